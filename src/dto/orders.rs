use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Order, OrderItem};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    pub shipping_address: String,
    pub payment_method: String,
    #[serde(default)]
    pub total_amount: Decimal,
    #[serde(default)]
    pub tax_amount: Decimal,
    #[serde(default)]
    pub shipping_cost: Decimal,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddOrderItemRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    /// One of `PENDING`, `PROCESSING`, `SHIPPED`, `DELIVERED`, `CANCELLED`.
    pub status: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct OrderList {
    #[schema(value_type = Vec<Order>)]
    pub items: Vec<Order>,
}
