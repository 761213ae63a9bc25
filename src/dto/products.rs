use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::Product;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateProductRequest {
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub quantity: i32,
    pub category: String,
    pub brand: String,
    pub image_url: Option<String>,
    /// Sellers may omit this or pass their own id; admins may list on behalf of a seller.
    pub seller_id: Option<Uuid>,
}

/// Content fields only. Approval state is changed through approve/reject.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub quantity: Option<i32>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct ProductList {
    #[schema(value_type = Vec<Product>)]
    pub items: Vec<Product>,
}
