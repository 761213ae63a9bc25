use chrono::Utc;
use rand::Rng;
use rust_decimal::Decimal;
use serde_json::json;
use uuid::Uuid;

use crate::{
    audit,
    dto::orders::{
        AddOrderItemRequest, CreateOrderRequest, OrderList, OrderWithItems,
        UpdateOrderStatusRequest,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{MAX_QUANTITY, Order, OrderItem, OrderStatus, max_money},
    policy,
    response::{ApiResponse, Meta},
    state::AppState,
};

pub const ORDER_NUMBER_PREFIX: &str = "ORD-";
const ORDER_NUMBER_LEN: usize = 8;
const ORDER_NUMBER_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
/// Attempts before a run of order-number collisions is reported as a conflict.
const ORDER_NUMBER_ATTEMPTS: usize = 3;

/// `ORD-` followed by eight random uppercase alphanumerics.
pub fn generate_order_number() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..ORDER_NUMBER_LEN)
        .map(|_| ORDER_NUMBER_CHARSET[rng.gen_range(0..ORDER_NUMBER_CHARSET.len())] as char)
        .collect();
    format!("{ORDER_NUMBER_PREFIX}{suffix}")
}

async fn load(state: &AppState, id: Uuid) -> AppResult<Order> {
    state.orders.find_order(id).await?.ok_or(AppError::NotFound)
}

async fn with_items(state: &AppState, order: Order) -> AppResult<OrderWithItems> {
    let items = state.orders.list_items(order.id).await?;
    Ok(OrderWithItems { order, items })
}

fn order_listing(items: Vec<Order>) -> ApiResponse<OrderList> {
    let meta = Meta::total(items.len());
    ApiResponse::success("Ok", OrderList { items }, Some(meta))
}

pub async fn create_order(
    state: &AppState,
    user: &AuthUser,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<Order>> {
    for (field, amount) in [
        ("total_amount", payload.total_amount),
        ("tax_amount", payload.tax_amount),
        ("shipping_cost", payload.shipping_cost),
    ] {
        if amount.is_sign_negative() {
            return Err(AppError::BadRequest(format!("{field} must not be negative")));
        }
        if amount > max_money() {
            return Err(AppError::BadRequest(format!(
                "{field} must not exceed {}",
                max_money()
            )));
        }
    }

    let now = Utc::now();
    let mut attempt = 0;
    let order = loop {
        attempt += 1;
        let order = Order {
            id: Uuid::new_v4(),
            user_id: user.user_id,
            order_number: generate_order_number(),
            status: OrderStatus::Pending,
            total_amount: payload.total_amount,
            tax_amount: payload.tax_amount,
            shipping_cost: payload.shipping_cost,
            shipping_address: payload.shipping_address.clone(),
            payment_method: payload.payment_method.clone(),
            created_at: now,
            updated_at: now,
        };
        match state.orders.insert_order(order).await {
            Ok(order) => break order,
            Err(AppError::Conflict(_)) if attempt < ORDER_NUMBER_ATTEMPTS => {
                tracing::warn!(attempt, "order number collision, regenerating");
            }
            Err(err) => return Err(err),
        }
    };

    tracing::info!(order_id = %order.id, order_number = %order.order_number, "order created");
    audit::record(
        state.audit.as_ref(),
        Some(user.user_id),
        "order_create",
        "orders",
        json!({ "order_id": order.id, "order_number": order.order_number }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order created",
        order,
        Some(Meta::empty()),
    ))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = load(state, id).await?;
    policy::can_view_order(user, order.user_id)?;
    let data = with_items(state, order).await?;
    Ok(ApiResponse::success("OK", data, Some(Meta::empty())))
}

/// Public lookup by tracking number; absence is not an error at this level.
pub async fn find_by_number(
    state: &AppState,
    order_number: &str,
) -> AppResult<Option<OrderWithItems>> {
    match state.orders.find_order_by_number(order_number).await? {
        Some(order) => with_items(state, order).await.map(Some),
        None => Ok(None),
    }
}

pub async fn track_order(
    state: &AppState,
    order_number: &str,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let data = find_by_number(state, order_number)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("OK", data, Some(Meta::empty())))
}

pub async fn list_my_orders(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<OrderList>> {
    let items = state.orders.list_orders_for_user(user.user_id).await?;
    Ok(order_listing(items))
}

pub async fn list_orders_for_user(
    state: &AppState,
    user: &AuthUser,
    owner_id: Uuid,
) -> AppResult<ApiResponse<OrderList>> {
    policy::can_view_order(user, owner_id)?;
    let items = state.orders.list_orders_for_user(owner_id).await?;
    Ok(order_listing(items))
}

/// Any status may follow any other; there is no transition graph.
pub async fn update_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    policy::can_change_order_status(user)?;
    let status: OrderStatus = payload.status.parse()?;

    let order = state
        .orders
        .set_order_status(id, status, Utc::now())
        .await?
        .ok_or(AppError::NotFound)?;

    tracing::info!(order_id = %id, status = status.as_str(), "order status changed");
    audit::record(
        state.audit.as_ref(),
        Some(user.user_id),
        "order_status_update",
        "orders",
        json!({ "order_id": id, "status": status.as_str() }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order status updated",
        order,
        Some(Meta::empty()),
    ))
}

/// Attach a product to the caller's order, copying its current price.
/// Inventory is not reserved or decremented.
pub async fn add_item(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
    payload: AddOrderItemRequest,
) -> AppResult<ApiResponse<OrderItem>> {
    if payload.quantity <= 0 {
        return Err(AppError::BadRequest("quantity must be positive".into()));
    }
    if payload.quantity > MAX_QUANTITY {
        return Err(AppError::BadRequest(format!(
            "quantity must not exceed {MAX_QUANTITY}"
        )));
    }

    let order = load(state, order_id).await?;
    policy::can_modify_order(user, order.user_id)?;

    let product = state
        .catalog
        .find_product(payload.product_id)
        .await?
        .filter(|p| p.is_public())
        .ok_or(AppError::NotFound)?;

    let unit_price = product.price;
    let total_price = unit_price
        .checked_mul(Decimal::from(payload.quantity))
        .filter(|total| *total <= max_money())
        .ok_or_else(|| AppError::BadRequest("line total exceeds the supported amount".into()))?;
    let item = OrderItem {
        id: Uuid::new_v4(),
        order_id: order.id,
        product_id: product.id,
        quantity: payload.quantity,
        unit_price,
        total_price,
        created_at: Utc::now(),
    };
    let item = state.orders.insert_item(item).await?;

    tracing::info!(order_id = %order.id, item_id = %item.id, product_id = %product.id, "order item added");
    audit::record(
        state.audit.as_ref(),
        Some(user.user_id),
        "order_item_add",
        "order_items",
        json!({ "order_id": order.id, "item_id": item.id, "product_id": product.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Item added",
        item,
        Some(Meta::empty()),
    ))
}

/// Deletes the item without checking which order, or whose order, it belongs to.
pub async fn remove_item(
    state: &AppState,
    user: &AuthUser,
    item_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    if !state.orders.delete_item(item_id).await? {
        return Err(AppError::NotFound);
    }

    tracing::info!(item_id = %item_id, "order item removed");
    audit::record(
        state.audit.as_ref(),
        Some(user.user_id),
        "order_item_remove",
        "order_items",
        json!({ "item_id": item_id }),
    )
    .await;

    Ok(ApiResponse::success("Deleted", json!({}), Some(Meta::empty())))
}
