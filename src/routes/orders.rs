use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
};
use uuid::Uuid;

use crate::{
    dto::orders::{
        AddOrderItemRequest, CreateOrderRequest, OrderList, OrderWithItems,
        UpdateOrderStatusRequest,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::{Order, OrderItem},
    response::ApiResponse,
    services::order_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders).post(create_order))
        .route("/track/{order_number}", get(track_order))
        .route("/user/{user_id}", get(list_user_orders))
        .route("/items/{item_id}", delete(remove_item))
        .route("/{id}", get(get_order))
        .route("/{id}/status", put(update_status))
        .route("/{id}/items", post(add_item))
}

#[utoipa::path(
    post,
    path = "/api/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created in PENDING", body = ApiResponse<Order>),
        (status = 401, description = "Unauthenticated"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateOrderRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Order>>)> {
    let resp = order_service::create_order(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    get,
    path = "/api/orders",
    responses(
        (status = 200, description = "Caller's orders, newest first", body = ApiResponse<OrderList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let resp = order_service::list_my_orders(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Order with items", body = ApiResponse<OrderWithItems>),
        (status = 403, description = "Neither owner nor admin"),
        (status = 404, description = "Order not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    let resp = order_service::get_order(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/orders/user/{user_id}",
    params(
        ("user_id" = Uuid, Path, description = "Owner ID")
    ),
    responses(
        (status = 200, description = "Orders of the user", body = ApiResponse<OrderList>),
        (status = 403, description = "Neither owner nor admin"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_user_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let resp = order_service::list_orders_for_user(&state, &user, user_id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/orders/{id}/status",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = ApiResponse<Order>),
        (status = 400, description = "Unknown status"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Order not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn update_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let resp = order_service::update_status(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/orders/{id}/items",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    request_body = AddOrderItemRequest,
    responses(
        (status = 201, description = "Item added with a price snapshot", body = ApiResponse<OrderItem>),
        (status = 403, description = "Not the order owner"),
        (status = 404, description = "Order or product not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn add_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddOrderItemRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<OrderItem>>)> {
    let resp = order_service::add_item(&state, &user, id, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

/// Ownership of the item is not verified before deletion.
#[utoipa::path(
    delete,
    path = "/api/orders/items/{item_id}",
    params(
        ("item_id" = Uuid, Path, description = "Order item ID")
    ),
    responses(
        (status = 200, description = "Item removed"),
        (status = 404, description = "Item not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn remove_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(item_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = order_service::remove_item(&state, &user, item_id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/orders/track/{order_number}",
    params(
        ("order_number" = String, Path, description = "Public tracking number, e.g. ORD-7K2Q9ZXA")
    ),
    responses(
        (status = 200, description = "Order with items", body = ApiResponse<OrderWithItems>),
        (status = 404, description = "No such order"),
    ),
    tag = "Orders"
)]
pub async fn track_order(
    State(state): State<AppState>,
    Path(order_number): Path<String>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    let resp = order_service::track_order(&state, &order_number).await?;
    Ok(Json(resp))
}
