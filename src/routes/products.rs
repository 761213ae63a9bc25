use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
};
use uuid::Uuid;

use crate::{
    dto::{
        products::{CreateProductRequest, ProductList, UpdateProductRequest},
        reviews::{CreateReviewRequest, ReviewList},
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::{Product, Review},
    response::ApiResponse,
    routes::params::SearchQuery,
    services::{product_service, recommendation_service, review_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/pending", get(list_pending))
        .route("/search", get(search_products))
        .route("/search/suggestions", get(search_suggestions))
        .route("/trending/top-rated", get(top_rated))
        .route("/recommendations/{user_id}", get(recommendations))
        .route("/category/{category}", get(list_by_category))
        .route("/seller/{seller_id}", get(list_by_seller))
        .route(
            "/{id}",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/{id}/approve", put(approve_product))
        .route("/{id}/reject", put(reject_product))
        .route("/{id}/reviews", get(list_reviews).post(create_review))
}

#[utoipa::path(
    get,
    path = "/api/products",
    responses(
        (status = 200, description = "Approved products", body = ApiResponse<ProductList>)
    ),
    tag = "Products"
)]
pub async fn list_products(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    let resp = product_service::list_products(&state).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/products/{id}",
    params(
        ("id" = Uuid, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Get product", body = ApiResponse<Product>),
        (status = 404, description = "Product not found"),
    ),
    tag = "Products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let resp = product_service::get_product(&state, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/products/category/{category}",
    params(
        ("category" = String, Path, description = "Category name")
    ),
    responses(
        (status = 200, description = "Approved products in the category", body = ApiResponse<ProductList>)
    ),
    tag = "Products"
)]
pub async fn list_by_category(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    let resp = product_service::list_by_category(&state, category).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/products/search",
    params(SearchQuery),
    responses(
        (status = 200, description = "Matching approved products", body = ApiResponse<ProductList>)
    ),
    tag = "Products"
)]
pub async fn search_products(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    let resp = product_service::search(&state, query.q.as_deref()).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/products/search/suggestions",
    params(SearchQuery),
    responses(
        (status = 200, description = "Up to ten products by name", body = ApiResponse<ProductList>)
    ),
    tag = "Products"
)]
pub async fn search_suggestions(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    let resp = product_service::suggestions(&state, query.q.as_deref()).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/products/trending/top-rated",
    responses(
        (status = 200, description = "Best rated products in stock", body = ApiResponse<ProductList>)
    ),
    tag = "Products"
)]
pub async fn top_rated(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    let resp = product_service::top_rated(&state).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/products/recommendations/{user_id}",
    params(
        ("user_id" = Uuid, Path, description = "User to recommend for")
    ),
    responses(
        (status = 200, description = "Recommended products; unknown users get the top rated fallback", body = ApiResponse<ProductList>)
    ),
    tag = "Products"
)]
pub async fn recommendations(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Json<ApiResponse<ProductList>> {
    Json(recommendation_service::recommend(&state, user_id).await)
}

#[utoipa::path(
    post,
    path = "/api/products",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Create product", body = ApiResponse<Product>),
        (status = 401, description = "Unauthenticated"),
        (status = 403, description = "Customers cannot list products"),
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateProductRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Product>>)> {
    let resp = product_service::create_product(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    put,
    path = "/api/products/{id}",
    params(
        ("id" = Uuid, Path, description = "Product ID")
    ),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Updated product", body = ApiResponse<Product>),
        (status = 403, description = "Not the owning seller"),
        (status = 404, description = "Product not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn update_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductRequest>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let resp = product_service::update_product(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/products/{id}",
    params(
        ("id" = Uuid, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Deleted product"),
        (status = 403, description = "Not the owning seller"),
        (status = 404, description = "Product not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = product_service::delete_product(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/products/pending",
    responses(
        (status = 200, description = "Products awaiting review", body = ApiResponse<ProductList>),
        (status = 403, description = "Admin only"),
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn list_pending(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    let resp = product_service::list_pending(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/products/seller/{seller_id}",
    params(
        ("seller_id" = Uuid, Path, description = "Seller ID")
    ),
    responses(
        (status = 200, description = "All listings of the seller", body = ApiResponse<ProductList>),
        (status = 403, description = "Another seller's listings"),
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn list_by_seller(
    State(state): State<AppState>,
    user: AuthUser,
    Path(seller_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    let resp = product_service::list_by_seller(&state, &user, seller_id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/products/{id}/approve",
    params(
        ("id" = Uuid, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Approved product", body = ApiResponse<Product>),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Product not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn approve_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let resp = product_service::approve_product(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/products/{id}/reject",
    params(
        ("id" = Uuid, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Rejected product", body = ApiResponse<Product>),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Product not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn reject_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let resp = product_service::reject_product(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/products/{id}/reviews",
    params(
        ("id" = Uuid, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Reviews, newest first", body = ApiResponse<ReviewList>),
        (status = 404, description = "Product not found"),
    ),
    tag = "Reviews"
)]
pub async fn list_reviews(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<ReviewList>>> {
    let resp = review_service::list_reviews(&state, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/products/{id}/reviews",
    params(
        ("id" = Uuid, Path, description = "Product ID")
    ),
    request_body = CreateReviewRequest,
    responses(
        (status = 201, description = "Review added", body = ApiResponse<Review>),
        (status = 400, description = "Rating out of range"),
        (status = 404, description = "Product not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Reviews"
)]
pub async fn create_review(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreateReviewRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Review>>)> {
    let resp = review_service::add_review(&state, &user, id, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}
