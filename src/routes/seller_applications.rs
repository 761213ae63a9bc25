use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
};
use uuid::Uuid;

use crate::{
    dto::seller_applications::{ApplicationList, ApplyRequest, DecisionRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    models::{ApplicationStatus, SellerApplication},
    response::ApiResponse,
    services::seller_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_applications).post(apply))
        .route("/pending", get(list_pending))
        .route("/{id}/approve", put(approve))
        .route("/{id}/reject", put(reject))
}

#[utoipa::path(
    post,
    path = "/api/seller-applications",
    request_body = ApplyRequest,
    responses(
        (status = 201, description = "Application submitted", body = ApiResponse<SellerApplication>),
        (status = 409, description = "An application is already on file"),
    ),
    security(("bearer_auth" = [])),
    tag = "Seller Applications"
)]
pub async fn apply(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<ApplyRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<SellerApplication>>)> {
    let resp = seller_service::apply(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    get,
    path = "/api/seller-applications",
    responses(
        (status = 200, description = "All applications, oldest first", body = ApiResponse<ApplicationList>),
        (status = 403, description = "Admin only"),
    ),
    security(("bearer_auth" = [])),
    tag = "Seller Applications"
)]
pub async fn list_applications(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<ApplicationList>>> {
    let resp = seller_service::list_applications(&state, &user, None).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/seller-applications/pending",
    responses(
        (status = 200, description = "Applications awaiting a decision", body = ApiResponse<ApplicationList>),
        (status = 403, description = "Admin only"),
    ),
    security(("bearer_auth" = [])),
    tag = "Seller Applications"
)]
pub async fn list_pending(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<ApplicationList>>> {
    let resp =
        seller_service::list_applications(&state, &user, Some(ApplicationStatus::Pending)).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/seller-applications/{id}/approve",
    params(
        ("id" = Uuid, Path, description = "Application ID")
    ),
    request_body = DecisionRequest,
    responses(
        (status = 200, description = "Approved; applicant is now a seller", body = ApiResponse<SellerApplication>),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Application not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Seller Applications"
)]
pub async fn approve(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    payload: Option<Json<DecisionRequest>>,
) -> AppResult<Json<ApiResponse<SellerApplication>>> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let resp = seller_service::approve(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/seller-applications/{id}/reject",
    params(
        ("id" = Uuid, Path, description = "Application ID")
    ),
    request_body = DecisionRequest,
    responses(
        (status = 200, description = "Rejected", body = ApiResponse<SellerApplication>),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Application not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Seller Applications"
)]
pub async fn reject(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    payload: Option<Json<DecisionRequest>>,
) -> AppResult<Json<ApiResponse<SellerApplication>>> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let resp = seller_service::reject(&state, &user, id, payload).await?;
    Ok(Json(resp))
}
