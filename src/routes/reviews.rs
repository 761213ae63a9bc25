use axum::{
    Json, Router,
    extract::{Path, State},
    routing::delete,
};
use uuid::Uuid;

use crate::{
    error::AppResult, middleware::auth::AuthUser, response::ApiResponse,
    services::review_service, state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/{id}", delete(delete_review))
}

#[utoipa::path(
    delete,
    path = "/api/reviews/{id}",
    params(
        ("id" = Uuid, Path, description = "Review ID")
    ),
    responses(
        (status = 200, description = "Deleted review"),
        (status = 403, description = "Neither author nor admin"),
        (status = 404, description = "Review not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Reviews"
)]
pub async fn delete_review(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = review_service::delete_review(&state, &user, id).await?;
    Ok(Json(resp))
}
