use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::{
    audit,
    dto::reviews::{CreateReviewRequest, ReviewList},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Review,
    policy,
    response::{ApiResponse, Meta},
    state::AppState,
};

pub async fn add_review(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    payload: CreateReviewRequest,
) -> AppResult<ApiResponse<Review>> {
    if !(1..=5).contains(&payload.rating) {
        return Err(AppError::BadRequest("rating must be between 1 and 5".into()));
    }
    if state.catalog.find_product(product_id).await?.is_none() {
        return Err(AppError::NotFound);
    }

    let review = Review {
        id: Uuid::new_v4(),
        product_id,
        user_id: user.user_id,
        rating: payload.rating,
        title: payload.title,
        comment: payload.comment,
        created_at: Utc::now(),
    };
    let review = state.reviews.insert_review(review).await?;

    audit::record(
        state.audit.as_ref(),
        Some(user.user_id),
        "review_create",
        "reviews",
        json!({ "review_id": review.id, "product_id": product_id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Review added",
        review,
        Some(Meta::empty()),
    ))
}

pub async fn list_reviews(
    state: &AppState,
    product_id: Uuid,
) -> AppResult<ApiResponse<ReviewList>> {
    if state.catalog.find_product(product_id).await?.is_none() {
        return Err(AppError::NotFound);
    }
    let items = state.reviews.list_reviews(product_id).await?;
    let meta = Meta::total(items.len());
    Ok(ApiResponse::success("Reviews", ReviewList { items }, Some(meta)))
}

pub async fn delete_review(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let review = state
        .reviews
        .find_review(id)
        .await?
        .ok_or(AppError::NotFound)?;
    policy::can_delete_review(user, review.user_id)?;

    if !state.reviews.delete_review(id).await? {
        return Err(AppError::NotFound);
    }

    audit::record(
        state.audit.as_ref(),
        Some(user.user_id),
        "review_delete",
        "reviews",
        json!({ "review_id": id, "product_id": review.product_id }),
    )
    .await;

    Ok(ApiResponse::success("Deleted", json!({}), Some(Meta::empty())))
}
