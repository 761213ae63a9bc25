use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::Review;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateReviewRequest {
    /// 1 to 5 inclusive.
    pub rating: i16,
    pub title: String,
    pub comment: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct ReviewList {
    #[schema(value_type = Vec<Review>)]
    pub items: Vec<Review>,
}
