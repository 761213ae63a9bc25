use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::SellerApplication;

#[derive(Debug, Deserialize, ToSchema)]
pub struct ApplyRequest {
    pub business_name: String,
    pub business_type: Option<String>,
    pub tax_id: Option<String>,
    pub business_address: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct DecisionRequest {
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct ApplicationList {
    #[schema(value_type = Vec<SellerApplication>)]
    pub items: Vec<SellerApplication>,
}
