//! Heuristic product ranking.
//!
//! Each candidate scores `rating/5 * 0.4 + min(reviews/100, 1) * 0.3
//! + 0.2 (in stock) + jitter`, where the jitter is drawn from `[0, 0.1)` on
//! every call. Rankings therefore differ between otherwise identical calls.

use rand::Rng;
use uuid::Uuid;

use crate::{
    dto::products::ProductList,
    error::{AppError, AppResult},
    models::Product,
    response::{ApiResponse, Meta},
    state::AppState,
    store::ProductFilter,
};

pub const RECOMMENDATION_LIMIT: usize = 10;
pub const FALLBACK_LIMIT: u64 = 5;

const RATING_WEIGHT: f64 = 0.4;
const POPULARITY_WEIGHT: f64 = 0.3;
const POPULARITY_SATURATION: f64 = 100.0;
const STOCK_BONUS: f64 = 0.2;
pub const DIVERSITY_WEIGHT: f64 = 0.1;
const SCORE_THRESHOLD: f64 = 0.5;

/// Source of the per-product diversity term. Implementations return values in
/// `[0, DIVERSITY_WEIGHT)`.
pub trait JitterSource: Send + Sync {
    fn jitter(&self) -> f64;
}

/// Fresh thread-local randomness on every draw.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRngJitter;

impl JitterSource for ThreadRngJitter {
    fn jitter(&self) -> f64 {
        rand::thread_rng().gen_range(0.0..DIVERSITY_WEIGHT)
    }
}

/// Constant jitter, clamped into the valid range.
#[derive(Debug, Clone, Copy)]
pub struct FixedJitter(pub f64);

impl JitterSource for FixedJitter {
    fn jitter(&self) -> f64 {
        self.0.clamp(0.0, DIVERSITY_WEIGHT - f64::EPSILON)
    }
}

#[derive(Debug, Clone)]
pub struct ScoredProduct {
    pub product: Product,
    pub score: f64,
}

pub fn score(product: &Product, jitter: f64) -> f64 {
    let rating = (product.rating / 5.0).clamp(0.0, 1.0) * RATING_WEIGHT;
    let popularity = (f64::from(product.review_count.max(0)) / POPULARITY_SATURATION).min(1.0)
        * POPULARITY_WEIGHT;
    let stock = if product.quantity > 0 { STOCK_BONUS } else { 0.0 };
    (rating + popularity + stock + jitter).clamp(0.0, 1.0)
}

/// Score, keep those above the threshold, best first. Ties keep input order.
pub fn rank(products: Vec<Product>, jitter: &dyn JitterSource) -> Vec<ScoredProduct> {
    let mut scored: Vec<ScoredProduct> = products
        .into_iter()
        .map(|product| {
            let score = score(&product, jitter.jitter());
            ScoredProduct { product, score }
        })
        .filter(|s| s.score > SCORE_THRESHOLD)
        .collect();
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(RECOMMENDATION_LIMIT);
    scored
}

async fn ranked(state: &AppState, user_id: Uuid) -> AppResult<Vec<Product>> {
    if state.accounts.find_user(user_id).await?.is_none() {
        return Err(AppError::NotFound);
    }
    let candidates = state.catalog.list_products(ProductFilter::public()).await?;
    Ok(rank(candidates, state.jitter.as_ref())
        .into_iter()
        .map(|s| s.product)
        .collect())
}

/// Never fails: on any error, an unknown user included, the top-rated catalog
/// is served instead, and if that fails too the list is empty.
pub async fn recommend(state: &AppState, user_id: Uuid) -> ApiResponse<ProductList> {
    let (message, items) = match ranked(state, user_id).await {
        Ok(items) => ("Recommendations", items),
        Err(err) => {
            tracing::error!(error = %err, %user_id, "recommendation failed, serving top rated");
            let fallback = state
                .catalog
                .top_rated(FALLBACK_LIMIT)
                .await
                .unwrap_or_else(|err| {
                    tracing::error!(error = %err, %user_id, "top rated fallback failed");
                    Vec::new()
                });
            ("Top rated products", fallback)
        }
    };
    tracing::debug!(%user_id, count = items.len(), "recommendations served");

    let meta = Meta::total(items.len());
    ApiResponse::success(message, ProductList { items }, Some(meta))
}
