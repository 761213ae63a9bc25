mod common;

use std::sync::Arc;

use async_trait::async_trait;
use common::{memory_state, rated_product, register};
use marketplace_api::{
    error::{AppError, AppResult},
    models::{ApprovalStatus, Product},
    services::recommendation_service::{FALLBACK_LIMIT, FixedJitter, recommend},
    store::{CatalogStore, InMemoryStore, ProductFilter, SearchScope},
};
use uuid::Uuid;

/// Catalog whose listing query fails; `top_rated` can be made to fail too.
struct BrokenCatalog {
    inner: Arc<InMemoryStore>,
    top_rated_fails: bool,
}

fn outage() -> AppError {
    AppError::Internal(anyhow::anyhow!("catalog unavailable"))
}

#[async_trait]
impl CatalogStore for BrokenCatalog {
    async fn insert_product(&self, product: Product) -> AppResult<Product> {
        self.inner.insert_product(product).await
    }

    async fn find_product(&self, id: Uuid) -> AppResult<Option<Product>> {
        self.inner.find_product(id).await
    }

    async fn save_product(&self, product: Product) -> AppResult<Product> {
        self.inner.save_product(product).await
    }

    async fn delete_product(&self, id: Uuid) -> AppResult<bool> {
        self.inner.delete_product(id).await
    }

    async fn list_products(&self, _filter: ProductFilter) -> AppResult<Vec<Product>> {
        Err(outage())
    }

    async fn search_products(
        &self,
        keyword: &str,
        scope: SearchScope,
        limit: Option<u64>,
    ) -> AppResult<Vec<Product>> {
        self.inner.search_products(keyword, scope, limit).await
    }

    async fn top_rated(&self, limit: u64) -> AppResult<Vec<Product>> {
        if self.top_rated_fails {
            return Err(outage());
        }
        self.inner.top_rated(limit).await
    }
}

async fn seed(store: &InMemoryStore, products: &[Product]) {
    for p in products {
        store.insert_product(p.clone()).await.unwrap();
    }
}

#[tokio::test]
async fn ranks_public_products_above_threshold() {
    let (state, store) = memory_state();
    let state = state.with_jitter(Arc::new(FixedJitter(0.0)));

    let strong = rated_product("Strong", 4.5, 90, 10);
    let decent = rated_product("Decent", 3.0, 40, 2);
    let weak = rated_product("Weak", 1.0, 1, 1);
    let sold_out = rated_product("Sold out", 5.0, 100, 0);
    let mut hidden = rated_product("Hidden", 5.0, 100, 5);
    hidden.approval_status = Some(ApprovalStatus::Pending);
    seed(
        &store,
        &[strong.clone(), decent.clone(), weak, sold_out.clone(), hidden.clone()],
    )
    .await;
    let user = register(&state, "ranked@example.com").await;

    let resp = recommend(&state, user.id).await;
    assert_eq!(resp.message, "Recommendations");
    let ids: Vec<Uuid> = resp.data.unwrap().items.iter().map(|p| p.id).collect();

    // strong 0.83, sold_out 0.70, decent 0.56, weak 0.28
    assert_eq!(ids, vec![strong.id, sold_out.id, decent.id]);
    assert!(!ids.contains(&hidden.id));
}

#[tokio::test]
async fn output_is_capped_at_ten() {
    let (state, store) = memory_state();
    let products: Vec<Product> = (0..25)
        .map(|i| rated_product(&format!("P{i}"), 5.0, 100, 1))
        .collect();
    seed(&store, &products).await;
    let user = register(&state, "capped@example.com").await;

    for _ in 0..3 {
        let resp = recommend(&state, user.id).await;
        let items = resp.data.unwrap().items;
        assert_eq!(items.len(), 10);
    }
}

#[tokio::test]
async fn store_failure_falls_back_to_top_rated() {
    let (mut state, store) = memory_state();
    let products: Vec<Product> = (0..8)
        .map(|i| rated_product(&format!("P{i}"), f64::from(i) * 0.5 + 1.0, 10, 1))
        .collect();
    seed(&store, &products).await;
    let user = register(&state, "fallback@example.com").await;
    state.catalog = Arc::new(BrokenCatalog {
        inner: store.clone(),
        top_rated_fails: false,
    });

    let resp = recommend(&state, user.id).await;
    assert_eq!(resp.message, "Top rated products");
    let items = resp.data.unwrap().items;
    assert_eq!(items.len() as u64, FALLBACK_LIMIT);
    assert!(items.windows(2).all(|w| w[0].rating >= w[1].rating));
    assert_eq!(items[0].name, "P7");
}

#[tokio::test]
async fn total_outage_still_answers_with_empty_list() {
    let (mut state, store) = memory_state();
    seed(&store, &[rated_product("Only", 5.0, 100, 1)]).await;
    state.catalog = Arc::new(BrokenCatalog {
        inner: store,
        top_rated_fails: true,
    });

    let resp = recommend(&state, Uuid::new_v4()).await;
    assert!(resp.data.unwrap().items.is_empty());
    assert_eq!(resp.meta.unwrap().total, Some(0));
}

#[tokio::test]
async fn unknown_user_gets_top_rated_fallback() {
    let (state, store) = memory_state();
    let state = state.with_jitter(Arc::new(FixedJitter(0.0)));
    let products: Vec<Product> = (0..8)
        .map(|i| rated_product(&format!("P{i}"), f64::from(i) * 0.5 + 1.0, 100, 1))
        .collect();
    seed(&store, &products).await;

    let resp = recommend(&state, Uuid::new_v4()).await;
    assert_eq!(resp.message, "Top rated products");
    let items = resp.data.unwrap().items;
    assert!(items.len() as u64 <= FALLBACK_LIMIT);
    let names: Vec<&str> = items.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["P7", "P6", "P5", "P4", "P3"]);
}
