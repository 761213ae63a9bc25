use std::sync::Arc;

use crate::{
    db::DbPool,
    services::recommendation_service::{JitterSource, ThreadRngJitter},
    store::{
        AccountStore, AuditStore, CatalogStore, InMemoryStore, OrderStore, PgStore, ReviewStore,
    },
};

/// Shared handles every handler and service receives.
///
/// Each store is held behind its own trait object so tests can swap a single
/// collaborator, e.g. a failing catalog, without touching the rest.
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<dyn CatalogStore>,
    pub orders: Arc<dyn OrderStore>,
    pub accounts: Arc<dyn AccountStore>,
    pub reviews: Arc<dyn ReviewStore>,
    pub audit: Arc<dyn AuditStore>,
    pub jitter: Arc<dyn JitterSource>,
    pub jwt_secret: Arc<str>,
}

impl AppState {
    /// Wire every store to the same backing implementation.
    pub fn with_store<S>(store: Arc<S>, jwt_secret: impl Into<Arc<str>>) -> Self
    where
        S: CatalogStore + OrderStore + AccountStore + ReviewStore + AuditStore + 'static,
    {
        Self {
            catalog: store.clone(),
            orders: store.clone(),
            accounts: store.clone(),
            reviews: store.clone(),
            audit: store,
            jitter: Arc::new(ThreadRngJitter),
            jwt_secret: jwt_secret.into(),
        }
    }

    pub fn postgres(pool: DbPool, jwt_secret: impl Into<Arc<str>>) -> Self {
        Self::with_store(Arc::new(PgStore::new(pool)), jwt_secret)
    }

    pub fn in_memory(jwt_secret: impl Into<Arc<str>>) -> Self {
        Self::with_store(Arc::new(InMemoryStore::new()), jwt_secret)
    }

    pub fn with_jitter(mut self, jitter: Arc<dyn JitterSource>) -> Self {
        self.jitter = jitter;
        self
    }
}
