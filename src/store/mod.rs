//! Repository contract consumed by the services.
//!
//! Every store returns `AppResult` so storage failures flow through the same
//! error taxonomy as business failures. Uniqueness rules the workflows rely on
//! (order numbers, one application per user, user email/phone) are enforced
//! here as well, so a lost check-then-write race still ends in `Conflict`.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        ApplicationStatus, ApprovalStatus, Order, OrderItem, OrderStatus, Product, Review, Role,
        SellerApplication, User,
    },
};

pub use memory::InMemoryStore;
pub use postgres::PgStore;

/// Which approval states a product listing query admits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Visibility {
    /// Every product regardless of approval state.
    #[default]
    Any,
    /// Approved products plus legacy rows without a status.
    Public,
    /// Exactly one approval state; legacy rows never match.
    Status(ApprovalStatus),
}

impl Visibility {
    pub fn admits(&self, product: &Product) -> bool {
        match self {
            Visibility::Any => true,
            Visibility::Public => product.is_public(),
            Visibility::Status(status) => product.approval_status == Some(*status),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub visibility: Visibility,
    pub category: Option<String>,
    pub seller_id: Option<Uuid>,
}

impl ProductFilter {
    pub fn public() -> Self {
        Self {
            visibility: Visibility::Public,
            ..Self::default()
        }
    }

    pub fn matches(&self, product: &Product) -> bool {
        self.visibility.admits(product)
            && self
                .category
                .as_ref()
                .is_none_or(|category| &product.category == category)
            && self
                .seller_id
                .is_none_or(|seller_id| product.seller_id == Some(seller_id))
    }
}

/// Which columns a keyword search inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    /// Name, brand, description and category; unordered.
    Full,
    /// Name and brand only, ordered by name.
    Suggestions,
}

impl SearchScope {
    /// Case-insensitive substring match of an already lowercased keyword.
    pub fn matches(&self, product: &Product, keyword_lower: &str) -> bool {
        let hit = |value: &str| value.to_lowercase().contains(keyword_lower);
        let narrow = hit(product.name.as_str()) || hit(product.brand.as_str());
        match self {
            SearchScope::Suggestions => narrow,
            SearchScope::Full => {
                narrow
                    || product.description.as_deref().is_some_and(hit)
                    || hit(product.category.as_str())
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Terminal decision on a seller application.
#[derive(Debug, Clone)]
pub struct ApplicationDecision {
    pub application_id: Uuid,
    pub status: ApplicationStatus,
    pub admin_notes: Option<String>,
    /// Rewrite the applicant's role from CUSTOMER to SELLER in the same unit of work.
    pub promote_applicant: bool,
    pub decided_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub action: String,
    pub resource: Option<String>,
    pub metadata: Option<Value>,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn insert_product(&self, product: Product) -> AppResult<Product>;

    async fn find_product(&self, id: Uuid) -> AppResult<Option<Product>>;

    /// Overwrite every column of an existing product.
    async fn save_product(&self, product: Product) -> AppResult<Product>;

    /// Returns `false` when no row existed.
    async fn delete_product(&self, id: Uuid) -> AppResult<bool>;

    /// Newest first.
    async fn list_products(&self, filter: ProductFilter) -> AppResult<Vec<Product>>;

    /// Public products only. `keyword` is trimmed and non-empty.
    async fn search_products(
        &self,
        keyword: &str,
        scope: SearchScope,
        limit: Option<u64>,
    ) -> AppResult<Vec<Product>>;

    /// Approved, in-stock products by rating, best first.
    async fn top_rated(&self, limit: u64) -> AppResult<Vec<Product>>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// `Conflict` when the order number is already taken.
    async fn insert_order(&self, order: Order) -> AppResult<Order>;

    async fn find_order(&self, id: Uuid) -> AppResult<Option<Order>>;

    async fn find_order_by_number(&self, order_number: &str) -> AppResult<Option<Order>>;

    /// Newest first.
    async fn list_orders_for_user(&self, user_id: Uuid) -> AppResult<Vec<Order>>;

    async fn set_order_status(
        &self,
        id: Uuid,
        status: OrderStatus,
        updated_at: DateTime<Utc>,
    ) -> AppResult<Option<Order>>;

    async fn insert_item(&self, item: OrderItem) -> AppResult<OrderItem>;

    async fn list_items(&self, order_id: Uuid) -> AppResult<Vec<OrderItem>>;

    /// Returns `false` when no row existed.
    async fn delete_item(&self, item_id: Uuid) -> AppResult<bool>;
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// `Conflict` on a duplicate email or non-empty phone number.
    async fn insert_user(&self, user: NewUser) -> AppResult<User>;

    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>>;

    async fn email_registered(&self, email: &str) -> AppResult<bool>;

    async fn phone_registered(&self, phone_number: &str) -> AppResult<bool>;

    /// `Conflict` when the applicant already has an application on file.
    async fn insert_application(
        &self,
        application: SellerApplication,
    ) -> AppResult<SellerApplication>;

    async fn find_application(&self, id: Uuid) -> AppResult<Option<SellerApplication>>;

    async fn application_exists_for(&self, user_id: Uuid) -> AppResult<bool>;

    /// Oldest first. `None` lists every status.
    async fn list_applications(
        &self,
        status: Option<ApplicationStatus>,
    ) -> AppResult<Vec<SellerApplication>>;

    /// Applies the decision and, when requested, the role promotion atomically.
    /// `Ok(None)` when the application does not exist; `NotFound` when the
    /// applicant has vanished, in which case nothing is written.
    async fn decide_application(
        &self,
        decision: ApplicationDecision,
    ) -> AppResult<Option<SellerApplication>>;
}

#[async_trait]
pub trait ReviewStore: Send + Sync {
    /// Stores the review and refreshes the product's rating and review count atomically.
    async fn insert_review(&self, review: Review) -> AppResult<Review>;

    async fn find_review(&self, id: Uuid) -> AppResult<Option<Review>>;

    /// Newest first.
    async fn list_reviews(&self, product_id: Uuid) -> AppResult<Vec<Review>>;

    /// Removes the review and refreshes the product's rating; `false` when absent.
    async fn delete_review(&self, id: Uuid) -> AppResult<bool>;
}

#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append(&self, entry: AuditEntry) -> AppResult<()>;
}

/// Mean review rating and count as stored on the product.
pub fn rating_summary(ratings: impl IntoIterator<Item = i16>) -> (f64, i32) {
    let (sum, count) = ratings
        .into_iter()
        .fold((0_i64, 0_i32), |(sum, count), r| (sum + i64::from(r), count + 1));
    if count == 0 {
        (0.0, 0)
    } else {
        (sum as f64 / f64::from(count), count)
    }
}
