use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{
    AccountStore, ApplicationDecision, AuditEntry, AuditStore, CatalogStore, NewUser,
    OrderStore, ProductFilter, ReviewStore, SearchScope, Visibility, rating_summary,
};
use crate::{
    error::{AppError, AppResult},
    models::{
        ApplicationStatus, ApprovalStatus, Order, OrderItem, OrderStatus, Product, Review, Role,
        SellerApplication, User,
    },
};

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    products: HashMap<Uuid, Product>,
    orders: HashMap<Uuid, Order>,
    order_items: HashMap<Uuid, OrderItem>,
    applications: HashMap<Uuid, SellerApplication>,
    reviews: HashMap<Uuid, Review>,
    audit: Vec<AuditEntry>,
}

impl Tables {
    fn refresh_rating(&mut self, product_id: Uuid, now: DateTime<Utc>) {
        let (rating, count) = rating_summary(
            self.reviews
                .values()
                .filter(|r| r.product_id == product_id)
                .map(|r| r.rating),
        );
        if let Some(product) = self.products.get_mut(&product_id) {
            product.rating = rating;
            product.review_count = count;
            product.updated_at = now;
        }
    }
}

/// In-memory implementation of every store trait.
///
/// Intended for tests and local runs. All tables sit behind one lock, so
/// multi-entity operations are atomic with respect to each other.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> AppResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| AppError::Internal(anyhow::anyhow!("store lock poisoned")))
    }

    fn write(&self) -> AppResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| AppError::Internal(anyhow::anyhow!("store lock poisoned")))
    }

    /// Snapshot of the audit trail, oldest first.
    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.read()
            .map(|tables| tables.audit.clone())
            .unwrap_or_default()
    }
}

fn newest_first<T>(items: &mut [T], created_at: impl Fn(&T) -> DateTime<Utc>) {
    items.sort_by(|a, b| created_at(b).cmp(&created_at(a)));
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn insert_product(&self, product: Product) -> AppResult<Product> {
        let mut tables = self.write()?;
        if tables.products.contains_key(&product.id) {
            return Err(AppError::Conflict("product already exists".into()));
        }
        tables.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn find_product(&self, id: Uuid) -> AppResult<Option<Product>> {
        Ok(self.read()?.products.get(&id).cloned())
    }

    async fn save_product(&self, product: Product) -> AppResult<Product> {
        let mut tables = self.write()?;
        match tables.products.get_mut(&product.id) {
            Some(existing) => {
                *existing = product.clone();
                Ok(product)
            }
            None => Err(AppError::NotFound),
        }
    }

    async fn delete_product(&self, id: Uuid) -> AppResult<bool> {
        let mut tables = self.write()?;
        let removed = tables.products.remove(&id).is_some();
        if removed {
            tables.reviews.retain(|_, review| review.product_id != id);
        }
        Ok(removed)
    }

    async fn list_products(&self, filter: ProductFilter) -> AppResult<Vec<Product>> {
        let tables = self.read()?;
        let mut items: Vec<Product> = tables
            .products
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        newest_first(&mut items, |p| p.created_at);
        Ok(items)
    }

    async fn search_products(
        &self,
        keyword: &str,
        scope: SearchScope,
        limit: Option<u64>,
    ) -> AppResult<Vec<Product>> {
        let keyword = keyword.to_lowercase();
        let tables = self.read()?;
        let mut items: Vec<Product> = tables
            .products
            .values()
            .filter(|p| Visibility::Public.admits(p) && scope.matches(p, &keyword))
            .cloned()
            .collect();
        match scope {
            // Case-insensitive, like the collation Postgres sorts names with.
            SearchScope::Suggestions => items.sort_by(|a, b| {
                a.name
                    .to_lowercase()
                    .cmp(&b.name.to_lowercase())
                    .then_with(|| a.name.cmp(&b.name))
            }),
            SearchScope::Full => newest_first(&mut items, |p| p.created_at),
        }
        if let Some(limit) = limit {
            items.truncate(limit as usize);
        }
        Ok(items)
    }

    async fn top_rated(&self, limit: u64) -> AppResult<Vec<Product>> {
        let tables = self.read()?;
        let mut items: Vec<Product> = tables
            .products
            .values()
            .filter(|p| p.quantity > 0 && p.approval_status == Some(ApprovalStatus::Approved))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.rating.total_cmp(&a.rating));
        items.truncate(limit as usize);
        Ok(items)
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn insert_order(&self, order: Order) -> AppResult<Order> {
        let mut tables = self.write()?;
        if tables
            .orders
            .values()
            .any(|o| o.order_number == order.order_number)
        {
            return Err(AppError::Conflict("order number already exists".into()));
        }
        tables.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn find_order(&self, id: Uuid) -> AppResult<Option<Order>> {
        Ok(self.read()?.orders.get(&id).cloned())
    }

    async fn find_order_by_number(&self, order_number: &str) -> AppResult<Option<Order>> {
        Ok(self
            .read()?
            .orders
            .values()
            .find(|o| o.order_number == order_number)
            .cloned())
    }

    async fn list_orders_for_user(&self, user_id: Uuid) -> AppResult<Vec<Order>> {
        let tables = self.read()?;
        let mut items: Vec<Order> = tables
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        newest_first(&mut items, |o| o.created_at);
        Ok(items)
    }

    async fn set_order_status(
        &self,
        id: Uuid,
        status: OrderStatus,
        updated_at: DateTime<Utc>,
    ) -> AppResult<Option<Order>> {
        let mut tables = self.write()?;
        Ok(tables.orders.get_mut(&id).map(|order| {
            order.status = status;
            order.updated_at = updated_at;
            order.clone()
        }))
    }

    async fn insert_item(&self, item: OrderItem) -> AppResult<OrderItem> {
        let mut tables = self.write()?;
        if !tables.orders.contains_key(&item.order_id) {
            return Err(AppError::NotFound);
        }
        tables.order_items.insert(item.id, item.clone());
        Ok(item)
    }

    async fn list_items(&self, order_id: Uuid) -> AppResult<Vec<OrderItem>> {
        let tables = self.read()?;
        let mut items: Vec<OrderItem> = tables
            .order_items
            .values()
            .filter(|i| i.order_id == order_id)
            .cloned()
            .collect();
        items.sort_by_key(|i| i.created_at);
        Ok(items)
    }

    async fn delete_item(&self, item_id: Uuid) -> AppResult<bool> {
        Ok(self.write()?.order_items.remove(&item_id).is_some())
    }
}

#[async_trait]
impl AccountStore for InMemoryStore {
    async fn insert_user(&self, user: NewUser) -> AppResult<User> {
        let mut tables = self.write()?;
        let email = user.email.to_lowercase();
        if tables.users.values().any(|u| u.email.to_lowercase() == email) {
            return Err(AppError::Conflict("email already registered".into()));
        }
        if let Some(phone) = user.phone_number.as_deref().filter(|p| !p.is_empty()) {
            if tables
                .users
                .values()
                .any(|u| u.phone_number.as_deref() == Some(phone))
            {
                return Err(AppError::Conflict("phone number already registered".into()));
            }
        }
        let stored = User {
            id: user.id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            phone_number: user.phone_number,
            role: user.role,
            created_at: user.created_at,
            updated_at: user.created_at,
        };
        tables.users.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.read()?.users.get(&id).cloned())
    }

    async fn email_registered(&self, email: &str) -> AppResult<bool> {
        let email = email.to_lowercase();
        Ok(self
            .read()?
            .users
            .values()
            .any(|u| u.email.to_lowercase() == email))
    }

    async fn phone_registered(&self, phone_number: &str) -> AppResult<bool> {
        Ok(self
            .read()?
            .users
            .values()
            .any(|u| u.phone_number.as_deref() == Some(phone_number)))
    }

    async fn insert_application(
        &self,
        application: SellerApplication,
    ) -> AppResult<SellerApplication> {
        let mut tables = self.write()?;
        if tables
            .applications
            .values()
            .any(|a| a.user_id == application.user_id)
        {
            return Err(AppError::Conflict(
                "seller application already exists".into(),
            ));
        }
        tables
            .applications
            .insert(application.id, application.clone());
        Ok(application)
    }

    async fn find_application(&self, id: Uuid) -> AppResult<Option<SellerApplication>> {
        Ok(self.read()?.applications.get(&id).cloned())
    }

    async fn application_exists_for(&self, user_id: Uuid) -> AppResult<bool> {
        Ok(self
            .read()?
            .applications
            .values()
            .any(|a| a.user_id == user_id))
    }

    async fn list_applications(
        &self,
        status: Option<ApplicationStatus>,
    ) -> AppResult<Vec<SellerApplication>> {
        let tables = self.read()?;
        let mut items: Vec<SellerApplication> = tables
            .applications
            .values()
            .filter(|a| status.is_none_or(|s| a.status == s))
            .cloned()
            .collect();
        items.sort_by_key(|a| a.created_at);
        Ok(items)
    }

    async fn decide_application(
        &self,
        decision: ApplicationDecision,
    ) -> AppResult<Option<SellerApplication>> {
        let mut tables = self.write()?;
        let Some(applicant) = tables
            .applications
            .get(&decision.application_id)
            .map(|a| a.user_id)
        else {
            return Ok(None);
        };

        // Validate both rows before touching either.
        if decision.promote_applicant && !tables.users.contains_key(&applicant) {
            return Err(AppError::NotFound);
        }

        if decision.promote_applicant {
            if let Some(user) = tables.users.get_mut(&applicant) {
                if user.role == Role::Customer {
                    user.role = Role::Seller;
                    user.updated_at = decision.decided_at;
                }
            }
        }

        let application = tables
            .applications
            .get_mut(&decision.application_id)
            .ok_or(AppError::NotFound)?;
        application.status = decision.status;
        application.admin_notes = decision.admin_notes;
        application.updated_at = decision.decided_at;
        Ok(Some(application.clone()))
    }
}

#[async_trait]
impl ReviewStore for InMemoryStore {
    async fn insert_review(&self, review: Review) -> AppResult<Review> {
        let mut tables = self.write()?;
        if !tables.products.contains_key(&review.product_id) {
            return Err(AppError::NotFound);
        }
        tables.reviews.insert(review.id, review.clone());
        tables.refresh_rating(review.product_id, review.created_at);
        Ok(review)
    }

    async fn find_review(&self, id: Uuid) -> AppResult<Option<Review>> {
        Ok(self.read()?.reviews.get(&id).cloned())
    }

    async fn list_reviews(&self, product_id: Uuid) -> AppResult<Vec<Review>> {
        let tables = self.read()?;
        let mut items: Vec<Review> = tables
            .reviews
            .values()
            .filter(|r| r.product_id == product_id)
            .cloned()
            .collect();
        newest_first(&mut items, |r| r.created_at);
        Ok(items)
    }

    async fn delete_review(&self, id: Uuid) -> AppResult<bool> {
        let mut tables = self.write()?;
        match tables.reviews.remove(&id) {
            Some(review) => {
                tables.refresh_rating(review.product_id, Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl AuditStore for InMemoryStore {
    async fn append(&self, entry: AuditEntry) -> AppResult<()> {
        self.write()?.audit.push(entry);
        Ok(())
    }
}
