use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::sea_query::{Expr, Func, LockType, SimpleExpr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DbErr, EntityTrait,
    Order as SortOrder, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, SqlErr,
    TransactionTrait,
};
use uuid::Uuid;

use super::{
    AccountStore, ApplicationDecision, AuditEntry, AuditStore, CatalogStore, NewUser,
    OrderStore, ProductFilter, ReviewStore, SearchScope, Visibility, rating_summary,
};
use crate::{
    db::{DbPool, OrmConn, orm_from_pool},
    entity::{
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
            Model as OrderItemModel,
        },
        orders::{
            ActiveModel as OrderActive, Column as OrderCol, Entity as Orders,
            Model as OrderModel,
        },
        products::{
            ActiveModel as ProductActive, Column as ProductCol, Entity as Products,
            Model as ProductModel,
        },
        reviews::{
            ActiveModel as ReviewActive, Column as ReviewCol, Entity as Reviews,
            Model as ReviewModel,
        },
        seller_applications::{
            ActiveModel as ApplicationActive, Column as ApplicationCol,
            Entity as SellerApplications, Model as ApplicationModel,
        },
        users::{ActiveModel as UserActive, Column as UserCol, Entity as Users, Model as UserModel},
    },
    error::{AppError, AppResult},
    models::{
        ApplicationStatus, ApprovalStatus, Order, OrderItem, OrderStatus, Product, Review, Role,
        SellerApplication, User,
    },
};

/// Postgres-backed store. Entity reads and writes go through SeaORM; the
/// audit trail is written with a raw sqlx statement on the shared pool.
#[derive(Clone)]
pub struct PgStore {
    orm: OrmConn,
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self {
            orm: orm_from_pool(pool.clone()),
            pool,
        }
    }

    pub fn orm(&self) -> &OrmConn {
        &self.orm
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

fn conflict_on_unique(err: DbErr, message: &str) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => AppError::Conflict(message.to_string()),
        Some(SqlErr::ForeignKeyConstraintViolation(_)) => AppError::NotFound,
        _ => AppError::OrmError(err),
    }
}

fn decode<T: FromStr>(column: &str, value: &str) -> AppResult<T> {
    value
        .parse()
        .map_err(|_| AppError::Internal(anyhow::anyhow!("invalid {column} '{value}' in storage")))
}

fn like_pattern(keyword: &str) -> String {
    let escaped = keyword
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn visibility_condition(visibility: Visibility) -> Condition {
    match visibility {
        Visibility::Any => Condition::all(),
        Visibility::Public => Condition::any()
            .add(ProductCol::ApprovalStatus.eq(ApprovalStatus::Approved.as_str()))
            .add(ProductCol::ApprovalStatus.is_null()),
        Visibility::Status(status) => {
            Condition::all().add(ProductCol::ApprovalStatus.eq(status.as_str()))
        }
    }
}

fn product_from_entity(model: ProductModel) -> AppResult<Product> {
    let approval_status = model
        .approval_status
        .as_deref()
        .map(|s| decode::<ApprovalStatus>("approval status", s))
        .transpose()?;
    Ok(Product {
        id: model.id,
        name: model.name,
        description: model.description,
        price: model.price,
        quantity: model.quantity,
        category: model.category,
        brand: model.brand,
        image_url: model.image_url,
        rating: model.rating,
        review_count: model.review_count,
        seller_id: model.seller_id,
        approval_status,
        approved_by: model.approved_by,
        approved_at: model.approved_at.map(|dt| dt.with_timezone(&Utc)),
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

fn product_to_active(product: Product) -> ProductActive {
    ProductActive {
        id: Set(product.id),
        name: Set(product.name),
        description: Set(product.description),
        price: Set(product.price),
        quantity: Set(product.quantity),
        category: Set(product.category),
        brand: Set(product.brand),
        image_url: Set(product.image_url),
        rating: Set(product.rating),
        review_count: Set(product.review_count),
        seller_id: Set(product.seller_id),
        approval_status: Set(product.approval_status.map(|s| s.as_str().to_string())),
        approved_by: Set(product.approved_by),
        approved_at: Set(product.approved_at.map(Into::into)),
        created_at: Set(product.created_at.into()),
        updated_at: Set(product.updated_at.into()),
    }
}

fn products_from_entities(models: Vec<ProductModel>) -> AppResult<Vec<Product>> {
    models.into_iter().map(product_from_entity).collect()
}

fn order_from_entity(model: OrderModel) -> AppResult<Order> {
    Ok(Order {
        id: model.id,
        user_id: model.user_id,
        status: decode("order status", &model.status)?,
        order_number: model.order_number,
        total_amount: model.total_amount,
        tax_amount: model.tax_amount,
        shipping_cost: model.shipping_cost,
        shipping_address: model.shipping_address,
        payment_method: model.payment_method,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

fn order_item_from_entity(model: OrderItemModel) -> OrderItem {
    OrderItem {
        id: model.id,
        order_id: model.order_id,
        product_id: model.product_id,
        quantity: model.quantity,
        unit_price: model.unit_price,
        total_price: model.total_price,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

fn user_from_entity(model: UserModel) -> AppResult<User> {
    Ok(User {
        id: model.id,
        role: decode::<Role>("role", &model.role)?,
        email: model.email,
        first_name: model.first_name,
        last_name: model.last_name,
        phone_number: model.phone_number,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

fn application_from_entity(model: ApplicationModel) -> AppResult<SellerApplication> {
    Ok(SellerApplication {
        id: model.id,
        user_id: model.user_id,
        status: decode("application status", &model.status)?,
        business_name: model.business_name,
        business_type: model.business_type,
        tax_id: model.tax_id,
        business_address: model.business_address,
        admin_notes: model.admin_notes,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

fn review_from_entity(model: ReviewModel) -> Review {
    Review {
        id: model.id,
        product_id: model.product_id,
        user_id: model.user_id,
        rating: model.rating,
        title: model.title,
        comment: model.comment,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

/// Recompute the derived rating columns from the reviews visible to `conn`.
async fn refresh_rating<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    now: DateTime<Utc>,
) -> AppResult<()> {
    let ratings = Reviews::find()
        .filter(ReviewCol::ProductId.eq(product_id))
        .all(conn)
        .await?
        .into_iter()
        .map(|r| r.rating);
    let (rating, count) = rating_summary(ratings);

    Products::update_many()
        .col_expr(ProductCol::Rating, Expr::value(rating))
        .col_expr(ProductCol::ReviewCount, Expr::value(count))
        .col_expr(
            ProductCol::UpdatedAt,
            Expr::value(DateTime::<chrono::FixedOffset>::from(now)),
        )
        .filter(ProductCol::Id.eq(product_id))
        .exec(conn)
        .await?;
    Ok(())
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn insert_product(&self, product: Product) -> AppResult<Product> {
        let model = product_to_active(product)
            .insert(&self.orm)
            .await
            .map_err(|err| conflict_on_unique(err, "product already exists"))?;
        product_from_entity(model)
    }

    async fn find_product(&self, id: Uuid) -> AppResult<Option<Product>> {
        Products::find_by_id(id)
            .one(&self.orm)
            .await?
            .map(product_from_entity)
            .transpose()
    }

    async fn save_product(&self, product: Product) -> AppResult<Product> {
        match product_to_active(product).update(&self.orm).await {
            Ok(model) => product_from_entity(model),
            Err(DbErr::RecordNotUpdated) => Err(AppError::NotFound),
            Err(err) => Err(err.into()),
        }
    }

    async fn delete_product(&self, id: Uuid) -> AppResult<bool> {
        let result = Products::delete_by_id(id).exec(&self.orm).await?;
        Ok(result.rows_affected > 0)
    }

    async fn list_products(&self, filter: ProductFilter) -> AppResult<Vec<Product>> {
        let mut condition = Condition::all().add(visibility_condition(filter.visibility));
        if let Some(category) = filter.category {
            condition = condition.add(ProductCol::Category.eq(category));
        }
        if let Some(seller_id) = filter.seller_id {
            condition = condition.add(ProductCol::SellerId.eq(seller_id));
        }

        let models = Products::find()
            .filter(condition)
            .order_by_desc(ProductCol::CreatedAt)
            .all(&self.orm)
            .await?;
        products_from_entities(models)
    }

    async fn search_products(
        &self,
        keyword: &str,
        scope: SearchScope,
        limit: Option<u64>,
    ) -> AppResult<Vec<Product>> {
        let pattern = like_pattern(keyword);
        let mut matches = Condition::any()
            .add(Expr::col(ProductCol::Name).ilike(pattern.clone()))
            .add(Expr::col(ProductCol::Brand).ilike(pattern.clone()));
        if scope == SearchScope::Full {
            matches = matches
                .add(Expr::col(ProductCol::Description).ilike(pattern.clone()))
                .add(Expr::col(ProductCol::Category).ilike(pattern));
        }

        let mut finder = Products::find().filter(
            Condition::all()
                .add(visibility_condition(Visibility::Public))
                .add(matches),
        );
        finder = match scope {
            // Case-insensitive regardless of the database collation.
            SearchScope::Suggestions => finder
                .order_by(
                    SimpleExpr::from(Func::lower(Expr::col(ProductCol::Name))),
                    SortOrder::Asc,
                )
                .order_by_asc(ProductCol::Name),
            SearchScope::Full => finder.order_by_desc(ProductCol::CreatedAt),
        };
        if let Some(limit) = limit {
            finder = finder.limit(limit);
        }

        products_from_entities(finder.all(&self.orm).await?)
    }

    async fn top_rated(&self, limit: u64) -> AppResult<Vec<Product>> {
        let models = Products::find()
            .filter(ProductCol::ApprovalStatus.eq(ApprovalStatus::Approved.as_str()))
            .filter(ProductCol::Quantity.gt(0))
            .order_by_desc(ProductCol::Rating)
            .limit(limit)
            .all(&self.orm)
            .await?;
        products_from_entities(models)
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn insert_order(&self, order: Order) -> AppResult<Order> {
        let model = OrderActive {
            id: Set(order.id),
            user_id: Set(order.user_id),
            order_number: Set(order.order_number),
            status: Set(order.status.as_str().to_string()),
            total_amount: Set(order.total_amount),
            tax_amount: Set(order.tax_amount),
            shipping_cost: Set(order.shipping_cost),
            shipping_address: Set(order.shipping_address),
            payment_method: Set(order.payment_method),
            created_at: Set(order.created_at.into()),
            updated_at: Set(order.updated_at.into()),
        }
        .insert(&self.orm)
        .await
        .map_err(|err| conflict_on_unique(err, "order number already exists"))?;
        order_from_entity(model)
    }

    async fn find_order(&self, id: Uuid) -> AppResult<Option<Order>> {
        Orders::find_by_id(id)
            .one(&self.orm)
            .await?
            .map(order_from_entity)
            .transpose()
    }

    async fn find_order_by_number(&self, order_number: &str) -> AppResult<Option<Order>> {
        Orders::find()
            .filter(OrderCol::OrderNumber.eq(order_number))
            .one(&self.orm)
            .await?
            .map(order_from_entity)
            .transpose()
    }

    async fn list_orders_for_user(&self, user_id: Uuid) -> AppResult<Vec<Order>> {
        Orders::find()
            .filter(OrderCol::UserId.eq(user_id))
            .order_by_desc(OrderCol::CreatedAt)
            .all(&self.orm)
            .await?
            .into_iter()
            .map(order_from_entity)
            .collect()
    }

    async fn set_order_status(
        &self,
        id: Uuid,
        status: OrderStatus,
        updated_at: DateTime<Utc>,
    ) -> AppResult<Option<Order>> {
        let Some(existing) = Orders::find_by_id(id).one(&self.orm).await? else {
            return Ok(None);
        };
        let mut active: OrderActive = existing.into();
        active.status = Set(status.as_str().to_string());
        active.updated_at = Set(updated_at.into());
        let order = active.update(&self.orm).await?;
        order_from_entity(order).map(Some)
    }

    async fn insert_item(&self, item: OrderItem) -> AppResult<OrderItem> {
        let model = OrderItemActive {
            id: Set(item.id),
            order_id: Set(item.order_id),
            product_id: Set(item.product_id),
            quantity: Set(item.quantity),
            unit_price: Set(item.unit_price),
            total_price: Set(item.total_price),
            created_at: Set(item.created_at.into()),
        }
        .insert(&self.orm)
        .await
        .map_err(|err| conflict_on_unique(err, "order item already exists"))?;
        Ok(order_item_from_entity(model))
    }

    async fn list_items(&self, order_id: Uuid) -> AppResult<Vec<OrderItem>> {
        Ok(OrderItems::find()
            .filter(OrderItemCol::OrderId.eq(order_id))
            .order_by_asc(OrderItemCol::CreatedAt)
            .all(&self.orm)
            .await?
            .into_iter()
            .map(order_item_from_entity)
            .collect())
    }

    async fn delete_item(&self, item_id: Uuid) -> AppResult<bool> {
        let result = OrderItems::delete_by_id(item_id).exec(&self.orm).await?;
        Ok(result.rows_affected > 0)
    }
}

#[async_trait]
impl AccountStore for PgStore {
    async fn insert_user(&self, user: NewUser) -> AppResult<User> {
        let model = UserActive {
            id: Set(user.id),
            email: Set(user.email),
            password_hash: Set(user.password_hash),
            first_name: Set(user.first_name),
            last_name: Set(user.last_name),
            phone_number: Set(user.phone_number),
            role: Set(user.role.as_str().to_string()),
            created_at: Set(user.created_at.into()),
            updated_at: Set(user.created_at.into()),
        }
        .insert(&self.orm)
        .await
        .map_err(|err| conflict_on_unique(err, "email or phone number already registered"))?;
        user_from_entity(model)
    }

    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>> {
        Users::find_by_id(id)
            .one(&self.orm)
            .await?
            .map(user_from_entity)
            .transpose()
    }

    async fn email_registered(&self, email: &str) -> AppResult<bool> {
        let count = Users::find()
            .filter(UserCol::Email.eq(email.to_lowercase()))
            .count(&self.orm)
            .await?;
        Ok(count > 0)
    }

    async fn phone_registered(&self, phone_number: &str) -> AppResult<bool> {
        let count = Users::find()
            .filter(UserCol::PhoneNumber.eq(phone_number))
            .count(&self.orm)
            .await?;
        Ok(count > 0)
    }

    async fn insert_application(
        &self,
        application: SellerApplication,
    ) -> AppResult<SellerApplication> {
        let model = ApplicationActive {
            id: Set(application.id),
            user_id: Set(application.user_id),
            business_name: Set(application.business_name),
            business_type: Set(application.business_type),
            tax_id: Set(application.tax_id),
            business_address: Set(application.business_address),
            status: Set(application.status.as_str().to_string()),
            admin_notes: Set(application.admin_notes),
            created_at: Set(application.created_at.into()),
            updated_at: Set(application.updated_at.into()),
        }
        .insert(&self.orm)
        .await
        .map_err(|err| conflict_on_unique(err, "seller application already exists"))?;
        application_from_entity(model)
    }

    async fn find_application(&self, id: Uuid) -> AppResult<Option<SellerApplication>> {
        SellerApplications::find_by_id(id)
            .one(&self.orm)
            .await?
            .map(application_from_entity)
            .transpose()
    }

    async fn application_exists_for(&self, user_id: Uuid) -> AppResult<bool> {
        let count = SellerApplications::find()
            .filter(ApplicationCol::UserId.eq(user_id))
            .count(&self.orm)
            .await?;
        Ok(count > 0)
    }

    async fn list_applications(
        &self,
        status: Option<ApplicationStatus>,
    ) -> AppResult<Vec<SellerApplication>> {
        let mut finder = SellerApplications::find();
        if let Some(status) = status {
            finder = finder.filter(ApplicationCol::Status.eq(status.as_str()));
        }
        finder
            .order_by_asc(ApplicationCol::CreatedAt)
            .all(&self.orm)
            .await?
            .into_iter()
            .map(application_from_entity)
            .collect()
    }

    async fn decide_application(
        &self,
        decision: ApplicationDecision,
    ) -> AppResult<Option<SellerApplication>> {
        let txn = self.orm.begin().await?;

        let Some(application) = SellerApplications::find_by_id(decision.application_id)
            .lock(LockType::Update)
            .one(&txn)
            .await?
        else {
            return Ok(None);
        };

        if decision.promote_applicant {
            let user = Users::find_by_id(application.user_id)
                .lock(LockType::Update)
                .one(&txn)
                .await?
                .ok_or(AppError::NotFound)?;
            if user.role == Role::Customer.as_str() {
                let mut active: UserActive = user.into();
                active.role = Set(Role::Seller.as_str().to_string());
                active.updated_at = Set(decision.decided_at.into());
                active.update(&txn).await?;
            }
        }

        let mut active: ApplicationActive = application.into();
        active.status = Set(decision.status.as_str().to_string());
        active.admin_notes = Set(decision.admin_notes);
        active.updated_at = Set(decision.decided_at.into());
        let application = active.update(&txn).await?;

        txn.commit().await?;
        application_from_entity(application).map(Some)
    }
}

#[async_trait]
impl ReviewStore for PgStore {
    async fn insert_review(&self, review: Review) -> AppResult<Review> {
        let txn = self.orm.begin().await?;

        // Lock the product so concurrent review writes recompute in turn.
        Products::find_by_id(review.product_id)
            .lock(LockType::Update)
            .one(&txn)
            .await?
            .ok_or(AppError::NotFound)?;

        let model = ReviewActive {
            id: Set(review.id),
            product_id: Set(review.product_id),
            user_id: Set(review.user_id),
            rating: Set(review.rating),
            title: Set(review.title),
            comment: Set(review.comment),
            created_at: Set(review.created_at.into()),
        }
        .insert(&txn)
        .await
        .map_err(|err| conflict_on_unique(err, "review already exists"))?;

        refresh_rating(&txn, review.product_id, review.created_at).await?;
        txn.commit().await?;
        Ok(review_from_entity(model))
    }

    async fn find_review(&self, id: Uuid) -> AppResult<Option<Review>> {
        Ok(Reviews::find_by_id(id)
            .one(&self.orm)
            .await?
            .map(review_from_entity))
    }

    async fn list_reviews(&self, product_id: Uuid) -> AppResult<Vec<Review>> {
        Ok(Reviews::find()
            .filter(ReviewCol::ProductId.eq(product_id))
            .order_by_desc(ReviewCol::CreatedAt)
            .all(&self.orm)
            .await?
            .into_iter()
            .map(review_from_entity)
            .collect())
    }

    async fn delete_review(&self, id: Uuid) -> AppResult<bool> {
        let txn = self.orm.begin().await?;

        let Some(review) = Reviews::find_by_id(id).one(&txn).await? else {
            return Ok(false);
        };
        Products::find_by_id(review.product_id)
            .lock(LockType::Update)
            .one(&txn)
            .await?;

        Reviews::delete_by_id(id).exec(&txn).await?;
        refresh_rating(&txn, review.product_id, Utc::now()).await?;
        txn.commit().await?;
        Ok(true)
    }
}

#[async_trait]
impl AuditStore for PgStore {
    async fn append(&self, entry: AuditEntry) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (id, user_id, action, resource, metadata, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(entry.id)
        .bind(entry.user_id)
        .bind(entry.action)
        .bind(entry.resource)
        .bind(entry.metadata)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
