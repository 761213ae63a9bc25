use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;
use uuid::Uuid;

use crate::{
    audit,
    dto::products::{CreateProductRequest, ProductList, UpdateProductRequest},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{ApprovalStatus, MAX_QUANTITY, Product, max_money},
    policy,
    response::{ApiResponse, Meta},
    state::AppState,
    store::{ProductFilter, SearchScope, Visibility},
};

pub const SUGGESTION_LIMIT: u64 = 10;
pub const TOP_RATED_LIMIT: u64 = 10;

fn listing(message: &str, items: Vec<Product>) -> ApiResponse<ProductList> {
    let meta = Meta::total(items.len());
    ApiResponse::success(message, ProductList { items }, Some(meta))
}

fn validate_price(price: Decimal) -> AppResult<()> {
    if price.is_sign_negative() {
        return Err(AppError::BadRequest("price must not be negative".into()));
    }
    if price > max_money() {
        return Err(AppError::BadRequest(format!(
            "price must not exceed {}",
            max_money()
        )));
    }
    Ok(())
}

fn validate_quantity(quantity: i32) -> AppResult<()> {
    if quantity < 0 {
        return Err(AppError::BadRequest("quantity must not be negative".into()));
    }
    if quantity > MAX_QUANTITY {
        return Err(AppError::BadRequest(format!(
            "quantity must not exceed {MAX_QUANTITY}"
        )));
    }
    Ok(())
}

async fn load(state: &AppState, id: Uuid) -> AppResult<Product> {
    state.catalog.find_product(id).await?.ok_or(AppError::NotFound)
}

/// Customer-facing catalog: approved products plus legacy rows without a status.
pub async fn list_products(state: &AppState) -> AppResult<ApiResponse<ProductList>> {
    let items = state.catalog.list_products(ProductFilter::public()).await?;
    Ok(listing("Products", items))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Product>> {
    let product = load(state, id).await?;
    Ok(ApiResponse::success("Product", product, None))
}

pub async fn list_by_category(
    state: &AppState,
    category: String,
) -> AppResult<ApiResponse<ProductList>> {
    let filter = ProductFilter {
        category: Some(category),
        ..ProductFilter::public()
    };
    let items = state.catalog.list_products(filter).await?;
    Ok(listing("Products", items))
}

/// A blank keyword falls back to the full public listing.
pub async fn search(
    state: &AppState,
    keyword: Option<&str>,
) -> AppResult<ApiResponse<ProductList>> {
    let keyword = keyword.map(str::trim).unwrap_or_default();
    if keyword.is_empty() {
        return list_products(state).await;
    }
    let items = state
        .catalog
        .search_products(keyword, SearchScope::Full, None)
        .await?;
    Ok(listing("Search results", items))
}

/// Autocomplete over name and brand, alphabetical, at most [`SUGGESTION_LIMIT`] entries.
pub async fn suggestions(
    state: &AppState,
    keyword: Option<&str>,
) -> AppResult<ApiResponse<ProductList>> {
    let keyword = keyword.map(str::trim).unwrap_or_default();
    if keyword.is_empty() {
        return Ok(listing("Suggestions", Vec::new()));
    }
    let items = state
        .catalog
        .search_products(keyword, SearchScope::Suggestions, Some(SUGGESTION_LIMIT))
        .await?;
    Ok(listing("Suggestions", items))
}

pub async fn top_rated(state: &AppState) -> AppResult<ApiResponse<ProductList>> {
    let items = state.catalog.top_rated(TOP_RATED_LIMIT).await?;
    Ok(listing("Top rated products", items))
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    let seller_id = policy::listing_owner_for_create(user, payload.seller_id)?;
    validate_price(payload.price)?;
    validate_quantity(payload.quantity)?;
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name is required".into()));
    }

    let now = Utc::now();
    let product = Product {
        id: Uuid::new_v4(),
        name: payload.name,
        description: payload.description,
        price: payload.price,
        quantity: payload.quantity,
        category: payload.category,
        brand: payload.brand,
        image_url: payload.image_url,
        rating: 0.0,
        review_count: 0,
        seller_id,
        approval_status: Some(ApprovalStatus::initial_for(seller_id)),
        approved_by: None,
        approved_at: None,
        created_at: now,
        updated_at: now,
    };
    let product = state.catalog.insert_product(product).await?;

    tracing::info!(
        product_id = %product.id,
        seller_id = ?product.seller_id,
        status = product.effective_status().as_str(),
        "product created"
    );
    audit::record(
        state.audit.as_ref(),
        Some(user.user_id),
        "product_create",
        "products",
        json!({ "product_id": product.id, "seller_id": product.seller_id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Product created",
        product,
        Some(Meta::empty()),
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    let mut product = load(state, id).await?;
    policy::can_modify_product(user, product.seller_id)?;

    if let Some(name) = payload.name {
        product.name = name;
    }
    if let Some(description) = payload.description {
        product.description = Some(description);
    }
    if let Some(price) = payload.price {
        validate_price(price)?;
        product.price = price;
    }
    if let Some(quantity) = payload.quantity {
        validate_quantity(quantity)?;
        product.quantity = quantity;
    }
    if let Some(category) = payload.category {
        product.category = category;
    }
    if let Some(brand) = payload.brand {
        product.brand = brand;
    }
    if let Some(image_url) = payload.image_url {
        product.image_url = Some(image_url);
    }
    product.updated_at = Utc::now();

    let product = state.catalog.save_product(product).await?;

    audit::record(
        state.audit.as_ref(),
        Some(user.user_id),
        "product_update",
        "products",
        json!({ "product_id": product.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Updated",
        product,
        Some(Meta::empty()),
    ))
}

pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let product = load(state, id).await?;
    policy::can_modify_product(user, product.seller_id)?;

    if !state.catalog.delete_product(id).await? {
        return Err(AppError::NotFound);
    }

    tracing::info!(product_id = %id, "product deleted");
    audit::record(
        state.audit.as_ref(),
        Some(user.user_id),
        "product_delete",
        "products",
        json!({ "product_id": id }),
    )
    .await;

    Ok(ApiResponse::success("Deleted", json!({}), Some(Meta::empty())))
}

pub async fn list_pending(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<ProductList>> {
    policy::can_moderate_catalog(user)?;
    let filter = ProductFilter {
        visibility: Visibility::Status(ApprovalStatus::Pending),
        ..ProductFilter::default()
    };
    let items = state.catalog.list_products(filter).await?;
    Ok(listing("Pending products", items))
}

/// Every listing of one seller, whatever its approval state.
pub async fn list_by_seller(
    state: &AppState,
    user: &AuthUser,
    seller_id: Uuid,
) -> AppResult<ApiResponse<ProductList>> {
    policy::can_view_seller_listing(user, seller_id)?;
    let filter = ProductFilter {
        seller_id: Some(seller_id),
        ..ProductFilter::default()
    };
    let items = state.catalog.list_products(filter).await?;
    Ok(listing("Seller products", items))
}

pub async fn approve_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Product>> {
    decide(state, user, id, ApprovalStatus::Approved).await
}

pub async fn reject_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Product>> {
    decide(state, user, id, ApprovalStatus::Rejected).await
}

/// Repeating a decision re-stamps the reviewer and time instead of failing.
async fn decide(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    status: ApprovalStatus,
) -> AppResult<ApiResponse<Product>> {
    policy::can_moderate_catalog(user)?;
    let mut product = load(state, id).await?;

    let now = Utc::now();
    product.approval_status = Some(status);
    product.approved_by = Some(user.user_id);
    product.approved_at = Some(now);
    product.updated_at = now;
    let product = state.catalog.save_product(product).await?;

    let action = match status {
        ApprovalStatus::Approved => "product_approve",
        _ => "product_reject",
    };
    tracing::info!(product_id = %id, admin_id = %user.user_id, status = status.as_str(), "product reviewed");
    audit::record(
        state.audit.as_ref(),
        Some(user.user_id),
        action,
        "products",
        json!({ "product_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        match status {
            ApprovalStatus::Approved => "Product approved",
            _ => "Product rejected",
        },
        product,
        Some(Meta::empty()),
    ))
}
