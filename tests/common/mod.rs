#![allow(dead_code)]

use std::sync::Arc;

use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header, encode};
use marketplace_api::{
    dto::{auth::Claims, auth::RegisterRequest, products::CreateProductRequest},
    middleware::auth::AuthUser,
    models::{ApprovalStatus, Product, Role, User},
    services::{account_service, product_service},
    state::AppState,
    store::InMemoryStore,
};
use rust_decimal::Decimal;
use uuid::Uuid;

pub const SECRET: &str = "test-secret";

pub fn memory_state() -> (AppState, Arc<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::new());
    (AppState::with_store(store.clone(), SECRET), store)
}

pub fn actor(role: Role) -> AuthUser {
    AuthUser::new(Uuid::new_v4(), role)
}

pub fn token_for(user: &AuthUser) -> String {
    let claims = Claims {
        sub: user.user_id.to_string(),
        role: user.role.as_str().to_string(),
        exp: (Utc::now().timestamp() + 3600) as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .expect("encode token")
}

pub async fn register(state: &AppState, email: &str) -> User {
    let payload = RegisterRequest {
        email: email.to_string(),
        password: "secret-password".to_string(),
        first_name: "Test".to_string(),
        last_name: "User".to_string(),
        phone_number: None,
    };
    account_service::register(state, payload)
        .await
        .expect("register")
        .data
        .expect("user data")
}

pub fn product_request(name: &str, price: Decimal, quantity: i32) -> CreateProductRequest {
    CreateProductRequest {
        name: name.to_string(),
        description: Some(format!("{name} description")),
        price,
        quantity,
        category: "gadgets".to_string(),
        brand: "Acme".to_string(),
        image_url: None,
        seller_id: None,
    }
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> Product {
    product_service::create_product(state, user, payload)
        .await
        .expect("create product")
        .data
        .expect("product data")
}

/// A public product with a preset rating, written straight to the catalog.
pub fn rated_product(name: &str, rating: f64, review_count: i32, quantity: i32) -> Product {
    let now = Utc::now();
    Product {
        id: Uuid::new_v4(),
        name: name.to_string(),
        description: None,
        price: Decimal::new(1999, 2),
        quantity,
        category: "gadgets".to_string(),
        brand: "Acme".to_string(),
        image_url: None,
        rating,
        review_count,
        seller_id: None,
        approval_status: Some(ApprovalStatus::Approved),
        approved_by: None,
        approved_at: None,
        created_at: now,
        updated_at: now,
    }
}
