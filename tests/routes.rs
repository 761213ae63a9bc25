mod common;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use common::{actor, memory_state, register, token_for};
use marketplace_api::{middleware::auth::AuthUser, models::Role, routes::create_router};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

fn app() -> Router {
    let (state, _) = memory_state();
    create_router(state)
}

fn request(
    method: Method,
    uri: &str,
    user: Option<&AuthUser>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header(
            header::AUTHORIZATION,
            format!("Bearer {}", token_for(user)),
        );
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn widget() -> Value {
    json!({
        "name": "Widget",
        "description": "A widget",
        "price": "10.00",
        "quantity": 5,
        "category": "gadgets",
        "brand": "Acme"
    })
}

#[tokio::test]
async fn health_endpoint_is_public() {
    let app = app();
    let (status, body) = send(&app, request(Method::GET, "/health", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ok");
}

#[tokio::test]
async fn product_creation_requires_a_valid_seller_token() {
    let app = app();

    let (status, _) = send(
        &app,
        request(Method::POST, "/api/products", None, Some(widget())),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let forged = Request::builder()
        .method(Method::POST)
        .uri("/api/products")
        .header(header::AUTHORIZATION, "Bearer not-a-jwt")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(widget().to_string()))
        .unwrap();
    let (status, _) = send(&app, forged).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let customer = actor(Role::Customer);
    let (status, _) = send(
        &app,
        request(Method::POST, "/api/products", Some(&customer), Some(widget())),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let seller = actor(Role::Seller);
    let (status, body) = send(
        &app,
        request(Method::POST, "/api/products", Some(&seller), Some(widget())),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["approval_status"], "PENDING");
    assert_eq!(body["data"]["seller_id"], seller.user_id.to_string());

    let id = body["data"]["id"].as_str().unwrap().to_string();
    let (status, body) = send(
        &app,
        request(Method::GET, &format!("/api/products/{id}"), None, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Widget");
}

#[tokio::test]
async fn missing_resources_answer_404() {
    let app = app();

    for uri in [
        format!("/api/products/{}", Uuid::new_v4()),
        "/api/orders/track/ORD-MISSING0".to_string(),
        "/api/nowhere".to_string(),
    ] {
        let (status, _) = send(&app, request(Method::GET, &uri, None, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
    }

    let admin = actor(Role::Admin);
    let (status, _) = send(
        &app,
        request(
            Method::PUT,
            &format!("/api/seller-applications/{}/approve", Uuid::new_v4()),
            Some(&admin),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn blank_search_lists_the_public_catalog() {
    let app = app();
    let (status, body) = send(
        &app,
        request(Method::GET, "/api/products/search?q=", None, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].is_array());
}

#[tokio::test]
async fn tokens_signed_with_another_secret_are_rejected() {
    let user = actor(Role::Admin);
    let claims = marketplace_api::dto::auth::Claims {
        sub: user.user_id.to_string(),
        role: "ADMIN".into(),
        exp: (chrono::Utc::now().timestamp() + 3600) as usize,
    };
    let token = jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(b"other-secret"),
    )
    .unwrap();

    let app = app();
    let req = Request::builder()
        .uri("/api/products/pending")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn approved_applicant_can_sell_with_the_same_token() {
    let (state, _) = memory_state();
    let user = register(&state, "promoted@example.com").await;
    let applicant = AuthUser::new(user.id, user.role);
    let admin = actor(Role::Admin);
    let app = create_router(state);

    let (status, _) = send(
        &app,
        request(Method::POST, "/api/products", Some(&applicant), Some(widget())),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        request(
            Method::POST,
            "/api/seller-applications",
            Some(&applicant),
            Some(json!({ "business_name": "Acme" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let application_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        request(
            Method::PUT,
            &format!("/api/seller-applications/{application_id}/approve"),
            Some(&admin),
            Some(json!({ "notes": "ok" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "APPROVED");

    // The token still claims CUSTOMER; the stored role now says SELLER.
    let (status, body) = send(
        &app,
        request(Method::POST, "/api/products", Some(&applicant), Some(widget())),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["seller_id"], user.id.to_string());
    assert_eq!(body["data"]["approval_status"], "PENDING");

    let (status, body) = send(
        &app,
        request(Method::GET, "/api/auth/me", Some(&applicant), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["role"], "SELLER");
}

#[tokio::test]
async fn stored_role_overrides_an_inflated_token_claim() {
    let (state, _) = memory_state();
    let user = register(&state, "claims-admin@example.com").await;
    let app = create_router(state);

    let inflated = AuthUser::new(user.id, Role::Admin);
    let (status, _) = send(
        &app,
        request(Method::GET, "/api/products/pending", Some(&inflated), None),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
