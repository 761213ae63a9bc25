mod common;

use common::{actor, create_product, memory_state, product_request, rated_product, register};
use marketplace_api::{
    db::{create_pool, orm_from_pool, run_migrations},
    dto::{
        orders::{AddOrderItemRequest, CreateOrderRequest, UpdateOrderStatusRequest},
        products::UpdateProductRequest,
    },
    error::AppError,
    middleware::auth::AuthUser,
    models::{MAX_QUANTITY, Order, OrderStatus, Product, Role},
    services::{order_service, product_service},
    state::AppState,
    store::CatalogStore,
};
use rust_decimal::Decimal;
use uuid::Uuid;

fn order_request() -> CreateOrderRequest {
    CreateOrderRequest {
        shipping_address: "1 Main St".into(),
        payment_method: "card".into(),
        total_amount: Decimal::new(3000, 2),
        tax_amount: Decimal::new(300, 2),
        shipping_cost: Decimal::new(500, 2),
    }
}

async fn approved_product(state: &AppState, seller: &AuthUser, admin: &AuthUser) -> Product {
    let product = create_product(
        state,
        seller,
        product_request("Widget", Decimal::new(1000, 2), 5),
    )
    .await;
    product_service::approve_product(state, admin, product.id)
        .await
        .expect("approve")
        .data
        .expect("product")
}

async fn new_order(state: &AppState, owner: &AuthUser) -> Order {
    order_service::create_order(state, owner, order_request())
        .await
        .expect("create order")
        .data
        .expect("order")
}

#[tokio::test]
async fn item_price_is_snapshotted_at_attach_time() {
    let (state, store) = memory_state();
    let seller = actor(Role::Seller);
    let admin = actor(Role::Admin);
    let customer = actor(Role::Customer);

    let product = approved_product(&state, &seller, &admin).await;
    assert_eq!(product.approved_by, Some(admin.user_id));

    let order = new_order(&state, &customer).await;
    assert_eq!(order.status, OrderStatus::Pending);
    assert!(order.order_number.starts_with("ORD-"));
    assert_eq!(order.order_number.len(), 12);

    let item = order_service::add_item(
        &state,
        &customer,
        order.id,
        AddOrderItemRequest {
            product_id: product.id,
            quantity: 3,
        },
    )
    .await
    .unwrap()
    .data
    .unwrap();
    assert_eq!(item.unit_price, Decimal::new(1000, 2));
    assert_eq!(item.total_price, Decimal::new(3000, 2));

    product_service::update_product(
        &state,
        &seller,
        product.id,
        UpdateProductRequest {
            price: Some(Decimal::new(1200, 2)),
            ..UpdateProductRequest::default()
        },
    )
    .await
    .unwrap();

    let view = order_service::get_order(&state, &customer, order.id)
        .await
        .unwrap()
        .data
        .unwrap();
    assert_eq!(view.items.len(), 1);
    assert_eq!(view.items[0].unit_price, Decimal::new(1000, 2));
    assert_eq!(view.items[0].total_price, Decimal::new(3000, 2));

    let still_stocked = product_service::get_product(&state, product.id)
        .await
        .unwrap()
        .data
        .unwrap();
    assert_eq!(still_stocked.quantity, 5);

    let actions: Vec<String> = store.audit_entries().into_iter().map(|e| e.action).collect();
    assert!(actions.contains(&"order_create".to_string()));
    assert!(actions.contains(&"order_item_add".to_string()));
}

#[tokio::test]
async fn add_item_validates_order_product_and_owner() {
    let (state, _) = memory_state();
    let seller = actor(Role::Seller);
    let admin = actor(Role::Admin);
    let customer = actor(Role::Customer);
    let product = approved_product(&state, &seller, &admin).await;
    let order = new_order(&state, &customer).await;

    let request = |product_id, quantity| AddOrderItemRequest {
        product_id,
        quantity,
    };

    let err = order_service::add_item(&state, &customer, order.id, request(product.id, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let err = order_service::add_item(&state, &customer, Uuid::new_v4(), request(product.id, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    let err = order_service::add_item(&state, &customer, order.id, request(Uuid::new_v4(), 1))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    for outsider in [actor(Role::Customer), admin] {
        let err = order_service::add_item(&state, &outsider, order.id, request(product.id, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden));
    }

    let pending = create_product(
        &state,
        &seller,
        product_request("Unreviewed", Decimal::new(100, 2), 1),
    )
    .await;
    let err = order_service::add_item(&state, &customer, order.id, request(pending.id, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));
}

#[tokio::test]
async fn oversized_amounts_are_rejected_instead_of_overflowing() {
    let (state, store) = memory_state();
    let admin = actor(Role::Admin);
    let customer = actor(Role::Customer);

    let huge = Decimal::from_i128_with_scale(10_i128.pow(20), 0);
    let err = product_service::create_product(
        &state,
        &admin,
        product_request("Yacht", huge, 1),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let err = product_service::create_product(
        &state,
        &admin,
        product_request("Pallet", Decimal::new(100, 2), MAX_QUANTITY + 1),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    // Rows written before the bounds existed may still carry any price.
    let mut legacy = rated_product("Legacy yacht", 4.0, 1, 1);
    legacy.price = huge;
    store.insert_product(legacy.clone()).await.unwrap();
    let mut priceless = rated_product("Priceless", 4.0, 1, 1);
    priceless.price = Decimal::MAX;
    store.insert_product(priceless.clone()).await.unwrap();

    let order = new_order(&state, &customer).await;
    let attempts = [
        (legacy.id, 2_000_000_000),
        (legacy.id, 2),
        (priceless.id, 2),
    ];
    for (product_id, quantity) in attempts {
        let err = order_service::add_item(
            &state,
            &customer,
            order.id,
            AddOrderItemRequest {
                product_id,
                quantity,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)), "{quantity}");
    }

    let view = order_service::get_order(&state, &customer, order.id)
        .await
        .unwrap()
        .data
        .unwrap();
    assert!(view.items.is_empty());
}

#[tokio::test]
async fn status_changes_are_admin_only_and_unrestricted() {
    let (state, _) = memory_state();
    let admin = actor(Role::Admin);
    let customer = actor(Role::Customer);
    let order = new_order(&state, &customer).await;

    let status = |s: &str| UpdateOrderStatusRequest { status: s.into() };

    let err = order_service::update_status(&state, &customer, order.id, status("SHIPPED"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    for next in ["DELIVERED", "pending", "CANCELLED", "PROCESSING"] {
        let updated = order_service::update_status(&state, &admin, order.id, status(next))
            .await
            .unwrap()
            .data
            .unwrap();
        assert_eq!(updated.status.as_str(), next.to_ascii_uppercase());
    }

    let err = order_service::update_status(&state, &admin, order.id, status("LOST"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let err = order_service::update_status(&state, &admin, Uuid::new_v4(), status("SHIPPED"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));
}

#[tokio::test]
async fn tracking_resolves_by_number_without_identity() {
    let (state, _) = memory_state();
    let customer = actor(Role::Customer);
    let order = new_order(&state, &customer).await;

    let tracked = order_service::track_order(&state, &order.order_number)
        .await
        .unwrap()
        .data
        .unwrap();
    assert_eq!(tracked.order.id, order.id);

    let absent = order_service::find_by_number(&state, "ORD-ZZZZZZZZ")
        .await
        .unwrap();
    assert!(absent.is_none());
    let err = order_service::track_order(&state, "ORD-ZZZZZZZZ")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));
}

#[tokio::test]
async fn orders_are_visible_to_owner_and_admin_only() {
    let (state, _) = memory_state();
    let owner = actor(Role::Customer);
    let stranger = actor(Role::Customer);
    let admin = actor(Role::Admin);
    let first = new_order(&state, &owner).await;
    let second = new_order(&state, &owner).await;
    assert_ne!(first.order_number, second.order_number);

    let err = order_service::get_order(&state, &stranger, first.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));
    order_service::get_order(&state, &admin, first.id)
        .await
        .unwrap();

    let mine = order_service::list_my_orders(&state, &owner)
        .await
        .unwrap()
        .data
        .unwrap();
    assert_eq!(mine.items.len(), 2);

    let err = order_service::list_orders_for_user(&state, &stranger, owner.user_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));
    let listed = order_service::list_orders_for_user(&state, &admin, owner.user_id)
        .await
        .unwrap();
    assert_eq!(listed.meta.unwrap().total, Some(2));

    let err = order_service::get_order(&state, &owner, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));
}

#[tokio::test]
async fn remove_item_does_not_check_ownership() {
    let (state, _) = memory_state();
    let seller = actor(Role::Seller);
    let admin = actor(Role::Admin);
    let owner = actor(Role::Customer);
    let product = approved_product(&state, &seller, &admin).await;
    let order = new_order(&state, &owner).await;
    let item = order_service::add_item(
        &state,
        &owner,
        order.id,
        AddOrderItemRequest {
            product_id: product.id,
            quantity: 1,
        },
    )
    .await
    .unwrap()
    .data
    .unwrap();

    order_service::remove_item(&state, &actor(Role::Customer), item.id)
        .await
        .unwrap();
    let view = order_service::get_order(&state, &owner, order.id)
        .await
        .unwrap()
        .data
        .unwrap();
    assert!(view.items.is_empty());

    let err = order_service::remove_item(&state, &owner, item.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));
}

// Same lifecycle against Postgres; skipped unless a database is configured.
#[tokio::test]
async fn postgres_order_lifecycle() -> anyhow::Result<()> {
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            return Ok(());
        }
    };

    let pool = create_pool(&database_url).await?;
    run_migrations(&orm_from_pool(pool.clone())).await?;
    let state = AppState::postgres(pool, common::SECRET);

    let user = register(&state, &format!("buyer-{}@example.com", Uuid::new_v4())).await;
    let customer = AuthUser::new(user.id, Role::Customer);
    let seller = actor(Role::Seller);
    let admin = actor(Role::Admin);

    let product = approved_product(&state, &seller, &admin).await;
    let order = new_order(&state, &customer).await;
    let item = order_service::add_item(
        &state,
        &customer,
        order.id,
        AddOrderItemRequest {
            product_id: product.id,
            quantity: 3,
        },
    )
    .await?
    .data
    .expect("item");
    assert_eq!(item.total_price, Decimal::new(3000, 2));

    let shipped = order_service::update_status(
        &state,
        &admin,
        order.id,
        UpdateOrderStatusRequest {
            status: "SHIPPED".into(),
        },
    )
    .await?
    .data
    .expect("order");
    assert_eq!(shipped.status, OrderStatus::Shipped);

    let tracked = order_service::track_order(&state, &order.order_number)
        .await?
        .data
        .expect("tracked order");
    assert_eq!(tracked.order.status, OrderStatus::Shipped);
    assert_eq!(tracked.items.len(), 1);
    assert_eq!(tracked.items[0].unit_price, Decimal::new(1000, 2));

    product_service::delete_product(&state, &admin, product.id).await?;
    Ok(())
}
