use marketplace_api::{
    config::AppConfig,
    db::{DbPool, create_pool, orm_from_pool, run_migrations},
    models::Role,
    services::account_service::hash_password,
};
use rust_decimal::Decimal;
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(config.require_database_url()?).await?;
    run_migrations(&orm_from_pool(pool.clone())).await?;

    let admin_id = ensure_user(&pool, "admin@example.com", "admin123", Role::Admin).await?;
    let user_id = ensure_user(&pool, "user@example.com", "user123", Role::Customer).await?;
    let seller_id = ensure_user(&pool, "seller@example.com", "seller123", Role::Seller).await?;
    seed_products(&pool, admin_id).await?;

    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}, Seller ID: {seller_id}");
    Ok(())
}

async fn ensure_user(
    pool: &DbPool,
    email: &str,
    password: &str,
    role: Role,
) -> anyhow::Result<Uuid> {
    let password_hash = hash_password(password)?;

    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, password_hash, role)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role, updated_at = now()
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(password_hash)
    .bind(role.as_str())
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Admin-authored listings, so they are approved from the start.
async fn seed_products(pool: &DbPool, admin_id: Uuid) -> anyhow::Result<()> {
    let products = [
        ("Axum Hoodie", "Warm hoodie for Rustaceans", "apparel", "Ferris Co", 5500, 50),
        ("Ferris Mug", "Coffee tastes better with Ferris", "kitchen", "Ferris Co", 1200, 100),
        ("Rust Sticker Pack", "Decorate your laptop", "accessories", "Crab Goods", 500, 200),
        ("E-book: Async Rust", "Learn async Rust patterns", "books", "Crab Press", 2500, 75),
    ];

    for (name, desc, category, brand, cents, quantity) in products {
        sqlx::query(
            r#"
            INSERT INTO products
                (id, name, description, price, quantity, category, brand,
                 approval_status, approved_by, approved_at)
            SELECT $1, $2, $3, $4, $5, $6, $7, 'APPROVED', $8, now()
            WHERE NOT EXISTS (SELECT 1 FROM products WHERE name = $2)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(desc)
        .bind(Decimal::new(cents, 2))
        .bind(quantity)
        .bind(category)
        .bind(brand)
        .bind(admin_id)
        .execute(pool)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}
