use marketplace_api::{
    config::AppConfig,
    db::{create_pool, orm_from_pool, run_migrations},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,marketplace_api=debug".into()),
        )
        .init();

    let config = AppConfig::from_env()?;
    let pool = create_pool(config.require_database_url()?).await?;
    run_migrations(&orm_from_pool(pool)).await?;
    tracing::info!("migrations applied");
    Ok(())
}
