use std::env;

use anyhow::{Context, bail};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub host: String,
    pub port: u16,
    pub storage: StorageBackend,
    pub jwt_secret: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let storage = match env::var("STORAGE")
            .unwrap_or_else(|_| "postgres".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "postgres" => StorageBackend::Postgres,
            "memory" => StorageBackend::Memory,
            other => bail!("unsupported STORAGE backend: {other}"),
        };
        let database_url = env::var("DATABASE_URL").ok();
        if storage == StorageBackend::Postgres && database_url.is_none() {
            bail!("DATABASE_URL must be set when STORAGE=postgres");
        }
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET is not set")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        Ok(Self {
            port,
            database_url,
            host,
            storage,
            jwt_secret,
        })
    }

    pub fn require_database_url(&self) -> anyhow::Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL is not set")
    }
}
