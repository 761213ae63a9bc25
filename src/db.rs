use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sea_orm::{ConnectionTrait, DatabaseConnection, SqlxPostgresConnector, Statement};
use sqlx::postgres::PgPoolOptions;
use tokio::fs;

pub type DbPool = sqlx::PgPool;
pub type OrmConn = DatabaseConnection;

pub const MIGRATIONS_DIR: &str = "migrations";

/// Create the sqlx pool shared by the audit writer and the SeaORM connection.
pub async fn create_pool(database_url: &str) -> Result<DbPool> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .context("connecting to postgres")
}

pub fn orm_from_pool(pool: DbPool) -> OrmConn {
    SqlxPostgresConnector::from_sqlx_postgres_pool(pool)
}

/// Apply every `*.sql` file under `migrations/` in filename order.
/// Statements use `IF NOT EXISTS`, so re-running is harmless.
pub async fn run_migrations(conn: &OrmConn) -> Result<()> {
    let backend = conn.get_database_backend();
    for file in migration_files(Path::new(MIGRATIONS_DIR)).await? {
        let sql = fs::read_to_string(&file)
            .await
            .with_context(|| format!("reading {}", file.display()))?;
        let statements = split_statements(&sql);
        tracing::debug!(file = %file.display(), statements = statements.len(), "applying migration");
        // One command per prepared statement on Postgres.
        for stmt in statements {
            conn.execute(Statement::from_string(backend, format!("{stmt};")))
                .await
                .with_context(|| format!("migration {} failed", file.display()))?;
        }
    }
    Ok(())
}

async fn migration_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir)
        .await
        .with_context(|| format!("opening {}", dir.display()))?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "sql") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Drop `--` line comments, then split on `;`.
fn split_statements(sql: &str) -> Vec<String> {
    let stripped: String = sql
        .lines()
        .map(|line| match line.find("--") {
            Some(idx) => &line[..idx],
            None => line,
        })
        .collect::<Vec<_>>()
        .join("\n");
    stripped
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
