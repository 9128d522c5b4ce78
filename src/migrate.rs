//! Vector store schema.
//!
//! | Table | Contents |
//! |-------|----------|
//! | `collections` | one row per collection name |
//! | `documents` | crawled pages keyed by `(collection, id)`, with the embedding BLOB |
//!
//! Every statement is idempotent, so running migrations on an existing
//! database is a no-op.

use anyhow::{Context, Result};
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Connects to the configured database and creates the schema.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Creates the schema on an open pool.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS collections (
            name TEXT PRIMARY KEY,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create collections table")?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            collection TEXT NOT NULL,
            id TEXT NOT NULL,
            content TEXT NOT NULL,
            url TEXT NOT NULL,
            title TEXT,
            depth INTEGER NOT NULL,
            crawled_at TEXT NOT NULL,
            model TEXT NOT NULL,
            embedding BLOB NOT NULL,
            PRIMARY KEY (collection, id),
            FOREIGN KEY (collection) REFERENCES collections(name)
        )
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create documents table")?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_url ON documents(collection, url)")
        .execute(pool)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::minimal();
        config.db.path = tmp.path().join("nested").join("store.sqlite");

        run_migrations(&config).await.unwrap();
        run_migrations(&config).await.unwrap();

        let pool = db::connect(&config).await.unwrap();
        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();
        assert_eq!(tables, vec!["collections", "documents"]);
    }
}
