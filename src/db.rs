//! SQLite connection setup.
//!
//! Every running crawl writes pages while API queries read, so the pool
//! holds one connection per crawl worker plus one for readers, and writers
//! wait on the lock instead of failing with `SQLITE_BUSY`.

use anyhow::{Context, Result};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::str::FromStr;
use std::time::Duration;

use crate::config::Config;

const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// Opens (creating if missing) the database at `config.db.path` in WAL mode.
pub async fn connect(config: &Config) -> Result<SqlitePool> {
    let db_path = &config.db.path;

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create database directory {}", parent.display())
            })?;
        }
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(pool_size(config))
        .connect_with(options)
        .await?;

    Ok(pool)
}

fn pool_size(config: &Config) -> u32 {
    u32::try_from(config.tasks.max_concurrent)
        .unwrap_or(u32::MAX - 1)
        .saturating_add(1)
        .max(2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn pool_has_a_reader_slot_beyond_workers() {
        let mut config = Config::minimal();
        config.tasks.max_concurrent = 4;
        assert_eq!(pool_size(&config), 5);
        config.tasks.max_concurrent = 1;
        assert_eq!(pool_size(&config), 2);
    }

    #[tokio::test]
    async fn connect_creates_nested_directories() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::minimal();
        config.db.path = tmp.path().join("a/b/vectors.sqlite");

        let pool = connect(&config).await.unwrap();
        let mode: String = sqlx::query_scalar("PRAGMA journal_mode")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
        assert!(config.db.path.exists());
    }
}
