//! Vector store abstraction.
//!
//! Crawled pages land in named collections and are retrieved by semantic
//! similarity. The [`VectorStore`] trait defines the operations the crawler
//! and the query facade need, so backends are pluggable:
//!
//! | Backend | Use |
//! |---------|-----|
//! | [`SqliteVectorStore`] | persistent store behind `db.path` |
//! | [`InMemoryVectorStore`] | tests and throwaway runs |
//!
//! Both embed text through an [`Embedder`](crate::embedding::Embedder) and
//! rank by cosine distance (`1 - cosine similarity`, smaller is closer).

pub mod memory;
pub mod sqlite;

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::error::{HarnessError, HarnessResult};
use crate::models::{PageDocument, StoredHit};

pub use memory::InMemoryVectorStore;
pub use sqlite::SqliteVectorStore;

/// Abstract vector store.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`list_collections`](VectorStore::list_collections) | Names of every collection, sorted |
/// | [`get_or_create_collection`](VectorStore::get_or_create_collection) | Ensure a collection exists |
/// | [`add_documents`](VectorStore::add_documents) | Embed and upsert documents by id |
/// | [`query`](VectorStore::query) | Nearest `k` documents to a query text |
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn list_collections(&self) -> HarnessResult<Vec<String>>;

    async fn get_or_create_collection(&self, name: &str) -> HarnessResult<()>;

    /// Fails with `CollectionNotFound` if `collection` was never created.
    async fn add_documents(&self, collection: &str, docs: &[PageDocument]) -> HarnessResult<()>;

    /// Hits ordered by ascending distance. An existing but empty collection
    /// yields an empty vector; an unknown one is `CollectionNotFound`.
    async fn query(&self, collection: &str, text: &str, k: usize)
        -> HarnessResult<Vec<StoredHit>>;
}

/// Checks a collection name: 3–63 characters of `[A-Za-z0-9._-]`,
/// starting and ending with an alphanumeric character.
pub fn validate_collection_name(name: &str) -> HarnessResult<()> {
    let len = name.chars().count();
    if !(3..=63).contains(&len) {
        return Err(HarnessError::invalid(format!(
            "collection name '{}' must be between 3 and 63 characters",
            name
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(HarnessError::invalid(format!(
            "collection name '{}' may only contain letters, digits, '.', '_' and '-'",
            name
        )));
    }
    let starts = name.chars().next().is_some_and(|c| c.is_ascii_alphanumeric());
    let ends = name.chars().last().is_some_and(|c| c.is_ascii_alphanumeric());
    if !starts || !ends {
        return Err(HarnessError::invalid(format!(
            "collection name '{}' must start and end with a letter or digit",
            name
        )));
    }
    Ok(())
}

/// Opens the SQLite store at `config.db.path` with the configured embedder,
/// creating the schema if needed.
pub async fn open_store(config: &Config) -> Result<Arc<dyn VectorStore>> {
    let embedder = create_embedder(&config.embedding).context("Failed to set up embedder")?;
    let pool = crate::db::connect(config)
        .await
        .with_context(|| format!("Failed to open database {}", config.db.path.display()))?;
    crate::migrate::apply(&pool).await?;
    Ok(Arc::new(SqliteVectorStore::new(pool, embedder)))
}
