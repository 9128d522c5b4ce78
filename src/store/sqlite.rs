//! SQLite-backed [`VectorStore`].
//!
//! Collections and documents live in two tables (see [`crate::migrate`]);
//! each document row carries its embedding as a little-endian `f32` BLOB.
//! Search loads the collection's vectors and ranks them by cosine distance
//! in process.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::embedding::{blob_to_vec, cosine_distance, embed_query, vec_to_blob, Embedder};
use crate::error::{HarnessError, HarnessResult};
use crate::models::{PageDocument, PageMetadata, StoredHit};

use super::VectorStore;

pub struct SqliteVectorStore {
    pool: SqlitePool,
    embedder: Arc<dyn Embedder>,
}

impl SqliteVectorStore {
    pub fn new(pool: SqlitePool, embedder: Arc<dyn Embedder>) -> Self {
        Self { pool, embedder }
    }

    async fn collection_exists(&self, name: &str) -> HarnessResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT COUNT(*) > 0 FROM collections WHERE name = ?")
                .bind(name)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn require_collection(&self, name: &str) -> HarnessResult<()> {
        if self.collection_exists(name).await? {
            Ok(())
        } else {
            Err(HarnessError::CollectionNotFound(name.to_string()))
        }
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn list_collections(&self) -> HarnessResult<Vec<String>> {
        let names: Vec<String> = sqlx::query_scalar("SELECT name FROM collections ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(names)
    }

    async fn get_or_create_collection(&self, name: &str) -> HarnessResult<()> {
        sqlx::query("INSERT OR IGNORE INTO collections (name, created_at) VALUES (?, ?)")
            .bind(name)
            .bind(chrono::Utc::now().timestamp())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn add_documents(&self, collection: &str, docs: &[PageDocument]) -> HarnessResult<()> {
        self.require_collection(collection).await?;
        if docs.is_empty() {
            return Ok(());
        }

        let texts: Vec<String> = docs.iter().map(|d| d.content.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;
        if vectors.len() != docs.len() {
            return Err(HarnessError::Collaborator(anyhow::anyhow!(
                "embedder returned {} vectors for {} documents",
                vectors.len(),
                docs.len()
            )));
        }

        let mut tx = self.pool.begin().await?;
        for (doc, vector) in docs.iter().zip(vectors.iter()) {
            sqlx::query(
                r#"
                INSERT INTO documents (collection, id, content, url, title, depth,
                                       crawled_at, model, embedding)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(collection, id) DO UPDATE SET
                    content = excluded.content,
                    url = excluded.url,
                    title = excluded.title,
                    depth = excluded.depth,
                    crawled_at = excluded.crawled_at,
                    model = excluded.model,
                    embedding = excluded.embedding
                "#,
            )
            .bind(collection)
            .bind(&doc.id)
            .bind(&doc.content)
            .bind(&doc.metadata.url)
            .bind(&doc.metadata.title)
            .bind(doc.metadata.depth as i64)
            .bind(&doc.metadata.timestamp)
            .bind(self.embedder.model_name())
            .bind(vec_to_blob(vector))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        text: &str,
        k: usize,
    ) -> HarnessResult<Vec<StoredHit>> {
        self.require_collection(collection).await?;
        let query_vec = embed_query(self.embedder.as_ref(), text).await?;

        let rows = sqlx::query(
            "SELECT id, content, url, title, depth, crawled_at, embedding \
             FROM documents WHERE collection = ?",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in rows {
            let blob: Vec<u8> = row.try_get("embedding")?;
            let depth: i64 = row.try_get("depth")?;
            hits.push(StoredHit {
                id: row.try_get("id")?,
                content: row.try_get("content")?,
                metadata: PageMetadata {
                    url: row.try_get("url")?,
                    title: row.try_get("title")?,
                    depth: depth.max(0) as u32,
                    timestamp: row.try_get("crawled_at")?,
                },
                distance: cosine_distance(&query_vec, &blob_to_vec(&blob)),
            });
        }

        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(k);
        Ok(hits)
    }
}
