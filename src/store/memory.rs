//! In-memory [`VectorStore`] for tests and throwaway runs.
//!
//! Collections live in a `BTreeMap` behind `std::sync::RwLock`; search is
//! brute-force cosine distance over every vector in the collection.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;

use crate::embedding::{cosine_distance, embed_query, Embedder};
use crate::error::{HarnessError, HarnessResult};
use crate::models::{PageDocument, StoredHit};

use super::VectorStore;

struct StoredVector {
    doc: PageDocument,
    vector: Vec<f32>,
}

pub struct InMemoryVectorStore {
    embedder: Arc<dyn Embedder>,
    collections: RwLock<BTreeMap<String, Vec<StoredVector>>>,
}

impl InMemoryVectorStore {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            collections: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of documents in `collection`, if it exists.
    pub fn document_count(&self, collection: &str) -> Option<usize> {
        self.collections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(collection)
            .map(Vec::len)
    }

    fn ensure_exists(&self, collection: &str) -> HarnessResult<()> {
        let collections = self.collections.read().unwrap_or_else(PoisonError::into_inner);
        if collections.contains_key(collection) {
            Ok(())
        } else {
            Err(HarnessError::CollectionNotFound(collection.to_string()))
        }
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn list_collections(&self) -> HarnessResult<Vec<String>> {
        let collections = self.collections.read().unwrap_or_else(PoisonError::into_inner);
        Ok(collections.keys().cloned().collect())
    }

    async fn get_or_create_collection(&self, name: &str) -> HarnessResult<()> {
        let mut collections = self.collections.write().unwrap_or_else(PoisonError::into_inner);
        collections.entry(name.to_string()).or_default();
        Ok(())
    }

    async fn add_documents(&self, collection: &str, docs: &[PageDocument]) -> HarnessResult<()> {
        self.ensure_exists(collection)?;
        if docs.is_empty() {
            return Ok(());
        }

        // Embed before taking the write lock.
        let texts: Vec<String> = docs.iter().map(|d| d.content.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;
        if vectors.len() != docs.len() {
            return Err(HarnessError::Collaborator(anyhow::anyhow!(
                "embedder returned {} vectors for {} documents",
                vectors.len(),
                docs.len()
            )));
        }

        let mut collections = self.collections.write().unwrap_or_else(PoisonError::into_inner);
        let stored = collections
            .get_mut(collection)
            .ok_or_else(|| HarnessError::CollectionNotFound(collection.to_string()))?;
        for (doc, vector) in docs.iter().zip(vectors) {
            let entry = StoredVector {
                doc: doc.clone(),
                vector,
            };
            match stored.iter_mut().find(|s| s.doc.id == doc.id) {
                Some(existing) => *existing = entry,
                None => stored.push(entry),
            }
        }
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        text: &str,
        k: usize,
    ) -> HarnessResult<Vec<StoredHit>> {
        self.ensure_exists(collection)?;
        let query_vec = embed_query(self.embedder.as_ref(), text).await?;

        let collections = self.collections.read().unwrap_or_else(PoisonError::into_inner);
        let stored = collections
            .get(collection)
            .ok_or_else(|| HarnessError::CollectionNotFound(collection.to_string()))?;

        let mut hits: Vec<StoredHit> = stored
            .iter()
            .map(|s| StoredHit {
                id: s.doc.id.clone(),
                content: s.doc.content.clone(),
                metadata: s.doc.metadata.clone(),
                distance: cosine_distance(&query_vec, &s.vector),
            })
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(k);
        Ok(hits)
    }
}
