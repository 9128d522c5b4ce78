//! Query facade over the vector store.
//!
//! Forwards a text query to a collection and reshapes the raw nearest-
//! neighbour hits into ranked [`QueryResultEntry`] values:
//!
//! - `relevance_score = 1 - distance` (no clamping, so opposite vectors
//!   score below zero);
//! - `content_preview` is the first `preview_chars` characters followed by
//!   `...` when the body is longer, otherwise the whole body;
//! - `full_content` always carries the unmodified body.
//!
//! An unknown collection is an error; an existing collection with no hits
//! is the successful [`QueryOutcome::Empty`].

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{HarnessError, HarnessResult};
use crate::models::QueryResultEntry;
use crate::store::{open_store, VectorStore};

pub const EMPTY_RESULTS_MESSAGE: &str = "No results found for this query in the collection.";

#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    Hits(Vec<QueryResultEntry>),
    Empty,
}

impl QueryOutcome {
    pub fn len(&self) -> usize {
        match self {
            QueryOutcome::Hits(hits) => hits.len(),
            QueryOutcome::Empty => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Response body of `POST /query`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub collection: String,
    pub query: String,
    pub num_results: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<QueryResultEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl QueryResponse {
    pub fn new(collection: &str, query: &str, outcome: QueryOutcome) -> Self {
        let (num_results, results, message) = match outcome {
            QueryOutcome::Hits(hits) => (hits.len(), Some(hits), None),
            QueryOutcome::Empty => (0, None, Some(EMPTY_RESULTS_MESSAGE.to_string())),
        };
        Self {
            collection: collection.to_string(),
            query: query.to_string(),
            num_results,
            results,
            message,
        }
    }
}

/// Runs `query_text` against `collection` and returns up to `n_results`
/// ranked entries.
pub async fn query_collection(
    store: &dyn VectorStore,
    collection: &str,
    query_text: &str,
    n_results: usize,
    preview_chars: usize,
) -> HarnessResult<QueryOutcome> {
    if n_results == 0 {
        return Err(HarnessError::invalid("n_results must be at least 1"));
    }
    if query_text.trim().is_empty() {
        return Err(HarnessError::invalid("query must not be empty"));
    }

    let hits = store.query(collection, query_text, n_results).await?;
    tracing::debug!(
        collection = %collection,
        hits = hits.len(),
        "query executed"
    );
    if hits.is_empty() {
        return Ok(QueryOutcome::Empty);
    }

    let entries = hits
        .into_iter()
        .enumerate()
        .map(|(i, hit)| QueryResultEntry {
            rank: i + 1,
            relevance_score: similarity_from_distance(hit.distance),
            metadata: hit.metadata,
            content_preview: preview(&hit.content, preview_chars),
            full_content: hit.content,
        })
        .collect();
    Ok(QueryOutcome::Hits(entries))
}

pub fn similarity_from_distance(distance: f64) -> f64 {
    1.0 - distance
}

/// First `max_chars` characters of `content`, plus `...` if anything was cut.
pub fn preview(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_string(),
    }
}

/// `crawlctx query`: query the local store and print ranked results.
pub async fn run_query(
    config: &Config,
    collection: &str,
    query_text: &str,
    n_results: Option<usize>,
) -> Result<()> {
    let store = open_store(config).await?;
    let n = n_results.unwrap_or(config.query.default_results);
    let outcome =
        query_collection(store.as_ref(), collection, query_text, n, config.query.preview_chars)
            .await?;

    let QueryOutcome::Hits(entries) = outcome else {
        println!("No results.");
        return Ok(());
    };

    for entry in entries {
        println!(
            "{}. [{:.2}] {}",
            entry.rank,
            entry.relevance_score,
            entry.metadata.title.as_deref().unwrap_or("(untitled)")
        );
        println!("    url: {}", entry.metadata.url);
        println!("    depth: {}", entry.metadata.depth);
        println!(
            "    excerpt: \"{}\"",
            entry.content_preview.replace('\n', " ").trim()
        );
        println!();
    }
    Ok(())
}

/// `crawlctx collections`: list collections in the local store.
pub async fn run_collections(config: &Config) -> Result<()> {
    let store = open_store(config).await?;
    let names = store.list_collections().await?;
    if names.is_empty() {
        println!("No collections.");
        return Ok(());
    }
    for name in names {
        println!("{}", name);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PageDocument, PageMetadata, StoredHit};
    use async_trait::async_trait;

    /// Returns canned hits for the "docs" collection.
    struct CannedStore {
        hits: Vec<StoredHit>,
    }

    #[async_trait]
    impl VectorStore for CannedStore {
        async fn list_collections(&self) -> HarnessResult<Vec<String>> {
            Ok(vec!["docs".into(), "empty".into()])
        }

        async fn get_or_create_collection(&self, _name: &str) -> HarnessResult<()> {
            Ok(())
        }

        async fn add_documents(&self, _c: &str, _docs: &[PageDocument]) -> HarnessResult<()> {
            Ok(())
        }

        async fn query(&self, collection: &str, _t: &str, k: usize) -> HarnessResult<Vec<StoredHit>> {
            match collection {
                "docs" => Ok(self.hits.iter().take(k).cloned().collect()),
                "empty" => Ok(Vec::new()),
                other => Err(HarnessError::CollectionNotFound(other.to_string())),
            }
        }
    }

    fn hit(id: &str, content: &str, distance: f64) -> StoredHit {
        StoredHit {
            id: id.into(),
            content: content.into(),
            metadata: PageMetadata {
                url: format!("https://example.com/{}", id),
                title: Some(id.to_uppercase()),
                depth: 0,
                timestamp: "2024-01-01T00:00:00Z".into(),
            },
            distance,
        }
    }

    fn store() -> CannedStore {
        CannedStore {
            hits: vec![
                hit("a", "short body", 0.2),
                hit("b", &"x".repeat(301), 0.5),
                hit("c", "far", 1.3),
            ],
        }
    }

    #[test]
    fn distance_maps_to_score() {
        assert!((similarity_from_distance(0.2) - 0.8).abs() < 1e-12);
        assert!((similarity_from_distance(1.3) + 0.3).abs() < 1e-12);
    }

    #[test]
    fn preview_truncates_long_content() {
        assert_eq!(preview("short", 300), "short");
        let exact = "y".repeat(300);
        assert_eq!(preview(&exact, 300), exact);

        let long = "x".repeat(301);
        let p = preview(&long, 300);
        assert_eq!(p.len(), 303);
        assert!(p.ends_with("..."));
    }

    #[test]
    fn preview_counts_characters_not_bytes() {
        let text = "é".repeat(5);
        assert_eq!(preview(&text, 3), "ééé...");
    }

    #[tokio::test]
    async fn hits_are_ranked_and_reshaped() {
        let outcome = query_collection(&store(), "docs", "anything", 5, 300)
            .await
            .unwrap();
        let QueryOutcome::Hits(entries) = outcome else {
            panic!("expected hits");
        };
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].rank, 1);
        assert!((entries[0].relevance_score - 0.8).abs() < 1e-9);
        assert_eq!(entries[0].content_preview, "short body");
        assert_eq!(entries[1].content_preview.len(), 303);
        assert_eq!(entries[1].full_content.len(), 301);
        assert!(entries[2].relevance_score < 0.0);
    }

    #[tokio::test]
    async fn n_results_limits_hits() {
        let outcome = query_collection(&store(), "docs", "q", 1, 300).await.unwrap();
        assert_eq!(outcome.len(), 1);
    }

    #[tokio::test]
    async fn empty_collection_is_empty_outcome() {
        let outcome = query_collection(&store(), "empty", "q", 5, 300).await.unwrap();
        assert_eq!(outcome, QueryOutcome::Empty);

        let response = QueryResponse::new("empty", "q", outcome);
        assert_eq!(response.num_results, 0);
        assert_eq!(response.message.as_deref(), Some(EMPTY_RESULTS_MESSAGE));
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("results").is_none());
    }

    #[tokio::test]
    async fn unknown_collection_is_error() {
        let err = query_collection(&store(), "missing", "q", 5, 300)
            .await
            .unwrap_err();
        assert!(matches!(err, HarnessError::CollectionNotFound(c) if c == "missing"));
    }

    #[tokio::test]
    async fn zero_results_requested_is_invalid() {
        let err = query_collection(&store(), "docs", "q", 0, 300)
            .await
            .unwrap_err();
        assert!(matches!(err, HarnessError::InvalidRequest(_)));
    }
}
