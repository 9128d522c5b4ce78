//! Core data models used throughout crawl-harness.
//!
//! These types represent crawl requests and the task records that track
//! them, the page documents handed to the vector store, and the ranked
//! entries returned from a query.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

pub const DEFAULT_PATTERN: &str = "*";
pub const DEFAULT_MAX_DEPTH: u32 = 2;
pub const DEFAULT_COLLECTION: &str = "web_content";

fn default_pattern() -> String {
    DEFAULT_PATTERN.to_string()
}
fn default_max_depth() -> u32 {
    DEFAULT_MAX_DEPTH
}
fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

/// Parameters of one crawl, as submitted by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlRequest {
    /// Absolute start URL.
    pub url: String,
    /// URL substring filter; `*` follows every same-host link.
    #[serde(default = "default_pattern")]
    pub pattern: String,
    /// How many links deep to follow from the start page (which is depth 0).
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
    /// Destination collection in the vector store.
    #[serde(default = "default_collection")]
    pub collection_name: String,
}

impl CrawlRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            pattern: default_pattern(),
            max_depth: default_max_depth(),
            collection_name: default_collection(),
        }
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_collection(mut self, collection_name: impl Into<String>) -> Self {
        self.collection_name = collection_name.into();
        self
    }
}

/// Lifecycle of a crawl task: `pending → in_progress → completed | failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Whether `next` is a legal successor of this status.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::InProgress)
                | (TaskStatus::InProgress, TaskStatus::Completed)
                | (TaskStatus::InProgress, TaskStatus::Failed)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracked state of one crawl task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task_id: String,
    pub url: String,
    pub pattern: String,
    pub max_depth: u32,
    pub collection_name: String,
    pub status: TaskStatus,
    pub start_time: DateTime<Utc>,
    pub finish_time: Option<DateTime<Utc>>,
    pub pages_crawled: Option<u64>,
    pub error: Option<String>,
}

/// One status change applied by the runner. Each variant names exactly the
/// fields it writes.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskTransition {
    Started,
    Completed { pages_crawled: Option<u64> },
    Failed { error: String },
}

impl TaskTransition {
    pub fn target(&self) -> TaskStatus {
        match self {
            TaskTransition::Started => TaskStatus::InProgress,
            TaskTransition::Completed { .. } => TaskStatus::Completed,
            TaskTransition::Failed { .. } => TaskStatus::Failed,
        }
    }
}

static PAGE_COUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Successfully crawled (\d+) pages").expect("page count pattern is valid")
});

/// Result of a crawl as reported by the crawl engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrawlOutcome {
    /// Number of pages ingested, when known.
    pub pages_crawled: Option<u64>,
    /// Human-readable summary line.
    pub summary: String,
}

impl CrawlOutcome {
    pub fn new(pages_crawled: u64, collection_name: &str) -> Self {
        Self {
            pages_crawled: Some(pages_crawled),
            summary: format!(
                "Successfully crawled {} pages and saved to collection '{}'",
                pages_crawled, collection_name
            ),
        }
    }

    /// Builds an outcome from a prose summary, recovering the page count
    /// from the `Successfully crawled N pages` phrase if present.
    pub fn from_summary(summary: impl Into<String>) -> Self {
        let summary = summary.into();
        let pages_crawled = extract_page_count(&summary);
        Self {
            pages_crawled,
            summary,
        }
    }
}

/// Best-effort page count extraction from a crawl summary.
pub fn extract_page_count(summary: &str) -> Option<u64> {
    PAGE_COUNT_RE
        .captures(summary)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Source metadata stored alongside each page in the vector store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageMetadata {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub depth: u32,
    /// RFC 3339 time the page was ingested.
    pub timestamp: String,
}

/// A crawled page ready for ingestion.
#[derive(Debug, Clone, PartialEq)]
pub struct PageDocument {
    pub id: String,
    pub content: String,
    pub metadata: PageMetadata,
}

/// A nearest-neighbour hit as returned by a vector store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredHit {
    pub id: String,
    pub content: String,
    pub metadata: PageMetadata,
    /// Cosine distance, `1 - cosine_similarity`.
    pub distance: f64,
}

/// One ranked entry of a query response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResultEntry {
    /// 1-based position.
    pub rank: usize,
    /// `1 - distance`; higher is more relevant.
    pub relevance_score: f64,
    pub metadata: PageMetadata,
    pub content_preview: String,
    pub full_content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_count_from_summary() {
        let outcome = CrawlOutcome::from_summary(
            "Successfully crawled 42 pages and saved to ChromaDB collection 'x'",
        );
        assert_eq!(outcome.pages_crawled, Some(42));
    }

    #[test]
    fn page_count_missing_is_unknown() {
        assert_eq!(extract_page_count("crawl finished"), None);
        assert_eq!(
            CrawlOutcome::from_summary("done, saved somewhere").pages_crawled,
            None
        );
    }

    #[test]
    fn structured_outcome_summary_round_trips_count() {
        let outcome = CrawlOutcome::new(7, "docs");
        assert_eq!(extract_page_count(&outcome.summary), Some(7));
        assert!(outcome.summary.contains("'docs'"));
    }

    #[test]
    fn status_transitions_are_one_directional() {
        use TaskStatus::*;
        assert!(Pending.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Completed));
        assert!(InProgress.can_transition_to(Failed));

        assert!(!Pending.can_transition_to(Completed));
        assert!(!InProgress.can_transition_to(Pending));
        for terminal in [Completed, Failed] {
            assert!(terminal.is_terminal());
            for next in [Pending, InProgress, Completed, Failed] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
        assert_eq!(TaskStatus::Failed.to_string(), "failed");
    }

    #[test]
    fn crawl_request_defaults() {
        let req: CrawlRequest = serde_json::from_str(r#"{"url": "https://example.com"}"#).unwrap();
        assert_eq!(req.pattern, "*");
        assert_eq!(req.max_depth, 2);
        assert_eq!(req.collection_name, "web_content");
    }
}
