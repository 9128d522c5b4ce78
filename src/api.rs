//! Wire types of the HTTP API.
//!
//! Shared by the server handlers and the [`ApiClient`](crate::client::ApiClient)
//! so both sides agree on the JSON shapes.

use serde::{Deserialize, Serialize};

use crate::models::{TaskRecord, TaskStatus};

pub use crate::query::QueryResponse;

pub const SERVICE_NAME: &str = "Web Crawler and ChromaDB API";

/// Response body of `POST /crawl`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlAccepted {
    pub task_id: String,
    pub message: String,
    pub status: TaskStatus,
}

/// Response body of `GET /crawls`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskList {
    pub tasks: Vec<TaskRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
}

/// Response body of `GET /collections`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionList {
    pub collections: Vec<CollectionInfo>,
}

/// Request body of `POST /query`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub collection_name: String,
    pub query: String,
    /// Falls back to `query.default_results` when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_results: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointInfo {
    pub method: String,
    pub path: String,
    pub description: String,
}

/// Response body of `GET /`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub name: String,
    pub version: String,
    pub endpoints: Vec<EndpointInfo>,
}

impl ServiceInfo {
    pub fn current() -> Self {
        let endpoints = [
            ("POST", "/crawl", "Start a crawl task"),
            ("GET", "/crawl/{task_id}", "Get the status of a crawl task"),
            ("GET", "/crawls", "List all crawl tasks"),
            ("GET", "/collections", "List all collections"),
            ("POST", "/query", "Query a collection"),
            ("GET", "/health", "Health check"),
        ]
        .into_iter()
        .map(|(method, path, description)| EndpointInfo {
            method: method.to_string(),
            path: path.to_string(),
            description: description.to_string(),
        })
        .collect();

        Self {
            name: SERVICE_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            endpoints,
        }
    }
}

/// Error response body: `{ "error": { "code": "...", "message": "..." } }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable code: `bad_request`, `not_found`,
    /// `collection_not_found` or `internal`.
    pub code: String,
    pub message: String,
}
