//! HTTP API server.
//!
//! Accepts crawl submissions, reports task status and forwards semantic
//! queries to the vector store. Crawls run in the background on the
//! [`CrawlOrchestrator`]'s worker pool; every handler returns promptly.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Service name and endpoint catalog |
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/crawl` | Start a crawl task |
//! | `GET`  | `/crawl/{task_id}` | One task record |
//! | `GET`  | `/crawls` | Every task record |
//! | `GET`  | `/collections` | Collection names |
//! | `POST` | `/query` | Semantic query against a collection |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "invalid URL 'x': relative URL without a base" } }
//! ```
//!
//! | Code | Status | Cause |
//! |------|--------|-------|
//! | `bad_request` | 400 | malformed body, invalid URL or parameters |
//! | `collection_not_found` | 400 | query against an unknown collection |
//! | `query_failed` | 400 | vector store or embedder failure while querying |
//! | `not_found` | 404 | unknown task id |
//! | `internal` | 500 | vector store failure outside `/query` |
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::{
    CollectionInfo, CollectionList, CrawlAccepted, ErrorBody, ErrorDetail, HealthResponse,
    QueryRequest, QueryResponse, ServiceInfo, TaskList,
};
use crate::config::{Config, QueryConfig};
use crate::crawler::WebCrawler;
use crate::error::HarnessError;
use crate::models::{CrawlRequest, TaskRecord, TaskStatus};
use crate::orchestrator::CrawlOrchestrator;
use crate::query::query_collection;
use crate::store::{open_store, VectorStore};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<CrawlOrchestrator>,
    pub store: Arc<dyn VectorStore>,
    pub query: QueryConfig,
}

impl AppState {
    pub fn new(
        orchestrator: Arc<CrawlOrchestrator>,
        store: Arc<dyn VectorStore>,
        query: QueryConfig,
    ) -> Self {
        Self {
            orchestrator,
            store,
            query,
        }
    }
}

/// Builds the API router with CORS and request tracing.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route("/crawl", post(handle_crawl))
        .route("/crawl/{task_id}", get(handle_crawl_status))
        .route("/crawls", get(handle_list_crawls))
        .route("/collections", get(handle_collections))
        .route("/query", post(handle_query))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Starts the API server on `[server].bind`.
///
/// Opens the SQLite vector store, wires the web crawler and the worker pool,
/// and serves until Ctrl-C. In-flight crawls are allowed to finish before
/// returning.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let store = open_store(config).await?;
    let crawler = Arc::new(WebCrawler::new(&config.crawler, Arc::clone(&store))?);
    let orchestrator = Arc::new(CrawlOrchestrator::new(config, crawler));
    let state = AppState::new(Arc::clone(&orchestrator), store, config.query.clone());

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!("API server listening on http://{}", listener.local_addr()?);
    println!("API server listening on http://{}", config.server.bind);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let running = orchestrator
        .list()
        .iter()
        .filter(|r| !r.status.is_terminal())
        .count();
    if running > 0 {
        tracing::info!("waiting for {} unfinished crawl tasks", running);
    }
    orchestrator.wait_idle().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

// ============ Error response ============

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: message.into(),
    }
}

impl From<HarnessError> for AppError {
    fn from(err: HarnessError) -> Self {
        match err {
            HarnessError::InvalidRequest(msg) => bad_request(msg),
            HarnessError::TaskNotFound(_) => AppError {
                status: StatusCode::NOT_FOUND,
                code: "not_found",
                message: err.to_string(),
            },
            HarnessError::CollectionNotFound(_) => AppError {
                status: StatusCode::BAD_REQUEST,
                code: "collection_not_found",
                message: err.to_string(),
            },
            HarnessError::InvalidTransition { .. } | HarnessError::Collaborator(_) => {
                tracing::error!("request failed: {:#}", err);
                internal(format!("{:#}", err))
            }
        }
    }
}

/// `/query` reports store and embedder failures as client errors.
fn query_error(err: HarnessError) -> AppError {
    match err {
        HarnessError::Collaborator(e) => {
            tracing::warn!("query failed: {:#}", e);
            AppError {
                status: StatusCode::BAD_REQUEST,
                code: "query_failed",
                message: format!("{:#}", e),
            }
        }
        other => other.into(),
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

// ============ Handlers ============

async fn handle_root() -> Json<ServiceInfo> {
    Json(ServiceInfo::current())
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn handle_crawl(
    State(state): State<AppState>,
    body: Result<Json<CrawlRequest>, JsonRejection>,
) -> Result<Json<CrawlAccepted>, AppError> {
    let Json(request) = body?;
    let message = format!(
        "Crawling started for {} with max depth {}. Results will be saved to collection '{}'.",
        request.url, request.max_depth, request.collection_name
    );
    let task_id = state.orchestrator.submit(request).await?;

    Ok(Json(CrawlAccepted {
        task_id,
        message,
        status: TaskStatus::Pending,
    }))
}

async fn handle_crawl_status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<TaskRecord>, AppError> {
    Ok(Json(state.orchestrator.status(&task_id)?))
}

async fn handle_list_crawls(State(state): State<AppState>) -> Json<TaskList> {
    Json(TaskList {
        tasks: state.orchestrator.list(),
    })
}

async fn handle_collections(
    State(state): State<AppState>,
) -> Result<Json<CollectionList>, AppError> {
    let names = state.store.list_collections().await?;
    Ok(Json(CollectionList {
        collections: names
            .into_iter()
            .map(|name| CollectionInfo { name })
            .collect(),
    }))
}

async fn handle_query(
    State(state): State<AppState>,
    body: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, AppError> {
    let Json(request) = body?;
    let n_results = request.n_results.unwrap_or(state.query.default_results);

    let outcome = query_collection(
        state.store.as_ref(),
        &request.collection_name,
        &request.query,
        n_results,
        state.query.preview_chars,
    )
    .await
    .map_err(query_error)?;

    Ok(Json(QueryResponse::new(
        &request.collection_name,
        &request.query,
        outcome,
    )))
}
