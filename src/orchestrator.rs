//! Crawl submission and background execution.
//!
//! [`CrawlOrchestrator::submit`] validates a request, registers a `pending`
//! task and hands the crawl to a bounded worker pool without waiting for it.
//! At most `tasks.max_concurrent` crawls run at once; the rest stay
//! `pending` until a permit frees up.
//!
//! Each task runs in two layers: a supervisor spawned on the pool's
//! `JoinSet`, and the runner itself spawned as an inner tokio task. If the
//! runner panics the supervisor still sees the `JoinError` and records the
//! task as `failed`.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use url::Url;

use crate::config::Config;
use crate::crawler::{Crawler, WebCrawler};
use crate::error::{HarnessError, HarnessResult};
use crate::models::{CrawlRequest, TaskRecord, TaskStatus, TaskTransition};
use crate::store::{open_store, validate_collection_name};
use crate::tasks::TaskRegistry;

pub struct CrawlOrchestrator {
    registry: Arc<TaskRegistry>,
    crawler: Arc<dyn Crawler>,
    permits: Arc<Semaphore>,
    workers: Mutex<JoinSet<()>>,
    max_depth_limit: u32,
}

impl CrawlOrchestrator {
    pub fn new(config: &Config, crawler: Arc<dyn Crawler>) -> Self {
        Self {
            registry: Arc::new(TaskRegistry::new()),
            crawler,
            permits: Arc::new(Semaphore::new(config.tasks.max_concurrent.max(1))),
            workers: Mutex::new(JoinSet::new()),
            max_depth_limit: config.crawler.max_depth_limit,
        }
    }

    /// Checks a request without touching any state.
    pub fn validate_request(&self, request: &CrawlRequest) -> HarnessResult<()> {
        let url = Url::parse(&request.url)
            .map_err(|e| HarnessError::invalid(format!("invalid URL '{}': {}", request.url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(HarnessError::invalid(format!(
                "unsupported URL scheme '{}', expected http or https",
                url.scheme()
            )));
        }
        if url.host_str().is_none_or(str::is_empty) {
            return Err(HarnessError::invalid(format!(
                "URL '{}' has no host",
                request.url
            )));
        }
        if request.pattern.trim().is_empty() {
            return Err(HarnessError::invalid("pattern must not be empty"));
        }
        if request.max_depth > self.max_depth_limit {
            return Err(HarnessError::invalid(format!(
                "max_depth {} exceeds the limit of {}",
                request.max_depth, self.max_depth_limit
            )));
        }
        validate_collection_name(&request.collection_name)
    }

    /// Registers a crawl task and schedules it. Returns the task id, which
    /// is queryable as soon as this returns.
    ///
    /// Registration and spawning happen without an await point in between,
    /// so a caller dropping this future never leaves an unscheduled record.
    pub async fn submit(&self, request: CrawlRequest) -> HarnessResult<String> {
        self.validate_request(&request)?;

        let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
        while workers.try_join_next().is_some() {}

        let task_id = self.registry.create(&request);
        tracing::info!(
            task_id = %task_id,
            url = %request.url,
            collection = %request.collection_name,
            "crawl task submitted"
        );

        let registry = Arc::clone(&self.registry);
        let crawler = Arc::clone(&self.crawler);
        let permits = Arc::clone(&self.permits);
        let id = task_id.clone();

        workers.spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                record_failure(&registry, &id, "worker pool is shut down".to_string());
                return;
            };

            let runner = tokio::spawn(run_crawl_task(
                Arc::clone(&registry),
                crawler,
                id.clone(),
                request,
            ));
            if let Err(e) = runner.await {
                tracing::error!(task_id = %id, "crawl runner aborted: {}", e);
                record_failure(&registry, &id, format!("crawl runner aborted: {}", e));
            }
        });

        Ok(task_id)
    }

    pub fn status(&self, task_id: &str) -> HarnessResult<TaskRecord> {
        self.registry.get(task_id)
    }

    pub fn list(&self) -> Vec<TaskRecord> {
        self.registry.list()
    }

    /// Waits for every scheduled crawl to finish, including crawls
    /// submitted while waiting.
    pub async fn wait_idle(&self) {
        loop {
            let mut batch = {
                let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
                std::mem::take(&mut *workers)
            };
            if batch.is_empty() {
                return;
            }
            while batch.join_next().await.is_some() {}
        }
    }
}

/// Marks a task failed from whatever state it reached.
fn record_failure(registry: &TaskRegistry, task_id: &str, error: String) {
    if let Ok(record) = registry.get(task_id) {
        if record.status.is_terminal() {
            return;
        }
        if record.status == TaskStatus::Pending {
            let _ = registry.update(task_id, TaskTransition::Started);
        }
    }
    if let Err(e) = registry.update(task_id, TaskTransition::Failed { error }) {
        tracing::warn!(task_id = %task_id, "could not record failure: {}", e);
    }
}

/// Runs one crawl and records its outcome on the task.
pub async fn run_crawl_task(
    registry: Arc<TaskRegistry>,
    crawler: Arc<dyn Crawler>,
    task_id: String,
    request: CrawlRequest,
) {
    if let Err(e) = registry.update(&task_id, TaskTransition::Started) {
        tracing::warn!(task_id = %task_id, "cannot start crawl: {}", e);
        return;
    }
    tracing::info!(task_id = %task_id, url = %request.url, "crawl started");

    let transition = match crawler.crawl(&request).await {
        Ok(outcome) => {
            tracing::info!(
                task_id = %task_id,
                pages = ?outcome.pages_crawled,
                "{}",
                outcome.summary
            );
            TaskTransition::Completed {
                pages_crawled: outcome.pages_crawled,
            }
        }
        Err(e) => {
            tracing::warn!(task_id = %task_id, "crawl failed: {:#}", e);
            TaskTransition::Failed {
                error: format!("{:#}", e),
            }
        }
    };

    if let Err(e) = registry.update(&task_id, transition) {
        tracing::warn!(task_id = %task_id, "could not record crawl result: {}", e);
    }
}

/// `crawlctx crawl`: run one crawl in the foreground through the same
/// submit/run path the server uses, then print the final record.
pub async fn run_crawl(config: &Config, request: CrawlRequest) -> anyhow::Result<()> {
    let store = open_store(config).await?;
    let crawler = Arc::new(WebCrawler::new(&config.crawler, store)?);
    let orchestrator = CrawlOrchestrator::new(config, crawler);

    let task_id = orchestrator.submit(request).await?;
    orchestrator.wait_idle().await;
    let record = orchestrator.status(&task_id)?;

    match record.status {
        TaskStatus::Completed => {
            let pages = record
                .pages_crawled
                .map(|n| n.to_string())
                .unwrap_or_else(|| "?".to_string());
            println!(
                "Crawled {} pages from {} into collection '{}'.",
                pages, record.url, record.collection_name
            );
            Ok(())
        }
        _ => anyhow::bail!(
            "crawl of {} failed: {}",
            record.url,
            record.error.as_deref().unwrap_or("unknown error")
        ),
    }
}
