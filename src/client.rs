//! HTTP client for the crawl API.
//!
//! Used by the agent tools to talk to a running `crawlctx serve`. Each call
//! carries its own timeout: crawl submission, status/list lookups and
//! queries are budgeted separately (see `[agent]` in the config).

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::Url;
use serde::de::DeserializeOwned;

use crate::api::{CollectionList, CrawlAccepted, ErrorBody, QueryRequest, QueryResponse, TaskList};
use crate::config::AgentConfig;
use crate::models::{CrawlRequest, TaskRecord};

pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
    submit_timeout: Duration,
    status_timeout: Duration,
    query_timeout: Duration,
}

impl ApiClient {
    pub fn new(config: &AgentConfig) -> Self {
        Self {
            base_url: config.api_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            submit_timeout: Duration::from_secs(config.submit_timeout_secs),
            status_timeout: Duration::from_secs(config.status_timeout_secs),
            query_timeout: Duration::from_secs(config.query_timeout_secs),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `base_url` plus `segments`, each percent-encoded as one path segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .with_context(|| format!("Invalid API URL: {}", self.base_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("API URL cannot take a path: {}", self.base_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub async fn start_crawl(&self, request: &CrawlRequest) -> Result<CrawlAccepted> {
        let resp = self
            .http
            .post(self.endpoint(&["crawl"])?)
            .timeout(self.submit_timeout)
            .json(request)
            .send()
            .await
            .context("Failed to connect to crawl API")?;
        parse(resp, "crawl").await
    }

    pub async fn crawl_status(&self, task_id: &str) -> Result<TaskRecord> {
        let resp = self
            .http
            .get(self.endpoint(&["crawl", task_id])?)
            .timeout(self.status_timeout)
            .send()
            .await
            .context("Failed to connect to crawl API")?;
        parse(resp, "task status").await
    }

    pub async fn list_crawls(&self) -> Result<TaskList> {
        let resp = self
            .http
            .get(self.endpoint(&["crawls"])?)
            .timeout(self.status_timeout)
            .send()
            .await
            .context("Failed to connect to crawl API")?;
        parse(resp, "task list").await
    }

    pub async fn list_collections(&self) -> Result<CollectionList> {
        let resp = self
            .http
            .get(self.endpoint(&["collections"])?)
            .timeout(self.status_timeout)
            .send()
            .await
            .context("Failed to connect to crawl API")?;
        parse(resp, "collection list").await
    }

    pub async fn query(&self, request: &QueryRequest) -> Result<QueryResponse> {
        let resp = self
            .http
            .post(self.endpoint(&["query"])?)
            .timeout(self.query_timeout)
            .json(request)
            .send()
            .await
            .context("Failed to connect to crawl API")?;
        parse(resp, "query").await
    }
}

async fn parse<T: DeserializeOwned>(resp: reqwest::Response, what: &str) -> Result<T> {
    let status = resp.status();
    if !status.is_success() {
        let message = match resp.json::<ErrorBody>().await {
            Ok(body) => body.error.message,
            Err(_) => format!("HTTP {}", status),
        };
        anyhow::bail!("Server error ({}): {}", status, message);
    }
    resp.json()
        .await
        .with_context(|| format!("Failed to parse {} response", what))
}
