//! Agent tools.
//!
//! Each [`Tool`] wraps one call against the crawl API and renders the
//! response as plain text for a conversational agent. Tools never raise
//! protocol errors for API failures: a failed call comes back as a
//! `Failed to ...: {error}` message with [`ToolReply::is_error`] set.
//!
//! | Tool | API call |
//! |------|----------|
//! | `crawl_website` | `POST /crawl` |
//! | `check_crawl_status` | `GET /crawl/{task_id}` |
//! | `list_crawl_tasks` | `GET /crawls` |
//! | `list_collections` | `GET /collections` |
//! | `query_collection` | `POST /query` |

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::api::{CollectionList, CrawlAccepted, QueryRequest, QueryResponse, TaskList};
use crate::client::ApiClient;
use crate::config::Config;
use crate::models::{
    CrawlRequest, TaskRecord, TaskStatus, DEFAULT_COLLECTION, DEFAULT_MAX_DEPTH, DEFAULT_PATTERN,
};

/// Connection to the crawl API shared by every tool call.
pub struct ToolContext {
    pub client: ApiClient,
}

impl ToolContext {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

/// An agent-callable operation.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema of the parameters object.
    fn parameters_schema(&self) -> Value;

    /// Prefix of the text returned when [`execute`](Tool::execute) fails,
    /// e.g. `"Failed to list collections"`.
    fn failure_prefix(&self) -> &str;

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<String>;
}

/// Text returned to the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolReply {
    pub text: String,
    pub is_error: bool,
}

/// Runs `tool`, folding any failure into its `Failed to ...` text.
pub async fn call_tool(tool: &dyn Tool, params: Value, ctx: &ToolContext) -> ToolReply {
    match tool.execute(params, ctx).await {
        Ok(text) => ToolReply {
            text,
            is_error: false,
        },
        Err(e) => {
            tracing::warn!(tool = tool.name(), "tool call failed: {:#}", e);
            ToolReply {
                text: format!("{}: {:#}", tool.failure_prefix(), e),
                is_error: true,
            }
        }
    }
}

fn required_str<'a>(params: &'a Value, key: &str) -> Result<&'a str> {
    match params.get(key).and_then(Value::as_str) {
        Some(s) if !s.trim().is_empty() => Ok(s),
        _ => bail!("missing required parameter '{}'", key),
    }
}

fn optional_str<'a>(params: &'a Value, key: &str, default: &'a str) -> &'a str {
    params.get(key).and_then(Value::as_str).unwrap_or(default)
}

/// Missing or `null` takes `default`; anything but a non-negative integer
/// that fits in `T` is an error.
fn optional_int<T: TryFrom<u64>>(params: &Value, key: &str, default: T) -> Result<T> {
    let value = match params.get(key) {
        None | Some(Value::Null) => return Ok(default),
        Some(v) => v,
    };
    value
        .as_u64()
        .and_then(|n| T::try_from(n).ok())
        .ok_or_else(|| {
            anyhow::anyhow!(
                "parameter '{}' must be a non-negative integer, got {}",
                key,
                value
            )
        })
}

// ============ Formatting ============

pub fn format_crawl_started(url: &str, collection: &str, accepted: &CrawlAccepted) -> String {
    format!(
        "Crawling started for {} with task ID: {}.\n\
         The content will be saved to collection '{}'.\n\
         You can check the status using the task ID.",
        url, accepted.task_id, collection
    )
}

pub fn format_task_status(record: &TaskRecord) -> String {
    match record.status {
        TaskStatus::Completed => {
            let pages = record
                .pages_crawled
                .map(|n| n.to_string())
                .unwrap_or_else(|| "unknown number of".to_string());
            format!(
                "Crawl task {} completed successfully.\n\
                 Crawled {} pages from {}.\n\
                 Content saved to collection '{}'.",
                record.task_id, pages, record.url, record.collection_name
            )
        }
        TaskStatus::Failed => format!(
            "Crawl task {} failed: {}",
            record.task_id,
            record.error.as_deref().unwrap_or("Unknown error")
        ),
        status => format!(
            "Crawl task {} is {}. Started at {}.",
            record.task_id,
            status,
            record.start_time.to_rfc3339()
        ),
    }
}

pub fn format_task_list(list: &TaskList) -> String {
    if list.tasks.is_empty() {
        return "No crawl tasks found.".to_string();
    }

    let blocks: Vec<String> = list
        .tasks
        .iter()
        .map(|task| {
            let mut block = format!(
                "Task ID: {}\nURL: {}\nStatus: {}\nCollection: {}\n",
                task.task_id, task.url, task.status, task.collection_name
            );
            if let Some(pages) = task.pages_crawled {
                block.push_str(&format!("Pages crawled: {}\n", pages));
            }
            block
        })
        .collect();

    format!("Current crawl tasks:\n\n{}", blocks.join("\n"))
}

pub fn format_collections(list: &CollectionList) -> String {
    if list.collections.is_empty() {
        return "No collections found. You need to crawl a website first.".to_string();
    }
    let lines: Vec<String> = list
        .collections
        .iter()
        .map(|c| format!("Collection name: {}", c.name))
        .collect();
    format!("Available collections:\n{}", lines.join("\n"))
}

pub fn format_query_results(response: &QueryResponse) -> String {
    let results = response.results.as_deref().unwrap_or_default();
    if results.is_empty() {
        return format!(
            "No results found for '{}' in collection '{}'.",
            response.query, response.collection
        );
    }

    let formatted: Vec<String> = results
        .iter()
        .map(|r| {
            format!(
                "Result #{} (Score: {:.2})\nTitle: {}\nURL: {}\n\nContent: {}\n",
                r.rank,
                r.relevance_score,
                r.metadata.title.as_deref().unwrap_or("Untitled"),
                r.metadata.url,
                r.content_preview
            )
        })
        .collect();

    format!(
        "Query results for '{}' in collection '{}':\n\n{}",
        response.query,
        response.collection,
        formatted.join("\n---\n")
    )
}

// ============ Tools ============

pub struct CrawlWebsiteTool;

#[async_trait]
impl Tool for CrawlWebsiteTool {
    fn name(&self) -> &str {
        "crawl_website"
    }

    fn description(&self) -> &str {
        "Start crawling a website in the background and store its pages in a collection. Returns a task ID."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": { "type": "string", "description": "Starting URL of the crawl" },
                "pattern": { "type": "string", "description": "Substring that followed URLs must contain ('*' for all)", "default": DEFAULT_PATTERN },
                "max_depth": { "type": "integer", "description": "How many links deep to follow (1-3 recommended)", "default": DEFAULT_MAX_DEPTH },
                "collection_name": { "type": "string", "description": "Collection to store pages in", "default": DEFAULT_COLLECTION }
            },
            "required": ["url"]
        })
    }

    fn failure_prefix(&self) -> &str {
        "Failed to start crawling"
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<String> {
        let url = required_str(&params, "url")?;
        let request = CrawlRequest::new(url)
            .with_pattern(optional_str(&params, "pattern", DEFAULT_PATTERN))
            .with_max_depth(optional_int(&params, "max_depth", DEFAULT_MAX_DEPTH)?)
            .with_collection(optional_str(&params, "collection_name", DEFAULT_COLLECTION));

        let accepted = ctx.client.start_crawl(&request).await?;
        if accepted.task_id.is_empty() {
            bail!("No task ID returned from the API");
        }
        Ok(format_crawl_started(
            &request.url,
            &request.collection_name,
            &accepted,
        ))
    }
}

pub struct CheckCrawlStatusTool;

#[async_trait]
impl Tool for CheckCrawlStatusTool {
    fn name(&self) -> &str {
        "check_crawl_status"
    }

    fn description(&self) -> &str {
        "Check the status of a crawl task by its task ID"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "task_id": { "type": "string", "description": "ID returned by crawl_website" }
            },
            "required": ["task_id"]
        })
    }

    fn failure_prefix(&self) -> &str {
        "Failed to check crawl status"
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<String> {
        let task_id = required_str(&params, "task_id")?;
        let record = ctx.client.crawl_status(task_id).await?;
        Ok(format_task_status(&record))
    }
}

pub struct ListCrawlTasksTool;

#[async_trait]
impl Tool for ListCrawlTasksTool {
    fn name(&self) -> &str {
        "list_crawl_tasks"
    }

    fn description(&self) -> &str {
        "List every crawl task with its status"
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {}, "required": [] })
    }

    fn failure_prefix(&self) -> &str {
        "Failed to list crawl tasks"
    }

    async fn execute(&self, _params: Value, ctx: &ToolContext) -> Result<String> {
        Ok(format_task_list(&ctx.client.list_crawls().await?))
    }
}

pub struct ListCollectionsTool;

#[async_trait]
impl Tool for ListCollectionsTool {
    fn name(&self) -> &str {
        "list_collections"
    }

    fn description(&self) -> &str {
        "List the collections that hold crawled content"
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {}, "required": [] })
    }

    fn failure_prefix(&self) -> &str {
        "Failed to list collections"
    }

    async fn execute(&self, _params: Value, ctx: &ToolContext) -> Result<String> {
        Ok(format_collections(&ctx.client.list_collections().await?))
    }
}

pub struct QueryCollectionTool;

#[async_trait]
impl Tool for QueryCollectionTool {
    fn name(&self) -> &str {
        "query_collection"
    }

    fn description(&self) -> &str {
        "Search a collection of crawled pages for content relevant to a query"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "collection_name": { "type": "string", "description": "Collection to search" },
                "query": { "type": "string", "description": "Search query" },
                "n_results": { "type": "integer", "description": "Number of results", "default": 5 }
            },
            "required": ["collection_name", "query"]
        })
    }

    fn failure_prefix(&self) -> &str {
        "Failed to query collection"
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<String> {
        let request = QueryRequest {
            collection_name: required_str(&params, "collection_name")?.to_string(),
            query: required_str(&params, "query")?.to_string(),
            n_results: Some(optional_int(&params, "n_results", 5usize)?),
        };
        let response = ctx.client.query(&request).await?;
        Ok(format_query_results(&response))
    }
}

// ============ Registry ============

pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Registry pre-loaded with the five crawl tools.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(CrawlWebsiteTool));
        registry.register(Box::new(QueryCollectionTool));
        registry.register(Box::new(ListCollectionsTool));
        registry.register(Box::new(CheckCrawlStatusTool));
        registry.register(Box::new(ListCrawlTasksTool));
        registry
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn tools(&self) -> &[Box<dyn Tool>] {
        &self.tools
    }

    pub fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// `crawlctx agent call`: run one tool against the configured API and
/// print its text.
pub async fn run_tool_call(config: &Config, name: &str, params: Option<&str>) -> Result<()> {
    let registry = ToolRegistry::with_builtins();
    let Some(tool) = registry.find(name) else {
        let known: Vec<&str> = registry.tools().iter().map(|t| t.name()).collect();
        bail!("Unknown tool '{}'. Available: {}", name, known.join(", "));
    };
    let params: Value = match params {
        Some(raw) => serde_json::from_str(raw).context("--params must be a JSON object")?,
        None => json!({}),
    };
    if !params.is_object() {
        bail!("--params must be a JSON object");
    }

    let ctx = ToolContext::new(ApiClient::new(&config.agent));
    let reply = call_tool(tool, params, &ctx).await;
    println!("{}", reply.text);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::CollectionInfo;
    use crate::config::AgentConfig;
    use crate::models::{PageMetadata, QueryResultEntry};
    use chrono::{TimeZone, Utc};

    fn record(status: TaskStatus) -> TaskRecord {
        TaskRecord {
            task_id: "abc".into(),
            url: "https://example.com".into(),
            pattern: "*".into(),
            max_depth: 2,
            collection_name: "docs".into(),
            status,
            start_time: Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap(),
            finish_time: None,
            pages_crawled: None,
            error: None,
        }
    }

    #[test]
    fn integer_params_are_checked() {
        let params = json!({
            "max_depth": 3,
            "big": 4294967297u64,
            "neg": -1,
            "frac": 1.5,
            "none": null
        });
        assert_eq!(optional_int(&params, "max_depth", 2u32).unwrap(), 3);
        assert_eq!(optional_int(&params, "missing", 2u32).unwrap(), 2);
        assert_eq!(optional_int(&params, "none", 2u32).unwrap(), 2);
        assert!(optional_int(&params, "big", 2u32).is_err());
        assert!(optional_int(&params, "neg", 2u32).is_err());
        assert!(optional_int(&params, "frac", 2u32).is_err());
    }

    #[tokio::test]
    async fn out_of_range_depth_fails_before_any_request() {
        let ctx = ToolContext::new(ApiClient::new(&AgentConfig {
            api_url: "http://127.0.0.1:9".into(),
            ..Default::default()
        }));
        let reply = call_tool(
            &CrawlWebsiteTool,
            json!({ "url": "https://example.com", "max_depth": 4294967297u64 }),
            &ctx,
        )
        .await;
        assert!(reply.is_error);
        assert!(reply.text.starts_with("Failed to start crawling: parameter 'max_depth'"));
    }

    #[test]
    fn completed_status_text() {
        let mut r = record(TaskStatus::Completed);
        r.pages_crawled = Some(42);
        assert_eq!(
            format_task_status(&r),
            "Crawl task abc completed successfully.\n\
             Crawled 42 pages from https://example.com.\n\
             Content saved to collection 'docs'."
        );

        r.pages_crawled = None;
        assert!(format_task_status(&r).contains("Crawled unknown number of pages"));
    }

    #[test]
    fn failed_and_running_status_text() {
        let mut r = record(TaskStatus::Failed);
        r.error = Some("boom".into());
        assert_eq!(format_task_status(&r), "Crawl task abc failed: boom");

        let r = record(TaskStatus::InProgress);
        assert_eq!(
            format_task_status(&r),
            "Crawl task abc is in_progress. Started at 2024-03-01T09:30:00+00:00."
        );
    }

    #[test]
    fn task_list_text() {
        assert_eq!(
            format_task_list(&TaskList { tasks: vec![] }),
            "No crawl tasks found."
        );

        let mut done = record(TaskStatus::Completed);
        done.pages_crawled = Some(3);
        let text = format_task_list(&TaskList {
            tasks: vec![done, record(TaskStatus::Pending)],
        });
        assert!(text.starts_with("Current crawl tasks:\n\nTask ID: abc\n"));
        assert_eq!(text.matches("Pages crawled:").count(), 1);
        assert!(text.contains("Status: pending"));
    }

    #[test]
    fn collections_text() {
        assert_eq!(
            format_collections(&CollectionList {
                collections: vec![]
            }),
            "No collections found. You need to crawl a website first."
        );
        let text = format_collections(&CollectionList {
            collections: vec![
                CollectionInfo { name: "docs".into() },
                CollectionInfo { name: "blog".into() },
            ],
        });
        assert_eq!(
            text,
            "Available collections:\nCollection name: docs\nCollection name: blog"
        );
    }

    #[test]
    fn query_results_text() {
        let entry = |rank: usize, title: Option<&str>| QueryResultEntry {
            rank,
            relevance_score: 0.8123,
            metadata: PageMetadata {
                url: format!("https://example.com/{}", rank),
                title: title.map(str::to_string),
                depth: 0,
                timestamp: String::new(),
            },
            content_preview: "preview".into(),
            full_content: "preview".into(),
        };
        let response = QueryResponse {
            collection: "docs".into(),
            query: "install".into(),
            num_results: 2,
            results: Some(vec![entry(1, Some("Intro")), entry(2, None)]),
            message: None,
        };
        let text = format_query_results(&response);
        assert!(text.starts_with("Query results for 'install' in collection 'docs':\n\n"));
        assert!(text.contains("Result #1 (Score: 0.81)\nTitle: Intro\nURL: https://example.com/1\n\nContent: preview\n"));
        assert!(text.contains("\n---\nResult #2"));
        assert!(text.contains("Title: Untitled"));

        let empty = QueryResponse {
            collection: "docs".into(),
            query: "nothing".into(),
            num_results: 0,
            results: None,
            message: Some("No results found for this query in the collection.".into()),
        };
        assert_eq!(
            format_query_results(&empty),
            "No results found for 'nothing' in collection 'docs'."
        );
    }

    #[test]
    fn registry_has_all_tools() {
        let registry = ToolRegistry::with_builtins();
        assert_eq!(registry.len(), 5);
        for name in [
            "crawl_website",
            "check_crawl_status",
            "list_crawl_tasks",
            "list_collections",
            "query_collection",
        ] {
            assert!(registry.find(name).is_some(), "{}", name);
        }
        assert!(registry.find("nope").is_none());
    }

    #[tokio::test]
    async fn unreachable_api_becomes_failure_text() {
        // Port 9 (discard) on localhost is never an HTTP server in CI.
        let ctx = ToolContext::new(ApiClient::new(&AgentConfig {
            api_url: "http://127.0.0.1:9".into(),
            status_timeout_secs: 2,
            ..Default::default()
        }));
        let reply = call_tool(&ListCollectionsTool, json!({}), &ctx).await;
        assert!(reply.is_error);
        assert!(reply.text.starts_with("Failed to list collections: "));
    }

    #[tokio::test]
    async fn missing_parameter_becomes_failure_text() {
        let ctx = ToolContext::new(ApiClient::new(&AgentConfig::default()));
        let reply = call_tool(&CheckCrawlStatusTool, json!({}), &ctx).await;
        assert!(reply.is_error);
        assert_eq!(
            reply.text,
            "Failed to check crawl status: missing required parameter 'task_id'"
        );
    }
}
