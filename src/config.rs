//! TOML configuration.
//!
//! Every section has defaults, so an empty file (or [`Config::minimal`])
//! yields a working setup: a SQLite vector store under `./data`, the API
//! on `127.0.0.1:8000`, and local embeddings when the feature is enabled.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub tasks: TasksConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub agent: AgentConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/vectors.sqlite")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

/// Background crawl task pool.
#[derive(Debug, Deserialize, Clone)]
pub struct TasksConfig {
    /// Maximum number of crawls running at once. Further submissions wait
    /// in `pending` until a slot frees up.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
        }
    }
}

fn default_max_concurrent() -> usize {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct CrawlerConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Hard cap on pages fetched by a single crawl.
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    /// Largest `max_depth` a crawl request may ask for.
    #[serde(default = "default_max_depth_limit")]
    pub max_depth_limit: u32,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            request_timeout_secs: default_request_timeout_secs(),
            max_pages: default_max_pages(),
            max_depth_limit: default_max_depth_limit(),
        }
    }
}

fn default_user_agent() -> String {
    format!("crawl-harness/{}", env!("CARGO_PKG_VERSION"))
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_max_pages() -> usize {
    500
}
fn default_max_depth_limit() -> u32 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[cfg(feature = "local-embeddings")]
fn default_provider() -> String {
    "local".to_string()
}
#[cfg(not(feature = "local-embeddings"))]
fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct QueryConfig {
    /// Documents longer than this many characters are truncated in the
    /// `content_preview` field.
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
    #[serde(default = "default_results")]
    pub default_results: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            preview_chars: default_preview_chars(),
            default_results: default_results(),
        }
    }
}

fn default_preview_chars() -> usize {
    300
}
fn default_results() -> usize {
    5
}

/// Settings for the conversational agent wrapper, which talks to the API
/// over HTTP rather than in-process.
#[derive(Debug, Deserialize, Clone)]
pub struct AgentConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_submit_timeout_secs")]
    pub submit_timeout_secs: u64,
    #[serde(default = "default_status_timeout_secs")]
    pub status_timeout_secs: u64,
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            submit_timeout_secs: default_submit_timeout_secs(),
            status_timeout_secs: default_status_timeout_secs(),
            query_timeout_secs: default_query_timeout_secs(),
        }
    }
}

fn default_api_url() -> String {
    "http://localhost:8000".to_string()
}
fn default_submit_timeout_secs() -> u64 {
    30
}
fn default_status_timeout_secs() -> u64 {
    10
}
fn default_query_timeout_secs() -> u64 {
    15
}

impl Config {
    /// All defaults, no file required.
    pub fn minimal() -> Self {
        Self::default()
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config = parse_config(&content)?;
    validate(&config)?;
    Ok(config)
}

/// Loads the config file if it exists, otherwise falls back to defaults.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::debug!("config {} not found, using defaults", path.display());
        Ok(Config::minimal())
    }
}

fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).with_context(|| "Failed to parse config file")
}

fn validate(config: &Config) -> Result<()> {
    if config.tasks.max_concurrent == 0 {
        anyhow::bail!("tasks.max_concurrent must be >= 1");
    }

    if config.crawler.max_pages == 0 {
        anyhow::bail!("crawler.max_pages must be >= 1");
    }

    if config.query.preview_chars == 0 {
        anyhow::bail!("query.preview_chars must be >= 1");
    }

    if config.query.default_results == 0 {
        anyhow::bail!("query.default_results must be >= 1");
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" | "local" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, or local.",
            other
        ),
    }

    if matches!(config.embedding.provider.as_str(), "openai" | "ollama")
        && config.embedding.model.is_none()
    {
        anyhow::bail!(
            "embedding.model must be specified when provider is '{}'",
            config.embedding.provider
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let cfg = parse_config("").unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.server.bind, "127.0.0.1:8000");
        assert_eq!(cfg.tasks.max_concurrent, 4);
        assert_eq!(cfg.query.preview_chars, 300);
        assert_eq!(cfg.query.default_results, 5);
        assert_eq!(cfg.agent.status_timeout_secs, 10);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = parse_config(
            r#"
[server]
bind = "0.0.0.0:9000"

[tasks]
max_concurrent = 2
"#,
        )
        .unwrap();
        assert_eq!(cfg.server.bind, "0.0.0.0:9000");
        assert_eq!(cfg.tasks.max_concurrent, 2);
        assert_eq!(cfg.crawler.max_pages, 500);
    }

    #[test]
    fn rejects_zero_concurrency() {
        let cfg = parse_config("[tasks]\nmax_concurrent = 0\n").unwrap();
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn rejects_unknown_provider() {
        let cfg = parse_config("[embedding]\nprovider = \"chroma\"\n").unwrap();
        let err = validate(&cfg).unwrap_err();
        assert!(err.to_string().contains("Unknown embedding provider"));
    }

    #[test]
    fn remote_provider_requires_model() {
        let cfg = parse_config("[embedding]\nprovider = \"openai\"\n").unwrap();
        assert!(validate(&cfg).is_err());
    }
}
