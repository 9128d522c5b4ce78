//! # Crawl Harness CLI (`crawlctx`)
//!
//! The `crawlctx` binary starts the crawl API, runs one-off crawls and
//! queries against the local store, and exposes the agent tools over MCP.
//!
//! ## Usage
//!
//! ```bash
//! crawlctx --config ./config/crawl.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `crawlctx init` | Create the SQLite database and run schema migrations |
//! | `crawlctx serve` | Start the HTTP API |
//! | `crawlctx crawl <url>` | Crawl a site in the foreground |
//! | `crawlctx collections` | List collections in the local store |
//! | `crawlctx query <collection> "<text>"` | Semantic query against a collection |
//! | `crawlctx agent serve` | MCP server (stdio) forwarding to the API |
//! | `crawlctx agent call <tool>` | Run one agent tool against the API |
//! | `crawlctx agent prompt` | Print the resolved assistant prompt |
//!
//! ## Examples
//!
//! ```bash
//! # Start the API on the configured bind address
//! crawlctx serve --config ./config/crawl.toml
//!
//! # Crawl two levels of a documentation site
//! crawlctx crawl https://tokio.rs/tokio/tutorial --pattern tutorial --collection tokio
//!
//! # Ask the API-backed tool for task status
//! crawlctx agent call check_crawl_status --params '{"task_id": "..."}'
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crawl_harness::models::{CrawlRequest, DEFAULT_COLLECTION, DEFAULT_MAX_DEPTH, DEFAULT_PATTERN};
use crawl_harness::{agents, config, mcp, migrate, orchestrator, query, server, tools};

/// Crawl Harness CLI: crawl websites into vector collections and query them.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. A missing file means built-in defaults.
#[derive(Parser)]
#[command(
    name = "crawlctx",
    about = "Crawl Harness: background website crawling and semantic retrieval",
    version,
    long_about = "Crawl Harness crawls websites breadth-first in the background, stores the \
    pages as markdown in named vector collections, and answers semantic queries over HTTP. \
    An MCP bridge exposes the same operations as agent tools."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/crawl.toml`. When the file does not exist,
    /// every setting takes its default.
    #[arg(long, global = true, default_value = "./config/crawl.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the collection and document
    /// tables. Safe to run repeatedly.
    Init,

    /// Start the HTTP API.
    ///
    /// Serves on `[server].bind` until Ctrl-C, then waits for running
    /// crawls to finish.
    Serve,

    /// Crawl a website in the foreground and store it in a collection.
    Crawl {
        /// Start URL.
        url: String,

        /// Substring that followed URLs must contain (`*` follows all).
        #[arg(long, default_value = DEFAULT_PATTERN)]
        pattern: String,

        /// Link depth to follow from the start page.
        #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
        max_depth: u32,

        /// Destination collection.
        #[arg(long, default_value = DEFAULT_COLLECTION)]
        collection: String,
    },

    /// List collections in the local store.
    Collections,

    /// Query a collection by meaning.
    Query {
        /// Collection to search.
        collection: String,

        /// Query text.
        query: String,

        /// Number of results (defaults to `[query].default_results`).
        #[arg(short = 'n', long)]
        n_results: Option<usize>,
    },

    /// Agent tools backed by the HTTP API.
    Agent {
        #[command(subcommand)]
        action: AgentAction,
    },
}

/// Agent subcommands. All of them talk to `[agent].api_url`.
#[derive(Subcommand)]
enum AgentAction {
    /// Serve the tools and the assistant prompt over MCP on stdio.
    Serve {
        /// Override `[agent].api_url`.
        #[arg(long)]
        api_url: Option<String>,
    },
    /// Run one tool and print its text reply.
    Call {
        /// Tool name, e.g. `list_collections`.
        tool: String,
        /// Tool parameters as a JSON object.
        #[arg(long)]
        params: Option<String>,
    },
    /// Resolve and print the web content assistant prompt.
    Prompt {
        /// Initial user request to attach to the prompt.
        #[arg(long)]
        request: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries MCP frames under `agent serve`, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let mut cfg = config::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized at {}.", cfg.db.path.display());
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Crawl {
            url,
            pattern,
            max_depth,
            collection,
        } => {
            let request = CrawlRequest::new(url)
                .with_pattern(pattern)
                .with_max_depth(max_depth)
                .with_collection(collection);
            orchestrator::run_crawl(&cfg, request).await?;
        }
        Commands::Collections => {
            query::run_collections(&cfg).await?;
        }
        Commands::Query {
            collection,
            query: text,
            n_results,
        } => {
            query::run_query(&cfg, &collection, &text, n_results).await?;
        }
        Commands::Agent { action } => match action {
            AgentAction::Serve { api_url } => {
                if let Some(url) = api_url {
                    cfg.agent.api_url = url;
                }
                mcp::run_stdio(&cfg).await?;
            }
            AgentAction::Call { tool, params } => {
                tools::run_tool_call(&cfg, &tool, params.as_deref()).await?;
            }
            AgentAction::Prompt { request } => {
                agents::run_agent_prompt(&cfg, request.as_deref()).await?;
            }
        },
    }

    Ok(())
}
