//! # Crawl Harness
//!
//! Background website crawling, vector-store ingestion, and semantic
//! retrieval.
//!
//! A crawl request names a start URL, a URL pattern, a link depth and a
//! target collection. The HTTP API accepts the request, returns a task id
//! immediately, and runs the crawl on a bounded background pool. Crawled
//! pages are converted to markdown, embedded, and stored in a named
//! collection that can later be queried by meaning.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │  HTTP API    │──▶│ Orchestrator │──▶│   Crawler    │
//! │  (axum)      │   │ TaskRegistry │   │ fetch+extract│
//! └──────┬───────┘   └──────────────┘   └──────┬───────┘
//!        │                                     ▼
//!        │  POST /query                 ┌──────────────┐
//!        └─────────────────────────────▶│ VectorStore  │
//!                                       │ SQLite+embed │
//!                                       └──────────────┘
//!        ▲
//!        │ HTTP
//! ┌──────┴───────┐
//! │ Agent tools  │◀── MCP over stdio
//! └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! crawlctx init                                   # create database
//! crawlctx serve                                  # start the API
//! crawlctx crawl https://docs.rs --pattern docs   # one crawl, foreground
//! crawlctx query web_content "async runtimes"
//! crawlctx agent serve                            # MCP bridge to the API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Crawl requests, task records, stored documents |
//! | [`error`] | Typed errors shared by the API surfaces |
//! | [`tasks`] | Task registry with checked status transitions |
//! | [`orchestrator`] | Submission, validation and the background pool |
//! | [`crawler`] | Breadth-first web crawler |
//! | [`extract`] | HTML to markdown and link extraction |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`store`] | Vector store trait, SQLite and in-memory backends |
//! | [`query`] | Query facade and result shaping |
//! | [`api`] | HTTP wire types |
//! | [`server`] | HTTP API server |
//! | [`client`] | HTTP client for the API |
//! | [`tools`] | Agent tools over the client |
//! | [`agents`] | Agent personas |
//! | [`mcp`] | MCP stdio bridge |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod agents;
pub mod api;
pub mod client;
pub mod config;
pub mod crawler;
pub mod db;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod mcp;
pub mod migrate;
pub mod models;
pub mod orchestrator;
pub mod query;
pub mod server;
pub mod store;
pub mod tasks;
pub mod tools;
