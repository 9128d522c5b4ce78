//! Crawl engine.
//!
//! The [`Crawler`] trait is the seam between the task runner and whatever
//! actually fetches pages. [`WebCrawler`] is the built-in engine: a
//! breadth-first crawl that stays on the start URL's host, follows links up
//! to `max_depth`, converts each HTML page to markdown and writes it to the
//! destination collection as it goes.
//!
//! # URL filtering
//!
//! A pattern of `*` follows every same-host link. Any other pattern is
//! wrapped as the glob `*{pattern}*` and matched against the full link URL,
//! so `docs` keeps `https://example.com/docs/intro` and drops
//! `https://example.com/blog`. The start URL is always fetched.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use globset::{Glob, GlobMatcher};
use sha2::{Digest, Sha256};
use url::Url;

use crate::config::CrawlerConfig;
use crate::extract::{extract_page, ExtractedPage};
use crate::models::{CrawlOutcome, CrawlRequest, PageDocument, PageMetadata};
use crate::store::VectorStore;

/// Runs one crawl to completion.
///
/// Implementations report failure (network, parse, storage) through the
/// returned error; the runner records it on the task.
#[async_trait]
pub trait Crawler: Send + Sync {
    async fn crawl(&self, request: &CrawlRequest) -> Result<CrawlOutcome>;
}

/// Link filter built from a crawl request's pattern.
#[derive(Debug, Clone)]
pub enum UrlFilter {
    All,
    Glob(GlobMatcher),
}

impl UrlFilter {
    pub fn new(pattern: &str) -> Result<Self> {
        let core = pattern.trim().trim_matches('*');
        if core.is_empty() {
            return Ok(UrlFilter::All);
        }
        let glob = Glob::new(&format!("*{}*", core))
            .with_context(|| format!("invalid URL pattern: '{}'", pattern))?;
        Ok(UrlFilter::Glob(glob.compile_matcher()))
    }

    pub fn matches(&self, url: &Url) -> bool {
        match self {
            UrlFilter::All => true,
            UrlFilter::Glob(m) => m.is_match(url.as_str()),
        }
    }
}

/// Stable document id for the `index`-th page of a crawl.
pub fn document_id(index: u64, url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    let hex = hex::encode(digest);
    format!("doc_{:03}_{}", index, &hex[..12])
}

/// Breadth-first HTTP crawler that ingests into a [`VectorStore`].
pub struct WebCrawler {
    client: reqwest::Client,
    store: Arc<dyn VectorStore>,
    max_pages: usize,
}

impl WebCrawler {
    pub fn new(config: &CrawlerConfig, store: Arc<dyn VectorStore>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            store,
            max_pages: config.max_pages,
        })
    }

    /// Fetches `url`. Returns `Ok(None)` for non-HTML responses.
    async fn fetch(&self, url: &Url) -> Result<Option<(Url, ExtractedPage)>> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("request to {} failed", url))?
            .error_for_status()
            .with_context(|| format!("{} returned an error status", url))?;

        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("text/html") || ct.contains("application/xhtml"))
            .unwrap_or(true);
        if !is_html {
            tracing::debug!("skipping non-HTML page {}", url);
            return Ok(None);
        }

        // Links resolve against the post-redirect location.
        let final_url = response.url().clone();
        let body = response
            .text()
            .await
            .with_context(|| format!("failed to read body of {}", url))?;

        let page = extract_page(&body, &final_url);
        Ok(Some((final_url, page)))
    }
}

#[async_trait]
impl Crawler for WebCrawler {
    async fn crawl(&self, request: &CrawlRequest) -> Result<CrawlOutcome> {
        let mut start = Url::parse(&request.url)
            .with_context(|| format!("invalid start URL: {}", request.url))?;
        start.set_fragment(None);
        let host = start.host_str().map(str::to_string);
        let filter = UrlFilter::new(&request.pattern)?;

        self.store
            .get_or_create_collection(&request.collection_name)
            .await?;

        let mut queue: VecDeque<(Url, u32)> = VecDeque::from([(start.clone(), 0)]);
        let mut seen: HashSet<String> = HashSet::from([start.to_string()]);
        let mut pages: u64 = 0;

        while let Some((url, depth)) = queue.pop_front() {
            if pages as usize >= self.max_pages {
                tracing::info!(
                    "page cap of {} reached, stopping crawl of {}",
                    self.max_pages,
                    start
                );
                break;
            }

            let (final_url, page) = match self.fetch(&url).await {
                Ok(Some(fetched)) => fetched,
                Ok(None) => continue,
                Err(e) if depth == 0 => return Err(e),
                Err(e) => {
                    tracing::warn!("skipping {}: {:#}", url, e);
                    continue;
                }
            };

            pages += 1;
            let doc = PageDocument {
                id: document_id(pages, final_url.as_str()),
                content: page.markdown,
                metadata: PageMetadata {
                    url: final_url.to_string(),
                    title: page.title,
                    depth,
                    timestamp: Utc::now().to_rfc3339(),
                },
            };
            self.store
                .add_documents(&request.collection_name, std::slice::from_ref(&doc))
                .await
                .with_context(|| format!("failed to store {}", doc.metadata.url))?;
            tracing::debug!(
                "added {} to collection '{}'",
                doc.metadata.url,
                request.collection_name
            );

            if depth >= request.max_depth {
                continue;
            }
            for link in page.links {
                if link.host_str().map(str::to_string) != host {
                    continue;
                }
                if !filter.matches(&link) {
                    continue;
                }
                if seen.insert(link.to_string()) {
                    queue.push_back((link, depth + 1));
                }
            }
        }

        tracing::info!(
            "crawled {} pages from {} into '{}'",
            pages,
            start,
            request.collection_name
        );
        Ok(CrawlOutcome::new(pages, &request.collection_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn wildcard_pattern_matches_everything() {
        for pattern in ["*", "", "**"] {
            let filter = UrlFilter::new(pattern).unwrap();
            assert!(matches!(filter, UrlFilter::All));
            assert!(filter.matches(&url("https://example.com/anything")));
        }
    }

    #[test]
    fn substring_pattern_filters_links() {
        let filter = UrlFilter::new("docs").unwrap();
        assert!(filter.matches(&url("https://example.com/docs/intro")));
        assert!(filter.matches(&url("https://example.com/api/docs")));
        assert!(!filter.matches(&url("https://example.com/blog/post")));
    }

    #[test]
    fn pattern_with_inner_wildcard() {
        let filter = UrlFilter::new("*guide*v2*").unwrap();
        assert!(filter.matches(&url("https://example.com/guide/start/v2/")));
        assert!(!filter.matches(&url("https://example.com/guide/start/v1/")));
    }

    #[test]
    fn document_ids_are_stable_and_indexed() {
        let a = document_id(1, "https://example.com/");
        let b = document_id(1, "https://example.com/");
        let c = document_id(2, "https://example.com/other");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("doc_001_"));
        assert_eq!(a.len(), "doc_001_".len() + 12);
    }
}
