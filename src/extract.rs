//! HTML page extraction.
//!
//! Turns a fetched HTML document into the three things the crawler needs:
//! a title, a markdown rendering of the main content, and the absolute
//! URLs of outgoing links.

use std::sync::LazyLock;

use htmd::HtmlToMarkdown;
use scraper::{ElementRef, Html, Selector};
use url::Url;

static TITLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("BUG: hardcoded CSS selector 'title' is invalid"));

static LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("BUG: hardcoded CSS selector 'a[href]' is invalid"));

/// Content containers, most specific first.
static CONTENT_SELECTORS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    ["main", "article", "[role='main']", "body"]
        .iter()
        .map(|s| Selector::parse(s).expect("BUG: hardcoded content selector is invalid"))
        .collect()
});

/// Tags dropped before markdown conversion.
const SKIP_TAGS: &[&str] = &[
    "script", "style", "noscript", "nav", "header", "footer", "aside", "svg", "form",
];

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedPage {
    pub title: Option<String>,
    pub markdown: String,
    pub links: Vec<Url>,
}

/// Extracts title, markdown body and outgoing links from `html`, resolving
/// relative links against `base`.
pub fn extract_page(html: &str, base: &Url) -> ExtractedPage {
    let document = Html::parse_document(html);

    let title = document
        .select(&TITLE_SELECTOR)
        .next()
        .map(|t| collapse_whitespace(&t.text().collect::<String>()))
        .filter(|t| !t.is_empty());

    let links = extract_links(&document, base);
    let markdown = content_root(&document)
        .map(|root| to_markdown(&root))
        .unwrap_or_default();

    ExtractedPage {
        title,
        markdown,
        links,
    }
}

fn content_root(document: &Html) -> Option<ElementRef<'_>> {
    CONTENT_SELECTORS
        .iter()
        .find_map(|sel| document.select(sel).next())
}

fn to_markdown(root: &ElementRef<'_>) -> String {
    let converter = HtmlToMarkdown::builder()
        .skip_tags(SKIP_TAGS.to_vec())
        .build();

    match converter.convert(&root.html()) {
        Ok(md) => md.trim().to_string(),
        Err(e) => {
            tracing::debug!("markdown conversion failed, falling back to text: {}", e);
            collapse_whitespace(&root.text().collect::<Vec<_>>().join(" "))
        }
    }
}

fn extract_links(document: &Html, base: &Url) -> Vec<Url> {
    let mut links = Vec::new();
    for anchor in document.select(&LINK_SELECTOR) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') {
            continue;
        }
        let Ok(mut url) = base.join(href) else {
            continue;
        };
        if !matches!(url.scheme(), "http" | "https") {
            continue;
        }
        url.set_fragment(None);
        if !links.contains(&url) {
            links.push(url);
        }
    }
    links
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r##"<!doctype html>
<html>
  <head><title>  Getting   Started </title><style>body { color: red; }</style></head>
  <body>
    <nav><a href="/nav-only">Nav</a></nav>
    <main>
      <h1>Install</h1>
      <p>Run the <strong>installer</strong> first.</p>
      <a href="guide/setup.html#step-2">Setup</a>
      <a href="https://other.example.org/page">External</a>
      <a href="mailto:team@example.com">Mail</a>
      <a href="#top">Top</a>
      <script>console.log("ignored")</script>
    </main>
  </body>
</html>"##;

    fn base() -> Url {
        Url::parse("https://docs.example.com/start/index.html").unwrap()
    }

    #[test]
    fn extracts_title() {
        let page = extract_page(PAGE, &base());
        assert_eq!(page.title.as_deref(), Some("Getting Started"));
    }

    #[test]
    fn markdown_comes_from_main_content() {
        let page = extract_page(PAGE, &base());
        assert!(page.markdown.contains("Install"));
        assert!(page.markdown.contains("**installer**"));
        assert!(!page.markdown.contains("console.log"));
        assert!(!page.markdown.contains("color: red"));
    }

    #[test]
    fn links_are_absolute_without_fragments() {
        let page = extract_page(PAGE, &base());
        let links: Vec<String> = page.links.iter().map(|u| u.to_string()).collect();
        assert!(links.contains(&"https://docs.example.com/start/guide/setup.html".to_string()));
        assert!(links.contains(&"https://other.example.org/page".to_string()));
        assert!(links.contains(&"https://docs.example.com/nav-only".to_string()));
        assert!(!links.iter().any(|l| l.starts_with("mailto:")));
        assert!(!links.iter().any(|l| l.contains('#')));
    }

    #[test]
    fn page_without_title_or_body_text() {
        let page = extract_page("<html><body></body></html>", &base());
        assert_eq!(page.title, None);
        assert!(page.links.is_empty());
    }
}
