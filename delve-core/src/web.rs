//! Search and browse collaborators.
//!
//! The research core never performs HTTP itself. It talks to a
//! [`SearchEngine`] (query → ordered results) and a [`WebBrowser`]
//! (URLs → page text) supplied by the caller. In-memory implementations are
//! provided for tests and offline runs.

use crate::error::WebError;
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{LazyLock, Mutex};

static INLINE_WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t\u{a0}]+").expect("inline whitespace pattern"));

/// A single organic search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub link: String,
    pub snippet: String,
}

impl SearchResult {
    pub fn new(
        title: impl Into<String>,
        link: impl Into<String>,
        snippet: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            snippet: snippet.into(),
        }
    }
}

/// A search backend.
#[async_trait]
pub trait SearchEngine: Send + Sync {
    /// Search for `query`, returning at most `max_results` results, best first.
    async fn search(&self, query: &str, max_results: usize)
    -> Result<Vec<SearchResult>, WebError>;
}

/// A fetched page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebPage {
    pub url: String,
    /// Raw markup as fetched, empty when the page was built from plain text.
    pub html: String,
    /// Readable text of the page.
    pub inner_text: String,
}

impl WebPage {
    /// Build a page from HTML, extracting its readable text.
    pub fn from_html(url: impl Into<String>, html: impl Into<String>) -> Self {
        let html = html.into();
        let inner_text = extract_text_from_html(&html);
        Self {
            url: url.into(),
            html,
            inner_text,
        }
    }

    /// Build a page whose content is already plain text.
    pub fn from_text(url: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: String::new(),
            inner_text: text.into(),
        }
    }
}

/// A browse backend.
#[async_trait]
pub trait WebBrowser: Send + Sync {
    /// Fetch every URL in one call.
    ///
    /// Returns exactly one entry per URL, in the order of `urls`; `None`
    /// marks a page the backend could not produce. Entries are matched to
    /// URLs by position, so a page may carry a different (e.g. redirected)
    /// URL than the one requested.
    async fn fetch(&self, urls: &[String]) -> Result<Vec<Option<WebPage>>, WebError>;
}

/// Simple HTML-to-text extraction.
///
/// Strips tags, drops script and style bodies, decodes common entities and
/// collapses blank lines. Block-level tags become line breaks so paragraph
/// structure survives for chunking. A `<` not followed by a letter, `/` or
/// `!` is plain text.
pub fn extract_text_from_html(html: &str) -> String {
    let mut text = String::new();
    let mut in_tag = false;
    let mut in_script = false;
    let mut in_style = false;
    let mut tag_name = String::new();
    let mut building_tag = false;

    let mut chars = html.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '<'
            && !in_tag
            && chars
                .peek()
                .is_some_and(|next| next.is_ascii_alphabetic() || matches!(next, '/' | '!'))
        {
            in_tag = true;
            building_tag = true;
            tag_name.clear();
            continue;
        }
        if ch == '>' && in_tag {
            in_tag = false;
            building_tag = false;

            let tag_lower = tag_name.to_lowercase();
            match tag_lower.as_str() {
                "script" => in_script = true,
                "/script" => in_script = false,
                "style" => in_style = true,
                "/style" => in_style = false,
                _ => {}
            }

            if is_block_tag(tag_lower.trim_start_matches('/')) {
                text.push('\n');
            }
            continue;
        }
        if in_tag {
            if building_tag && (ch.is_alphanumeric() || ch == '/') {
                tag_name.push(ch);
            } else {
                building_tag = false;
            }
            continue;
        }
        if in_script || in_style {
            continue;
        }
        text.push(ch);
    }

    let text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");

    text.lines()
        .map(|l| INLINE_WHITESPACE.replace_all(l.trim(), " "))
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_block_tag(tag: &str) -> bool {
    matches!(
        tag,
        "p" | "br"
            | "div"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "li"
            | "tr"
            | "section"
            | "article"
            | "blockquote"
            | "pre"
    )
}

/// In-memory search engine keyed by exact query text.
///
/// Unknown queries fall back to the default result list, if one is set;
/// otherwise they yield an empty list. Every query is recorded.
#[derive(Default)]
pub struct StaticSearchEngine {
    results: HashMap<String, Vec<SearchResult>>,
    default_results: Vec<SearchResult>,
    failing: Vec<String>,
    queries: Mutex<Vec<(String, usize)>>,
}

impl StaticSearchEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_results(mut self, query: impl Into<String>, results: Vec<SearchResult>) -> Self {
        self.results.insert(query.into(), results);
        self
    }

    pub fn with_default_results(mut self, results: Vec<SearchResult>) -> Self {
        self.default_results = results;
        self
    }

    /// Make searches for `query` fail.
    pub fn failing_on(mut self, query: impl Into<String>) -> Self {
        self.failing.push(query.into());
        self
    }

    /// `(query, max_results)` pairs received so far.
    pub fn queries(&self) -> Vec<(String, usize)> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl SearchEngine for StaticSearchEngine {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchResult>, WebError> {
        if let Ok(mut queries) = self.queries.lock() {
            queries.push((query.to_string(), max_results));
        }
        if self.failing.iter().any(|q| q == query) {
            return Err(WebError::SearchFailed {
                query: query.to_string(),
                message: "search backend unavailable".to_string(),
            });
        }
        let results = self.results.get(query).unwrap_or(&self.default_results);
        Ok(results.iter().take(max_results).cloned().collect())
    }
}

/// In-memory browser serving fixed pages.
#[derive(Default)]
pub struct StaticBrowser {
    pages: HashMap<String, WebPage>,
    fetches: Mutex<Vec<Vec<String>>>,
}

impl StaticBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `text` as the readable text of `url`.
    pub fn with_text(mut self, url: impl Into<String>, text: impl Into<String>) -> Self {
        let url = url.into();
        self.pages
            .insert(url.clone(), WebPage::from_text(url, text));
        self
    }

    /// Serve `html` at `url`, extracting its text.
    pub fn with_html(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
        let url = url.into();
        self.pages.insert(url.clone(), WebPage::from_html(url, html));
        self
    }

    /// URL batches requested so far.
    pub fn fetches(&self) -> Vec<Vec<String>> {
        self.fetches.lock().map(|f| f.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl WebBrowser for StaticBrowser {
    async fn fetch(&self, urls: &[String]) -> Result<Vec<Option<WebPage>>, WebError> {
        if urls.is_empty() {
            return Err(WebError::NoUrls);
        }
        if let Ok(mut fetches) = self.fetches.lock() {
            fetches.push(urls.to_vec());
        }
        urls.iter()
            .map(|url| {
                self.pages
                    .get(url)
                    .cloned()
                    .map(Some)
                    .ok_or_else(|| WebError::Status {
                        url: url.clone(),
                        status: 404,
                    })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_text_from_html_strips_tags() {
        let html = "<html><head><title>T</title><style>p{color:red}</style></head>\
                    <body><h1>Oracle</h1><p>MySQL &amp; Oracle</p>\
                    <script>var x = 1;</script><p>Second</p></body></html>";
        let text = extract_text_from_html(html);
        assert!(text.contains("Oracle"));
        assert!(text.contains("MySQL & Oracle"));
        assert!(text.contains("Second"));
        assert!(!text.contains("color:red"));
        assert!(!text.contains("var x"));
    }

    #[test]
    fn test_extract_text_keeps_paragraph_lines() {
        let text = extract_text_from_html("<p>one</p><p>two</p>");
        assert_eq!(text, "one\ntwo");
    }

    #[test]
    fn test_entity_decoding_is_not_double_applied() {
        let text = extract_text_from_html("<p>&amp;lt;</p>");
        assert_eq!(text, "&lt;");
    }

    #[test]
    fn test_inline_whitespace_collapsed() {
        let text = extract_text_from_html("<p>Oracle \t  and&nbsp;&nbsp;MySQL</p>");
        assert_eq!(text, "Oracle and MySQL");
    }

    #[test]
    fn test_bare_less_than_is_text() {
        let text = extract_text_from_html("<p>a < b and 3<4</p><p>c > d</p>");
        assert_eq!(text, "a < b and 3<4\nc > d");
    }

    #[test]
    fn test_comments_and_closing_tags_still_stripped() {
        let text = extract_text_from_html("<!-- note --><div>x</div>");
        assert_eq!(text, "x");
    }

    #[tokio::test]
    async fn test_static_search_engine_limits_results() {
        let engine = StaticSearchEngine::new().with_results(
            "oracle",
            vec![
                SearchResult::new("a", "https://a", "sa"),
                SearchResult::new("b", "https://b", "sb"),
                SearchResult::new("c", "https://c", "sc"),
            ],
        );
        let results = engine.search("oracle", 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].link, "https://b");
        assert_eq!(engine.queries(), vec![("oracle".to_string(), 2)]);
    }

    #[tokio::test]
    async fn test_static_search_engine_failure() {
        let engine = StaticSearchEngine::new().failing_on("down");
        let err = engine.search("down", 5).await.unwrap_err();
        assert!(matches!(err, WebError::SearchFailed { .. }));
    }

    #[tokio::test]
    async fn test_static_browser_fetches_in_order() {
        let browser = StaticBrowser::new()
            .with_text("https://a", "alpha")
            .with_html("https://b", "<p>beta</p>");
        let pages = browser
            .fetch(&["https://b".to_string(), "https://a".to_string()])
            .await
            .unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].as_ref().unwrap().inner_text, "beta");
        assert_eq!(pages[1].as_ref().unwrap().inner_text, "alpha");
    }

    #[tokio::test]
    async fn test_static_browser_unknown_url_is_error() {
        let browser = StaticBrowser::new();
        let err = browser
            .fetch(&["https://missing".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, WebError::Status { status: 404, .. }));
    }
}
