//! Ordered result collections and the final research report.
//!
//! Both collections keep keys unique and preserve the order in which keys
//! were first inserted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ranked links for one decomposed query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryEntry {
    pub query: String,
    pub links: Vec<String>,
}

/// Query → ranked links, in decomposition order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryLinks {
    entries: Vec<QueryEntry>,
}

impl QueryLinks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a query. Returns `false` and leaves the map untouched if the
    /// query is already present.
    pub fn insert(&mut self, query: impl Into<String>, links: Vec<String>) -> bool {
        let query = query.into();
        if self.contains(&query) {
            return false;
        }
        self.entries.push(QueryEntry { query, links });
        true
    }

    pub fn contains(&self, query: &str) -> bool {
        self.entries.iter().any(|e| e.query == query)
    }

    pub fn get(&self, query: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|e| e.query == query)
            .map(|e| e.links.as_slice())
    }

    pub fn queries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.query.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Summary of one page; `None` when no chunk was relevant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSummary {
    pub url: String,
    pub summary: Option<String>,
}

/// URL → summary, in the order URLs were requested.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSummaries {
    entries: Vec<PageSummary>,
}

impl PageSummaries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the summary for `url`. A replaced URL keeps its
    /// original position.
    pub fn insert(&mut self, url: impl Into<String>, summary: Option<String>) {
        let url = url.into();
        match self.entries.iter_mut().find(|e| e.url == url) {
            Some(entry) => entry.summary = summary,
            None => self.entries.push(PageSummary { url, summary }),
        }
    }

    pub fn contains(&self, url: &str) -> bool {
        self.entries.iter().any(|e| e.url == url)
    }

    /// `None` if `url` was never requested, `Some(None)` if it had no
    /// relevant content.
    pub fn get(&self, url: &str) -> Option<Option<&str>> {
        self.entries
            .iter()
            .find(|e| e.url == url)
            .map(|e| e.summary.as_deref())
    }

    /// URLs that produced a summary, with that summary, in order.
    pub fn present(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .filter_map(|e| e.summary.as_deref().map(|s| (e.url.as_str(), s)))
    }

    pub fn urls(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.url.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &PageSummary> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A finished research run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchReport {
    /// The research topic.
    pub topic: String,
    /// Decomposed queries and their ranked links.
    pub links: QueryLinks,
    /// Every `(url, summary)` pair with a summary, in query then URL order.
    pub summaries: Vec<(String, String)>,
    /// The report text.
    pub content: String,
    pub generated_at: DateTime<Utc>,
}

impl ResearchReport {
    /// Number of distinct source URLs that contributed a summary.
    pub fn sources_cited(&self) -> usize {
        let mut urls: Vec<&str> = self.summaries.iter().map(|(u, _)| u.as_str()).collect();
        urls.sort_unstable();
        urls.dedup();
        urls.len()
    }
}
