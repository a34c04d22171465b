//! Map-reduce summarization of fetched pages.
//!
//! Each page is split into chunks that fit the model window. Every chunk is
//! mapped to an optional summary (the model answers [`NOT_RELEVANT`] for
//! chunks unrelated to the question), then the surviving summaries are
//! reduced to one. A reduce over a single summary is that summary.

use super::output::PageSummaries;
use super::prompts::{self, NOT_RELEVANT, RESEARCH_BASE_SYSTEM};
use crate::brain::Brain;
use crate::config::BudgetConfig;
use crate::error::{DelveError, LlmError, WebError};
use crate::text::{chunk_budget, split_into_chunks};
use crate::web::WebBrowser;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Fetches pages and summarizes them against a research question.
pub struct ContentSummarizer {
    brain: Arc<Brain>,
    browser: Arc<dyn WebBrowser>,
    budget: BudgetConfig,
    stream: bool,
}

impl ContentSummarizer {
    pub fn new(brain: Arc<Brain>, browser: Arc<dyn WebBrowser>, budget: &BudgetConfig) -> Self {
        Self {
            brain,
            browser,
            budget: budget.clone(),
            stream: false,
        }
    }

    pub fn with_streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Summarize `url` and `extra_urls` against `query`.
    ///
    /// Every requested URL appears in the result, in argument order. A URL
    /// maps to `None` when no chunk was relevant, when the browser returned no
    /// page for it, or when its text cannot be fitted into the window.
    /// Pages are matched to URLs by position, so a redirected page still
    /// summarizes under the URL that was requested. Browse and completion
    /// failures propagate, as does a reply with the wrong number of entries.
    pub async fn summarize(
        &self,
        url: &str,
        extra_urls: &[String],
        query: &str,
        system_text: Option<&str>,
    ) -> Result<PageSummaries, DelveError> {
        let mut urls = Vec::with_capacity(extra_urls.len() + 1);
        urls.push(url.to_string());
        urls.extend(extra_urls.iter().cloned());

        let pages = self.browser.fetch(&urls).await?;
        if pages.len() != urls.len() {
            return Err(WebError::FetchFailed {
                url: urls[0].clone(),
                message: format!(
                    "browser returned {} entries for {} urls",
                    pages.len(),
                    urls.len()
                ),
            }
            .into());
        }
        let system_text = system_text.unwrap_or(RESEARCH_BASE_SYSTEM);

        let mut summaries = PageSummaries::new();
        for (url, page) in urls.iter().zip(pages) {
            let summary = match page {
                Some(page) => self.summarize_text(url, &page.inner_text, query, system_text).await?,
                None => {
                    warn!(url = url.as_str(), "Browser returned no page");
                    None
                }
            };
            summaries.insert(url.as_str(), summary);
        }
        info!(
            query,
            urls = urls.len(),
            summarized = summaries.present().count(),
            "Pages summarized"
        );
        Ok(summaries)
    }

    /// Summarize one page's text. Budget failures yield `None`.
    pub async fn summarize_text(
        &self,
        url: &str,
        text: &str,
        query: &str,
        system_text: &str,
    ) -> Result<Option<String>, LlmError> {
        let counter = self.brain.token_counter();
        let overhead = format!(
            "{}{}",
            prompts::browse_and_summarize_prompt(query, ""),
            system_text
        );
        let chunks = match chunk_budget(
            counter,
            &overhead,
            self.brain.context_window(),
            self.budget.chunk_reserved_tokens,
            self.budget.chunk_margin_tokens,
        )
        .and_then(|max_tokens| split_into_chunks(text, counter, max_tokens))
        {
            Ok(chunks) => chunks,
            Err(e) => {
                warn!(url, error = %e, "Page does not fit the model budget, skipping");
                return Ok(None);
            }
        };
        debug!(url, chunks = chunks.len(), "Page chunked");

        let mut relevant = Vec::new();
        for chunk in &chunks {
            if let Some(summary) = self.map_chunk(query, chunk, system_text).await? {
                relevant.push(summary);
            }
        }
        self.reduce(url, query, relevant, system_text).await
    }

    async fn map_chunk(
        &self,
        query: &str,
        chunk: &str,
        system_text: &str,
    ) -> Result<Option<String>, LlmError> {
        let prompt = prompts::browse_and_summarize_prompt(query, chunk);
        let reply = self
            .brain
            .ask(&prompt, &[system_text.to_string()], self.stream)
            .await?;
        if reply.trim() == NOT_RELEVANT {
            return Ok(None);
        }
        Ok(Some(reply))
    }

    async fn reduce(
        &self,
        url: &str,
        query: &str,
        mut summaries: Vec<String>,
        system_text: &str,
    ) -> Result<Option<String>, LlmError> {
        match summaries.len() {
            0 => {
                debug!(url, "No relevant content");
                Ok(None)
            }
            1 => Ok(summaries.pop()),
            n => {
                debug!(url, partial_summaries = n, "Reducing chunk summaries");
                let prompt = prompts::browse_and_summarize_prompt(query, &summaries.join("\n"));
                let reply = self
                    .brain
                    .ask(&prompt, &[system_text.to_string()], self.stream)
                    .await?;
                Ok(Some(reply))
            }
        }
    }
}
