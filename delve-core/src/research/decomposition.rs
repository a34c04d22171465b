//! Topic decomposition into ranked, searchable sub-queries.
//!
//! 1. Ask the model for grounding keywords (fallback: the topic itself).
//! 2. Search every keyword concurrently.
//! 3. Fit the keyword → results grounding into the token budget.
//! 4. Ask the model for sub-queries (fallback: the keywords).
//! 5. Rank links for every sub-query.

use super::output::QueryLinks;
use super::prompts;
use super::ranking::{LinkRanker, RankFn};
use crate::brain::Brain;
use crate::config::ResearchConfig;
use crate::error::{BudgetError, DelveError, LlmError, WebError};
use crate::parse::{StructuredOutput, StructuredOutputError, parse_string_list};
use crate::text::{Fitted, fit_segments};
use crate::web::{SearchEngine, SearchResult};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Decomposes a research topic into sub-queries, each with ranked links.
pub struct QueryDecomposer {
    brain: Arc<Brain>,
    search: Arc<dyn SearchEngine>,
    ranker: LinkRanker,
    keyword_count: usize,
    keyword_search_results: usize,
    grounding_reserved_tokens: usize,
    stream: bool,
}

impl QueryDecomposer {
    pub fn new(
        brain: Arc<Brain>,
        search: Arc<dyn SearchEngine>,
        ranker: LinkRanker,
        config: &ResearchConfig,
    ) -> Self {
        Self {
            brain,
            search,
            ranker,
            keyword_count: config.keyword_count,
            keyword_search_results: config.keyword_search_results,
            grounding_reserved_tokens: config.budget.grounding_reserved_tokens,
            stream: config.stream,
        }
    }

    pub fn ranker(&self) -> &LinkRanker {
        &self.ranker
    }

    /// Install a re-ranking hook on the link ranker.
    pub fn with_rank_fn(mut self, rank_fn: RankFn) -> Self {
        self.ranker = self.ranker.with_rank_fn(rank_fn);
        self
    }

    /// Decompose `topic` into at most `decomposition_nums` queries, each
    /// mapped to at most `url_per_query` ranked links.
    ///
    /// Malformed model output never fails this call; completion-service and
    /// search failures do.
    pub async fn decompose(
        &self,
        topic: &str,
        decomposition_nums: usize,
        url_per_query: usize,
        system_text: Option<&str>,
    ) -> Result<QueryLinks, DelveError> {
        let system_text = system_text
            .map(str::to_string)
            .unwrap_or_else(|| prompts::research_topic_system(topic));

        let keywords = self.extract_keywords(topic, &system_text).await?;
        info!(topic, keywords = ?keywords, "Grounding keywords selected");

        let mut results = self.search_keywords(&keywords).await?;
        let grounding =
            self.fit_grounding(&keywords, &mut results, decomposition_nums, &system_text);
        let queries = match grounding {
            Ok(fitted) => {
                debug!(
                    tokens = fitted.size,
                    dropped_results = fitted.removed,
                    "Grounding prompt fitted"
                );
                self.generate_queries(&fitted.prompt, &keywords, decomposition_nums, &system_text)
                    .await?
            }
            Err(e) => {
                warn!(
                    topic,
                    error = %e,
                    "Grounding does not fit the model budget, using keywords as queries"
                );
                keywords.clone()
            }
        };
        info!(topic, queries = queries.len(), "Topic decomposed");

        let mut links = QueryLinks::new();
        for query in queries {
            if links.contains(&query) {
                debug!(query = query.as_str(), "Skipping duplicate query");
                continue;
            }
            let ranked = self.ranker.rank(topic, &query, url_per_query).await?;
            links.insert(query, ranked);
        }
        Ok(links)
    }

    /// Ask the model for grounding keywords; falls back to `[topic]`.
    pub async fn extract_keywords(
        &self,
        topic: &str,
        system_text: &str,
    ) -> Result<Vec<String>, LlmError> {
        let reply = self
            .brain
            .ask(
                &prompts::search_topic_prompt(self.keyword_count),
                &[system_text.to_string()],
                self.stream,
            )
            .await?;
        let limit = self.keyword_count;
        let keywords = StructuredOutput::parse_or(
            &reply,
            |r| non_empty(parse_string_list(r)?, limit),
            || vec![topic.to_string()],
        );
        if let Some(error) = keywords.error() {
            warn!(topic, error = %error, "Failed to extract keywords, falling back to the topic");
        }
        Ok(keywords.into_value())
    }

    /// Search every keyword concurrently. `result[i]` belongs to `keywords[i]`.
    pub async fn search_keywords(
        &self,
        keywords: &[String],
    ) -> Result<Vec<Vec<SearchResult>>, WebError> {
        let max_results = self.keyword_search_results;
        let searches = keywords.iter().enumerate().map(|(i, keyword)| async move {
            self.search
                .search(keyword, max_results)
                .await
                .map(|results| (i, results))
        });
        let tagged = futures::future::try_join_all(searches).await?;

        let mut slots = vec![Vec::new(); keywords.len()];
        for (i, results) in tagged {
            slots[i] = results;
        }
        Ok(slots)
    }

    /// Build the query-generation prompt, trimming search results until the
    /// prompt plus system text fits the grounding budget.
    pub fn fit_grounding(
        &self,
        keywords: &[String],
        results: &mut [Vec<SearchResult>],
        decomposition_nums: usize,
        system_text: &str,
    ) -> Result<Fitted, BudgetError> {
        let counter = self.brain.token_counter();
        let system_tokens = counter.count(system_text);
        let budget = self
            .brain
            .context_window()
            .saturating_sub(self.grounding_reserved_tokens);
        fit_segments(
            results,
            |segments| {
                prompts::summarize_search_prompt(
                    decomposition_nums,
                    &prompts::grounding_block(keywords, segments),
                )
            },
            |prompt| counter.count(prompt) + system_tokens,
            budget,
        )
    }

    /// Ask the model for sub-queries; falls back to the keywords.
    pub async fn generate_queries(
        &self,
        prompt: &str,
        keywords: &[String],
        decomposition_nums: usize,
        system_text: &str,
    ) -> Result<Vec<String>, LlmError> {
        let reply = self
            .brain
            .ask(prompt, &[system_text.to_string()], self.stream)
            .await?;
        let queries = StructuredOutput::parse_or(
            &reply,
            |r| non_empty(parse_string_list(r)?, decomposition_nums),
            || keywords.to_vec(),
        );
        if let Some(error) = queries.error() {
            warn!(error = %error, "Failed to break down the research question, using keywords");
        }
        Ok(queries.into_value())
    }
}

/// Drop blank entries, cap at `limit`, and reject an empty result.
fn non_empty(items: Vec<String>, limit: usize) -> Result<Vec<String>, StructuredOutputError> {
    let items: Vec<String> = items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .take(limit)
        .collect();
    if items.is_empty() {
        return Err(StructuredOutputError::Validation("empty list".to_string()));
    }
    Ok(items)
}
