//! Link ranking for a single query.
//!
//! The model only ever sees an enumerated candidate list and answers with
//! indices into it, so a ranking can never invent or alter a link.

use super::prompts;
use crate::brain::Brain;
use crate::config::RankingConfig;
use crate::error::DelveError;
use crate::parse::{StructuredOutput, parse_index_list};
use crate::web::{SearchEngine, SearchResult};
use std::sync::Arc;
use tracing::{debug, warn};

/// Caller-supplied re-ranking applied after the model's ordering.
pub type RankFn = Arc<dyn Fn(Vec<SearchResult>) -> Vec<SearchResult> + Send + Sync>;

/// Ranks search results for a query by credibility, then relevance.
pub struct LinkRanker {
    brain: Arc<Brain>,
    search: Arc<dyn SearchEngine>,
    config: RankingConfig,
    rank_fn: Option<RankFn>,
    stream: bool,
}

impl LinkRanker {
    pub fn new(brain: Arc<Brain>, search: Arc<dyn SearchEngine>, config: &RankingConfig) -> Self {
        Self {
            brain,
            search,
            config: config.clone(),
            rank_fn: None,
            stream: false,
        }
    }

    /// Re-rank the model-ordered results before links are taken.
    pub fn with_rank_fn(mut self, rank_fn: RankFn) -> Self {
        self.rank_fn = Some(rank_fn);
        self
    }

    pub fn with_streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn config(&self) -> &RankingConfig {
        &self.config
    }

    /// Return at most `num_results` links for `query`, best first.
    ///
    /// Falls back to search order when the model's reply is not a list of
    /// indices. Search failures propagate.
    pub async fn rank(
        &self,
        topic: &str,
        query: &str,
        num_results: usize,
    ) -> Result<Vec<String>, DelveError> {
        let max_results = self.config.candidates_for(num_results);
        let candidates = self.search.search(query, max_results).await?;
        if candidates.is_empty() {
            debug!(query, "No search results to rank");
            return Ok(Vec::new());
        }

        let prompt = prompts::rank_urls_prompt(topic, query, &candidates);
        let reply = self.brain.ask(&prompt, &[], self.stream).await?;
        let count = candidates.len();
        let order = StructuredOutput::parse_or(&reply, parse_index_list, || (0..count).collect());
        if let Some(error) = order.error() {
            warn!(query, error = %error, "Failed to rank results, keeping search order");
        }

        let ranked = select(candidates, &order.into_value(), self.config.first_candidate_only);
        let ranked = match &self.rank_fn {
            Some(rank_fn) => rank_fn(ranked),
            None => ranked,
        };
        let links: Vec<String> = ranked
            .into_iter()
            .take(num_results)
            .map(|r| r.link)
            .collect();
        debug!(query, candidates = count, links = links.len(), "Links ranked");
        Ok(links)
    }
}

/// Map indices back onto `candidates`, dropping out-of-range and repeated
/// indices.
fn select(candidates: Vec<SearchResult>, order: &[usize], first_only: bool) -> Vec<SearchResult> {
    let mut slots: Vec<Option<SearchResult>> = candidates.into_iter().map(Some).collect();
    let mut selected = Vec::with_capacity(order.len());
    for &index in order {
        match slots.get_mut(index).and_then(Option::take) {
            Some(result) => selected.push(result),
            None => debug!(index, "Ignoring invalid or repeated ranking index"),
        }
    }
    if first_only {
        selected.truncate(1);
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brain::MockLlmProvider;
    use crate::web::StaticSearchEngine;

    fn candidates(n: usize) -> Vec<SearchResult> {
        (0..n)
            .map(|i| SearchResult::new(format!("r{i}"), format!("https://r{i}.example"), "s"))
            .collect()
    }

    fn ranker(reply: &str, search: StaticSearchEngine, config: RankingConfig) -> LinkRanker {
        let brain = Arc::new(Brain::new(Arc::new(MockLlmProvider::with_response(reply))));
        LinkRanker::new(brain, Arc::new(search), &config)
    }

    #[test]
    fn test_select_drops_invalid_indices() {
        let selected = select(candidates(3), &[2, 9, 2, 0], false);
        let links: Vec<_> = selected.iter().map(|r| r.link.as_str()).collect();
        assert_eq!(links, vec!["https://r2.example", "https://r0.example"]);
    }

    #[test]
    fn test_select_first_only() {
        assert_eq!(select(candidates(3), &[1, 2], true).len(), 1);
    }

    #[tokio::test]
    async fn test_rank_uses_model_order() {
        let search = StaticSearchEngine::new().with_default_results(candidates(8));
        let r = ranker("[3, 1, 0]", search, RankingConfig::default());
        let links = r.rank("topic", "query", 2).await.unwrap();
        assert_eq!(links, vec!["https://r3.example", "https://r1.example"]);
    }

    #[tokio::test]
    async fn test_rank_fetches_candidates() {
        let search = Arc::new(StaticSearchEngine::new().with_default_results(candidates(20)));
        let brain = Arc::new(Brain::new(Arc::new(MockLlmProvider::with_response("[0]"))));
        let r = LinkRanker::new(brain, search.clone(), &RankingConfig::default());
        r.rank("topic", "q1", 1).await.unwrap();
        r.rank("topic", "q2", 5).await.unwrap();
        assert_eq!(
            search.queries(),
            vec![("q1".to_string(), 6), ("q2".to_string(), 10)]
        );
    }

    #[tokio::test]
    async fn test_rank_invalid_reply_keeps_search_order() {
        let search = StaticSearchEngine::new().with_default_results(candidates(8));
        let r = ranker("the best one is the first", search, RankingConfig::default());
        let links = r.rank("topic", "query", 3).await.unwrap();
        assert_eq!(
            links,
            vec!["https://r0.example", "https://r1.example", "https://r2.example"]
        );
    }

    #[tokio::test]
    async fn test_rank_non_integer_reply_keeps_search_order() {
        let search = StaticSearchEngine::new().with_default_results(candidates(4));
        let r = ranker(r#"[1, "two", 3.5]"#, search, RankingConfig::default());
        let links = r.rank("topic", "query", 2).await.unwrap();
        assert_eq!(links, vec!["https://r0.example", "https://r1.example"]);
    }

    #[tokio::test]
    async fn test_rank_first_candidate_only() {
        let search = StaticSearchEngine::new().with_default_results(candidates(8));
        let config = RankingConfig {
            first_candidate_only: true,
            ..Default::default()
        };
        let r = ranker("[4, 2, 1]", search, config);
        let links = r.rank("topic", "query", 4).await.unwrap();
        assert_eq!(links, vec!["https://r4.example"]);
    }

    #[tokio::test]
    async fn test_rank_fn_applied_before_truncation() {
        let search = StaticSearchEngine::new().with_default_results(candidates(6));
        let r = ranker("[0, 1, 2]", search, RankingConfig::default()).with_rank_fn(Arc::new(
            |mut results: Vec<SearchResult>| {
                results.reverse();
                results
            },
        ));
        let links = r.rank("topic", "query", 2).await.unwrap();
        assert_eq!(links, vec!["https://r2.example", "https://r1.example"]);
    }

    #[tokio::test]
    async fn test_rank_no_candidates_skips_model() {
        let provider = Arc::new(MockLlmProvider::with_response("[0]"));
        let brain = Arc::new(Brain::new(provider.clone()));
        let search = Arc::new(StaticSearchEngine::new());
        let r = LinkRanker::new(brain, search, &RankingConfig::default());
        assert!(r.rank("topic", "query", 4).await.unwrap().is_empty());
        assert_eq!(provider.call_count(), 0);
    }
}
