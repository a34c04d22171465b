//! Property-based tests for the budget and ranking algorithms using proptest.

use proptest::prelude::*;

use delve_core::brain::{Brain, MockLlmProvider, TokenCounter};
use delve_core::config::{RankingConfig, ResearchConfig};
use delve_core::error::BudgetError;
use delve_core::parse::parse_index_list;
use delve_core::research::{LinkRanker, QueryDecomposer};
use delve_core::text::{fit_segments, split_into_chunks, split_paragraph};
use delve_core::web::{SearchResult, StaticSearchEngine};
use std::sync::Arc;

fn render(segments: &[Vec<String>]) -> String {
    segments
        .iter()
        .map(|s| s.join(" "))
        .collect::<Vec<_>>()
        .join("\n")
}

// --- Segment fitting properties ---

proptest! {
    #[test]
    fn fit_terminates_within_element_count(
        segments in prop::collection::vec(prop::collection::vec("[a-z]{1,12}", 0..10), 0..6),
        overhead in 0usize..40,
        budget in 0usize..200,
    ) {
        let total: usize = segments.iter().map(Vec::len).sum();
        let mut working = segments.clone();
        let result = fit_segments(&mut working, render, |p| p.len() + overhead, budget);
        let remaining: usize = working.iter().map(Vec::len).sum();

        match result {
            Ok(fitted) => {
                prop_assert!(fitted.size <= budget);
                prop_assert!(fitted.removed <= total);
                prop_assert_eq!(fitted.removed, total - remaining);
                prop_assert_eq!(fitted.prompt, render(&working));
            }
            Err(BudgetError::Exhausted { .. }) => {
                prop_assert_eq!(remaining, 0);
            }
            Err(other) => prop_assert!(false, "unexpected error: {}", other),
        }
    }

    #[test]
    fn fit_only_drops_trailing_elements(
        segments in prop::collection::vec(prop::collection::vec("[a-z]{1,8}", 0..8), 1..5),
        budget in 0usize..120,
    ) {
        let mut working = segments.clone();
        let _ = fit_segments(&mut working, render, str::len, budget);
        for (before, after) in segments.iter().zip(&working) {
            prop_assert!(before.starts_with(after));
        }
    }

    #[test]
    fn fit_leaves_fitting_prompt_untouched(
        segments in prop::collection::vec(prop::collection::vec("[a-z]{1,8}", 0..5), 0..4),
    ) {
        let mut working = segments.clone();
        let fitted = fit_segments(&mut working, render, str::len, usize::MAX).unwrap();
        prop_assert_eq!(fitted.removed, 0);
        prop_assert_eq!(working, segments);
    }
}

// --- Chunking properties ---

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn chunks_keep_text_in_order(
        lines in prop::collection::vec("[a-zA-Z ,.]{0,200}", 1..12),
        max_tokens in 8usize..64,
    ) {
        let counter = TokenCounter::for_model("gpt-4o");
        let text = lines.join("\n");
        let chunks = split_into_chunks(&text, &counter, max_tokens).unwrap();
        prop_assert!(chunks.iter().all(|c| !c.is_empty()));
        prop_assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn split_paragraph_preserves_text(paragraph in "[a-z ,.]{1,120}", count in 1usize..4) {
        let parts = split_paragraph(&paragraph, count);
        prop_assert_eq!(parts.concat(), paragraph);
    }
}

// --- Decomposition properties ---

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn decompose_survives_arbitrary_replies(
        keyword_reply in ".*",
        query_reply in ".*",
        rank_reply in ".*",
    ) {
        let provider = MockLlmProvider::new()
            .respond_when("necessary keywords", keyword_reply)
            .respond_when("Provide up to", query_reply)
            .respond_when("ranked results' indices", rank_reply);
        let candidates: Vec<SearchResult> = (0..3)
            .map(|i| SearchResult::new(format!("r{i}"), format!("https://r{i}.example"), "s"))
            .collect();
        let brain = Arc::new(Brain::new(Arc::new(provider)));
        let search = Arc::new(StaticSearchEngine::new().with_default_results(candidates));
        let config = ResearchConfig::default();
        let ranker = LinkRanker::new(brain.clone(), search.clone(), &config.ranking);
        let decomposer = QueryDecomposer::new(brain, search, ranker, &config);

        let links = tokio_test::block_on(decomposer.decompose("topic", 4, 4, None));
        prop_assert!(links.is_ok(), "decompose failed: {:?}", links.as_ref().err());
        let links = links.unwrap();
        prop_assert!(!links.is_empty());
        prop_assert!(links.len() <= 4);
        prop_assert!(links.iter().all(|entry| entry.links.len() <= 4));
    }
}

// --- Ranking properties ---

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn ranking_respects_bounds(
        available in 0usize..20,
        num_results in 1usize..8,
        reply in prop::collection::vec(0usize..30, 0..12),
    ) {
        let candidates: Vec<SearchResult> = (0..available)
            .map(|i| SearchResult::new(format!("r{i}"), format!("https://r{i}.example"), "s"))
            .collect();
        let reply = serde_json::to_string(&reply).unwrap();
        let brain = Arc::new(Brain::new(Arc::new(MockLlmProvider::with_response(&reply))));
        let search = Arc::new(StaticSearchEngine::new().with_default_results(candidates));
        let ranker = LinkRanker::new(brain, search, &RankingConfig::default());

        let links = tokio_test::block_on(ranker.rank("topic", "query", num_results)).unwrap();
        let fetched = available.min(RankingConfig::default().candidates_for(num_results));
        prop_assert!(links.len() <= num_results);
        prop_assert!(links.len() <= fetched);
        let mut unique = links.clone();
        unique.sort();
        unique.dedup();
        prop_assert_eq!(unique.len(), links.len());
    }

    #[test]
    fn index_list_accepts_only_non_negative_integers(
        values in prop::collection::vec(-5i64..50, 0..10),
    ) {
        let reply = serde_json::to_string(&values).unwrap();
        let parsed = parse_index_list(&reply);
        if values.iter().all(|v| *v >= 0) {
            let expected: Vec<usize> = values.iter().map(|v| *v as usize).collect();
            prop_assert_eq!(parsed.unwrap(), expected);
        } else {
            prop_assert!(parsed.is_err());
        }
    }
}
