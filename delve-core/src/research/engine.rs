//! Research engine — runs the pipeline from topic to report.

use super::decomposition::QueryDecomposer;
use super::output::{PageSummaries, QueryLinks, ResearchReport};
use super::prompts;
use super::ranking::{LinkRanker, RankFn};
use super::session::{ResearchCallback, ResearchPhase};
use super::summarize::ContentSummarizer;
use super::synthesis::ReportSynthesizer;
use crate::brain::{Brain, LlmProvider};
use crate::config::ResearchConfig;
use crate::error::{ConfigError, DelveError};
use crate::web::{SearchEngine, WebBrowser};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

/// The main research engine: decompose, browse, synthesize.
pub struct ResearchEngine {
    config: ResearchConfig,
    brain: Arc<Brain>,
    decomposer: QueryDecomposer,
    summarizer: ContentSummarizer,
    synthesizer: ReportSynthesizer,
    callback: Option<Arc<dyn ResearchCallback>>,
}

impl ResearchEngine {
    /// Create an engine over the given collaborators.
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        search: Arc<dyn SearchEngine>,
        browser: Arc<dyn WebBrowser>,
        config: ResearchConfig,
    ) -> Self {
        let brain = Arc::new(Brain::with_default_context_window(
            provider,
            config.budget.default_context_window,
        ));
        let ranker = LinkRanker::new(brain.clone(), search.clone(), &config.ranking)
            .with_streaming(config.stream);
        let decomposer = QueryDecomposer::new(brain.clone(), search, ranker, &config);
        let summarizer = ContentSummarizer::new(brain.clone(), browser, &config.budget)
            .with_streaming(config.stream);
        let synthesizer = ReportSynthesizer::new(brain.clone()).with_streaming(config.stream);
        Self {
            config,
            brain,
            decomposer,
            summarizer,
            synthesizer,
            callback: None,
        }
    }

    pub fn with_callback(mut self, callback: Arc<dyn ResearchCallback>) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Re-rank every query's search results with `rank_fn` after the model.
    pub fn with_rank_fn(mut self, rank_fn: RankFn) -> Self {
        self.decomposer = self.decomposer.with_rank_fn(rank_fn);
        self
    }

    pub fn config(&self) -> &ResearchConfig {
        &self.config
    }

    /// The brain shared by every stage; exposes accumulated token usage.
    pub fn brain(&self) -> &Brain {
        &self.brain
    }

    /// Research `topic` with the configured query and URL limits.
    pub async fn research(&self, topic: &str) -> Result<ResearchReport, DelveError> {
        self.research_with(
            topic,
            self.config.decomposition_nums,
            self.config.url_per_query,
        )
        .await
    }

    /// Research `topic` with explicit limits.
    ///
    /// Fails with a configuration error before any request is made when a
    /// limit is zero or the model window cannot hold the budget reservations.
    pub async fn research_with(
        &self,
        topic: &str,
        decomposition_nums: usize,
        url_per_query: usize,
    ) -> Result<ResearchReport, DelveError> {
        self.config.validate()?;
        self.config.budget.validate_window(self.brain.context_window())?;
        for (name, value) in [
            ("decomposition_nums", decomposition_nums),
            ("url_per_query", url_per_query),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    message: format!("{name} must be at least 1"),
                }
                .into());
            }
        }

        info!(topic, decomposition_nums, url_per_query, "Starting research");
        let system_text = prompts::research_system_text(topic, self.config.language.as_deref());

        self.notify(ResearchPhase::Decomposing);
        let links = self
            .decomposer
            .decompose(topic, decomposition_nums, url_per_query, Some(&system_text))
            .await?;

        self.notify(ResearchPhase::Browsing);
        let per_query = self.summarize_queries(&links, &system_text).await?;
        let summaries: Vec<(String, String)> = per_query
            .iter()
            .flat_map(|s| s.present().map(|(url, summary)| (url.to_string(), summary.to_string())))
            .collect();
        let content = summaries
            .iter()
            .map(|(url, summary)| format!("url: {url}\nsummary: {summary}"))
            .collect::<Vec<_>>()
            .join("\n---\n");

        self.notify(ResearchPhase::Synthesizing);
        let report = self
            .synthesizer
            .write_report(topic, &content, Some(&system_text))
            .await?;

        self.notify(ResearchPhase::Complete);
        let usage = self.brain.total_usage();
        info!(
            topic,
            queries = links.len(),
            sources = summaries.len(),
            total_tokens = usage.total(),
            "Research complete"
        );
        Ok(ResearchReport {
            topic: topic.to_string(),
            links,
            summaries,
            content: report,
            generated_at: Utc::now(),
        })
    }

    /// Summarize the links of every query that has any, in query order.
    async fn summarize_queries(
        &self,
        links: &QueryLinks,
        system_text: &str,
    ) -> Result<Vec<PageSummaries>, DelveError> {
        let jobs = links.iter().filter_map(|entry| {
            let (first, rest) = entry.links.split_first()?;
            Some(async move {
                let summaries = self
                    .summarizer
                    .summarize(first, rest, &entry.query, Some(system_text))
                    .await?;
                if let Some(cb) = &self.callback {
                    cb.on_query_complete(&entry.query, summaries.present().count());
                }
                Ok::<_, DelveError>(summaries)
            })
        });

        if self.config.enable_concurrency {
            futures::future::try_join_all(jobs).await
        } else {
            let mut results = Vec::new();
            for job in jobs {
                results.push(job.await?);
            }
            Ok(results)
        }
    }

    fn notify(&self, phase: ResearchPhase) {
        info!(phase = %phase, "Research phase");
        if let Some(cb) = &self.callback {
            cb.on_phase_change(phase, phase.progress());
        }
    }
}
