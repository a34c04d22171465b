//! Final report writing.

use super::prompts::{self, RESEARCH_BASE_SYSTEM};
use crate::brain::Brain;
use crate::error::LlmError;
use std::sync::Arc;
use tracing::info;

/// Writes the long-form report from aggregated summaries.
///
/// `content` is expected to fit the model already; the request is sent once
/// with the output allowance raised to whatever the prompt leaves free.
pub struct ReportSynthesizer {
    brain: Arc<Brain>,
    stream: bool,
}

impl ReportSynthesizer {
    pub fn new(brain: Arc<Brain>) -> Self {
        Self {
            brain,
            stream: false,
        }
    }

    pub fn with_streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub async fn write_report(
        &self,
        topic: &str,
        content: &str,
        system_text: Option<&str>,
    ) -> Result<String, LlmError> {
        let prompt = prompts::conduct_research_prompt(topic, content);
        let system_text = system_text.unwrap_or(RESEARCH_BASE_SYSTEM).to_string();
        let report = self
            .brain
            .ask_uncapped(&prompt, &[system_text], self.stream)
            .await?;
        info!(topic, report_chars = report.len(), "Report written");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brain::MockLlmProvider;

    #[tokio::test]
    async fn test_report_request_is_uncapped() {
        let provider = Arc::new(MockLlmProvider::with_response("# Report"));
        let brain = Arc::new(Brain::new(provider.clone()));
        let synthesizer = ReportSynthesizer::new(brain.clone());

        let report = synthesizer
            .write_report("Oracle vs MySQL", "url: https://a\nsummary: s", None)
            .await
            .unwrap();
        assert_eq!(report, "# Report");

        let request = &provider.requests()[0];
        let used = brain.count_tokens(request.prompt()) + brain.count_tokens(RESEARCH_BASE_SYSTEM);
        assert_eq!(request.max_tokens, Some(brain.context_window() - used));
        assert!(request.prompt().contains("\"Oracle vs MySQL\""));
    }

    #[tokio::test]
    async fn test_report_streaming_matches_plain() {
        let provider = Arc::new(MockLlmProvider::with_response("Line one.\nLine  two."));
        let brain = Arc::new(Brain::new(provider));
        let plain = ReportSynthesizer::new(brain.clone())
            .write_report("t", "c", Some("sys"))
            .await
            .unwrap();
        let streamed = ReportSynthesizer::new(brain)
            .with_streaming(true)
            .write_report("t", "c", Some("sys"))
            .await
            .unwrap();
        assert_eq!(plain, streamed);
    }

    #[tokio::test]
    async fn test_oversized_content_overflows() {
        let provider = Arc::new(MockLlmProvider::with_response("x").with_context_window(50));
        let synthesizer = ReportSynthesizer::new(Arc::new(Brain::new(provider)));
        let err = synthesizer
            .write_report("t", &"word ".repeat(200), None)
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::ContextOverflow { .. }));
    }
}
