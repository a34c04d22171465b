//! Research pipeline — topic in, cited report out.
//!
//! Runs three stages over caller-supplied collaborators:
//! 1. **Decompose** — keywords, grounding searches, sub-queries, ranked links
//! 2. **Browse** — fetch every ranked link and map-reduce it into a summary
//! 3. **Synthesize** — write the report from the collected summaries
//!
//! Model output is treated as untrusted throughout: every structured reply
//! has a named fallback and never aborts a run.

pub mod decomposition;
pub mod engine;
pub mod output;
pub mod prompts;
pub mod ranking;
pub mod session;
pub mod summarize;
pub mod synthesis;

pub use decomposition::QueryDecomposer;
pub use engine::ResearchEngine;
pub use output::{PageSummaries, PageSummary, QueryEntry, QueryLinks, ResearchReport};
pub use ranking::{LinkRanker, RankFn};
pub use session::{NoOpResearchCallback, ResearchCallback, ResearchPhase};
pub use summarize::ContentSummarizer;
pub use synthesis::ReportSynthesizer;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_research_module_exports() {
        let _phase = ResearchPhase::Decomposing;
        assert!(QueryLinks::new().is_empty());
    }
}
