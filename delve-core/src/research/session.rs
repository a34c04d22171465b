//! Research run phases and progress callbacks.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Current phase of a research run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResearchPhase {
    /// Extracting keywords, generating queries, ranking links.
    Decomposing,
    /// Fetching and summarizing pages.
    Browsing,
    /// Writing the report.
    Synthesizing,
    /// Report produced.
    Complete,
}

impl ResearchPhase {
    /// Overall progress at the start of this phase (0.0-1.0).
    pub fn progress(&self) -> f32 {
        match self {
            ResearchPhase::Decomposing => 0.1,
            ResearchPhase::Browsing => 0.4,
            ResearchPhase::Synthesizing => 0.8,
            ResearchPhase::Complete => 1.0,
        }
    }
}

impl std::fmt::Display for ResearchPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResearchPhase::Decomposing => write!(f, "decomposing"),
            ResearchPhase::Browsing => write!(f, "browsing"),
            ResearchPhase::Synthesizing => write!(f, "synthesizing"),
            ResearchPhase::Complete => write!(f, "complete"),
        }
    }
}

/// Callback trait for progressive research UI updates.
pub trait ResearchCallback: Send + Sync {
    /// Called when the research phase changes.
    fn on_phase_change(&self, phase: ResearchPhase, progress: f32);
    /// Called when every URL of a query has been summarized.
    fn on_query_complete(&self, query: &str, summaries_found: usize);
}

/// No-op callback.
pub struct NoOpResearchCallback;

impl ResearchCallback for NoOpResearchCallback {
    fn on_phase_change(&self, _phase: ResearchPhase, _progress: f32) {}
    fn on_query_complete(&self, _query: &str, _summaries_found: usize) {}
}

/// Callback that records every event, for tests and diagnostics.
#[derive(Default)]
pub struct RecordingResearchCallback {
    phases: Mutex<Vec<ResearchPhase>>,
    queries: Mutex<Vec<(String, usize)>>,
}

impl RecordingResearchCallback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phases(&self) -> Vec<ResearchPhase> {
        self.phases.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn completed_queries(&self) -> Vec<(String, usize)> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }
}

impl ResearchCallback for RecordingResearchCallback {
    fn on_phase_change(&self, phase: ResearchPhase, _progress: f32) {
        if let Ok(mut phases) = self.phases.lock() {
            phases.push(phase);
        }
    }

    fn on_query_complete(&self, query: &str, summaries_found: usize) {
        if let Ok(mut queries) = self.queries.lock() {
            queries.push((query.to_string(), summaries_found));
        }
    }
}
