//! # Delve Core
//!
//! Research pipeline library: decomposes a topic into searchable queries,
//! ranks and summarizes the pages found for each, and writes a cited report.
//! Completion, search and browse services are supplied by the caller through
//! the [`LlmProvider`], [`SearchEngine`] and [`WebBrowser`] traits.

pub mod brain;
pub mod config;
pub mod error;
pub mod logging;
pub mod parse;
pub mod research;
pub mod text;
pub mod types;
pub mod web;

// Re-export commonly used types at the crate root.
pub use brain::{Brain, LlmProvider, MockLlmProvider, TokenCounter};
pub use config::{BudgetConfig, RankingConfig, ResearchConfig, load_config};
pub use error::{BudgetError, ConfigError, DelveError, LlmError, Result, WebError};
pub use parse::{StructuredOutput, StructuredOutputError};
pub use research::{
    ContentSummarizer, LinkRanker, PageSummaries, QueryDecomposer, QueryLinks,
    ReportSynthesizer, ResearchCallback, ResearchEngine, ResearchPhase, ResearchReport,
};
pub use types::{CompletionRequest, CompletionResponse, Message, Role, StreamEvent, TokenUsage};
pub use web::{SearchEngine, SearchResult, StaticBrowser, StaticSearchEngine, WebBrowser, WebPage};
