//! Error types for the Delve research core.
//!
//! Uses `thiserror` for public API error types with structured error variants
//! covering the completion service, search/browse collaborators, token
//! budgets, and configuration.
//!
//! Structured-output failures live in [`crate::parse`] and are intentionally
//! not part of [`DelveError`]: every call site recovers from them with a
//! fallback value.

use std::path::PathBuf;

/// Top-level error type for the Delve core library.
#[derive(Debug, thiserror::Error)]
pub enum DelveError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Web error: {0}")]
    Web(#[from] WebError),

    #[error("Budget error: {0}")]
    Budget(#[from] BudgetError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from completion-service interactions.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("API request failed: {message}")]
    ApiRequest { message: String },

    #[error("API response parse error: {message}")]
    ResponseParse { message: String },

    #[error("Streaming error: {message}")]
    Streaming { message: String },

    #[error("Context window exceeded: used {used} of {limit} tokens")]
    ContextOverflow { used: usize, limit: usize },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Provider connection failed: {message}")]
    Connection { message: String },
}

/// Errors from the search and browse collaborators.
#[derive(Debug, thiserror::Error)]
pub enum WebError {
    #[error("Search failed for '{query}': {message}")]
    SearchFailed { query: String, message: String },

    #[error("Fetch failed for {url}: {message}")]
    FetchFailed { url: String, message: String },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("No URLs given to browse")]
    NoUrls,
}

/// Raised when text cannot be fitted under a model's token budget.
#[derive(Debug, thiserror::Error)]
pub enum BudgetError {
    #[error("Prompt needs {needed} tokens but the budget is {budget}, nothing left to trim")]
    Exhausted { needed: usize, budget: usize },

    #[error("Prompt overhead of {overhead} tokens leaves no room for content (window {window})")]
    ChunkOverhead { overhead: usize, window: usize },

    #[error("Text cannot be split below {tokens} tokens (chunk budget {budget})")]
    Unsplittable { tokens: usize, budget: usize },
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

/// A type alias for results using the top-level `DelveError`.
pub type Result<T> = std::result::Result<T, DelveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_llm() {
        let err = DelveError::Llm(LlmError::ApiRequest {
            message: "connection refused".into(),
        });
        assert_eq!(
            err.to_string(),
            "LLM error: API request failed: connection refused"
        );
    }

    #[test]
    fn test_error_display_web() {
        let err = DelveError::Web(WebError::Status {
            url: "https://example.com".into(),
            status: 503,
        });
        assert_eq!(err.to_string(), "Web error: HTTP 503 from https://example.com");
    }

    #[test]
    fn test_error_display_budget() {
        let err = DelveError::Budget(BudgetError::Exhausted {
            needed: 5000,
            budget: 4096,
        });
        assert_eq!(
            err.to_string(),
            "Budget error: Prompt needs 5000 tokens but the budget is 4096, nothing left to trim"
        );
    }

    #[test]
    fn test_error_display_config() {
        let err = DelveError::Config(ConfigError::Invalid {
            message: "url_per_query must be at least 1".into(),
        });
        assert_eq!(
            err.to_string(),
            "Configuration error: Invalid configuration: url_per_query must be at least 1"
        );
    }

    #[test]
    fn test_error_from_serde() {
        let serde_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: DelveError = serde_err.into();
        assert!(matches!(err, DelveError::Serialization(_)));
    }

    #[test]
    fn test_llm_error_variants() {
        let err = LlmError::ContextOverflow {
            used: 150_000,
            limit: 128_000,
        };
        assert_eq!(
            err.to_string(),
            "Context window exceeded: used 150000 of 128000 tokens"
        );

        let err = LlmError::Timeout { timeout_secs: 60 };
        assert_eq!(err.to_string(), "Request timed out after 60s");
    }
}
