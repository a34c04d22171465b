//! Configuration system for Delve.
//!
//! Uses `figment` for layered configuration: defaults -> user config file ->
//! workspace config file -> environment -> explicit overrides.
//! Configuration is loaded from `~/.config/delve/config.toml` and/or
//! `.delve/config.toml` in the workspace directory.

use crate::error::ConfigError;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration for a research run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchConfig {
    /// Maximum number of sub-queries the topic is decomposed into.
    pub decomposition_nums: usize,
    /// Maximum number of ranked URLs kept per query.
    pub url_per_query: usize,
    /// Maximum number of grounding keywords requested from the model.
    pub keyword_count: usize,
    /// Search results fetched per grounding keyword.
    pub keyword_search_results: usize,
    /// Reply language appended to the research system text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Summarize the URL sets of different queries concurrently.
    pub enable_concurrency: bool,
    /// Request streamed completions from the provider.
    pub stream: bool,
    pub budget: BudgetConfig,
    pub ranking: RankingConfig,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            decomposition_nums: 4,
            url_per_query: 4,
            keyword_count: 2,
            keyword_search_results: 8,
            language: None,
            enable_concurrency: false,
            stream: false,
            budget: BudgetConfig::default(),
            ranking: RankingConfig::default(),
        }
    }
}

impl ResearchConfig {
    /// Reject settings that would make a run meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("decomposition_nums", self.decomposition_nums),
            ("url_per_query", self.url_per_query),
            ("keyword_count", self.keyword_count),
            ("keyword_search_results", self.keyword_search_results),
            ("ranking.min_candidates", self.ranking.min_candidates),
            ("ranking.candidate_multiplier", self.ranking.candidate_multiplier),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    message: format!("{name} must be at least 1"),
                });
            }
        }
        self.budget.validate_window(self.budget.default_context_window)
    }
}

/// Token budget constants used when fitting prompts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    /// Tokens kept free for the reply when fitting the grounding prompt.
    pub grounding_reserved_tokens: usize,
    /// Tokens kept free for the reply when sizing page chunks.
    pub chunk_reserved_tokens: usize,
    /// Extra slack subtracted from every chunk.
    pub chunk_margin_tokens: usize,
    /// Context window assumed when the provider reports none.
    pub default_context_window: usize,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            grounding_reserved_tokens: 4096,
            chunk_reserved_tokens: 4096,
            chunk_margin_tokens: 100,
            default_context_window: 8192,
        }
    }
}

impl BudgetConfig {
    /// Check that a model with `window` tokens leaves room for both the
    /// grounding prompt and page chunks after the reservations.
    pub fn validate_window(&self, window: usize) -> Result<(), ConfigError> {
        let chunk_floor = self
            .chunk_reserved_tokens
            .saturating_add(self.chunk_margin_tokens);
        if window <= chunk_floor {
            return Err(ConfigError::Invalid {
                message: format!(
                    "context window of {window} tokens leaves no room for page chunks \
                     ({chunk_floor} reserved)"
                ),
            });
        }
        if window <= self.grounding_reserved_tokens {
            return Err(ConfigError::Invalid {
                message: format!(
                    "context window of {window} tokens leaves no room for the grounding prompt \
                     ({} reserved)",
                    self.grounding_reserved_tokens
                ),
            });
        }
        Ok(())
    }
}

/// Link ranking settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    /// Lower bound on candidates fetched per query.
    pub min_candidates: usize,
    /// Candidates fetched per requested URL.
    pub candidate_multiplier: usize,
    /// Keep only the top candidate of the model's ordering, whatever
    /// `url_per_query` says.
    pub first_candidate_only: bool,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            min_candidates: 6,
            candidate_multiplier: 2,
            first_candidate_only: false,
        }
    }
}

impl RankingConfig {
    /// Number of search results to fetch when `num_results` links are wanted.
    pub fn candidates_for(&self, num_results: usize) -> usize {
        num_results
            .saturating_mul(self.candidate_multiplier)
            .max(self.min_candidates)
    }
}

fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "delve", "delve")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

fn workspace_config_path(workspace: &Path) -> PathBuf {
    workspace.join(".delve").join("config.toml")
}

/// Load configuration by merging all sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `DELVE_`)
/// 3. Workspace-local config (`.delve/config.toml`)
/// 4. User config (`~/.config/delve/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&ResearchConfig>,
) -> Result<ResearchConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(ResearchConfig::default()));

    if let Some(user_config) = user_config_path() {
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = workspace_config_path(ws);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // DELVE_URL_PER_QUERY, DELVE_BUDGET__CHUNK_RESERVED_TOKENS, etc.
    figment = figment.merge(Env::prefixed("DELVE_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    let config: ResearchConfig = figment.extract().map_err(|e| ConfigError::ParseError {
        message: e.to_string(),
    })?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from one explicit TOML file over the defaults.
pub fn load_config_file(path: &Path) -> Result<ResearchConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let config: ResearchConfig = Figment::from(Serialized::defaults(ResearchConfig::default()))
        .merge(Toml::file(path))
        .extract()
        .map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })?;
    config.validate()?;
    Ok(config)
}

/// Check whether any Delve configuration file exists (user-level or workspace-level).
pub fn config_exists(workspace: Option<&Path>) -> bool {
    if user_config_path().is_some_and(|p| p.exists()) {
        return true;
    }
    workspace.is_some_and(|ws| workspace_config_path(ws).exists())
}
