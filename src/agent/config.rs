//! Engine configuration with builder pattern and environment variable
//! support.
//!
//! Configuration is resolved in order: explicit values → environment
//! variables → defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ResearchError;

/// Default output budget for the final synthesis generation.
const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 65_000;
/// Default per-step response budget inside the tool loop.
const DEFAULT_STEP_MAX_TOKENS: u32 = 4_096;
/// Default batch-summary response budget (500–800 words plus headroom).
const DEFAULT_SUMMARY_MAX_TOKENS: u32 = 2_048;
/// Default search cache size.
const DEFAULT_SEARCH_CACHE_CAPACITY: usize = 128;
/// Default search cache TTL in seconds.
const DEFAULT_SEARCH_CACHE_TTL_SECS: u64 = 300;
/// Default scrape cache size.
const DEFAULT_SCRAPE_CACHE_CAPACITY: usize = 256;
/// Default scrape cache TTL in seconds.
const DEFAULT_SCRAPE_CACHE_TTL_SECS: u64 = 900;

/// Configuration for a [`ResearchEngine`](crate::agent::ResearchEngine).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// LLM provider name (e.g., "openai").
    pub provider: String,
    /// API key for the provider.
    pub api_key: String,
    /// Optional base URL override (for proxies or compatible APIs).
    pub base_url: Option<String>,
    /// Model used for the loop, batch summaries, and synthesis.
    pub model: String,
    /// Output token budget for the final synthesis generation.
    pub max_output_tokens: u32,
    /// Response token budget per loop step.
    pub step_max_tokens: u32,
    /// Response token budget per batch summary.
    pub summary_max_tokens: u32,
    /// Capacity of the instance-owned search cache.
    pub search_cache_capacity: usize,
    /// Time-to-live of search cache entries.
    pub search_cache_ttl: Duration,
    /// Capacity of the instance-owned scrape cache.
    pub scrape_cache_capacity: usize,
    /// Time-to-live of scrape cache entries.
    pub scrape_cache_ttl: Duration,
    /// Directory containing prompt template files.
    pub prompt_dir: Option<PathBuf>,
}

impl EngineConfig {
    /// Creates a new builder for `EngineConfig`.
    #[must_use]
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Creates configuration from environment variables with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ResearchError::ApiKeyMissing`] if no API key is found.
    pub fn from_env() -> Result<Self, ResearchError> {
        Self::builder().from_env().build()
    }
}

/// Builder for [`EngineConfig`].
#[derive(Debug, Clone, Default)]
pub struct EngineConfigBuilder {
    provider: Option<String>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    max_output_tokens: Option<u32>,
    step_max_tokens: Option<u32>,
    summary_max_tokens: Option<u32>,
    search_cache_capacity: Option<usize>,
    search_cache_ttl: Option<Duration>,
    scrape_cache_capacity: Option<usize>,
    scrape_cache_ttl: Option<Duration>,
    prompt_dir: Option<PathBuf>,
}

impl EngineConfigBuilder {
    /// Populates unset fields from environment variables.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        if self.provider.is_none() {
            self.provider = std::env::var("DEEPRESEARCH_PROVIDER").ok();
        }
        if self.api_key.is_none() {
            self.api_key = std::env::var("OPENAI_API_KEY")
                .or_else(|_| std::env::var("DEEPRESEARCH_API_KEY"))
                .ok();
        }
        if self.base_url.is_none() {
            self.base_url = std::env::var("OPENAI_BASE_URL")
                .or_else(|_| std::env::var("DEEPRESEARCH_BASE_URL"))
                .ok();
        }
        if self.model.is_none() {
            self.model = std::env::var("DEEPRESEARCH_MODEL").ok();
        }
        if self.max_output_tokens.is_none() {
            self.max_output_tokens = std::env::var("DEEPRESEARCH_MAX_OUTPUT_TOKENS")
                .ok()
                .and_then(|v| v.parse().ok());
        }
        if self.prompt_dir.is_none() {
            self.prompt_dir = std::env::var("DEEPRESEARCH_PROMPT_DIR")
                .ok()
                .map(PathBuf::from);
        }
        self
    }

    /// Sets the LLM provider name.
    #[must_use]
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Sets the API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the base URL override.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the model.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the synthesis output token budget.
    #[must_use]
    pub const fn max_output_tokens(mut self, n: u32) -> Self {
        self.max_output_tokens = Some(n);
        self
    }

    /// Sets the per-step response token budget.
    #[must_use]
    pub const fn step_max_tokens(mut self, n: u32) -> Self {
        self.step_max_tokens = Some(n);
        self
    }

    /// Sets the batch-summary response token budget.
    #[must_use]
    pub const fn summary_max_tokens(mut self, n: u32) -> Self {
        self.summary_max_tokens = Some(n);
        self
    }

    /// Sets the search cache capacity.
    #[must_use]
    pub const fn search_cache_capacity(mut self, n: usize) -> Self {
        self.search_cache_capacity = Some(n);
        self
    }

    /// Sets the search cache TTL.
    #[must_use]
    pub const fn search_cache_ttl(mut self, ttl: Duration) -> Self {
        self.search_cache_ttl = Some(ttl);
        self
    }

    /// Sets the scrape cache capacity.
    #[must_use]
    pub const fn scrape_cache_capacity(mut self, n: usize) -> Self {
        self.scrape_cache_capacity = Some(n);
        self
    }

    /// Sets the scrape cache TTL.
    #[must_use]
    pub const fn scrape_cache_ttl(mut self, ttl: Duration) -> Self {
        self.scrape_cache_ttl = Some(ttl);
        self
    }

    /// Sets the prompt template directory.
    #[must_use]
    pub fn prompt_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.prompt_dir = Some(dir.into());
        self
    }

    /// Builds the [`EngineConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`ResearchError::ApiKeyMissing`] if no API key was set.
    pub fn build(self) -> Result<EngineConfig, ResearchError> {
        let api_key = self.api_key.ok_or(ResearchError::ApiKeyMissing)?;

        Ok(EngineConfig {
            provider: self.provider.unwrap_or_else(|| "openai".to_string()),
            api_key,
            base_url: self.base_url,
            model: self
                .model
                .unwrap_or_else(|| "gpt-5.2-2025-12-11".to_string()),
            max_output_tokens: self.max_output_tokens.unwrap_or(DEFAULT_MAX_OUTPUT_TOKENS),
            step_max_tokens: self.step_max_tokens.unwrap_or(DEFAULT_STEP_MAX_TOKENS),
            summary_max_tokens: self
                .summary_max_tokens
                .unwrap_or(DEFAULT_SUMMARY_MAX_TOKENS),
            search_cache_capacity: self
                .search_cache_capacity
                .unwrap_or(DEFAULT_SEARCH_CACHE_CAPACITY),
            search_cache_ttl: self
                .search_cache_ttl
                .unwrap_or(Duration::from_secs(DEFAULT_SEARCH_CACHE_TTL_SECS)),
            scrape_cache_capacity: self
                .scrape_cache_capacity
                .unwrap_or(DEFAULT_SCRAPE_CACHE_CAPACITY),
            scrape_cache_ttl: self
                .scrape_cache_ttl
                .unwrap_or(Duration::from_secs(DEFAULT_SCRAPE_CACHE_TTL_SECS)),
            prompt_dir: self.prompt_dir,
        })
    }
}
