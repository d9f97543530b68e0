//! Error types for the research engine.
//!
//! Everything the model can recover from by choosing another tool is
//! swallowed into a structured tool result; the variants here are the
//! failures that prevent progress and surface to the caller.

use thiserror::Error;

/// Errors surfaced by the research engine.
#[derive(Debug, Error)]
pub enum ResearchError {
    /// No API key was provided or found in the environment.
    #[error("no API key provided (set OPENAI_API_KEY or DEEPRESEARCH_API_KEY)")]
    ApiKeyMissing,

    /// Unknown LLM provider name.
    #[error("unsupported provider: {name}")]
    UnsupportedProvider {
        /// The provider name that failed to resolve.
        name: String,
    },

    /// An LLM API request failed.
    #[error("API request failed: {message}")]
    ApiRequest {
        /// Provider error description.
        message: String,
        /// HTTP status code, when the provider reported one.
        status: Option<u16>,
    },

    /// A search backend call failed.
    #[error("search backend failed: {message}")]
    Search {
        /// Backend error description.
        message: String,
    },

    /// A scrape backend call failed.
    #[error("scrape backend failed for {url}: {message}")]
    Scrape {
        /// The URL that failed to scrape.
        url: String,
        /// Backend error description.
        message: String,
    },

    /// A tool call could not be executed.
    #[error("tool '{name}' failed: {message}")]
    ToolExecution {
        /// Name of the tool that failed.
        name: String,
        /// Failure description.
        message: String,
    },

    /// The run pipeline failed outside of any single backend call.
    #[error("orchestration error: {message}")]
    Orchestration {
        /// Failure description.
        message: String,
    },

    /// The final synthesis generation failed.
    #[error("synthesis failed: {message}")]
    Synthesis {
        /// Failure description.
        message: String,
    },

    /// The run was cancelled via its cancellation token.
    #[error("research run cancelled")]
    Cancelled,
}

impl ResearchError {
    /// Returns `true` for cancellation, which unwinds cooperatively
    /// rather than indicating a backend fault.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
