//! Provider registry and factory.
//!
//! Maps provider names to concrete [`LlmProvider`] implementations.

use std::sync::Arc;

use crate::agent::config::EngineConfig;
use crate::agent::provider::LlmProvider;
use crate::agent::providers::OpenAiProvider;
use crate::error::ResearchError;

/// Creates an [`LlmProvider`] based on the configured provider name.
///
/// # Supported Providers
///
/// - `"openai"` (default) — OpenAI-compatible APIs via `async-openai`
///
/// # Errors
///
/// Returns [`ResearchError::UnsupportedProvider`] for unknown provider
/// names.
pub fn create_provider(config: &EngineConfig) -> Result<Arc<dyn LlmProvider>, ResearchError> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiProvider::new(config))),
        other => Err(ResearchError::UnsupportedProvider {
            name: other.to_string(),
        }),
    }
}
