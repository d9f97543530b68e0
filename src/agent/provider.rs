//! Pluggable LLM provider trait.
//!
//! Implementations translate provider-agnostic [`ChatRequest`]/
//! [`ChatResponse`] into provider-specific SDK calls. This keeps the
//! loop, the batch summarizer, and the synthesizer decoupled from any
//! particular LLM vendor.

use async_trait::async_trait;

use super::message::{ChatRequest, ChatResponse};
use crate::error::ResearchError;

/// Trait for LLM provider backends.
///
/// Two operations cover the engine's needs: [`chat`](Self::chat) drives
/// the tool loop (and batch summarization), and
/// [`generate_text`](Self::generate_text) produces the single long-form
/// synthesis with a large output budget.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name (e.g., `"openai"`).
    fn name(&self) -> &'static str;

    /// Executes a chat completion request.
    ///
    /// # Errors
    ///
    /// Returns [`ResearchError::ApiRequest`] on API failures, timeouts,
    /// or parse errors.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ResearchError>;

    /// Generates free-form text for a single prompt.
    ///
    /// # Errors
    ///
    /// Returns [`ResearchError::ApiRequest`] on API failures.
    async fn generate_text(
        &self,
        model: &str,
        prompt: &str,
        max_output_tokens: u32,
    ) -> Result<ChatResponse, ResearchError>;
}
