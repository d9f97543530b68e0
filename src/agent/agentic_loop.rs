//! The agentic step loop.
//!
//! Drives the model ↔ tool round-trip under the step controller's
//! policy: each step is bracketed by `prepare_step` (which restricts
//! and optionally forces the tool set) and the step-finish hook (which
//! advances counters, triggers batch summarization, and reports
//! progress). The loop stops at the step budget, an early-stop signal,
//! the model's own final answer, the overall timeout, or cancellation.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::effort::EffortPreset;
use super::event::EventSink;
use super::executor::{progress_fraction, stats_of, ToolExecutor};
use super::message::{
    assistant_tool_calls_message, system_message, tool_message, user_message, ChatRequest,
    TokenUsage,
};
use super::provider::LlmProvider;
use super::state::ResearchState;
use super::step::{prepare_step, StopReason};
use super::summarizer::BatchSummarizer;
use super::tool::ToolSet;
use crate::error::ResearchError;

/// Sampling temperature for loop steps.
const LOOP_TEMPERATURE: f32 = 0.1;

/// How the step loop terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoopEnd {
    /// The step budget ran out.
    MaxSteps,
    /// The controller stopped the loop early.
    Stopped(StopReason),
    /// The model produced a final answer without tool calls.
    ModelStop,
    /// The overall run timeout elapsed.
    TimedOut,
}

/// Runs the research loop until a termination condition is met.
///
/// # Errors
///
/// Propagates provider failures as run failures and returns
/// [`ResearchError::Cancelled`] when the cancellation token fires.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn run_step_loop(
    provider: &Arc<dyn LlmProvider>,
    model: &str,
    step_max_tokens: u32,
    system_instruction: &str,
    user_prompt: &str,
    state: &Arc<Mutex<ResearchState>>,
    preset: &EffortPreset,
    executor: &ToolExecutor,
    summarizer: &BatchSummarizer,
    events: &EventSink,
    cancel: &CancellationToken,
    usage: &Arc<std::sync::Mutex<TokenUsage>>,
) -> Result<LoopEnd, ResearchError> {
    let mut request = ChatRequest {
        model: model.to_string(),
        messages: vec![
            system_message(system_instruction),
            user_message(user_prompt),
        ],
        temperature: Some(LOOP_TEMPERATURE),
        max_tokens: Some(step_max_tokens),
        tools: Vec::new(),
        tool_choice: None,
    };

    loop {
        if cancel.is_cancelled() {
            return Err(ResearchError::Cancelled);
        }

        let (completed, sources, scraped, elapsed) = {
            let state = state.lock().await;
            (
                state.step_count(),
                state.source_count(),
                state.scraped_count(),
                state.started_at().elapsed(),
            )
        };

        if completed >= preset.max_steps {
            debug!(steps = completed, "step budget exhausted");
            return Ok(LoopEnd::MaxSteps);
        }
        if elapsed >= preset.timeout {
            debug!(?elapsed, "overall run timeout reached");
            return Ok(LoopEnd::TimedOut);
        }

        let step_number = completed + 1;
        let plan = prepare_step(step_number, sources, scraped, preset);
        if let Some(reason) = plan.stop_reason {
            debug!(step = step_number, reason = reason.as_str(), "controller stopped the loop");
            return Ok(LoopEnd::Stopped(reason));
        }

        request.tools = ToolSet::subset(&plan.active_tools).definitions().to_vec();
        request.tool_choice = plan.forced.map(|tool| tool.as_str().to_string());

        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(ResearchError::Cancelled),
            result = provider.chat(&request) => result?,
        };

        usage
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .accumulate(response.usage);

        if response.tool_calls.is_empty() {
            debug!(step = step_number, "model produced final text, ending loop");
            finish_step(state, preset, summarizer, events).await;
            return Ok(LoopEnd::ModelStop);
        }

        debug!(
            step = step_number,
            tool_count = response.tool_calls.len(),
            "executing tool calls"
        );

        request.messages.push(assistant_tool_calls_message(
            response.content.clone(),
            response.tool_calls.clone(),
        ));

        for call in &response.tool_calls {
            let result = executor.execute(call).await;
            debug!(
                tool = call.name,
                call_id = call.id,
                is_error = result.is_error,
                "tool execution complete"
            );
            request
                .messages
                .push(tool_message(&result.tool_call_id, &result.content));
        }

        finish_step(state, preset, summarizer, events).await;
    }
}

/// The step-finish hook: advances the counter, triggers batch
/// summarization when enough content has accumulated, and emits a
/// progress update.
async fn finish_step(
    state: &Arc<Mutex<ResearchState>>,
    preset: &EffortPreset,
    summarizer: &BatchSummarizer,
    events: &EventSink,
) {
    let (step, stats) = {
        let mut state = state.lock().await;
        let step = state.increment_step();
        (step, stats_of(&state, preset))
    };

    summarizer.maybe_spawn_batch().await;

    events.progress(
        progress_fraction(step, preset.max_steps),
        format!("Completed step {step} of {}", preset.max_steps),
        stats,
    );
}
