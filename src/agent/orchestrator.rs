//! Orchestrator for the research run pipeline.
//!
//! Coordinates one run end to end: instruction assembly → the agentic
//! step loop (with background scraping and batch summarization riding
//! alongside) → the terminal synthesis → the completed event.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::agentic_loop::run_step_loop;
use super::config::EngineConfig;
use super::effort::{effort_of, EffortLevel};
use super::event::{EventSink, PatchCallback};
use super::executor::ToolExecutor;
use super::message::TokenUsage;
use super::prompt::{build_system_instruction, PromptSet};
use super::provider::LlmProvider;
use super::report::ResearchReport;
use super::state::{ResearchState, SourceInfo};
use super::summarizer::BatchSummarizer;
use super::synthesizer::Synthesizer;
use crate::error::ResearchError;
use crate::web::{Scraper, SearchProvider};

/// Findings needed for a full quality score.
const QUALITY_FINDINGS_DIVISOR: f64 = 10.0;

/// Aggregate statistics for a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunStats {
    /// Distinct sources discovered.
    pub total_sources: usize,
    /// Sources whose content was scraped.
    pub sources_processed: usize,
    /// Total wall-clock duration.
    #[serde(serialize_with = "serialize_duration")]
    pub duration: Duration,
    /// Total tokens consumed across the loop, batches, and synthesis.
    pub total_tokens: u32,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn serialize_duration<S>(d: &Duration, s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    s.serialize_f64(d.as_secs_f64())
}

/// Final result of a research run.
#[derive(Debug, Clone, Serialize)]
pub struct ResearchOutcome {
    /// Raw synthesis Markdown.
    pub synthesis: String,
    /// Parsed report structure.
    pub report: ResearchReport,
    /// Discovered sources in insertion order.
    pub sources: Vec<SourceInfo>,
    /// Aggregate run statistics.
    pub stats: RunStats,
    /// Quality score `min(1, findings / 10)`.
    pub quality: f64,
    /// Number of UI patches emitted.
    pub patches_streamed: usize,
}

/// Per-run options accepted by the engine's research operations.
#[derive(Default)]
pub struct ResearchOptions {
    /// Effort level selecting the run budget.
    pub effort: EffortLevel,
    /// Additional caller context woven into the prompts.
    pub context: Option<String>,
    /// External cancellation signal.
    pub cancel: Option<CancellationToken>,
    /// Progress event observer.
    pub on_progress: Option<super::event::ProgressCallback>,
    /// UI patch sink.
    pub on_patch: Option<PatchCallback>,
}

impl std::fmt::Debug for ResearchOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResearchOptions")
            .field("effort", &self.effort)
            .field("context", &self.context.is_some())
            .field("cancel", &self.cancel.is_some())
            .finish_non_exhaustive()
    }
}

/// Coordinates the full research pipeline for one engine.
pub(crate) struct Orchestrator {
    provider: Arc<dyn LlmProvider>,
    search: Arc<dyn SearchProvider>,
    scraper: Arc<dyn Scraper>,
    config: EngineConfig,
    prompts: PromptSet,
}

impl Orchestrator {
    /// Creates a new orchestrator, loading prompt templates from the
    /// configured directory with compiled-in fallbacks.
    pub(crate) fn new(
        provider: Arc<dyn LlmProvider>,
        search: Arc<dyn SearchProvider>,
        scraper: Arc<dyn Scraper>,
        config: EngineConfig,
    ) -> Self {
        let prompts = PromptSet::load(config.prompt_dir.as_deref());
        Self {
            provider,
            search,
            scraper,
            config,
            prompts,
        }
    }

    /// Executes one research run.
    ///
    /// # Errors
    ///
    /// Returns [`ResearchError`] on loop provider failures, synthesis
    /// failures, and cancellation.
    pub(crate) async fn run(
        &self,
        query: &str,
        effort: EffortLevel,
        context: Option<String>,
        events: EventSink,
        on_patch: Option<PatchCallback>,
        cancel: CancellationToken,
    ) -> Result<ResearchOutcome, ResearchError> {
        let preset = effort_of(effort);
        let state = Arc::new(Mutex::new(ResearchState::new()));
        let usage = Arc::new(std::sync::Mutex::new(TokenUsage::default()));

        events.phase_started(
            "research",
            format!("Starting {effort} research: {query}"),
        );

        let executor = ToolExecutor::new(
            Arc::clone(&state),
            preset,
            Arc::clone(&self.search),
            Arc::clone(&self.scraper),
            events.clone(),
            cancel.clone(),
        );
        let summarizer = BatchSummarizer::new(
            Arc::clone(&state),
            Arc::clone(&self.provider),
            self.config.model.clone(),
            self.config.summary_max_tokens,
            self.prompts.batch_summary.clone(),
            query.to_string(),
            cancel.clone(),
            Arc::clone(&usage),
        );

        let instruction = build_system_instruction(&self.prompts.research, &preset);
        let user_prompt = context.as_ref().map_or_else(
            || format!("Research this topic: {query}"),
            |ctx| format!("Research this topic: {query}\n\nAdditional context:\n{ctx}"),
        );

        let loop_end = run_step_loop(
            &self.provider,
            &self.config.model,
            self.config.step_max_tokens,
            &instruction,
            &user_prompt,
            &state,
            &preset,
            &executor,
            &summarizer,
            &events,
            &cancel,
            &usage,
        )
        .await?;
        debug!(?loop_end, "research loop finished");

        if cancel.is_cancelled() {
            return Err(ResearchError::Cancelled);
        }

        events.phase_started("synthesis", "Synthesizing final report");

        let synthesizer = Synthesizer::new(
            Arc::clone(&state),
            Arc::clone(&self.provider),
            summarizer,
            self.config.model.clone(),
            self.config.max_output_tokens,
            self.prompts.synthesis.clone(),
            preset,
            query.to_string(),
            context,
            on_patch,
            cancel,
            Arc::clone(&usage),
        );
        let output = synthesizer.run().await?;

        let (sources, findings_count, scraped_count, duration) = {
            let state = state.lock().await;
            (
                state.sources().to_vec(),
                state.findings().len(),
                state.scraped_count(),
                state.started_at().elapsed(),
            )
        };

        #[allow(clippy::cast_precision_loss)]
        let quality = (findings_count as f64 / QUALITY_FINDINGS_DIVISOR).min(1.0);
        let total_tokens = usage
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .total_tokens;

        events.completed(
            u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            quality,
        );
        info!(
            sources = sources.len(),
            findings = findings_count,
            quality,
            ?duration,
            "research run complete"
        );

        Ok(ResearchOutcome {
            synthesis: output.markdown,
            report: output.report,
            stats: RunStats {
                total_sources: sources.len(),
                sources_processed: scraped_count,
                duration,
                total_tokens,
            },
            sources,
            quality,
            patches_streamed: output.patches_streamed,
        })
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("provider", &self.provider.name())
            .field("search", &self.search.name())
            .field("scraper", &self.scraper.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
