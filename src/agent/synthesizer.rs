//! Terminal synthesis phase.
//!
//! Runs once after the loop: waits out every in-flight batch summary,
//! flushes the unbatched tail, assembles the final prompt from
//! findings, sources, and briefing notes, and issues one long-form
//! generation. The resulting Markdown is parsed into a sectioned report
//! and optionally streamed to a UI patch sink.

use std::sync::Arc;

use serde_json::json;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::effort::EffortPreset;
use super::event::PatchCallback;
use super::message::TokenUsage;
use super::prompt::{build_synthesis_prompt, SYNTHESIS_SOURCE_LIMIT};
use super::provider::LlmProvider;
use super::report::{parse_report, ResearchReport};
use super::state::{ResearchState, SourceInfo};
use super::summarizer::BatchSummarizer;
use crate::error::ResearchError;

/// Output of the synthesis phase.
#[derive(Debug)]
pub(crate) struct SynthesisOutput {
    /// Raw synthesis Markdown.
    pub markdown: String,
    /// Parsed report structure.
    pub report: ResearchReport,
    /// Number of UI patches emitted.
    pub patches_streamed: usize,
}

/// One-shot synthesizer for a run.
pub(crate) struct Synthesizer {
    state: Arc<Mutex<ResearchState>>,
    provider: Arc<dyn LlmProvider>,
    summarizer: BatchSummarizer,
    model: String,
    max_output_tokens: u32,
    system_prompt: String,
    preset: EffortPreset,
    query: String,
    context: Option<String>,
    on_patch: Option<PatchCallback>,
    cancel: CancellationToken,
    usage: Arc<std::sync::Mutex<TokenUsage>>,
}

impl Synthesizer {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        state: Arc<Mutex<ResearchState>>,
        provider: Arc<dyn LlmProvider>,
        summarizer: BatchSummarizer,
        model: String,
        max_output_tokens: u32,
        system_prompt: String,
        preset: EffortPreset,
        query: String,
        context: Option<String>,
        on_patch: Option<PatchCallback>,
        cancel: CancellationToken,
        usage: Arc<std::sync::Mutex<TokenUsage>>,
    ) -> Self {
        Self {
            state,
            provider,
            summarizer,
            model,
            max_output_tokens,
            system_prompt,
            preset,
            query,
            context,
            on_patch,
            cancel,
            usage,
        }
    }

    /// Runs the synthesis phase to completion.
    ///
    /// # Errors
    ///
    /// Propagates final-generation failures (as
    /// [`ResearchError::Synthesis`]) and cancellation. A failed tail
    /// flush is logged and ignored.
    pub(crate) async fn run(&self) -> Result<SynthesisOutput, ResearchError> {
        // Drain: settle in-flight background scrapes, then every
        // in-flight batch, so the tail flush sees final content.
        let (scrapes, summaries_pending) = {
            let mut state = self.state.lock().await;
            (state.take_pending_scrapes(), state.take_pending_summaries())
        };
        debug!(
            scrapes = scrapes.len(),
            summaries = summaries_pending.len(),
            "draining background work"
        );
        for handle in scrapes {
            if let Err(e) = handle.await {
                warn!(error = %e, "background scrape task panicked");
            }
        }
        for handle in summaries_pending {
            if let Err(e) = handle.await {
                warn!(error = %e, "batch summary task panicked");
            }
        }

        // Tail flush: one awaited batch over whatever remains.
        self.summarizer.tail_flush().await;

        let (findings, sources, summaries) = {
            let state = self.state.lock().await;
            (
                state.findings().to_vec(),
                state.sources().to_vec(),
                state.sorted_batch_summaries(),
            )
        };

        let prompt = format!(
            "{}\n\n{}",
            self.system_prompt,
            build_synthesis_prompt(
                &self.query,
                self.context.as_deref(),
                &findings,
                &sources,
                &summaries,
                &self.preset,
            )
        );

        let response = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Err(ResearchError::Cancelled),
            result = self
                .provider
                .generate_text(&self.model, &prompt, self.max_output_tokens) => {
                result.map_err(|e| match e {
                    ResearchError::Cancelled => ResearchError::Cancelled,
                    other => ResearchError::Synthesis {
                        message: other.to_string(),
                    },
                })?
            }
        };

        self.usage
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .accumulate(response.usage);

        let report = parse_report(&response.content, &self.query);
        debug!(
            sections = report.sections.len(),
            summaries = summaries.len(),
            "synthesis parsed"
        );

        let patches_streamed = self.on_patch.as_ref().map_or(0, |sink| {
            for patch in build_patches(&report, &sources, &self.query) {
                sink(&patch);
            }
            2
        });

        Ok(SynthesisOutput {
            markdown: response.content,
            report,
            patches_streamed,
        })
    }
}

impl std::fmt::Debug for Synthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Synthesizer")
            .field("model", &self.model)
            .field("query", &self.query)
            .finish_non_exhaustive()
    }
}

/// Builds the two UI patches: an `add` of the report element, then a
/// `set` of the root pointer.
fn build_patches(report: &ResearchReport, sources: &[SourceInfo], query: &str) -> [String; 2] {
    let source_values: Vec<serde_json::Value> = sources
        .iter()
        .take(SYNTHESIS_SOURCE_LIMIT)
        .enumerate()
        .map(|(i, source)| {
            json!({
                "id": i + 1,
                "title": source.title,
                "url": source.url,
                "domain": source.domain,
            })
        })
        .collect();

    let add = json!({
        "op": "add",
        "path": "/elements/research_report",
        "value": {
            "key": "research_report",
            "type": "ResearchReport",
            "props": {
                "title": report.title,
                "summary": report.summary,
                "sections": report.sections,
                "sources": source_values,
                "searchQuery": query,
                "totalResults": sources.len(),
            },
        },
    });
    let set = json!({
        "op": "set",
        "path": "/root",
        "value": "research_report",
    });

    [add.to_string(), set.to_string()]
}
