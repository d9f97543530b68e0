//! Map-reduce batch summarization of scraped content.
//!
//! As scraped bodies accumulate, fixed-size batches are condensed into
//! compact briefing notes so the final synthesis prompt stays tractable.
//! Batches launch unawaited from the step-finish hook; the synthesizer
//! drains the outstanding handles and flushes whatever remains in one
//! final awaited pass.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::message::{system_message, user_message, ChatRequest, TokenUsage};
use super::prompt::{build_batch_prompt, SourceExcerpt};
use super::provider::LlmProvider;
use super::state::{truncate_chars, BatchSummary, ResearchState};
use crate::error::ResearchError;

/// Scraped sources per summary batch.
pub(crate) const BATCH_SIZE: usize = 5;
/// Characters of each source body included in a batch prompt.
const SUMMARY_EXCERPT_CAP: usize = 5_000;
/// Sampling temperature for summarization.
const SUMMARY_TEMPERATURE: f32 = 0.1;

/// One source's owned excerpt, captured under the state lock.
struct BatchEntry {
    title: String,
    url: String,
    excerpt: String,
}

/// Per-run batch summarizer.
#[derive(Clone)]
pub(crate) struct BatchSummarizer {
    state: Arc<Mutex<ResearchState>>,
    provider: Arc<dyn LlmProvider>,
    model: String,
    max_tokens: u32,
    system_prompt: String,
    query: String,
    cancel: CancellationToken,
    usage: Arc<std::sync::Mutex<TokenUsage>>,
}

impl BatchSummarizer {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        state: Arc<Mutex<ResearchState>>,
        provider: Arc<dyn LlmProvider>,
        model: String,
        max_tokens: u32,
        system_prompt: String,
        query: String,
        cancel: CancellationToken,
        usage: Arc<std::sync::Mutex<TokenUsage>>,
    ) -> Self {
        Self {
            state,
            provider,
            model,
            max_tokens,
            system_prompt,
            query,
            cancel,
            usage,
        }
    }

    /// Launches an unawaited summarization task if at least
    /// [`BATCH_SIZE`] scraped sources are not yet batched.
    ///
    /// The batch is assigned (URLs marked, counter incremented) before
    /// the task starts, so a later step cannot double-assign the same
    /// sources. A failed task releases its URLs for the tail flush.
    pub(crate) async fn maybe_spawn_batch(&self) {
        let Some((urls, batch_num, entries)) = ({
            let mut state = self.state.lock().await;
            let unsummarized = state.unsummarized_urls();
            if unsummarized.len() < BATCH_SIZE {
                None
            } else {
                let urls: Vec<String> = unsummarized.into_iter().take(BATCH_SIZE).collect();
                let batch_num = state.assign_batch(&urls);
                let entries = Self::capture_entries(&state, &urls);
                Some((urls, batch_num, entries))
            }
        }) else {
            return;
        };

        debug!(batch_num, sources = urls.len(), "launching batch summarization");

        let this = self.clone();
        let handle = tokio::spawn(async move {
            match this.summarize(batch_num, &entries).await {
                Ok(summary) => {
                    this.state.lock().await.append_batch_summary(summary);
                }
                Err(ResearchError::Cancelled) => {
                    debug!(batch_num, "batch summarization cancelled");
                }
                Err(e) => {
                    warn!(batch_num, error = %e, "batch summarization failed, releasing batch");
                    this.state.lock().await.release_batch(&urls);
                }
            }
        });

        self.state.lock().await.push_pending_summary(handle);
    }

    /// Runs one final awaited summarization over every scraped source
    /// not yet covered by a batch. Failures are logged and ignored.
    pub(crate) async fn tail_flush(&self) {
        let Some((batch_num, entries)) = ({
            let mut state = self.state.lock().await;
            let remaining = state.unsummarized_urls();
            if remaining.is_empty() {
                None
            } else {
                let batch_num = state.assign_batch(&remaining);
                let entries = Self::capture_entries(&state, &remaining);
                Some((batch_num, entries))
            }
        }) else {
            return;
        };

        debug!(batch_num, sources = entries.len(), "tail-flush summarization");

        match self.summarize(batch_num, &entries).await {
            Ok(summary) => {
                self.state.lock().await.append_batch_summary(summary);
            }
            Err(e) => {
                warn!(batch_num, error = %e, "tail-flush summarization failed, continuing without it");
            }
        }
    }

    fn capture_entries(state: &ResearchState, urls: &[String]) -> Vec<BatchEntry> {
        urls.iter()
            .map(|url| BatchEntry {
                title: state
                    .source_info(url)
                    .map_or_else(|| url.clone(), |s| s.title.clone()),
                url: url.clone(),
                excerpt: truncate_chars(state.content_of(url).unwrap_or_default(), SUMMARY_EXCERPT_CAP),
            })
            .collect()
    }

    async fn summarize(
        &self,
        batch_num: u32,
        entries: &[BatchEntry],
    ) -> Result<BatchSummary, ResearchError> {
        let excerpts: Vec<SourceExcerpt<'_>> = entries
            .iter()
            .map(|e| SourceExcerpt {
                title: &e.title,
                url: &e.url,
                content: &e.excerpt,
            })
            .collect();

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                system_message(&self.system_prompt),
                user_message(&build_batch_prompt(&self.query, &excerpts)),
            ],
            temperature: Some(SUMMARY_TEMPERATURE),
            max_tokens: Some(self.max_tokens),
            tools: Vec::new(),
            tool_choice: None,
        };

        let response = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Err(ResearchError::Cancelled),
            result = self.provider.chat(&request) => result?,
        };

        self.usage
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .accumulate(response.usage);

        Ok(BatchSummary {
            batch_num,
            summary: response.content,
            source_count: entries.len(),
        })
    }
}

impl std::fmt::Debug for BatchSummarizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchSummarizer")
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}
