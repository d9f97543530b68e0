//! End-to-end pipeline tests with mocked search, scrape, and LLM
//! collaborators.

#![allow(clippy::panic)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

use deepresearch_rs::agent::{
    EffortLevel, EngineConfig, EventPayload, LlmProvider, PatchCallback, ResearchEngine,
    ResearchOptions, ChatRequest, ChatResponse, TokenUsage, ToolCall,
};
use deepresearch_rs::error::ResearchError;
use deepresearch_rs::web::{
    ScrapeOptions, ScrapedPage, SearchHit, SearchOptions, SearchProvider, SearchResponse, Scraper,
};

const REPORT_MD: &str = "\
# Research Report

## Executive Summary

The short version.

## Background

Where this started.

## Findings

What the sources showed.

## Conclusion

Where this leaves us.
";

/// Search backend serving a fixed pool of URLs through a cursor, so
/// successive calls discover successive slices of the pool.
struct PoolSearch {
    pool: Vec<SearchHit>,
    cursor: AtomicUsize,
}

impl PoolSearch {
    fn new(count: usize) -> Self {
        Self {
            pool: (0..count)
                .map(|i| SearchHit {
                    url: format!("https://example.org/{i}"),
                    title: format!("Source {i}"),
                    snippet: Some(format!("snippet {i}")),
                })
                .collect(),
            cursor: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SearchProvider for PoolSearch {
    fn name(&self) -> &'static str {
        "pool"
    }

    async fn search(
        &self,
        _query: &str,
        options: &SearchOptions,
    ) -> Result<SearchResponse, ResearchError> {
        let start = self.cursor.load(Ordering::SeqCst).min(self.pool.len());
        let end = (start + options.max_results).min(self.pool.len());
        self.cursor.store(end, Ordering::SeqCst);
        Ok(SearchResponse {
            results: self.pool[start..end].to_vec(),
        })
    }
}

/// Scraper that succeeds with deterministic content, failing for a
/// configured set of URLs.
struct PoolScraper {
    fail_for: Vec<String>,
}

#[async_trait]
impl Scraper for PoolScraper {
    fn name(&self) -> &'static str {
        "pool"
    }

    async fn scrape(&self, url: &str, _options: &ScrapeOptions) -> Result<ScrapedPage, ResearchError> {
        if self.fail_for.iter().any(|f| f == url) {
            return Err(ResearchError::Scrape {
                url: url.to_string(),
                message: "unreachable".to_string(),
            });
        }
        Ok(ScrapedPage {
            title: format!("Title of {url}"),
            content: format!("Extracted body of {url}. ").repeat(40),
        })
    }
}

/// Scripted model: obeys forced tools, records a fixed number of
/// findings when unforced, then produces a final answer. Summarization
/// requests (no tools offered) get briefing-note text; the synthesis
/// generation returns a fixed four-section report.
struct ScriptedModel {
    calls: AtomicUsize,
    scrape_cursor: AtomicUsize,
    findings_emitted: AtomicUsize,
    findings_target: usize,
    urls: Vec<String>,
    cancel_at_call: Option<(usize, CancellationToken)>,
}

impl ScriptedModel {
    fn new(url_count: usize, findings_target: usize) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            scrape_cursor: AtomicUsize::new(0),
            findings_emitted: AtomicUsize::new(0),
            findings_target,
            urls: (0..url_count)
                .map(|i| format!("https://example.org/{i}"))
                .collect(),
            cancel_at_call: None,
        }
    }

    fn final_answer() -> ChatResponse {
        ChatResponse {
            content: "Research complete.".to_string(),
            usage: TokenUsage::default(),
            tool_calls: Vec::new(),
            finish_reason: Some("stop".to_string()),
        }
    }

    fn tool_response(name: &str, arguments: String, call_id: usize) -> ChatResponse {
        ChatResponse {
            content: String::new(),
            usage: TokenUsage {
                prompt_tokens: 100,
                completion_tokens: 20,
                total_tokens: 120,
            },
            tool_calls: vec![ToolCall {
                id: format!("call_{call_id}"),
                name: name.to_string(),
                arguments,
            }],
            finish_reason: Some("tool_calls".to_string()),
        }
    }
}

#[async_trait]
impl LlmProvider for ScriptedModel {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ResearchError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some((at, ref token)) = self.cancel_at_call {
            if call + 1 == at {
                token.cancel();
                return Ok(Self::final_answer());
            }
        }

        // No tools offered: this is a batch-summarization request.
        if request.tools.is_empty() {
            return Ok(ChatResponse {
                content: "Briefing notes covering the batch sources.".to_string(),
                usage: TokenUsage {
                    prompt_tokens: 200,
                    completion_tokens: 80,
                    total_tokens: 280,
                },
                tool_calls: Vec::new(),
                finish_reason: Some("stop".to_string()),
            });
        }

        match request.tool_choice.as_deref() {
            Some("search") => Ok(Self::tool_response(
                "search",
                format!(r#"{{"query":"angle {call}"}}"#),
                call,
            )),
            Some("scrape") => {
                let idx = self.scrape_cursor.fetch_add(1, Ordering::SeqCst)
                    % self.urls.len().max(1);
                let url = self.urls.get(idx).cloned().unwrap_or_default();
                Ok(Self::tool_response(
                    "scrape",
                    format!(r#"{{"url":"{url}"}}"#),
                    call,
                ))
            }
            Some(other) => Ok(Self::tool_response(other, "{}".to_string(), call)),
            None => {
                let emitted = self.findings_emitted.fetch_add(1, Ordering::SeqCst);
                if emitted < self.findings_target {
                    Ok(Self::tool_response(
                        "record_finding",
                        format!(
                            r#"{{"finding":"fact number {emitted}","source":"https://example.org/0"}}"#
                        ),
                        call,
                    ))
                } else {
                    Ok(Self::final_answer())
                }
            }
        }
    }

    async fn generate_text(
        &self,
        _model: &str,
        _prompt: &str,
        _max_output_tokens: u32,
    ) -> Result<ChatResponse, ResearchError> {
        Ok(ChatResponse {
            content: REPORT_MD.to_string(),
            usage: TokenUsage {
                prompt_tokens: 1_000,
                completion_tokens: 2_000,
                total_tokens: 3_000,
            },
            tool_calls: Vec::new(),
            finish_reason: Some("stop".to_string()),
        })
    }
}

fn engine_with(
    model: ScriptedModel,
    search: PoolSearch,
    scraper: PoolScraper,
) -> ResearchEngine {
    let config = EngineConfig::builder()
        .api_key("test")
        .model("test-model")
        .build()
        .unwrap_or_else(|_| unreachable!());
    ResearchEngine::with_provider(
        config,
        Arc::new(model),
        Arc::new(search),
        Arc::new(scraper),
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn small_pool_run_produces_full_report() {
    let engine = engine_with(
        ScriptedModel::new(4, 6),
        PoolSearch::new(4),
        PoolScraper { fail_for: vec![] },
    );

    let patches: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let patches_clone = Arc::clone(&patches);
    let on_patch: PatchCallback = Arc::new(move |p| {
        patches_clone
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(p.to_string());
    });

    let outcome = engine
        .research_async(
            "What is Rust's ownership model?",
            ResearchOptions {
                effort: EffortLevel::Standard,
                on_patch: Some(on_patch),
                ..ResearchOptions::default()
            },
        )
        .await
        .unwrap_or_else(|e| panic!("run failed: {e}"));

    assert_eq!(outcome.stats.total_sources, 4);
    assert_eq!(outcome.stats.sources_processed, 4);
    assert!((outcome.quality - 0.6).abs() < f64::EPSILON, "6 findings → 0.6");
    assert_eq!(outcome.report.title, "Research Report");
    assert!(outcome.report.sections.len() >= 4);
    assert_eq!(outcome.report.summary, "The short version.");
    assert_eq!(outcome.patches_streamed, 2);
    assert!(outcome.stats.total_tokens > 0);

    let patches = patches.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    assert_eq!(patches.len(), 2);
    let add: serde_json::Value =
        serde_json::from_str(&patches[0]).unwrap_or_else(|e| panic!("bad patch: {e}"));
    assert_eq!(add["path"], "/elements/research_report");
    assert_eq!(add["value"]["props"]["totalResults"], 4);
    let set: serde_json::Value =
        serde_json::from_str(&patches[1]).unwrap_or_else(|e| panic!("bad patch: {e}"));
    assert_eq!(set["value"], "research_report");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn source_cap_run_stops_within_budget() {
    let engine = engine_with(
        ScriptedModel::new(25, 6),
        PoolSearch::new(25),
        PoolScraper { fail_for: vec![] },
    );

    let outcome = engine
        .research_async(
            "What is Rust's ownership model?",
            ResearchOptions::default(),
        )
        .await
        .unwrap_or_else(|e| panic!("run failed: {e}"));

    assert_eq!(outcome.stats.total_sources, 25, "pool fully discovered");
    assert!(
        outcome.stats.sources_processed >= 15,
        "scrape target met before the loop ended (got {})",
        outcome.stats.sources_processed
    );
    assert!(!outcome.synthesis.is_empty());
    assert!(outcome.report.sections.len() >= 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn streaming_run_emits_events_then_result() {
    let engine = engine_with(
        ScriptedModel::new(4, 3),
        PoolSearch::new(4),
        PoolScraper { fail_for: vec![] },
    );

    let mut run = engine.research("streaming query", ResearchOptions::default());

    let mut events = Vec::new();
    while let Some(event) = run.next().await {
        events.push(event);
    }
    let outcome = run
        .finish()
        .await
        .unwrap_or_else(|e| panic!("run failed: {e}"));

    assert!(matches!(
        events.first().map(|e| &e.payload),
        Some(EventPayload::PhaseStarted { .. })
    ));

    let mut last_progress = 0.0_f64;
    let mut findings = 0usize;
    let mut completed_quality = None;
    for event in &events {
        assert_eq!(event.research_id, "agent");
        match &event.payload {
            EventPayload::ProgressUpdate { progress, .. } => {
                assert!(*progress >= last_progress, "progress must not decrease");
                assert!(*progress <= 0.95);
                last_progress = *progress;
            }
            EventPayload::FindingDiscovered { confidence, .. } => {
                assert_eq!(confidence, "medium");
                findings += 1;
            }
            EventPayload::Completed { final_quality, .. } => {
                completed_quality = Some(*final_quality);
            }
            EventPayload::PhaseStarted { .. } => {}
        }
    }

    assert_eq!(findings, 3);
    #[allow(clippy::cast_precision_loss)]
    let expected_quality = (findings as f64 / 10.0).min(1.0);
    let quality = completed_quality.unwrap_or_else(|| panic!("no completed event"));
    assert!((quality - expected_quality).abs() < f64::EPSILON);
    assert!((outcome.quality - expected_quality).abs() < f64::EPSILON);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancellation_returns_cancelled_without_completion() {
    let cancel = CancellationToken::new();
    let mut model = ScriptedModel::new(25, 6);
    model.cancel_at_call = Some((7, cancel.clone()));

    let engine = engine_with(model, PoolSearch::new(25), PoolScraper { fail_for: vec![] });

    let mut run = engine.research(
        "cancelled query",
        ResearchOptions {
            cancel: Some(cancel),
            ..ResearchOptions::default()
        },
    );

    let mut saw_completed = false;
    while let Some(event) = run.next().await {
        if matches!(event.payload, EventPayload::Completed { .. }) {
            saw_completed = true;
        }
    }
    let result = run.finish().await;

    assert!(matches!(result, Err(ResearchError::Cancelled)));
    assert!(!saw_completed, "a cancelled run must not emit completed");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn partial_scrape_failures_do_not_fail_the_run() {
    let engine = engine_with(
        ScriptedModel::new(9, 4),
        PoolSearch::new(9),
        PoolScraper {
            fail_for: vec![
                "https://example.org/1".to_string(),
                "https://example.org/3".to_string(),
            ],
        },
    );

    let outcome = engine
        .research_async("partly unreachable", ResearchOptions::default())
        .await
        .unwrap_or_else(|e| panic!("run failed: {e}"));

    assert_eq!(outcome.stats.total_sources, 9);
    assert_eq!(
        outcome.stats.sources_processed, 7,
        "the two failing URLs stay unscraped"
    );
    assert!(!outcome.synthesis.is_empty());
}
