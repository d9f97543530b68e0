//! Tool executor for the research loop.
//!
//! Validates tool arguments at the model boundary, dispatches to the
//! search/scrape collaborators, and mutates the shared research state.
//! Backend failures never escape a tool: they come back as structured
//! results the model can read and route around. Only malformed
//! arguments are flagged as errors.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::background::BackgroundScraper;
use super::effort::EffortPreset;
use super::event::{EventSink, ProgressStats};
use super::state::{truncate_chars, ResearchState};
use super::tool::{ToolCall, ToolResult};
use crate::error::ResearchError;
use crate::web::{ScrapeOptions, Scraper, SearchOptions, SearchProvider, SearchType};

/// Maximum raw byte length of tool argument JSON from the LLM.
const MAX_TOOL_ARGS_LEN: usize = 100_000;
/// Per-search timeout.
const SEARCH_TIMEOUT: Duration = Duration::from_secs(45);
/// Foreground per-scrape timeout.
const SCRAPE_TIMEOUT: Duration = Duration::from_secs(20);
/// Foreground scraped-content cap in characters.
const SCRAPE_CONTENT_CAP: usize = 25_000;
/// Search results echoed back to the model.
const RESULTS_RETURNED: usize = 8;
/// Leading content characters echoed back from a scrape.
const CONTENT_PREVIEW: usize = 8_000;
/// Excerpt characters echoed back from a scrape.
const EXCERPT_LEN: usize = 500;

/// A validated tool invocation, parsed from the model's raw arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolInput {
    /// Web/news search.
    Search {
        /// Search query text.
        query: String,
        /// Search vertical.
        search_type: SearchType,
    },
    /// Foreground content extraction.
    Scrape {
        /// URL of a discovered source.
        url: String,
    },
    /// Record a research finding.
    RecordFinding {
        /// Finding text.
        finding: String,
        /// Optional source URL attribution.
        source: Option<String>,
    },
    /// Report run counters.
    Status,
}

impl ToolInput {
    /// Parses a named tool call's JSON arguments into a typed input.
    ///
    /// # Errors
    ///
    /// Returns [`ResearchError::ToolExecution`] for unknown tool names
    /// or arguments that fail schema validation.
    pub fn parse(name: &str, arguments: &str) -> Result<Self, ResearchError> {
        let invalid = |e: serde_json::Error| ResearchError::ToolExecution {
            name: name.to_string(),
            message: format!("invalid arguments: {e}"),
        };

        match name {
            "search" => {
                #[derive(Deserialize)]
                struct Args {
                    query: String,
                    #[serde(default)]
                    search_type: Option<SearchType>,
                }
                let args: Args = serde_json::from_str(arguments).map_err(invalid)?;
                Ok(Self::Search {
                    query: args.query,
                    search_type: args.search_type.unwrap_or(SearchType::Web),
                })
            }
            "scrape" => {
                #[derive(Deserialize)]
                struct Args {
                    url: String,
                }
                let args: Args = serde_json::from_str(arguments).map_err(invalid)?;
                Ok(Self::Scrape { url: args.url })
            }
            "record_finding" => {
                #[derive(Deserialize)]
                struct Args {
                    finding: String,
                    #[serde(default)]
                    source: Option<String>,
                }
                let args: Args = serde_json::from_str(arguments).map_err(invalid)?;
                Ok(Self::RecordFinding {
                    finding: args.finding,
                    source: args.source,
                })
            }
            "get_research_status" => Ok(Self::Status),
            other => Err(ResearchError::ToolExecution {
                name: other.to_string(),
                message: "unknown tool".to_string(),
            }),
        }
    }
}

/// Executes tool calls against the run's collaborators and state.
pub(crate) struct ToolExecutor {
    state: Arc<Mutex<ResearchState>>,
    preset: EffortPreset,
    search: Arc<dyn SearchProvider>,
    scraper: Arc<dyn Scraper>,
    background: BackgroundScraper,
    events: EventSink,
    cancel: CancellationToken,
}

impl ToolExecutor {
    pub(crate) fn new(
        state: Arc<Mutex<ResearchState>>,
        preset: EffortPreset,
        search: Arc<dyn SearchProvider>,
        scraper: Arc<dyn Scraper>,
        events: EventSink,
        cancel: CancellationToken,
    ) -> Self {
        let background = BackgroundScraper::new(
            Arc::clone(&state),
            Arc::clone(&scraper),
            cancel.clone(),
        );
        Self {
            state,
            preset,
            search,
            scraper,
            background,
            events,
            cancel,
        }
    }

    /// Dispatches one tool call and packages the outcome for the model.
    pub(crate) async fn execute(&self, call: &ToolCall) -> ToolResult {
        if call.arguments.len() > MAX_TOOL_ARGS_LEN {
            return ToolResult {
                tool_call_id: call.id.clone(),
                content: format!(
                    "tool arguments too large ({} bytes, max {MAX_TOOL_ARGS_LEN})",
                    call.arguments.len()
                ),
                is_error: true,
            };
        }

        let input = match ToolInput::parse(&call.name, &call.arguments) {
            Ok(input) => input,
            Err(e) => {
                return ToolResult {
                    tool_call_id: call.id.clone(),
                    content: e.to_string(),
                    is_error: true,
                };
            }
        };

        let value = match input {
            ToolInput::Search { query, search_type } => {
                self.tool_search(&query, search_type).await
            }
            ToolInput::Scrape { url } => self.tool_scrape(&url).await,
            ToolInput::RecordFinding { finding, source } => {
                self.tool_record_finding(finding, source).await
            }
            ToolInput::Status => self.tool_status().await,
        };

        ToolResult {
            tool_call_id: call.id.clone(),
            content: value.to_string(),
            is_error: false,
        }
    }

    /// Runs a search, integrates the hits, and queues background
    /// scrapes for the newly added URLs.
    async fn tool_search(&self, query: &str, search_type: SearchType) -> serde_json::Value {
        self.events
            .phase_started("search", format!("Searching {search_type} for \"{query}\""));

        let current = self.state.lock().await.source_count();
        let cap = self.preset.max_sources;
        if current >= cap {
            return json!({
                "found": 0,
                "sources": [],
                "total_sources": current,
                "message": "source limit reached; stop searching and scrape instead",
            });
        }

        let options = SearchOptions {
            max_results: cap.div_ceil(3).min(10).min(cap - current),
            search_type,
            timeout: SEARCH_TIMEOUT,
            cache: true,
        };

        let response = tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(ResearchError::Cancelled),
            result = tokio::time::timeout(SEARCH_TIMEOUT, self.search.search(query, &options)) => {
                result.map_or_else(
                    |_| Err(ResearchError::Search { message: "search timed out".to_string() }),
                    |inner| inner,
                )
            }
        };

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                warn!(query, error = %e, "search backend failed");
                return json!({ "found": 0, "error": e.to_string() });
            }
        };

        let added = self
            .state
            .lock()
            .await
            .add_search_results(&response.results, cap);
        debug!(query, found = response.results.len(), added = added.len(), "search integrated");

        self.background.enqueue(added.clone()).await;

        let total_sources = self.state.lock().await.source_count();
        let echoed: Vec<serde_json::Value> = response
            .results
            .iter()
            .take(RESULTS_RETURNED)
            .map(|hit| {
                json!({
                    "url": hit.url,
                    "title": hit.title,
                    "snippet": hit.snippet,
                })
            })
            .collect();

        json!({
            "found": response.results.len(),
            "sources": echoed,
            "new_sources": added.len(),
            "total_sources": total_sources,
        })
    }

    /// Scrapes one URL in the foreground and records the body.
    async fn tool_scrape(&self, url: &str) -> serde_json::Value {
        {
            let state = self.state.lock().await;
            let step = state.step_count();
            self.events.progress(
                progress_fraction(step, self.preset.max_steps),
                format!("Extracting content from {url}"),
                stats_of(&state, &self.preset),
            );
        }

        let options = ScrapeOptions {
            timeout: SCRAPE_TIMEOUT,
            max_content_length: SCRAPE_CONTENT_CAP,
            cache: true,
        };

        let scraped = tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(ResearchError::Cancelled),
            result = tokio::time::timeout(SCRAPE_TIMEOUT, self.scraper.scrape(url, &options)) => {
                result.map_or_else(
                    |_| Err(ResearchError::Scrape {
                        url: url.to_string(),
                        message: "scrape timed out".to_string(),
                    }),
                    |inner| inner,
                )
            }
        };

        let page = match scraped {
            Ok(page) => page,
            Err(e) => {
                warn!(url, error = %e, "scrape backend failed");
                return json!({ "success": false, "error": e.to_string() });
            }
        };

        let body = truncate_chars(&page.content, SCRAPE_CONTENT_CAP);
        let word_count = body.split_whitespace().count();
        self.state.lock().await.record_scrape(url, body.clone());

        json!({
            "success": true,
            "title": page.title,
            "word_count": word_count,
            "content": truncate_chars(&body, CONTENT_PREVIEW),
            "excerpt": truncate_chars(&body, EXCERPT_LEN),
        })
    }

    /// Appends a finding and announces it.
    async fn tool_record_finding(
        &self,
        finding: String,
        source: Option<String>,
    ) -> serde_json::Value {
        let total_findings = {
            let mut state = self.state.lock().await;
            state.record_finding(finding.clone());
            state.findings().len()
        };

        self.events
            .finding(&finding, source.into_iter().collect());

        json!({ "recorded": true, "total_findings": total_findings })
    }

    /// Reports run counters.
    async fn tool_status(&self) -> serde_json::Value {
        let snapshot = self
            .state
            .lock()
            .await
            .status(self.preset.sources_to_scrape());
        serde_json::to_value(&snapshot).unwrap_or_else(|_| json!({}))
    }
}

impl std::fmt::Debug for ToolExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolExecutor")
            .field("search", &self.search.name())
            .field("scraper", &self.scraper.name())
            .finish_non_exhaustive()
    }
}

/// Loop progress as a fraction of the step budget.
pub(crate) fn progress_fraction(step: usize, max_steps: usize) -> f64 {
    if max_steps == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    {
        step as f64 / max_steps as f64
    }
}

/// Builds progress stats from the current state.
pub(crate) fn stats_of(state: &ResearchState, preset: &EffortPreset) -> ProgressStats {
    ProgressStats {
        sources_found: state.source_count(),
        sources_processed: state.scraped_count(),
        steps_completed: state.step_count(),
        total_steps: preset.max_steps,
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::agent::effort::{effort_of, EffortLevel};
    use crate::web::{ScrapedPage, SearchHit, SearchResponse};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubSearch {
        hits: usize,
        fail: bool,
        requested: AtomicUsize,
    }

    impl StubSearch {
        fn with_hits(hits: usize) -> Arc<Self> {
            Arc::new(Self {
                hits,
                fail: false,
                requested: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                hits: 0,
                fail: true,
                requested: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl SearchProvider for StubSearch {
        fn name(&self) -> &'static str {
            "stub-search"
        }

        async fn search(
            &self,
            _query: &str,
            options: &SearchOptions,
        ) -> Result<SearchResponse, ResearchError> {
            self.requested.store(options.max_results, Ordering::SeqCst);
            if self.fail {
                return Err(ResearchError::Search {
                    message: "backend unavailable".to_string(),
                });
            }
            Ok(SearchResponse {
                results: (0..self.hits)
                    .map(|i| SearchHit {
                        url: format!("https://example.org/{i}"),
                        title: format!("Result {i}"),
                        snippet: Some(format!("snippet {i}")),
                    })
                    .collect(),
            })
        }
    }

    struct StubScraper(String);

    #[async_trait]
    impl Scraper for StubScraper {
        fn name(&self) -> &'static str {
            "stub-scraper"
        }

        async fn scrape(
            &self,
            _url: &str,
            _options: &ScrapeOptions,
        ) -> Result<ScrapedPage, ResearchError> {
            Ok(ScrapedPage {
                title: "Page Title".to_string(),
                content: self.0.clone(),
            })
        }
    }

    fn harness(
        search: Arc<StubSearch>,
        content: &str,
    ) -> (ToolExecutor, Arc<Mutex<ResearchState>>) {
        let state = Arc::new(Mutex::new(ResearchState::new()));
        let executor = ToolExecutor::new(
            Arc::clone(&state),
            effort_of(EffortLevel::Standard),
            search,
            Arc::new(StubScraper(content.to_string())),
            EventSink::new(None, None),
            CancellationToken::new(),
        );
        (executor, state)
    }

    async fn seed(state: &Arc<Mutex<ResearchState>>, urls: &[String]) {
        let hits: Vec<SearchHit> = urls
            .iter()
            .map(|u| SearchHit {
                url: u.clone(),
                title: "t".to_string(),
                snippet: None,
            })
            .collect();
        state.lock().await.add_search_results(&hits, 25);
    }

    fn call(name: &str, arguments: &str) -> ToolCall {
        ToolCall {
            id: "call_1".to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }

    fn parsed(result: &ToolResult) -> serde_json::Value {
        serde_json::from_str(&result.content)
            .unwrap_or_else(|e| panic!("tool returned invalid JSON: {e}"))
    }

    #[tokio::test]
    async fn test_search_integrates_and_echoes_first_eight() {
        let (executor, state) = harness(StubSearch::with_hits(10), "");

        let result = executor
            .execute(&call("search", r#"{"query":"rust ownership"}"#))
            .await;
        assert!(!result.is_error);
        let value = parsed(&result);
        assert_eq!(value["found"], 10);
        assert_eq!(value["sources"].as_array().map_or(0, Vec::len), 8);
        assert_eq!(value["total_sources"], 10);
        assert_eq!(state.lock().await.source_count(), 10);
    }

    #[tokio::test]
    async fn test_search_request_size_bounded() {
        let search = StubSearch::with_hits(0);
        let (executor, _state) = harness(Arc::clone(&search), "");

        let _ = executor.execute(&call("search", r#"{"query":"q"}"#)).await;
        // Standard effort: min(10, ceil(25/3) = 9, 25 - 0) = 9.
        assert_eq!(search.requested.load(Ordering::SeqCst), 9);
    }

    #[tokio::test]
    async fn test_search_error_swallowed() {
        let (executor, state) = harness(StubSearch::failing(), "");

        let result = executor
            .execute(&call("search", r#"{"query":"q"}"#))
            .await;
        assert!(!result.is_error, "backend failure is a structured result");
        let value = parsed(&result);
        assert_eq!(value["found"], 0);
        assert!(value["error"].as_str().is_some());
        assert_eq!(state.lock().await.source_count(), 0);
    }

    #[tokio::test]
    async fn test_search_short_circuits_at_source_cap() {
        let (executor, state) = harness(StubSearch::with_hits(10), "");
        let urls: Vec<String> = (0..25)
            .map(|i| format!("https://cap.example.org/{i}"))
            .collect();
        seed(&state, &urls).await;

        let result = executor
            .execute(&call("search", r#"{"query":"q"}"#))
            .await;
        let value = parsed(&result);
        assert_eq!(value["found"], 0);
        assert_eq!(value["total_sources"], 25);
        assert_eq!(state.lock().await.source_count(), 25);
    }

    #[tokio::test]
    async fn test_scrape_truncates_and_records() {
        let (executor, state) = harness(StubSearch::with_hits(0), &"word ".repeat(10_000));
        seed(&state, &["https://example.org/long".to_string()]).await;

        let result = executor
            .execute(&call("scrape", r#"{"url":"https://example.org/long"}"#))
            .await;
        let value = parsed(&result);
        assert_eq!(value["success"], true);
        assert_eq!(value["title"], "Page Title");
        let content = value["content"].as_str().map_or(0, |s| s.chars().count());
        assert!(content <= 8_000);
        let excerpt = value["excerpt"].as_str().map_or(0, |s| s.chars().count());
        assert!(excerpt <= 500);

        let state = state.lock().await;
        let stored = state
            .content_of("https://example.org/long")
            .map_or(0, |s| s.chars().count());
        assert_eq!(stored, 25_000);
    }

    #[tokio::test]
    async fn test_record_finding_and_status() {
        let (executor, _state) = harness(StubSearch::with_hits(0), "");

        let result = executor
            .execute(&call(
                "record_finding",
                r#"{"finding":"Rust enforces ownership at compile time","source":"https://example.org/"}"#,
            ))
            .await;
        let value = parsed(&result);
        assert_eq!(value["recorded"], true);
        assert_eq!(value["total_findings"], 1);

        let status = executor.execute(&call("get_research_status", "{}")).await;
        let value = parsed(&status);
        assert_eq!(value["findings_recorded"], 1);
        assert_eq!(value["target_sources"], 15);
    }

    #[tokio::test]
    async fn test_invalid_arguments_flagged() {
        let (executor, _state) = harness(StubSearch::with_hits(0), "");

        let result = executor.execute(&call("search", "{}")).await;
        assert!(result.is_error);

        let result = executor.execute(&call("unknown_tool", "{}")).await;
        assert!(result.is_error);
        assert!(result.content.contains("unknown tool"));
    }

    #[test]
    fn test_tool_input_search_type_defaults_to_web() {
        let web = ToolInput::parse("search", r#"{"query":"q"}"#)
            .unwrap_or_else(|e| panic!("parse failed: {e}"));
        assert!(matches!(web, ToolInput::Search { search_type: SearchType::Web, .. }));

        let news = ToolInput::parse("search", r#"{"query":"q","search_type":"news"}"#)
            .unwrap_or_else(|e| panic!("parse failed: {e}"));
        assert!(matches!(news, ToolInput::Search { search_type: SearchType::News, .. }));
    }
}
