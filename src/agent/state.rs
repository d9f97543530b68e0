//! Mutable per-run research state.
//!
//! One [`ResearchState`] exists per run. Tools, the step hooks, and the
//! background tasks are the only mutators; the synthesizer reads it.
//! The run shares it as `Arc<tokio::sync::Mutex<ResearchState>>`, so
//! every mutation serializes on the per-run lock.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::web::url::{canonicalize_url, domain_of};
use crate::web::SearchHit;

/// A discovered source, keyed by canonical URL within the run.
#[derive(Debug, Clone, Serialize)]
pub struct SourceInfo {
    /// Canonical URL.
    pub url: String,
    /// Title from the search hit.
    pub title: String,
    /// Host minus any leading `www.`.
    pub domain: String,
    /// Search snippet, when available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

/// A completed map-reduce summary over one batch of scraped sources.
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    /// Strictly-increasing batch number, starting at 1.
    pub batch_num: u32,
    /// Summary text produced by the model.
    pub summary: String,
    /// Number of sources covered by this batch.
    pub source_count: usize,
}

/// Counters reported by the `get_research_status` tool.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    /// Distinct sources discovered so far.
    pub sources_found: usize,
    /// Sources with scraped content.
    pub sources_scraped: usize,
    /// Findings recorded by the model.
    pub findings_recorded: usize,
    /// Scrape target derived from the effort preset.
    pub target_sources: usize,
    /// Milliseconds since run start.
    pub elapsed_ms: u64,
}

/// Truncates a string to at most `max` characters on a char boundary.
///
/// Scraped web content is arbitrary UTF-8; byte-indexed truncation
/// would panic mid-codepoint.
#[must_use]
pub(crate) fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

/// The mutable record of one research run.
#[derive(Debug)]
pub struct ResearchState {
    sources: Vec<SourceInfo>,
    source_urls: HashSet<String>,
    scraped_content: HashMap<String, String>,
    scrape_order: Vec<String>,
    findings: Vec<String>,
    batch_summaries: Vec<BatchSummary>,
    summarized_urls: HashSet<String>,
    pending_summaries: Vec<JoinHandle<()>>,
    pending_scrapes: Vec<JoinHandle<()>>,
    batch_counter: u32,
    step_count: usize,
    started_at: Instant,
}

impl ResearchState {
    /// Creates empty state stamped with the run start time.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            source_urls: HashSet::new(),
            scraped_content: HashMap::new(),
            scrape_order: Vec::new(),
            findings: Vec::new(),
            batch_summaries: Vec::new(),
            summarized_urls: HashSet::new(),
            pending_summaries: Vec::new(),
            pending_scrapes: Vec::new(),
            batch_counter: 0,
            step_count: 0,
            started_at: Instant::now(),
        }
    }

    /// Canonicalizes, dedupes, and inserts search hits up to
    /// `cap − |sources|` new entries. Malformed URLs and duplicates are
    /// dropped silently. Returns the canonical URLs actually added.
    pub fn add_search_results(&mut self, results: &[SearchHit], cap: usize) -> Vec<String> {
        let mut added = Vec::new();
        for hit in results {
            if self.sources.len() >= cap {
                break;
            }
            let Some(canonical) = canonicalize_url(&hit.url) else {
                debug!(url = hit.url, "dropping malformed search result URL");
                continue;
            };
            if !self.source_urls.insert(canonical.clone()) {
                continue;
            }
            self.sources.push(SourceInfo {
                domain: domain_of(&canonical),
                url: canonical.clone(),
                title: hit.title.clone(),
                snippet: hit.snippet.clone(),
            });
            added.push(canonical);
        }
        added
    }

    /// Records scraped content for a known source. The first body wins;
    /// unknown URLs are ignored (scrapes race against the source cap).
    pub fn record_scrape(&mut self, url: &str, body: String) {
        if !self.source_urls.contains(url) {
            debug!(url, "dropping scrape for URL not in sources");
            return;
        }
        if self.scraped_content.contains_key(url) {
            return;
        }
        self.scraped_content.insert(url.to_string(), body);
        self.scrape_order.push(url.to_string());
    }

    /// Appends a finding verbatim. No dedup.
    pub fn record_finding(&mut self, text: String) {
        self.findings.push(text);
    }

    /// Scraped URLs not yet assigned to any summary batch, in scrape
    /// order.
    #[must_use]
    pub fn unsummarized_urls(&self) -> Vec<String> {
        self.scrape_order
            .iter()
            .filter(|url| !self.summarized_urls.contains(*url))
            .cloned()
            .collect()
    }

    /// Marks URLs as belonging to the next batch and returns its number.
    pub fn assign_batch(&mut self, urls: &[String]) -> u32 {
        for url in urls {
            self.summarized_urls.insert(url.clone());
        }
        self.batch_counter += 1;
        self.batch_counter
    }

    /// Releases a failed batch's URLs so the tail flush can retry them.
    pub fn release_batch(&mut self, urls: &[String]) {
        for url in urls {
            self.summarized_urls.remove(url);
        }
    }

    /// Appends a completed batch summary.
    pub fn append_batch_summary(&mut self, summary: BatchSummary) {
        self.batch_summaries.push(summary);
    }

    /// Batch summaries sorted by `batch_num` (completion order is
    /// arbitrary).
    #[must_use]
    pub fn sorted_batch_summaries(&self) -> Vec<BatchSummary> {
        let mut summaries = self.batch_summaries.clone();
        summaries.sort_by_key(|s| s.batch_num);
        summaries
    }

    /// Tracks an in-flight summarization task.
    pub fn push_pending_summary(&mut self, handle: JoinHandle<()>) {
        self.pending_summaries.push(handle);
    }

    /// Takes ownership of all in-flight summarization handles.
    pub fn take_pending_summaries(&mut self) -> Vec<JoinHandle<()>> {
        std::mem::take(&mut self.pending_summaries)
    }

    /// Tracks an in-flight background scrape task.
    pub fn push_pending_scrape(&mut self, handle: JoinHandle<()>) {
        self.pending_scrapes.push(handle);
    }

    /// Takes ownership of all in-flight background scrape handles.
    pub fn take_pending_scrapes(&mut self) -> Vec<JoinHandle<()>> {
        std::mem::take(&mut self.pending_scrapes)
    }

    /// Counters for the status tool and progress events.
    #[must_use]
    pub fn status(&self, target_sources: usize) -> StatusSnapshot {
        StatusSnapshot {
            sources_found: self.sources.len(),
            sources_scraped: self.scraped_content.len(),
            findings_recorded: self.findings.len(),
            target_sources,
            elapsed_ms: u64::try_from(self.started_at.elapsed().as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Discovered sources in insertion order.
    #[must_use]
    pub fn sources(&self) -> &[SourceInfo] {
        &self.sources
    }

    /// Looks up a source by canonical URL.
    #[must_use]
    pub fn source_info(&self, url: &str) -> Option<&SourceInfo> {
        self.sources.iter().find(|s| s.url == url)
    }

    /// Number of distinct sources.
    #[must_use]
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Number of sources with scraped content.
    #[must_use]
    pub fn scraped_count(&self) -> usize {
        self.scraped_content.len()
    }

    /// Returns `true` if content was already scraped for this URL.
    #[must_use]
    pub fn has_scraped(&self, url: &str) -> bool {
        self.scraped_content.contains_key(url)
    }

    /// Scraped body for a URL, if any.
    #[must_use]
    pub fn content_of(&self, url: &str) -> Option<&str> {
        self.scraped_content.get(url).map(String::as_str)
    }

    /// Recorded findings in order.
    #[must_use]
    pub fn findings(&self) -> &[String] {
        &self.findings
    }

    /// Completed model steps.
    #[must_use]
    pub const fn step_count(&self) -> usize {
        self.step_count
    }

    /// Increments the step counter and returns the new value.
    pub const fn increment_step(&mut self) -> usize {
        self.step_count += 1;
        self.step_count
    }

    /// Last assigned batch number.
    #[must_use]
    pub const fn batch_counter(&self) -> u32 {
        self.batch_counter
    }

    /// Wall-clock instant the run started.
    #[must_use]
    pub const fn started_at(&self) -> Instant {
        self.started_at
    }
}

impl Default for ResearchState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(url: &str) -> SearchHit {
        SearchHit {
            url: url.to_string(),
            title: format!("Title for {url}"),
            snippet: None,
        }
    }

    #[test]
    fn test_add_dedupes_across_calls() {
        let mut state = ResearchState::new();
        let first = state.add_search_results(&[hit("https://example.org/a")], 25);
        assert_eq!(first.len(), 1);
        // Same URL from a later search call is ignored.
        let second = state.add_search_results(&[hit("https://example.org/a")], 25);
        assert!(second.is_empty());
        assert_eq!(state.source_count(), 1);
    }

    #[test]
    fn test_add_respects_cap() {
        let mut state = ResearchState::new();
        let hits: Vec<SearchHit> = (0..10)
            .map(|i| hit(&format!("https://example.org/{i}")))
            .collect();
        let added = state.add_search_results(&hits, 4);
        assert_eq!(added.len(), 4);
        assert_eq!(state.source_count(), 4);
    }

    #[test]
    fn test_add_canonicalizes_and_drops_malformed() {
        let mut state = ResearchState::new();
        let added = state.add_search_results(
            &[
                hit("https://duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.org%2Fx"),
                hit("//example.org/y"),
                hit("not a url"),
            ],
            25,
        );
        assert_eq!(
            added,
            vec![
                "https://example.org/x".to_string(),
                "https://example.org/y".to_string()
            ]
        );
        assert_eq!(state.sources()[0].domain, "example.org");
    }

    #[test]
    fn test_record_scrape_requires_known_source() {
        let mut state = ResearchState::new();
        state.record_scrape("https://example.org/unknown", "body".to_string());
        assert_eq!(state.scraped_count(), 0);

        state.add_search_results(&[hit("https://example.org/a")], 25);
        state.record_scrape("https://example.org/a", "body".to_string());
        assert_eq!(state.scraped_count(), 1);
        assert_eq!(state.content_of("https://example.org/a"), Some("body"));
    }

    #[test]
    fn test_first_scrape_wins() {
        let mut state = ResearchState::new();
        state.add_search_results(&[hit("https://example.org/a")], 25);
        state.record_scrape("https://example.org/a", "first".to_string());
        state.record_scrape("https://example.org/a", "second".to_string());
        assert_eq!(state.content_of("https://example.org/a"), Some("first"));
    }

    #[test]
    fn test_assign_and_release_batches() {
        let mut state = ResearchState::new();
        let urls: Vec<String> = (0..7).map(|i| format!("https://example.org/{i}")).collect();
        let hits: Vec<SearchHit> = urls.iter().map(|u| hit(u)).collect();
        state.add_search_results(&hits, 25);
        for url in &urls {
            state.record_scrape(url, "body".to_string());
        }

        let first_batch: Vec<String> = state.unsummarized_urls().into_iter().take(5).collect();
        let num = state.assign_batch(&first_batch);
        assert_eq!(num, 1);
        assert_eq!(state.unsummarized_urls().len(), 2);

        // A failed batch releases its URLs for the tail flush.
        state.release_batch(&first_batch);
        assert_eq!(state.unsummarized_urls().len(), 7);
        assert_eq!(state.batch_counter(), 1);
    }

    #[test]
    fn test_batch_summaries_sorted_by_number() {
        let mut state = ResearchState::new();
        state.append_batch_summary(BatchSummary {
            batch_num: 2,
            summary: "second".to_string(),
            source_count: 5,
        });
        state.append_batch_summary(BatchSummary {
            batch_num: 1,
            summary: "first".to_string(),
            source_count: 5,
        });
        let sorted = state.sorted_batch_summaries();
        assert_eq!(sorted[0].batch_num, 1);
        assert_eq!(sorted[1].batch_num, 2);
    }

    #[test]
    fn test_truncate_chars_utf8_safe() {
        let s = "héllo wörld";
        assert_eq!(truncate_chars(s, 4), "héll");
        assert_eq!(truncate_chars(s, 100), s);
    }

    #[test]
    fn test_status_counters() {
        let mut state = ResearchState::new();
        state.add_search_results(&[hit("https://example.org/a")], 25);
        state.record_scrape("https://example.org/a", "body".to_string());
        state.record_finding("a finding".to_string());
        let status = state.status(15);
        assert_eq!(status.sources_found, 1);
        assert_eq!(status.sources_scraped, 1);
        assert_eq!(status.findings_recorded, 1);
        assert_eq!(status.target_sources, 15);
    }
}
