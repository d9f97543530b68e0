//! Fire-and-forget background scraping.
//!
//! The `search` tool queues newly discovered URLs here so content
//! extraction overlaps with model thinking. Tasks write straight into
//! the shared research state; nothing awaits them between steps, and
//! failures are dropped silently. The run's cancellation token aborts
//! any task still in flight.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::state::{truncate_chars, ResearchState};
use crate::web::{ScrapeOptions, Scraper};

/// Maximum URLs queued per search call.
const URLS_PER_EVENT: usize = 5;
/// Per-run cap on in-flight background scrapes.
pub(crate) const BACKGROUND_CONCURRENCY: usize = 3;
/// Background per-scrape timeout.
const BACKGROUND_TIMEOUT: Duration = Duration::from_secs(10);
/// Background content cap in characters.
const BACKGROUND_CONTENT_CAP: usize = 15_000;

/// Opportunistic scraper shared by all `search` tool executions in a
/// run.
pub(crate) struct BackgroundScraper {
    state: Arc<Mutex<ResearchState>>,
    scraper: Arc<dyn Scraper>,
    gate: Arc<Semaphore>,
    cancel: CancellationToken,
}

impl BackgroundScraper {
    /// Creates the per-run background scraper with its concurrency gate.
    pub(crate) fn new(
        state: Arc<Mutex<ResearchState>>,
        scraper: Arc<dyn Scraper>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            state,
            scraper,
            gate: Arc::new(Semaphore::new(BACKGROUND_CONCURRENCY)),
            cancel,
        }
    }

    /// Queues background scrapes for up to five not-yet-scraped URLs.
    ///
    /// Returns immediately; the spawned tasks' only observable effect
    /// is content appearing in the research state.
    pub(crate) async fn enqueue(&self, candidates: Vec<String>) {
        let pending: Vec<String> = {
            let state = self.state.lock().await;
            candidates
                .into_iter()
                .filter(|url| !state.has_scraped(url))
                .take(URLS_PER_EVENT)
                .collect()
        };

        let mut handles = Vec::with_capacity(pending.len());
        for url in pending {
            let state = Arc::clone(&self.state);
            let scraper = Arc::clone(&self.scraper);
            let gate = Arc::clone(&self.gate);
            let cancel = self.cancel.clone();

            handles.push(tokio::spawn(async move {
                let Ok(_permit) = gate.acquire().await else {
                    return;
                };
                if cancel.is_cancelled() {
                    return;
                }

                let options = ScrapeOptions {
                    timeout: BACKGROUND_TIMEOUT,
                    max_content_length: BACKGROUND_CONTENT_CAP,
                    cache: true,
                };

                let scraped = tokio::select! {
                    biased;
                    () = cancel.cancelled() => {
                        debug!(url, "background scrape cancelled");
                        return;
                    }
                    result = tokio::time::timeout(
                        BACKGROUND_TIMEOUT,
                        scraper.scrape(&url, &options),
                    ) => result,
                };

                match scraped {
                    Ok(Ok(page)) => {
                        let body = truncate_chars(&page.content, BACKGROUND_CONTENT_CAP);
                        state.lock().await.record_scrape(&url, body);
                        debug!(url, "background scrape stored");
                    }
                    Ok(Err(e)) => {
                        warn!(url, error = %e, "background scrape failed, dropping");
                    }
                    Err(_) => {
                        warn!(url, "background scrape timed out, dropping");
                    }
                }
            }));
        }

        if !handles.is_empty() {
            let mut state = self.state.lock().await;
            for handle in handles {
                state.push_pending_scrape(handle);
            }
        }
    }
}

impl std::fmt::Debug for BackgroundScraper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundScraper")
            .field("scraper", &self.scraper.name())
            .finish_non_exhaustive()
    }
}
