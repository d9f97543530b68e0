//! Public engine factory and run handles.
//!
//! A [`ResearchEngine`] wires an LLM provider and the search/scrape
//! collaborators together behind instance-owned caches, and exposes the
//! two run operations: [`research_async`](ResearchEngine::research_async)
//! (await the outcome, observe progress via callback) and
//! [`research`](ResearchEngine::research) (a streaming variant yielding
//! the same events, then the same outcome).

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::client::create_provider;
use super::config::EngineConfig;
use super::event::{EventSink, ResearchEvent};
use super::orchestrator::{Orchestrator, ResearchOptions, ResearchOutcome};
use super::provider::LlmProvider;
use crate::error::ResearchError;
use crate::web::cache::{CachedScraper, CachedSearch};
use crate::web::{Scraper, SearchProvider};

/// The deep-research engine handle.
///
/// One engine can serve many runs; each run owns its own state, and the
/// search/scrape caches are shared across runs of this handle only.
#[derive(Debug)]
pub struct ResearchEngine {
    orchestrator: Arc<Orchestrator>,
}

impl ResearchEngine {
    /// Creates an engine from configuration, resolving the LLM backend
    /// through the provider registry.
    ///
    /// # Errors
    ///
    /// Returns [`ResearchError::UnsupportedProvider`] for unknown
    /// provider names.
    pub fn new(
        config: EngineConfig,
        search: Arc<dyn SearchProvider>,
        scraper: Arc<dyn Scraper>,
    ) -> Result<Self, ResearchError> {
        let provider = create_provider(&config)?;
        Ok(Self::with_provider(config, provider, search, scraper))
    }

    /// Creates an engine with an explicit LLM provider (useful for
    /// tests and custom backends).
    #[must_use]
    pub fn with_provider(
        config: EngineConfig,
        provider: Arc<dyn LlmProvider>,
        search: Arc<dyn SearchProvider>,
        scraper: Arc<dyn Scraper>,
    ) -> Self {
        let search: Arc<dyn SearchProvider> = Arc::new(CachedSearch::new(
            search,
            config.search_cache_capacity,
            config.search_cache_ttl,
        ));
        let scraper: Arc<dyn Scraper> = Arc::new(CachedScraper::new(
            scraper,
            config.scrape_cache_capacity,
            config.scrape_cache_ttl,
        ));
        Self {
            orchestrator: Arc::new(Orchestrator::new(provider, search, scraper, config)),
        }
    }

    /// Runs one research query to completion.
    ///
    /// Progress events go to `options.on_progress`; UI patches go to
    /// `options.on_patch`.
    ///
    /// # Errors
    ///
    /// Returns [`ResearchError`] on validation failures, provider
    /// failures, synthesis failures, and cancellation.
    pub async fn research_async(
        &self,
        query: &str,
        options: ResearchOptions,
    ) -> Result<ResearchOutcome, ResearchError> {
        let events = EventSink::new(None, options.on_progress);
        let cancel = options.cancel.unwrap_or_default();
        self.orchestrator
            .run(
                query,
                options.effort,
                options.context,
                events,
                options.on_patch,
                cancel,
            )
            .await
    }

    /// Starts a research run and returns a handle streaming its events.
    ///
    /// The stream yields exactly the events `on_progress` would
    /// receive; [`ResearchRun::finish`] then returns the same outcome
    /// `research_async` would.
    #[must_use]
    pub fn research(&self, query: &str, options: ResearchOptions) -> ResearchRun {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let events = EventSink::new(Some(tx), options.on_progress);
        let cancel = options.cancel.unwrap_or_default();

        let orchestrator = Arc::clone(&self.orchestrator);
        let query = query.to_string();
        let effort = options.effort;
        let context = options.context;
        let on_patch = options.on_patch;

        let handle = tokio::spawn(async move {
            orchestrator
                .run(&query, effort, context, events, on_patch, cancel)
                .await
        });

        ResearchRun {
            events: UnboundedReceiverStream::new(rx),
            handle,
        }
    }
}

/// A streaming research run: an event stream plus the joinable outcome.
#[derive(Debug)]
pub struct ResearchRun {
    events: UnboundedReceiverStream<ResearchEvent>,
    handle: JoinHandle<Result<ResearchOutcome, ResearchError>>,
}

impl ResearchRun {
    /// Awaits the run's outcome. Remaining events are dropped; poll the
    /// stream first to observe them all.
    ///
    /// # Errors
    ///
    /// Returns the run's error, or [`ResearchError::Orchestration`] if
    /// the run task panicked.
    pub async fn finish(self) -> Result<ResearchOutcome, ResearchError> {
        self.handle
            .await
            .map_err(|e| ResearchError::Orchestration {
                message: format!("research task failed to join: {e}"),
            })?
    }
}

impl Stream for ResearchRun {
    type Item = ResearchEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.get_mut().events).poll_next(cx)
    }
}
