//! Progress event schema and the run's event sink.
//!
//! Every run emits a stream of typed events a frontend can render live.
//! Progress is monotone non-decreasing and capped at 0.95 until the
//! synthesizer completes the run.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

/// Constant research identifier carried by every event.
pub const RESEARCH_ID: &str = "agent";

/// Progress cap while the loop is still running.
const PROGRESS_CAP: f64 = 0.95;

/// Counters attached to progress events.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ProgressStats {
    /// Distinct sources discovered.
    pub sources_found: usize,
    /// Sources with scraped content.
    pub sources_processed: usize,
    /// Model steps completed.
    pub steps_completed: usize,
    /// Step budget for this run.
    pub total_steps: usize,
}

/// Event payload, discriminated by `type` on the wire.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum EventPayload {
    /// A research phase began.
    PhaseStarted {
        /// Phase name (e.g. `"search"`, `"synthesis"`).
        phase: String,
        /// Human-readable description.
        message: String,
    },
    /// Periodic progress report.
    ProgressUpdate {
        /// Fraction complete in `[0, 1]`.
        progress: f64,
        /// Human-readable description.
        message: String,
        /// Current counters.
        stats: ProgressStats,
    },
    /// The model recorded a finding.
    FindingDiscovered {
        /// Finding text.
        finding: String,
        /// Confidence label (`"medium"` for tool-recorded findings).
        confidence: String,
        /// Attributed source URLs, possibly empty.
        source_ids: Vec<String>,
    },
    /// The run finished and the report is ready.
    Completed {
        /// Total wall-clock duration in milliseconds.
        total_duration_ms: u64,
        /// Final quality score in `[0, 1]`.
        final_quality: f64,
    },
}

/// A timestamped event from a research run.
#[derive(Debug, Clone, Serialize)]
pub struct ResearchEvent {
    /// Typed payload.
    #[serde(flatten)]
    pub payload: EventPayload,
    /// Emission time.
    pub timestamp: DateTime<Utc>,
    /// Constant run identifier.
    pub research_id: &'static str,
}

impl ResearchEvent {
    fn new(payload: EventPayload) -> Self {
        Self {
            payload,
            timestamp: Utc::now(),
            research_id: RESEARCH_ID,
        }
    }
}

/// Observer callback for progress events.
pub type ProgressCallback = Arc<dyn Fn(&ResearchEvent) + Send + Sync>;

/// Observer callback for UI patches (serialized JSON strings).
pub type PatchCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Fan-out sink for a run's events.
///
/// Events go to an optional streaming channel and an optional progress
/// callback. The sink enforces the monotone progress contract: a
/// progress value below the high-water mark is raised to it, and no
/// value above [`PROGRESS_CAP`] is reported before completion.
#[derive(Clone)]
pub struct EventSink {
    channel: Option<UnboundedSender<ResearchEvent>>,
    on_progress: Option<ProgressCallback>,
    high_water: Arc<Mutex<f64>>,
}

impl EventSink {
    /// Creates a sink feeding the given channel and/or callback.
    #[must_use]
    pub fn new(
        channel: Option<UnboundedSender<ResearchEvent>>,
        on_progress: Option<ProgressCallback>,
    ) -> Self {
        Self {
            channel,
            on_progress,
            high_water: Arc::new(Mutex::new(0.0)),
        }
    }

    /// Emits a phase-started event.
    pub fn phase_started(&self, phase: &str, message: impl Into<String>) {
        self.dispatch(ResearchEvent::new(EventPayload::PhaseStarted {
            phase: phase.to_string(),
            message: message.into(),
        }));
    }

    /// Emits a progress update, clamped monotone and capped.
    pub fn progress(&self, progress: f64, message: impl Into<String>, stats: ProgressStats) {
        let clamped = {
            let mut high_water = self.high_water.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            let capped = progress.min(PROGRESS_CAP);
            *high_water = high_water.max(capped);
            *high_water
        };
        self.dispatch(ResearchEvent::new(EventPayload::ProgressUpdate {
            progress: clamped,
            message: message.into(),
            stats,
        }));
    }

    /// Emits a finding-discovered event.
    pub fn finding(&self, finding: &str, source_ids: Vec<String>) {
        self.dispatch(ResearchEvent::new(EventPayload::FindingDiscovered {
            finding: finding.to_string(),
            confidence: "medium".to_string(),
            source_ids,
        }));
    }

    /// Emits the terminal completed event.
    pub fn completed(&self, total_duration_ms: u64, final_quality: f64) {
        self.dispatch(ResearchEvent::new(EventPayload::Completed {
            total_duration_ms,
            final_quality,
        }));
    }

    fn dispatch(&self, event: ResearchEvent) {
        if let Some(ref callback) = self.on_progress {
            callback(&event);
        }
        if let Some(ref tx) = self.channel {
            if tx.send(event).is_err() {
                debug!("event receiver dropped, continuing without stream");
            }
        }
    }
}

impl std::fmt::Debug for EventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSink")
            .field("streaming", &self.channel.is_some())
            .field("callback", &self.on_progress.is_some())
            .finish()
    }
}
