//! Per-step control policy for the research loop.
//!
//! Before every model step the controller inspects live counters and
//! decides which tools the model may call, whether one is forced, and
//! whether the loop should stop early. The policy is a pure function of
//! `(step_number, sources, scraped, preset)`, which keeps it
//! deterministic and directly testable.

use super::effort::EffortPreset;
use super::tool::ToolName;

/// Why the controller stopped the loop before the step budget ran out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Source cap reached and the scrape target met.
    SourcesLimitReached,
}

impl StopReason {
    /// Returns the wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SourcesLimitReached => "sources_limit_reached",
        }
    }
}

/// The controller's decision for one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepPlan {
    /// Tools the model may call on this step.
    pub active_tools: Vec<ToolName>,
    /// Tool the model must call, when the phase demands it.
    pub forced: Option<ToolName>,
    /// Early-stop signal; when set, the step is not executed.
    pub stop_reason: Option<StopReason>,
}

/// Computes the tool plan for step `step_number` (1-based).
///
/// Clauses are evaluated in order; the first match wins:
///
/// | # | Predicate | Action |
/// |---|-----------|--------|
/// | S | `sources ≥ max ∧ scraped ≥ target` | stop: `sources_limit_reached` |
/// | P | `step ≤ ⌊steps·0.6⌋ ∧ sources > 5 ∧ scraped/sources < 0.5` | force `scrape` |
/// | F | `step ≤ search_steps ∧ sources < max` | force `search` |
/// | C | `step ≤ ⌊steps·0.8⌋ ∧ scraped < target ∧ sources > scraped` | force `scrape` |
/// | H | `sources > 2·scraped` | all tools, scrape hinted first |
/// | — | otherwise | all tools |
///
/// Scrape pressure (P) pre-empts the search phase (F): once more than
/// five sources exist with less than half of them scraped, extraction
/// takes priority, and search resumes when the ratio recovers.
/// Stop-early always wins over every force clause.
#[must_use]
pub fn prepare_step(
    step_number: usize,
    sources: usize,
    scraped: usize,
    preset: &EffortPreset,
) -> StepPlan {
    let max_steps = preset.max_steps;
    let target = preset.sources_to_scrape();

    // S: budget satisfied on both axes.
    if sources >= preset.max_sources && scraped >= target {
        return StepPlan {
            active_tools: vec![ToolName::Status],
            forced: None,
            stop_reason: Some(StopReason::SourcesLimitReached),
        };
    }

    // P: scrape pressure — under half the pool extracted.
    if step_number <= max_steps * 6 / 10 && sources > 5 && scraped * 2 < sources {
        return StepPlan {
            active_tools: vec![ToolName::Scrape, ToolName::RecordFinding, ToolName::Status],
            forced: Some(ToolName::Scrape),
            stop_reason: None,
        };
    }

    // F: search phase while the pool has room.
    if step_number <= preset.search_steps() && sources < preset.max_sources {
        return StepPlan {
            active_tools: vec![ToolName::Search, ToolName::Status],
            forced: Some(ToolName::Search),
            stop_reason: None,
        };
    }

    // C: catch-up extraction toward the scrape target.
    if step_number <= max_steps * 8 / 10 && scraped < target && sources > scraped {
        return StepPlan {
            active_tools: vec![
                ToolName::Scrape,
                ToolName::RecordFinding,
                ToolName::Search,
                ToolName::Status,
            ],
            forced: Some(ToolName::Scrape),
            stop_reason: None,
        };
    }

    // H: large unscraped backlog — hint scrape by listing it first.
    if sources > 2 * scraped {
        return StepPlan {
            active_tools: vec![
                ToolName::Scrape,
                ToolName::Search,
                ToolName::RecordFinding,
                ToolName::Status,
            ],
            forced: None,
            stop_reason: None,
        };
    }

    StepPlan {
        active_tools: vec![
            ToolName::Search,
            ToolName::Scrape,
            ToolName::RecordFinding,
            ToolName::Status,
        ],
        forced: None,
        stop_reason: None,
    }
}
