//! Agentic deep-research core.
//!
//! Provides the phase-aware tool loop that coordinates an LLM against
//! the four research tools while background scraping and map-reduce
//! summarization run alongside, finishing with a single long-form
//! synthesis pass.
//!
//! # Architecture
//!
//! ```text
//! research(query, effort) → Orchestrator
//!   ├── Step loop (prepare_step policy gates/forces the tool set)
//!   │   ├── search  ──→ BackgroundScraper (≤5 URLs, 3 in flight)
//!   │   ├── scrape / record_finding / get_research_status
//!   │   └── step-finish hook → BatchSummarizer (batches of 5, unawaited)
//!   ├── Synthesizer (drain summaries → tail flush → one generation)
//!   │   └── Markdown → titled sections → UI patches
//!   └── completed event + ResearchOutcome
//! ```
//!
//! Every run owns a single [`state::ResearchState`] behind a per-run
//! lock; tools and hooks are its only writers.

pub mod agentic_loop;
pub mod background;
pub mod client;
pub mod config;
pub mod effort;
pub mod engine;
pub mod event;
pub mod executor;
pub mod message;
pub mod orchestrator;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod report;
pub mod state;
pub mod step;
pub mod summarizer;
pub mod synthesizer;
pub mod tool;

// Re-export key types
pub use config::EngineConfig;
pub use effort::{effort_of, EffortLevel, EffortPreset, ReportTarget};
pub use engine::{ResearchEngine, ResearchRun};
pub use event::{
    EventPayload, PatchCallback, ProgressCallback, ProgressStats, ResearchEvent, RESEARCH_ID,
};
pub use executor::ToolInput;
pub use message::{ChatMessage, ChatRequest, ChatResponse, Role, TokenUsage};
pub use orchestrator::{ResearchOptions, ResearchOutcome, RunStats};
pub use prompt::PromptSet;
pub use provider::LlmProvider;
pub use report::{ReportSection, ResearchReport};
pub use state::{BatchSummary, ResearchState, SourceInfo, StatusSnapshot};
pub use step::{prepare_step, StepPlan, StopReason};
pub use tool::{ToolCall, ToolDefinition, ToolName, ToolResult, ToolSet};
