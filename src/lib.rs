//! Autonomous multi-step deep research over the open web.
//!
//! Given a natural-language query and an effort level, the engine
//! discovers sources, extracts their content, records findings, and
//! synthesizes a structured long-form report with citations - emitting
//! a stream of progress events along the way. It is designed to be
//! embedded in chat or agent frontends.
//!
//! The concrete web search, scraping, and LLM backends are pluggable
//! collaborators (see [`web::SearchProvider`], [`web::Scraper`], and
//! [`agent::LlmProvider`]); the crate ships an `OpenAI`-compatible LLM
//! backend.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use deepresearch_rs::agent::{EngineConfig, ResearchEngine, ResearchOptions};
//! # async fn example(
//! #     search: Arc<dyn deepresearch_rs::web::SearchProvider>,
//! #     scraper: Arc<dyn deepresearch_rs::web::Scraper>,
//! # ) -> Result<(), deepresearch_rs::error::ResearchError> {
//! let config = EngineConfig::from_env()?;
//! let engine = ResearchEngine::new(config, search, scraper)?;
//! let outcome = engine
//!     .research_async("What is Rust's ownership model?", ResearchOptions::default())
//!     .await?;
//! println!("{}", outcome.synthesis);
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod error;
pub mod web;

pub use agent::{
    EffortLevel, EngineConfig, ResearchEngine, ResearchOptions, ResearchOutcome, ResearchRun,
};
pub use error::ResearchError;
