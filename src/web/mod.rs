//! Web collaborator contracts: search and scrape backends.
//!
//! The engine treats the concrete web search and content extraction
//! implementations as pluggable collaborators, the same way the LLM
//! backend hides behind [`LlmProvider`](crate::agent::LlmProvider). Any
//! provider returning the wire types below is acceptable; the engine
//! never sees HTML, PDFs, or redirects — scrapers hand back plain
//! extracted text.

pub mod cache;
pub mod url;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ResearchError;

/// Search vertical requested by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    /// General web search.
    Web,
    /// News search.
    News,
}

impl SearchType {
    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::News => "news",
        }
    }
}

impl std::fmt::Display for SearchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single hit returned by a search backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    /// Result URL as returned by the backend (not yet canonicalized).
    pub url: String,
    /// Result title.
    pub title: String,
    /// Short result snippet, when the backend provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

/// Response from a search backend call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Hits in backend ranking order.
    pub results: Vec<SearchHit>,
}

/// Options for a single search call.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Maximum number of results to request.
    pub max_results: usize,
    /// Search vertical.
    pub search_type: SearchType,
    /// Per-call timeout enforced by the engine.
    pub timeout: Duration,
    /// Whether the engine's instance-owned cache may serve this call.
    pub cache: bool,
}

/// Options for a single scrape call.
#[derive(Debug, Clone)]
pub struct ScrapeOptions {
    /// Per-call timeout enforced by the engine.
    pub timeout: Duration,
    /// Maximum extracted-text length in characters.
    pub max_content_length: usize,
    /// Whether the engine's instance-owned cache may serve this call.
    pub cache: bool,
}

/// Plain extracted text for one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapedPage {
    /// Page title.
    pub title: String,
    /// Extracted text body.
    pub content: String,
}

/// Trait for web search backends.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &'static str;

    /// Runs a search and returns ranked hits.
    ///
    /// # Errors
    ///
    /// Returns [`ResearchError::Search`] when the backend is
    /// unavailable or the call times out.
    async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<SearchResponse, ResearchError>;
}

/// Trait for content extraction backends.
#[async_trait]
pub trait Scraper: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &'static str;

    /// Fetches a URL and returns its extracted plain text.
    ///
    /// # Errors
    ///
    /// Returns [`ResearchError::Scrape`] when the fetch or extraction
    /// fails or the call times out.
    async fn scrape(&self, url: &str, options: &ScrapeOptions)
    -> Result<ScrapedPage, ResearchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_type_roundtrip() {
        assert_eq!(SearchType::Web.as_str(), "web");
        assert_eq!(SearchType::News.to_string(), "news");
        let json = serde_json::to_string(&SearchType::News).unwrap_or_default();
        assert_eq!(json, "\"news\"");
    }

    #[test]
    fn test_search_hit_snippet_omitted() {
        let hit = SearchHit {
            url: "https://example.org/".to_string(),
            title: "Example".to_string(),
            snippet: None,
        };
        let json = serde_json::to_string(&hit).unwrap_or_default();
        assert!(!json.contains("snippet"));
    }
}
