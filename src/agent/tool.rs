//! Tool type definitions for the research loop.
//!
//! Provides provider-agnostic types for tool definitions, calls, and
//! results, plus the four research tools the model drives: `search`,
//! `scrape`, `record_finding`, and `get_research_status`.

use serde::{Deserialize, Serialize};
use serde_json::json;

/// A tool definition that can be sent to an LLM for function-calling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name (must match the executor's dispatch table).
    pub name: String,
    /// Human-readable description of what the tool does.
    pub description: String,
    /// JSON Schema object describing the tool's parameters.
    pub parameters: serde_json::Value,
}

/// A tool call requested by the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this call (assigned by the provider).
    pub id: String,
    /// Name of the tool to invoke.
    pub name: String,
    /// JSON-encoded arguments for the tool.
    pub arguments: String,
}

/// The result of executing a tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// ID of the tool call this result corresponds to.
    pub tool_call_id: String,
    /// Result content (JSON string; errors are structured results too,
    /// so the model can recover by choosing another tool).
    pub content: String,
    /// Whether this result represents an unrecoverable argument error.
    pub is_error: bool,
}

/// The four research tools, used by the step controller to name the
/// subsets it allows per step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    /// Web/news search.
    Search,
    /// Foreground content extraction.
    Scrape,
    /// Record a research finding.
    RecordFinding,
    /// Report run counters.
    Status,
}

impl ToolName {
    /// Returns the wire name of the tool.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Scrape => "scrape",
            Self::RecordFinding => "record_finding",
            Self::Status => "get_research_status",
        }
    }

    /// Resolves a wire name back to a tool.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "search" => Some(Self::Search),
            "scrape" => Some(Self::Scrape),
            "record_finding" => Some(Self::RecordFinding),
            "get_research_status" => Some(Self::Status),
            _ => None,
        }
    }
}

impl std::fmt::Display for ToolName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A set of tool definitions offered to the model on one step.
#[derive(Debug, Clone, Default)]
pub struct ToolSet {
    definitions: Vec<ToolDefinition>,
}

impl ToolSet {
    /// Returns the tool definitions in this set.
    #[must_use]
    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    /// Returns `true` if this set contains no tools.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Returns the number of tools in this set.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.definitions.len()
    }

    /// All four research tools.
    #[must_use]
    pub fn research_tools() -> Self {
        Self::subset(&[
            ToolName::Search,
            ToolName::Scrape,
            ToolName::RecordFinding,
            ToolName::Status,
        ])
    }

    /// The definitions for a specific subset of tools, in the given
    /// order.
    #[must_use]
    pub fn subset(names: &[ToolName]) -> Self {
        Self {
            definitions: names
                .iter()
                .map(|name| match name {
                    ToolName::Search => def_search(),
                    ToolName::Scrape => def_scrape(),
                    ToolName::RecordFinding => def_record_finding(),
                    ToolName::Status => def_status(),
                })
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tool schema definitions
// ---------------------------------------------------------------------------

/// Defines the `search` tool.
fn def_search() -> ToolDefinition {
    ToolDefinition {
        name: ToolName::Search.as_str().to_string(),
        description: "Search the web or news for sources on a topic. Returns result URLs, \
                       titles, and snippets, and queues promising results for background \
                       content extraction."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search query text."
                },
                "search_type": {
                    "type": "string",
                    "enum": ["web", "news"],
                    "description": "Search vertical. Defaults to 'web'.",
                    "default": "web"
                }
            },
            "required": ["query"],
            "additionalProperties": false
        }),
    }
}

/// Defines the `scrape` tool.
fn def_scrape() -> ToolDefinition {
    ToolDefinition {
        name: ToolName::Scrape.as_str().to_string(),
        description: "Extract the full text content of a discovered source URL. Returns the \
                       page title, word count, leading content, and a short excerpt."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "URL of a previously discovered source."
                }
            },
            "required": ["url"],
            "additionalProperties": false
        }),
    }
}

/// Defines the `record_finding` tool.
fn def_record_finding() -> ToolDefinition {
    ToolDefinition {
        name: ToolName::RecordFinding.as_str().to_string(),
        description: "Record a specific research finding discovered in the sources. Findings \
                       feed the final report; record each distinct fact, figure, or insight \
                       as its own finding."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "finding": {
                    "type": "string",
                    "description": "The finding text."
                },
                "source": {
                    "type": "string",
                    "description": "URL of the source this finding came from."
                }
            },
            "required": ["finding"],
            "additionalProperties": false
        }),
    }
}

/// Defines the `get_research_status` tool.
fn def_status() -> ToolDefinition {
    ToolDefinition {
        name: ToolName::Status.as_str().to_string(),
        description: "Get current research progress: sources found, sources scraped, findings \
                       recorded, the scrape target, and elapsed time."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {},
            "additionalProperties": false
        }),
    }
}
