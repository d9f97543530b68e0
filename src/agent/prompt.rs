//! System prompts and template builders for the research agents.
//!
//! Prompts are the core instructions that define the loop's behavior.
//! The compiled-in defaults can be overridden per-file from a prompt
//! directory; quantitative budget lines are always appended from the
//! effort preset so templates cannot drift from the control policy.

use std::fmt::Write;
use std::path::Path;

use super::effort::EffortPreset;
use super::state::{BatchSummary, SourceInfo};

/// System prompt preamble for the research loop agent.
pub const RESEARCH_SYSTEM_PROMPT: &str = r"You are an autonomous deep-research agent. You investigate a question by searching the open web, extracting source content, and recording findings, then a final synthesis pass turns your work into a long-form cited report.

## Research Phases

1. Comprehensive Search - cast a wide net with varied queries (web and news) until the source pool is full.
2. Deep Content Extraction - scrape the most promising sources; prefer primary sources and authoritative domains.
3. Finding Extraction - record each distinct fact, figure, quote, or insight as its own finding while reading.
4. Final Synthesis - performed automatically after your last step; you do not write the report yourself.

## Critical Rules

- Search with diverse, specific queries; do not repeat a query that already returned results.
- Scrape before you conclude: claims need extracted content behind them, not snippets.
- Record findings continuously as you read - never save them for the end.
- Each finding must be specific and self-contained: the actual figure, date, quote, or claim with its source.
- Check get_research_status when unsure of progress against the targets below.
- Some tools may be unavailable on a given step; work with the tools offered.";

/// System prompt for the batch summarization agent.
pub const BATCH_SUMMARY_SYSTEM_PROMPT: &str = r"You are a research summarization agent. You condense batches of scraped web sources into dense briefing notes for a downstream report writer.

Write a structured summary of 500-800 words covering, across all sources in the batch:
- Key facts and figures, with which source each came from.
- Notable direct quotes worth citing.
- Insights that emerge from reading the sources together.
- Contradictions or disagreements between sources.

Do not editorialize and do not introduce information that is not in the sources. Dense, factual prose; the writer never sees the raw pages, only your notes.";

/// System prompt preamble for the final synthesis generation.
pub const SYNTHESIS_SYSTEM_PROMPT: &str = r"You are an expert research writer. You turn recorded findings, source briefing notes, and a source list into a comprehensive, well-structured report.

## Output Format

Markdown only:
- One `# ` title line for the report.
- `## ` section headings; the first section should be an Executive Summary.
- Inline citations as [title](url) markdown links drawn from the source list.

## Quality Standards

- Every substantive claim is backed by a finding or briefing note; never invent facts or sources.
- Note contradictions between sources explicitly rather than silently picking a side.
- Organize by theme, not by source; connect findings across sources.
- Concrete detail over generalities: figures, dates, names, quoted text.";

/// Default prompt directory under the user's config.
const DEFAULT_PROMPT_DIR: &str = ".config/deepresearch-rs/prompts";

/// Filename for the research loop prompt template.
const RESEARCH_FILENAME: &str = "research.md";
/// Filename for the batch summary prompt template.
const BATCH_SUMMARY_FILENAME: &str = "batch_summary.md";
/// Filename for the synthesis prompt template.
const SYNTHESIS_FILENAME: &str = "synthesis.md";

/// A set of system prompts for the run's three LLM roles.
///
/// Loaded from external template files when available, falling back to
/// compiled-in defaults per file.
#[derive(Debug, Clone)]
pub struct PromptSet {
    /// Research loop system prompt preamble.
    pub research: String,
    /// Batch summarization system prompt.
    pub batch_summary: String,
    /// Final synthesis system prompt preamble.
    pub synthesis: String,
}

impl PromptSet {
    /// Loads prompts from the given directory, falling back to
    /// compiled-in defaults.
    ///
    /// Resolution order for the directory:
    /// 1. Explicit `prompt_dir` argument
    /// 2. `DEEPRESEARCH_PROMPT_DIR` environment variable
    /// 3. `~/.config/deepresearch-rs/prompts/`
    ///
    /// Each file is loaded independently; a missing file uses its
    /// default.
    #[must_use]
    pub fn load(prompt_dir: Option<&Path>) -> Self {
        let resolved_dir = prompt_dir
            .map(std::path::PathBuf::from)
            .or_else(|| {
                std::env::var("DEEPRESEARCH_PROMPT_DIR")
                    .ok()
                    .map(std::path::PathBuf::from)
            })
            .or_else(|| dirs::home_dir().map(|h| h.join(DEFAULT_PROMPT_DIR)));

        let load_file = |filename: &str, default: &str| -> String {
            resolved_dir
                .as_ref()
                .map(|dir| dir.join(filename))
                .and_then(|path| std::fs::read_to_string(&path).ok())
                .unwrap_or_else(|| default.to_string())
        };

        Self {
            research: load_file(RESEARCH_FILENAME, RESEARCH_SYSTEM_PROMPT),
            batch_summary: load_file(BATCH_SUMMARY_FILENAME, BATCH_SUMMARY_SYSTEM_PROMPT),
            synthesis: load_file(SYNTHESIS_FILENAME, SYNTHESIS_SYSTEM_PROMPT),
        }
    }

    /// Returns compiled-in defaults without checking the filesystem.
    #[must_use]
    pub fn defaults() -> Self {
        Self {
            research: RESEARCH_SYSTEM_PROMPT.to_string(),
            batch_summary: BATCH_SUMMARY_SYSTEM_PROMPT.to_string(),
            synthesis: SYNTHESIS_SYSTEM_PROMPT.to_string(),
        }
    }

    /// Writes the compiled-in default prompts to the given directory.
    ///
    /// Creates the directory if it does not exist. Existing files are
    /// **not** overwritten.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if directory creation or file writing fails.
    pub fn write_defaults(dir: &Path) -> std::io::Result<Vec<std::path::PathBuf>> {
        std::fs::create_dir_all(dir)?;

        let templates = [
            (RESEARCH_FILENAME, RESEARCH_SYSTEM_PROMPT),
            (BATCH_SUMMARY_FILENAME, BATCH_SUMMARY_SYSTEM_PROMPT),
            (SYNTHESIS_FILENAME, SYNTHESIS_SYSTEM_PROMPT),
        ];

        let mut written = Vec::new();
        for (filename, content) in &templates {
            let path = dir.join(filename);
            if !path.exists() {
                std::fs::write(&path, content)?;
                written.push(path);
            }
        }

        Ok(written)
    }
}

/// Builds the full system instruction for the research loop by
/// appending the preset's quantitative targets to the prompt preamble.
#[must_use]
pub fn build_system_instruction(preamble: &str, preset: &EffortPreset) -> String {
    let target = preset.report_target();
    format!(
        "{preamble}\n\n## Targets for this {level} run\n\
         - Collect up to {max_sources} distinct sources.\n\
         - Extract content from at least {to_scrape} sources.\n\
         - Record at least {min_findings} findings.\n\
         - The final report must reach at least {min_words} words across at least {min_sections} sections.\n\
         - Budget: at most {max_steps} steps.",
        level = preset.level,
        max_sources = preset.max_sources,
        to_scrape = preset.sources_to_scrape(),
        min_findings = preset.min_findings(),
        min_words = target.min_words,
        min_sections = target.min_sections,
        max_steps = preset.max_steps,
    )
}

/// One scraped source's excerpt passed to the batch prompt builder.
#[derive(Debug)]
pub struct SourceExcerpt<'a> {
    /// Source title.
    pub title: &'a str,
    /// Canonical URL.
    pub url: &'a str,
    /// Leading content excerpt (already truncated by the caller).
    pub content: &'a str,
}

/// Builds the user message for a batch summarization call.
#[must_use]
pub fn build_batch_prompt(query: &str, sources: &[SourceExcerpt<'_>]) -> String {
    let mut prompt = format!("<query>{query}</query>\n\n<sources>\n");
    for source in sources {
        let _ = write!(
            prompt,
            "<source title=\"{title}\" url=\"{url}\">\n{content}\n</source>\n\n",
            title = source.title,
            url = source.url,
            content = source.content,
        );
    }
    prompt.push_str("</sources>\n\nSummarize this batch for the report writer.");
    prompt
}

/// Maximum sources listed in the synthesis prompt and UI patches.
pub const SYNTHESIS_SOURCE_LIMIT: usize = 30;

/// Builds the final synthesis prompt from the run's accumulated state.
///
/// Concatenates the query and optional caller context, the numbered
/// findings, the first thirty sources, every batch summary in batch
/// order, and the effort-keyed instruction block.
#[must_use]
pub fn build_synthesis_prompt(
    query: &str,
    context: Option<&str>,
    findings: &[String],
    sources: &[SourceInfo],
    summaries: &[BatchSummary],
    preset: &EffortPreset,
) -> String {
    let mut prompt = format!("<query>{query}</query>\n");
    if let Some(context) = context {
        let _ = write!(prompt, "\n<context>\n{context}\n</context>\n");
    }

    prompt.push_str("\n<findings>\n");
    if findings.is_empty() {
        prompt.push_str("(no findings were recorded)\n");
    }
    for (i, finding) in findings.iter().enumerate() {
        let _ = writeln!(prompt, "{}. {finding}", i + 1);
    }
    prompt.push_str("</findings>\n\n<sources>\n");

    for source in sources.iter().take(SYNTHESIS_SOURCE_LIMIT) {
        let _ = writeln!(prompt, "- [{}]({})", source.title, source.url);
    }
    prompt.push_str("</sources>\n\n<briefing-notes>\n");

    for summary in summaries {
        let _ = write!(
            prompt,
            "### Batch {num} ({count} sources)\n{text}\n\n",
            num = summary.batch_num,
            count = summary.source_count,
            text = summary.summary,
        );
    }
    prompt.push_str("</briefing-notes>\n\n");

    let target = preset.report_target();
    let _ = write!(
        prompt,
        "Write the final {level}-effort research report now. at least {min_words} words and \
         at least {min_sections} `## ` sections, starting with an Executive Summary section. \
         Cite sources inline as markdown links.",
        level = preset.level,
        min_words = target.min_words,
        min_sections = target.min_sections,
    );
    prompt
}
