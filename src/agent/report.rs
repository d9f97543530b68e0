//! Structured report parsed from the synthesis Markdown.
//!
//! The heading contract is deliberately simple and is not a full
//! Markdown parser: the first `# ` line is the report title, each
//! `## ` line starts a section, and a section's content is everything
//! up to the next `## `. Deeper headings stay inside their section.

use serde::Serialize;

/// One titled section of the report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportSection {
    /// Section title (text after `## `).
    pub title: String,
    /// Section body, trimmed.
    pub content: String,
}

/// The parsed research report.
#[derive(Debug, Clone, Serialize)]
pub struct ResearchReport {
    /// Report title; falls back to the original query when the model
    /// produced no `# ` heading.
    pub title: String,
    /// Executive summary: the content of the section whose title
    /// contains "summary" (case-insensitive), else the first section's
    /// content, else empty.
    pub summary: String,
    /// Sections in document order.
    pub sections: Vec<ReportSection>,
}

/// Splits synthesis Markdown into a titled, sectioned report.
#[must_use]
pub fn parse_report(markdown: &str, fallback_title: &str) -> ResearchReport {
    let mut title: Option<String> = None;
    let mut sections: Vec<ReportSection> = Vec::new();
    let mut current: Option<(String, Vec<&str>)> = None;

    for line in markdown.lines() {
        if let Some(heading) = line.strip_prefix("## ") {
            if let Some((section_title, body)) = current.take() {
                sections.push(ReportSection {
                    title: section_title,
                    content: body.join("\n").trim().to_string(),
                });
            }
            current = Some((heading.trim().to_string(), Vec::new()));
        } else if let Some(heading) = line.strip_prefix("# ") {
            if title.is_none() && current.is_none() {
                title = Some(heading.trim().to_string());
            } else if let Some((_, ref mut body)) = current {
                body.push(line);
            }
        } else if let Some((_, ref mut body)) = current {
            body.push(line);
        }
    }
    if let Some((section_title, body)) = current.take() {
        sections.push(ReportSection {
            title: section_title,
            content: body.join("\n").trim().to_string(),
        });
    }

    let summary = sections
        .iter()
        .find(|s| s.title.to_lowercase().contains("summary"))
        .or_else(|| sections.first())
        .map(|s| s.content.clone())
        .unwrap_or_default();

    ResearchReport {
        title: title.unwrap_or_else(|| fallback_title.to_string()),
        summary,
        sections,
    }
}
