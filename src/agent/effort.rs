//! Effort presets for research runs.
//!
//! An effort level fixes the step budget, source caps, parallelism,
//! and timeouts for the whole run. The preset is frozen at run entry;
//! the quantities the step controller needs are pure functions of it,
//! making the control policy deterministic and easy to test.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Named effort level selecting a run budget.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffortLevel {
    /// Balanced budget for everyday questions.
    #[default]
    Standard,
    /// Wider source pool and longer loop for involved topics.
    Deep,
    /// Maximum budget for exhaustive reports.
    Max,
}

impl EffortLevel {
    /// Parses an effort level string (case-insensitive). Unknown input
    /// falls back to `Standard`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "deep" => Self::Deep,
            "max" => Self::Max,
            _ => Self::Standard,
        }
    }

    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Deep => "deep",
            Self::Max => "max",
        }
    }
}

impl std::fmt::Display for EffortLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable budget record for one run.
///
/// `quality_threshold` and `auto_stop_on_quality` are carried for
/// frontends that display them; the agentic core never consults them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffortPreset {
    /// The level this preset belongs to.
    pub level: EffortLevel,
    /// Maximum model steps in the tool loop.
    pub max_steps: usize,
    /// Overall run timeout.
    pub timeout: Duration,
    /// Maximum distinct sources collected.
    pub max_sources: usize,
    /// Background parallelism hint for frontends.
    pub parallelism: usize,
    /// Follow-link recursion depth hint for frontends.
    pub recursion_depth: usize,
    /// Declared quality bar for the final report.
    pub quality_threshold: f64,
    /// Whether a frontend may stop early once the bar is met.
    pub auto_stop_on_quality: bool,
}

/// Word and section targets for the final report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportTarget {
    /// Minimum word count for the synthesis.
    pub min_words: usize,
    /// Minimum number of `##` sections.
    pub min_sections: usize,
}

/// Returns the process-wide preset for an effort level.
///
/// # Preset Table
///
/// | Level    | Steps | Timeout | Sources | Parallelism | Depth | Quality |
/// |----------|-------|---------|---------|-------------|-------|---------|
/// | Standard | 50    | 300 s   | 25      | 10          | 1     | 0.75    |
/// | Deep     | 100   | 900 s   | 50      | 15          | 2     | 0.80    |
/// | Max      | 200   | 2700 s  | 100     | 20          | 3     | 0.90    |
#[must_use]
pub const fn effort_of(level: EffortLevel) -> EffortPreset {
    match level {
        EffortLevel::Standard => EffortPreset {
            level,
            max_steps: 50,
            timeout: Duration::from_secs(300),
            max_sources: 25,
            parallelism: 10,
            recursion_depth: 1,
            quality_threshold: 0.75,
            auto_stop_on_quality: true,
        },
        EffortLevel::Deep => EffortPreset {
            level,
            max_steps: 100,
            timeout: Duration::from_secs(900),
            max_sources: 50,
            parallelism: 15,
            recursion_depth: 2,
            quality_threshold: 0.80,
            auto_stop_on_quality: true,
        },
        EffortLevel::Max => EffortPreset {
            level,
            max_steps: 200,
            timeout: Duration::from_secs(2700),
            max_sources: 100,
            parallelism: 20,
            recursion_depth: 3,
            quality_threshold: 0.90,
            auto_stop_on_quality: true,
        },
    }
}

impl EffortPreset {
    /// Number of leading steps reserved for the search phase.
    ///
    /// Standard ⌊steps·0.3⌋, deep ⌊steps·0.25⌋, max ⌊steps·0.2⌋.
    #[must_use]
    pub const fn search_steps(&self) -> usize {
        match self.level {
            EffortLevel::Standard => self.max_steps * 3 / 10,
            EffortLevel::Deep => self.max_steps / 4,
            EffortLevel::Max => self.max_steps / 5,
        }
    }

    /// Number of sources the run aims to scrape.
    ///
    /// Standard ⌈sources·0.6⌉, deep ⌈sources·0.7⌉, max ⌈sources·0.8⌉.
    #[must_use]
    pub const fn sources_to_scrape(&self) -> usize {
        match self.level {
            EffortLevel::Standard => (self.max_sources * 6).div_ceil(10),
            EffortLevel::Deep => (self.max_sources * 7).div_ceil(10),
            EffortLevel::Max => (self.max_sources * 8).div_ceil(10),
        }
    }

    /// Minimum number of findings the instruction text asks for.
    #[must_use]
    pub const fn min_findings(&self) -> usize {
        match self.level {
            EffortLevel::Standard => 10,
            EffortLevel::Deep => 20,
            EffortLevel::Max => 30,
        }
    }

    /// Word and section targets for the final report.
    #[must_use]
    pub const fn report_target(&self) -> ReportTarget {
        match self.level {
            EffortLevel::Standard => ReportTarget {
                min_words: 2_000,
                min_sections: 4,
            },
            EffortLevel::Deep => ReportTarget {
                min_words: 3_500,
                min_sections: 6,
            },
            EffortLevel::Max => ReportTarget {
                min_words: 5_000,
                min_sections: 8,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(EffortLevel::Standard, 50, 25, 300; "standard budget")]
    #[test_case(EffortLevel::Deep, 100, 50, 900; "deep budget")]
    #[test_case(EffortLevel::Max, 200, 100, 2700; "max budget")]
    fn test_preset_values(level: EffortLevel, steps: usize, sources: usize, timeout_s: u64) {
        let preset = effort_of(level);
        assert_eq!(preset.max_steps, steps);
        assert_eq!(preset.max_sources, sources);
        assert_eq!(preset.timeout, Duration::from_secs(timeout_s));
    }

    #[test_case(EffortLevel::Standard, 15, 15; "standard derived")]
    #[test_case(EffortLevel::Deep, 25, 35; "deep derived")]
    #[test_case(EffortLevel::Max, 40, 80; "max derived")]
    fn test_derived_quantities(level: EffortLevel, search_steps: usize, to_scrape: usize) {
        let preset = effort_of(level);
        assert_eq!(preset.search_steps(), search_steps);
        assert_eq!(preset.sources_to_scrape(), to_scrape);
    }

    #[test]
    fn test_min_findings_scale_with_effort() {
        assert!(
            effort_of(EffortLevel::Standard).min_findings()
                < effort_of(EffortLevel::Deep).min_findings()
        );
        assert!(
            effort_of(EffortLevel::Deep).min_findings()
                < effort_of(EffortLevel::Max).min_findings()
        );
    }

    #[test]
    fn test_level_parse() {
        assert_eq!(EffortLevel::parse("DEEP"), EffortLevel::Deep);
        assert_eq!(EffortLevel::parse("max"), EffortLevel::Max);
        assert_eq!(EffortLevel::parse("anything"), EffortLevel::Standard);
    }

    #[test]
    fn test_report_target_sections() {
        assert_eq!(effort_of(EffortLevel::Standard).report_target().min_sections, 4);
        assert_eq!(effort_of(EffortLevel::Max).report_target().min_words, 5_000);
    }
}
