//! Output formatting for coverage change sets.

use std::fmt::Write;

use crate::model::{ChangeSet, FileChange};

/// Shown in place of a table when nothing in scope changed.
pub const EMPTY_REPORT: &str = "No coverage data for the files changed in this pull request.";

const MISSING: &str = "—";

/// A rendered report plus the verdict it carries.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedReport {
    pub content: String,
    /// Nothing to report; callers should not post it.
    pub is_empty: bool,
    /// The gate verdict.
    pub is_low: bool,
}

/// Trait for formatting change sets.
pub trait ReportFormatter {
    /// Format a non-empty change set.
    fn format(&self, changes: &ChangeSet) -> String;

    /// Format the "nothing to report" state.
    fn format_empty(&self) -> String {
        format!("{EMPTY_REPORT}\n")
    }
}

/// Render a change set. Total over any change set.
#[must_use]
pub fn render(changes: &ChangeSet, formatter: &dyn ReportFormatter) -> RenderedReport {
    let is_empty = changes.is_empty();
    let content = if is_empty {
        formatter.format_empty()
    } else {
        formatter.format(changes)
    };
    RenderedReport {
        content,
        is_empty,
        is_low: changes.is_coverage_low,
    }
}

fn pct(ratio: Option<f64>) -> String {
    match ratio {
        Some(r) => format!("{:.1}%", r * 100.0),
        None => MISSING.to_string(),
    }
}

fn signed(delta: Option<f64>) -> String {
    match delta {
        Some(d) => format!("{:+.1}", d * 100.0),
        None => MISSING.to_string(),
    }
}

/// Plain text formatter.
pub struct TextFormatter;

impl ReportFormatter for TextFormatter {
    fn format(&self, changes: &ChangeSet) -> String {
        let mut out = String::new();

        writeln!(
            out,
            "{:<60} {:>8} {:>8} {:>8}  STATUS",
            "FILE", "OLD", "NEW", "DELTA"
        )
        .unwrap();
        writeln!(out, "{}", "-".repeat(96)).unwrap();

        for c in changes.reportable() {
            writeln!(
                out,
                "{:<60} {:>8} {:>8} {:>8}  {}",
                c.path,
                pct(c.base_ratio),
                pct(c.new_ratio),
                signed(c.delta()),
                c.kind
            )
            .unwrap();
        }

        writeln!(out, "{}", "-".repeat(96)).unwrap();
        writeln!(
            out,
            "{:<60} {:>8} {:>8} {:>8}",
            "TOTAL",
            pct(Some(changes.base_ratio)),
            pct(Some(changes.new_ratio)),
            signed(Some(changes.delta()))
        )
        .unwrap();

        if changes.is_coverage_low {
            let threshold = changes.threshold_pct;
            writeln!(out, "\nCoverage is below the {threshold:.1}% threshold.").unwrap();
        }
        out
    }
}

/// Markdown formatter, used for review comments.
pub struct MarkdownFormatter;

impl MarkdownFormatter {
    fn file_cell(change: &FileChange) -> String {
        let path = &change.path;
        match change.line_cov_link {
            Some(ref link) => format!("[`{path}`]({link})"),
            None => format!("`{path}`"),
        }
    }
}

impl ReportFormatter for MarkdownFormatter {
    fn format(&self, changes: &ChangeSet) -> String {
        let mut md = String::new();

        let new_pct = changes.new_ratio * 100.0;
        writeln!(md, "### Coverage: {new_pct:.1}%\n").unwrap();

        if changes.is_coverage_low {
            let threshold = changes.threshold_pct;
            writeln!(
                md,
                ":warning: Coverage of the changed files is below the **{threshold:.1}%** threshold.\n"
            )
            .unwrap();
        }

        md.push_str("| File | Old Coverage | New Coverage | Delta | Status |\n");
        md.push_str("|:-----|-------------:|-------------:|------:|:-------|\n");

        for c in changes.reportable() {
            writeln!(
                md,
                "| {} | {} | {} | {} | {} |",
                Self::file_cell(c),
                pct(c.base_ratio),
                pct(c.new_ratio),
                signed(c.delta()),
                c.kind
            )
            .unwrap();
        }

        writeln!(
            md,
            "| **Total** | **{}** | **{}** | **{}** | |",
            pct(Some(changes.base_ratio)),
            pct(Some(changes.new_ratio)),
            signed(Some(changes.delta()))
        )
        .unwrap();

        md.push_str("\n<sub>covgate</sub>\n");
        md
    }

    fn format_empty(&self) -> String {
        format!("_{EMPTY_REPORT}_\n")
    }
}
