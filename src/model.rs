//! In-memory representation of a coverage comparison. A profile is parsed
//! into `StatementRange`s, folded into a `CoverageGroup` per run, and two
//! groups are compared into a `ChangeSet`.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use crate::error::{CovgateError, Result};

/// Compute a coverage ratio. A zero total counts as fully covered.
#[must_use]
pub fn rate(covered: u64, total: u64) -> f64 {
    if total == 0 {
        1.0
    } else {
        covered as f64 / total as f64
    }
}

/// Whether `covered / total` is strictly below `threshold_pct` percent.
///
/// Compared as `covered * 100 < threshold_pct * total` so a ratio exactly at
/// a fractional threshold such as 69.9% is not pushed below it by rounding
/// the threshold into a ratio. Files without statements are never below.
#[must_use]
pub fn is_below(covered: u64, total: u64, threshold_pct: f64) -> bool {
    total > 0 && (covered as f64) * 100.0 < threshold_pct * total as f64
}

/// One instrumented block from a coverage profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementRange {
    pub path: String,
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
    pub num_statements: u64,
    pub hit_count: u64,
}

impl StatementRange {
    #[must_use]
    pub fn is_covered(&self) -> bool {
        self.hit_count > 0
    }
}

/// Statement coverage for a single source file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileCoverage {
    pub path: String,
    pub total_statements: u64,
    pub covered_statements: u64,
    /// Deep link into the rendered line-coverage view, once annotated.
    pub line_cov_link: Option<String>,
}

impl FileCoverage {
    pub fn new(path: impl Into<String>, covered_statements: u64, total_statements: u64) -> Self {
        Self {
            path: path.into(),
            total_statements,
            covered_statements,
            line_cov_link: None,
        }
    }

    #[must_use]
    pub fn ratio(&self) -> f64 {
        rate(self.covered_statements, self.total_statements)
    }

    #[must_use]
    pub fn has_statements(&self) -> bool {
        self.total_statements > 0
    }

    #[must_use]
    pub fn is_below(&self, threshold_pct: f64) -> bool {
        is_below(self.covered_statements, self.total_statements, threshold_pct)
    }
}

/// Per-file coverage for one profile, plus the threshold (in percent) it is
/// judged by.
///
/// Paths are unique within a group and the statement total fits in a `u64`. The order of `files` is the order the
/// report renders, so it only changes through [`crate::calc::sort_coverages`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageGroup {
    files: Vec<FileCoverage>,
    threshold_pct: f64,
}

impl CoverageGroup {
    /// Build a group, rejecting duplicate paths and totals that overflow.
    pub fn from_files(files: Vec<FileCoverage>, threshold_pct: f64) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut total: u64 = 0;
        for f in &files {
            if !seen.insert(f.path.as_str()) {
                return Err(CovgateError::Other(format!(
                    "duplicate file '{}' in coverage group",
                    f.path
                )));
            }
            total = total
                .checked_add(f.total_statements)
                .ok_or_else(|| CovgateError::CountOverflow {
                    path: f.path.clone(),
                })?;
        }
        Ok(Self {
            files,
            threshold_pct,
        })
    }

    /// Callers guarantee unique paths and a total that fits.
    pub(crate) fn from_unique(files: Vec<FileCoverage>, threshold_pct: f64) -> Self {
        Self {
            files,
            threshold_pct,
        }
    }

    #[must_use]
    pub fn files(&self) -> &[FileCoverage] {
        &self.files
    }

    pub(crate) fn files_mut(&mut self) -> &mut Vec<FileCoverage> {
        &mut self.files
    }

    #[must_use]
    pub fn get(&self, path: &str) -> Option<&FileCoverage> {
        self.files.iter().find(|f| f.path == path)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    #[must_use]
    pub fn threshold_pct(&self) -> f64 {
        self.threshold_pct
    }

    #[must_use]
    pub fn total_statements(&self) -> u64 {
        self.files.iter().map(|f| f.total_statements).sum()
    }

    #[must_use]
    pub fn covered_statements(&self) -> u64 {
        self.files.iter().map(|f| f.covered_statements).sum()
    }

    /// Covered over total across the whole group, not a mean of file ratios.
    #[must_use]
    pub fn ratio(&self) -> f64 {
        rate(self.covered_statements(), self.total_statements())
    }

    /// Files with statements whose ratio is below the group threshold.
    pub fn low_files(&self) -> impl Iterator<Item = &FileCoverage> {
        self.files
            .iter()
            .filter(move |f| f.is_below(self.threshold_pct))
    }
}

/// How a file's coverage moved between the base and new profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Only in the new profile.
    Added,
    /// Only in the base profile, and the file is in scope for this change.
    Removed,
    /// Only in the base profile because the concerned-file filter left it out.
    OutOfScope,
    Unchanged,
    Improved,
    Regressed,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Added => "new",
            ChangeKind::Removed => "removed",
            ChangeKind::OutOfScope => "out of scope",
            ChangeKind::Unchanged => "unchanged",
            ChangeKind::Improved => "improved",
            ChangeKind::Regressed => "regressed",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coverage delta for one file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileChange {
    pub path: String,
    pub base_ratio: Option<f64>,
    pub new_ratio: Option<f64>,
    pub kind: ChangeKind,
    /// Statements in the new profile; zero when the file is absent there.
    pub new_statements: u64,
    pub new_covered: u64,
    pub line_cov_link: Option<String>,
}

impl FileChange {
    /// `new - base`, only when the file exists on both sides.
    #[must_use]
    pub fn delta(&self) -> Option<f64> {
        match (self.base_ratio, self.new_ratio) {
            (Some(base), Some(new)) => Some(new - base),
            _ => None,
        }
    }

    /// Whether this row belongs in the report.
    #[must_use]
    pub fn is_reportable(&self) -> bool {
        self.kind != ChangeKind::OutOfScope
    }
}

/// Result of comparing a base group against a new group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeSet {
    pub changes: Vec<FileChange>,
    pub base_ratio: f64,
    pub new_ratio: f64,
    pub new_statements: u64,
    pub new_covered: u64,
    pub threshold_pct: f64,
    pub is_coverage_low: bool,
}

impl ChangeSet {
    /// Aggregate delta, computed from the aggregate ratios.
    #[must_use]
    pub fn delta(&self) -> f64 {
        self.new_ratio - self.base_ratio
    }

    pub fn reportable(&self) -> impl Iterator<Item = &FileChange> {
        self.changes.iter().filter(|c| c.is_reportable())
    }

    /// True when there is nothing to report.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reportable().next().is_none()
    }

    #[must_use]
    pub fn get(&self, path: &str) -> Option<&FileChange> {
        self.changes.iter().find(|c| c.path == path)
    }
}
