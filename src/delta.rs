//! Comparing a base coverage group against a new one and deciding whether
//! the change leaves coverage too low.

use std::collections::HashMap;

use log::info;

use crate::calc::ConcernedFiles;
use crate::config::GateConfig;
use crate::model::{is_below, ChangeKind, ChangeSet, CoverageGroup, FileChange, FileCoverage};

/// Pair `base` and `new` by path and compute per-file and aggregate deltas.
///
/// Rows follow `new`'s order, then base-only files in `base`'s order. A
/// base-only file counts as `Removed` when `concerned` admits it and as
/// `OutOfScope` otherwise.
///
/// The presubmit run and `covgate compare` filter both groups by the same
/// concerned set before calling this, so they never produce `OutOfScope`
/// rows. Those rows only appear when a caller passes a `base` aggregated
/// without the filter, and they are left out of reports.
#[must_use]
pub fn diff(
    base: &CoverageGroup,
    new: &CoverageGroup,
    gate: &GateConfig,
    concerned: Option<&ConcernedFiles>,
) -> ChangeSet {
    let base_index: HashMap<&str, &FileCoverage> =
        base.files().iter().map(|f| (f.path.as_str(), f)).collect();

    let mut changes = Vec::with_capacity(base.len().max(new.len()));

    for file in new.files() {
        let base_ratio = base_index.get(file.path.as_str()).map(|b| b.ratio());
        let kind = match base_ratio {
            Some(b) => classify(file, file.ratio() - b, gate.epsilon),
            None => ChangeKind::Added,
        };
        changes.push(FileChange {
            path: file.path.clone(),
            base_ratio,
            new_ratio: Some(file.ratio()),
            kind,
            new_statements: file.total_statements,
            new_covered: file.covered_statements,
            line_cov_link: file.line_cov_link.clone(),
        });
    }

    for file in base.files() {
        if new.get(&file.path).is_some() {
            continue;
        }
        let in_scope = concerned.map_or(true, |c| c.admits(&file.path));
        changes.push(FileChange {
            path: file.path.clone(),
            base_ratio: Some(file.ratio()),
            new_ratio: None,
            kind: if in_scope {
                ChangeKind::Removed
            } else {
                ChangeKind::OutOfScope
            },
            new_statements: 0,
            new_covered: 0,
            line_cov_link: None,
        });
    }

    let mut set = ChangeSet {
        changes,
        base_ratio: base.ratio(),
        new_ratio: new.ratio(),
        new_statements: new.total_statements(),
        new_covered: new.covered_statements(),
        threshold_pct: gate.threshold_pct,
        is_coverage_low: false,
    };
    set.is_coverage_low = is_coverage_low(&set, gate);

    info!(
        "compared {} base files with {} new files: {:.1}% -> {:.1}%, low={}",
        base.len(),
        new.len(),
        set.base_ratio * 100.0,
        set.new_ratio * 100.0,
        set.is_coverage_low
    );
    set
}

fn classify(file: &FileCoverage, delta: f64, epsilon: f64) -> ChangeKind {
    if file.has_statements() && delta < -epsilon {
        ChangeKind::Regressed
    } else if delta > 0.0 {
        ChangeKind::Improved
    } else {
        ChangeKind::Unchanged
    }
}

/// The gate verdict. Low when the aggregate new ratio is below the
/// threshold, or when a regressed file ends up below it. Equality passes.
#[must_use]
pub fn is_coverage_low(set: &ChangeSet, gate: &GateConfig) -> bool {
    if is_below(set.new_covered, set.new_statements, gate.threshold_pct) {
        return true;
    }
    set.changes.iter().any(|c| {
        c.kind == ChangeKind::Regressed
            && c.new_ratio.is_some()
            && is_below(c.new_covered, c.new_statements, gate.threshold_pct)
    })
}
