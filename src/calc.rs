//! Folding statement ranges into per-file coverage, restricting the result
//! to the files a change touches, and putting it in report order.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use crate::error::{CovgateError, Result};
use crate::model::{CoverageGroup, FileCoverage, StatementRange};
use crate::parsers::ProfileParser;

/// Repository files touched by a pull request, as profile paths.
///
/// An empty set means "no filtering".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConcernedFiles(BTreeSet<String>);

impl ConcernedFiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>) {
        self.0.insert(path.into());
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.0.contains(path)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Whether `path` survives filtering. Everything passes an empty set.
    #[must_use]
    pub fn admits(&self, path: &str) -> bool {
        self.is_empty() || self.contains(path)
    }
}

impl<S: Into<String>> FromIterator<S> for ConcernedFiles {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Supplies the concerned files for a run, e.g. from a pull request.
pub trait ConcernedFileSource {
    fn concerned_files(&self) -> Result<ConcernedFiles>;
}

/// Group ranges by file and sum statement and hit counts, keeping only
/// concerned files. The result is ordered by path.
///
/// Fails with `CountOverflow` when the statements of the kept files do not
/// fit in a `u64`.
pub fn aggregate(
    ranges: &[StatementRange],
    concerned: Option<&ConcernedFiles>,
    threshold_pct: f64,
) -> Result<CoverageGroup> {
    let mut by_path: BTreeMap<&str, (u64, u64)> = BTreeMap::new();
    let mut group_total: u64 = 0;

    for range in ranges {
        if let Some(filter) = concerned {
            if !filter.admits(&range.path) {
                continue;
            }
        }
        let overflow = || CovgateError::CountOverflow {
            path: range.path.clone(),
        };
        group_total = group_total
            .checked_add(range.num_statements)
            .ok_or_else(overflow)?;

        // Per-file sums are bounded by the group total.
        let (covered, total) = by_path.entry(range.path.as_str()).or_default();
        *total += range.num_statements;
        if range.is_covered() {
            *covered += range.num_statements;
        }
    }

    let files = by_path
        .into_iter()
        .map(|(path, (covered, total))| FileCoverage::new(path, covered, total))
        .collect();
    Ok(CoverageGroup::from_unique(files, threshold_pct))
}

/// Parse a profile and aggregate it in one step. Parse errors propagate
/// before any group exists.
pub fn cov_list(
    parser: &dyn ProfileParser,
    profile: &[u8],
    concerned: Option<&ConcernedFiles>,
    threshold_pct: f64,
) -> Result<CoverageGroup> {
    let ranges = parser.parse(profile)?;
    let group = aggregate(&ranges, concerned, threshold_pct)?;
    debug!(
        "aggregated {} ranges into {} files ({} bytes of profile)",
        ranges.len(),
        group.len(),
        profile.len()
    );
    Ok(group)
}

/// Put a group in report order: worst coverage first, ties by path.
#[must_use]
pub fn sort_coverages(mut group: CoverageGroup) -> CoverageGroup {
    group.files_mut().sort_by(|a, b| {
        a.ratio()
            .total_cmp(&b.ratio())
            .then_with(|| a.path.cmp(&b.path))
    });
    group
}

/// Sort the group and give every file a link to its anchor in the rendered
/// line-coverage page. The anchor index is the file's position in report
/// order, so a row and its link always agree.
#[must_use]
pub fn annotate_links(group: CoverageGroup, base_url: &str) -> CoverageGroup {
    let mut group = sort_coverages(group);
    for (i, file) in group.files_mut().iter_mut().enumerate() {
        let link = format!("{base_url}#file{i}");
        debug!("{} -> {}", file.path, link);
        file.line_cov_link = Some(link);
    }
    group
}
