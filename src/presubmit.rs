//! The presubmit run: sequences the collaborators around the pure
//! aggregate, diff and render stages.
//!
//! Order of a run:
//!   1. concerned files (an empty set ends the run, nothing to check)
//!   2. aggregate the new profile
//!   3. render the line-coverage page from the new profile restricted to
//!      concerned files, and annotate links (best effort)
//!   4. fetch and aggregate the base profile
//!   5. diff, render, archive, and comment when there is something to say
//!
//! Parse and fetch failures end the run before anything is published.

use log::{error, info, warn};

use crate::calc::{self, ConcernedFileSource, ConcernedFiles};
use crate::config::GateConfig;
use crate::delta;
use crate::error::{CovgateError, Result};
use crate::html::LineCovRenderer;
use crate::links::LinkTemplate;
use crate::model::{ChangeSet, CoverageGroup};
use crate::parsers::ProfileParser;
use crate::profile::ProfileSource;
use crate::publish::{CommentPoster, ReportArchive};
use crate::report::{self, RenderedReport, ReportFormatter};

/// How a presubmit run ended.
#[derive(Debug)]
pub enum Outcome {
    /// The pull request touches no concerned files.
    NothingToCheck,
    Checked {
        changes: ChangeSet,
        report: RenderedReport,
        commented: bool,
    },
}

impl Outcome {
    /// The gate verdict for the run.
    #[must_use]
    pub fn is_coverage_low(&self) -> bool {
        match self {
            Outcome::NothingToCheck => false,
            Outcome::Checked { report, .. } => report.is_low,
        }
    }
}

/// Everything a run needs, passed in explicitly.
pub struct Presubmit<'a> {
    pub gate: GateConfig,
    pub parser: &'a dyn ProfileParser,
    pub new_profile: &'a dyn ProfileSource,
    pub base_profile: &'a dyn ProfileSource,
    /// Without a source, no filtering is applied.
    pub concerned: Option<&'a dyn ConcernedFileSource>,
    pub line_cov: Option<&'a dyn LineCovRenderer>,
    pub links: Option<&'a dyn LinkTemplate>,
    pub formatter: &'a dyn ReportFormatter,
    pub archive: &'a dyn ReportArchive,
    pub commenter: Option<&'a dyn CommentPoster>,
}

impl Presubmit<'_> {
    pub fn run(&self) -> Result<Outcome> {
        info!("starting presubmit run");

        let concerned = match self.concerned {
            Some(source) => {
                let files = source.concerned_files()?;
                if files.is_empty() {
                    info!("no concerned files in this change, nothing to check");
                    return Ok(Outcome::NothingToCheck);
                }
                info!("{} concerned files", files.len());
                Some(files)
            }
            None => None,
        };

        let new_bytes = self.new_profile.read_profile()?;
        let g_new = self.aggregate(
            &new_bytes,
            concerned.as_ref(),
            "new",
            &self.new_profile.describe(),
        )?;
        let key_profile = self.parser.filter(&new_bytes, &|path: &str| {
            concerned.as_ref().map_or(true, |c| c.admits(path))
        });
        let g_new = self.annotate(g_new, &key_profile);

        let base_bytes = self.base_profile.read_profile().map_err(|e| {
            let e = match e {
                CovgateError::Fetch(_) => e,
                other => {
                    CovgateError::Fetch(format!("{}: {other}", self.base_profile.describe()))
                }
            };
            error!("{e}");
            e
        })?;
        let g_base = calc::sort_coverages(self.aggregate(
            &base_bytes,
            concerned.as_ref(),
            "base",
            &self.base_profile.describe(),
        )?);

        let changes = delta::diff(&g_base, &g_new, &self.gate, concerned.as_ref());
        let report = report::render(&changes, self.formatter);

        self.archive.write_report(&report.content)?;

        let mut commented = false;
        if report.is_empty {
            info!("report is empty, not commenting");
        } else if let Some(commenter) = self.commenter {
            commenter.clean_and_post(&report.content)?;
            commented = true;
        }

        info!(
            "completed presubmit run: {} changes, coverage low: {}",
            changes.changes.len(),
            report.is_low
        );
        Ok(Outcome::Checked {
            changes,
            report,
            commented,
        })
    }

    fn aggregate(
        &self,
        bytes: &[u8],
        concerned: Option<&ConcernedFiles>,
        which: &str,
        origin: &str,
    ) -> Result<CoverageGroup> {
        let group = calc::cov_list(self.parser, bytes, concerned, self.gate.threshold_pct)
            .map_err(|e| {
                error!(
                    "failed to aggregate {which} profile from {origin} \
                     ({} bytes, {} concerned files): {e}",
                    bytes.len(),
                    concerned.map_or(0, ConcernedFiles::len)
                );
                e
            })?;
        info!(
            "{which} profile: {} files, {:.1}% covered",
            group.len(),
            group.ratio() * 100.0
        );
        Ok(group)
    }

    /// Render the line-coverage page for `key_profile` and link each file
    /// into it. Any failure leaves the rows without links.
    fn annotate(&self, group: CoverageGroup, key_profile: &[u8]) -> CoverageGroup {
        if let Some(renderer) = self.line_cov {
            if let Err(e) = renderer.render(key_profile) {
                warn!("line coverage page not rendered, omitting links: {e}");
                return calc::sort_coverages(group);
            }
            info!("line coverage page at {}", renderer.output().display());
        }

        let Some(links) = self.links else {
            return calc::sort_coverages(group);
        };
        match links.base_url() {
            Ok(url) => calc::annotate_links(group, &url),
            Err(e) => {
                warn!("omitting coverage links: {e}");
                calc::sort_coverages(group)
            }
        }
    }
}
