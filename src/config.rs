//! Gate settings shared by the pure pipeline stages.

use crate::error::{CovgateError, Result};

/// Default coverage threshold, in percent.
pub const DEFAULT_THRESHOLD_PERCENT: f64 = 50.0;

/// Default lifetime of links into the rendered coverage page.
pub const DEFAULT_LINK_TTL_DAYS: i64 = 7;

/// Name of the report file written to the artifacts directory.
pub const REPORT_FILE_NAME: &str = "bot-post";

/// Name of the profile restricted to concerned files, written next to the
/// report and rendered into the line-coverage page.
pub const KEY_PROFILE_FILE_NAME: &str = "key-cov-prof.txt";

/// Settings for the gate decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateConfig {
    /// Percent in `0.0..=100.0`. Coverage strictly below this is low; a
    /// file exactly at it passes.
    pub threshold_pct: f64,
    /// Ratio in `0.0..=1.0`. A file regresses only when it drops by more
    /// than this.
    pub epsilon: f64,
}

impl GateConfig {
    /// Build from percentages, e.g. `from_percent(70.0, 0.5)`.
    pub fn from_percent(threshold: f64, epsilon: f64) -> Result<Self> {
        for (name, value) in [("threshold", threshold), ("epsilon", epsilon)] {
            if !(0.0..=100.0).contains(&value) {
                return Err(CovgateError::Other(format!(
                    "{name} must be a percentage between 0 and 100, got {value}"
                )));
            }
        }
        Ok(Self {
            threshold_pct: threshold,
            epsilon: epsilon / 100.0,
        })
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            threshold_pct: DEFAULT_THRESHOLD_PERCENT,
            epsilon: 0.0,
        }
    }
}

/// Identity of the presubmit job run, as CI exports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobInfo {
    pub org: String,
    pub repo: String,
    pub pr: String,
    pub job_name: String,
    pub build_id: String,
}

impl JobInfo {
    /// Storage prefix holding this run's logs and artifacts.
    #[must_use]
    pub fn job_prefix(&self) -> String {
        format!(
            "pr-logs/pull/{}_{}/{}/{}/{}",
            self.org, self.repo, self.pr, self.job_name, self.build_id
        )
    }

    /// File name of the line-coverage HTML page.
    #[must_use]
    pub fn html_profile(&self) -> String {
        format!("{}-{}-pr{}-coverage.html", self.org, self.repo, self.pr)
    }

    /// Storage key of the uploaded line-coverage page.
    #[must_use]
    pub fn html_key(&self) -> String {
        format!("{}/artifacts/{}", self.job_prefix(), self.html_profile())
    }
}
