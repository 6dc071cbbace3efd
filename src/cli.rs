//! Command handler functions for the covgate CLI.
//!
//! Each `cmd_*` function returns its output as a `String` (plus the gate
//! verdict where there is one), making them easy to test without
//! capturing stdout.

use std::fmt::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context as _, Result};
use chrono::TimeDelta;
use clap::{Args, ValueEnum};
use log::warn;

use crate::cache::BaselineCache;
use crate::calc::{self, ConcernedFileSource, ConcernedFiles};
use crate::config::{GateConfig, JobInfo, DEFAULT_LINK_TTL_DAYS, KEY_PROFILE_FILE_NAME};
use crate::github::{self, PrConcernedFiles};
use crate::html::{GoToolCover, LineCovRenderer};
use crate::links::{ArtifactLink, LinkTemplate};
use crate::parsers::gocover::GocoverParser;
use crate::presubmit::{Outcome, Presubmit};
use crate::profile::{LocalProfile, ProfileSource, RemoteProfile};
use crate::publish::{ArtifactWriter, CommentPoster};
use crate::report::{self, MarkdownFormatter, TextFormatter};
use crate::{delta, model::CoverageGroup};

/// Output style for reports.
#[derive(Clone, ValueEnum)]
pub enum Style {
    Text,
    Markdown,
    Json,
}

/// Settings for a presubmit run. Each can also come from the CI environment.
#[derive(Args, Debug, Clone)]
pub struct PresubmitArgs {
    /// Coverage profile produced by this pull request.
    #[arg(long, env = "COV_PROFILE", default_value = "coverage.out")]
    pub profile: PathBuf,

    /// Local baseline profile. Skips the remote lookup.
    #[arg(long)]
    pub base_profile: Option<PathBuf>,

    /// Postsubmit job whose latest build holds the baseline profile.
    #[arg(long, env = "POSTSUBMIT_JOB")]
    pub postsubmit_job: Option<String>,

    /// File name of the profile in the postsubmit artifacts.
    #[arg(long, env = "POSTSUBMIT_PROFILE", default_value = "coverage.out")]
    pub postsubmit_profile: String,

    /// Base URL of the artifact store.
    #[arg(long, env = "COV_STORAGE_URL")]
    pub storage_url: Option<String>,

    /// SQLite file caching fetched baseline profiles.
    #[arg(long, env = "COV_CACHE")]
    pub cache: Option<PathBuf>,

    /// Coverage threshold in percent; coverage below it fails the gate.
    #[arg(long, env = "COV_THRESHOLD", default_value_t = 50.0)]
    pub threshold: f64,

    /// Drop in percentage points a file may take before it counts as regressed.
    #[arg(long, env = "COV_EPSILON", default_value_t = 0.0)]
    pub epsilon: f64,

    /// Directory for the report and the line-coverage page.
    #[arg(long, env = "ARTIFACTS", default_value = "./artifacts")]
    pub artifacts: PathBuf,

    #[arg(long, env = "REPO_OWNER")]
    pub org: Option<String>,

    #[arg(long, env = "REPO_NAME")]
    pub repo: Option<String>,

    #[arg(long, env = "PULL_NUMBER")]
    pub pr: Option<String>,

    #[arg(long, env = "JOB_NAME")]
    pub job_name: Option<String>,

    #[arg(long, env = "BUILD_ID")]
    pub build_id: Option<String>,

    /// Prefix that maps repository paths onto profile paths,
    /// e.g. the module path.
    #[arg(long, env = "COV_PATH_PREFIX")]
    pub path_prefix: Option<String>,

    /// Lifetime of links into the line-coverage page, in days.
    #[arg(long, default_value_t = DEFAULT_LINK_TTL_DAYS)]
    pub link_ttl_days: i64,

    /// Read concerned files from the pull request and comment on it.
    /// Needs `GITHUB_TOKEN`.
    #[arg(long)]
    pub github: bool,
}

impl PresubmitArgs {
    fn job(&self) -> Option<JobInfo> {
        Some(JobInfo {
            org: self.org.clone()?,
            repo: self.repo.clone()?,
            pr: self.pr.clone()?,
            job_name: self.job_name.clone()?,
            build_id: self.build_id.clone()?,
        })
    }

    fn base_source(&self) -> Result<Box<dyn ProfileSource>> {
        if let Some(path) = &self.base_profile {
            return Ok(Box::new(LocalProfile::new(path)));
        }
        let (Some(storage), Some(job)) = (&self.storage_url, &self.postsubmit_job) else {
            bail!("either --base-profile or both --storage-url and --postsubmit-job are required");
        };
        let mut remote = RemoteProfile::new(storage, job, &self.postsubmit_profile);
        if let Some(path) = &self.cache {
            let cache = BaselineCache::open(path)
                .with_context(|| format!("Failed to open cache at {}", path.display()))?;
            remote = remote.with_cache(cache);
        }
        Ok(Box::new(remote))
    }
}

fn concerned_from(files: &[String]) -> Option<ConcernedFiles> {
    if files.is_empty() {
        None
    } else {
        Some(files.iter().cloned().collect())
    }
}

fn load_group(
    path: &Path,
    concerned: Option<&ConcernedFiles>,
    threshold_pct: f64,
) -> Result<CoverageGroup> {
    let content = std::fs::read(path)
        .with_context(|| format!("Failed to read profile {}", path.display()))?;
    let group = calc::cov_list(&GocoverParser, &content, concerned, threshold_pct)
        .with_context(|| format!("Failed to parse profile {}", path.display()))?;
    Ok(calc::sort_coverages(group))
}

/// Per-file coverage of one profile, worst first.
pub fn cmd_summary(profile: &Path, files: &[String], threshold: f64) -> Result<String> {
    let gate = GateConfig::from_percent(threshold, 0.0)?;
    let concerned = concerned_from(files);
    let group = load_group(profile, concerned.as_ref(), gate.threshold_pct)?;

    let mut out = String::new();
    writeln!(
        out,
        "{:<60} {:>8} {:>8} {:>8}",
        "FILE", "STMTS", "COVERED", "RATE"
    )
    .unwrap();
    writeln!(out, "{}", "-".repeat(88)).unwrap();

    for f in group.files() {
        let marker = if f.is_below(gate.threshold_pct) {
            "  ✗"
        } else {
            ""
        };
        writeln!(
            out,
            "{:<60} {:>8} {:>8} {:>7.1}%{}",
            f.path,
            f.total_statements,
            f.covered_statements,
            f.ratio() * 100.0,
            marker
        )
        .unwrap();
    }

    writeln!(out, "{}", "-".repeat(88)).unwrap();
    writeln!(
        out,
        "{:<60} {:>8} {:>8} {:>7.1}%",
        "TOTAL",
        group.total_statements(),
        group.covered_statements(),
        group.ratio() * 100.0
    )
    .unwrap();
    let low = group.low_files().count();
    if low > 0 {
        writeln!(
            out,
            "\n{low} files below the {:.1}% threshold",
            gate.threshold_pct
        )
        .unwrap();
    }
    Ok(out)
}

/// Compare two local profiles. Returns the report and whether coverage is low.
pub fn cmd_compare(
    base: &Path,
    new: &Path,
    files: &[String],
    gate: &GateConfig,
    style: &Style,
) -> Result<(String, bool)> {
    let concerned = concerned_from(files);
    let g_base = load_group(base, concerned.as_ref(), gate.threshold_pct)?;
    let g_new = load_group(new, concerned.as_ref(), gate.threshold_pct)?;

    let changes = delta::diff(&g_base, &g_new, gate, concerned.as_ref());

    let output = match style {
        Style::Json => {
            let mut json = serde_json::to_string_pretty(&changes)?;
            json.push('\n');
            json
        }
        Style::Text => report::render(&changes, &TextFormatter).content,
        Style::Markdown => report::render(&changes, &MarkdownFormatter).content,
    };
    Ok((output, changes.is_coverage_low))
}

/// Link to the uploaded line-coverage page, or `None` (with a warning) when
/// the lifetime cannot be represented.
fn artifact_link(storage: &str, job: &JobInfo, ttl_days: i64) -> Option<ArtifactLink> {
    match TimeDelta::try_days(ttl_days) {
        Some(ttl) => Some(ArtifactLink::new(storage, job.html_key(), ttl)),
        None => {
            warn!("link lifetime of {ttl_days} days is out of range, omitting coverage links");
            None
        }
    }
}

/// Run the full presubmit gate. Returns the report and whether coverage is low.
pub fn cmd_presubmit(args: &PresubmitArgs) -> Result<(String, bool)> {
    let gate = GateConfig::from_percent(args.threshold, args.epsilon)?;
    let new_profile = LocalProfile::new(&args.profile);
    let base_profile = args.base_source()?;

    let job = args.job();
    let line_cov = job.as_ref().map(|job| {
        GoToolCover::new(
            args.artifacts.join(KEY_PROFILE_FILE_NAME),
            args.artifacts.join(job.html_profile()),
        )
    });
    let links = match (&job, &args.storage_url) {
        (Some(job), Some(storage)) => artifact_link(storage, job, args.link_ttl_days),
        _ => None,
    };

    let context = if args.github {
        Some(github::Context::from_env()?)
    } else {
        None
    };
    let pr_files = context.as_ref().map(|context| PrConcernedFiles {
        context,
        path_prefix: args.path_prefix.clone(),
    });

    let formatter = MarkdownFormatter;
    let archive = ArtifactWriter::new(&args.artifacts);

    let presubmit = Presubmit {
        gate,
        parser: &GocoverParser,
        new_profile: &new_profile,
        base_profile: &*base_profile,
        concerned: pr_files.as_ref().map(|p| p as &dyn ConcernedFileSource),
        line_cov: line_cov.as_ref().map(|r| r as &dyn LineCovRenderer),
        links: links.as_ref().map(|l| l as &dyn LinkTemplate),
        formatter: &formatter,
        archive: &archive,
        commenter: context.as_ref().map(|c| c as &dyn CommentPoster),
    };

    let outcome = presubmit.run()?;
    let is_low = outcome.is_coverage_low();
    let output = match outcome {
        Outcome::NothingToCheck => "No concerned files changed; nothing to check.\n".to_string(),
        Outcome::Checked { report, .. } => report.content,
    };
    Ok((output, is_low))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "mode: set\n\
        example.com/pkg/a.go:1.1,2.1 8 1\n\
        example.com/pkg/a.go:3.1,4.1 2 0\n\
        example.com/pkg/b.go:1.1,2.1 5 1\n\
        example.com/pkg/b.go:3.1,4.1 5 0\n";

    const NEW: &str = "mode: set\n\
        example.com/pkg/a.go:1.1,2.1 9 1\n\
        example.com/pkg/a.go:3.1,4.1 1 0\n\
        example.com/pkg/b.go:1.1,2.1 5 1\n\
        example.com/pkg/b.go:3.1,4.1 5 0\n";

    fn write_profiles(dir: &Path) -> (PathBuf, PathBuf) {
        let base = dir.join("base.out");
        let new = dir.join("new.out");
        std::fs::write(&base, BASE).unwrap();
        std::fs::write(&new, NEW).unwrap();
        (base, new)
    }

    fn presubmit_args(dir: &Path, base: PathBuf, new: PathBuf) -> PresubmitArgs {
        PresubmitArgs {
            profile: new,
            base_profile: Some(base),
            postsubmit_job: None,
            postsubmit_profile: "coverage.out".to_string(),
            storage_url: None,
            cache: None,
            threshold: 70.0,
            epsilon: 0.0,
            artifacts: dir.join("artifacts"),
            org: None,
            repo: None,
            pr: None,
            job_name: None,
            build_id: None,
            path_prefix: None,
            link_ttl_days: 7,
            github: false,
        }
    }

    #[test]
    fn test_cmd_summary() {
        let dir = tempfile::tempdir().unwrap();
        let (_, new) = write_profiles(dir.path());

        let out = cmd_summary(&new, &[], 70.0).unwrap();

        assert!(out.contains("FILE"));
        assert!(out.contains("example.com/pkg/a.go"));
        assert!(out.contains("90.0%"));
        assert!(out.contains("50.0%  ✗"));
        assert!(out.contains("1 files below the 70.0% threshold"));
        // Worst first.
        let b = out.find("example.com/pkg/b.go").unwrap();
        let a = out.find("example.com/pkg/a.go").unwrap();
        assert!(b < a);
    }

    #[test]
    fn test_cmd_summary_filtered() {
        let dir = tempfile::tempdir().unwrap();
        let (_, new) = write_profiles(dir.path());

        let out = cmd_summary(&new, &["example.com/pkg/a.go".to_string()], 70.0).unwrap();

        assert!(out.contains("example.com/pkg/a.go"));
        assert!(!out.contains("example.com/pkg/b.go"));
    }

    #[test]
    fn test_cmd_summary_malformed_profile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.out");
        std::fs::write(&path, "mode: set\nthis is not a profile\n").unwrap();

        let err = cmd_summary(&path, &[], 50.0).unwrap_err();
        assert!(format!("{err:#}").contains("Profile parse error"));
    }

    #[test]
    fn test_cmd_compare_text() {
        let dir = tempfile::tempdir().unwrap();
        let (base, new) = write_profiles(dir.path());
        let gate = GateConfig::from_percent(70.0, 0.0).unwrap();

        let (out, low) = cmd_compare(&base, &new, &[], &gate, &Style::Text).unwrap();

        assert!(!low);
        assert!(out.contains("improved"));
        assert!(out.contains("unchanged"));
        assert!(out.contains("65.0%"));
        assert!(out.contains("70.0%"));
        assert!(out.contains("+5.0"));
    }

    #[test]
    fn test_cmd_compare_low() {
        let dir = tempfile::tempdir().unwrap();
        let (base, new) = write_profiles(dir.path());
        let gate = GateConfig::from_percent(75.0, 0.0).unwrap();

        let (_, low) = cmd_compare(&base, &new, &[], &gate, &Style::Markdown).unwrap();
        assert!(low);
    }

    #[test]
    fn test_cmd_compare_json() {
        let dir = tempfile::tempdir().unwrap();
        let (base, new) = write_profiles(dir.path());
        let gate = GateConfig::from_percent(70.0, 0.0).unwrap();

        let (out, _) = cmd_compare(&base, &new, &[], &gate, &Style::Json).unwrap();

        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["changes"].as_array().unwrap().len(), 2);
        assert_eq!(value["is_coverage_low"], false);
        // Worst-covered file first.
        assert_eq!(value["changes"][0]["path"], "example.com/pkg/b.go");
        assert_eq!(value["changes"][0]["kind"], "unchanged");
        assert_eq!(value["changes"][1]["kind"], "improved");
    }

    #[test]
    fn test_cmd_presubmit_offline() {
        let dir = tempfile::tempdir().unwrap();
        let (base, new) = write_profiles(dir.path());
        let args = presubmit_args(dir.path(), base, new);

        let (out, low) = cmd_presubmit(&args).unwrap();

        assert!(!low);
        assert!(out.contains("| `example.com/pkg/a.go` |"));
        let archived = std::fs::read_to_string(dir.path().join("artifacts/bot-post")).unwrap();
        assert_eq!(archived, out);
    }

    #[test]
    fn test_artifact_link_out_of_range_lifetime_is_omitted() {
        let job = JobInfo {
            org: "knative".to_string(),
            repo: "serving".to_string(),
            pr: "42".to_string(),
            job_name: "pull-serving-coverage".to_string(),
            build_id: "1001".to_string(),
        };

        assert!(artifact_link("https://store", &job, i64::MAX).is_none());
        let link = artifact_link("https://store", &job, 1_000_000_000).unwrap();
        assert!(link.base_url().is_err());
        let link = artifact_link("https://store", &job, DEFAULT_LINK_TTL_DAYS).unwrap();
        assert!(link.base_url().unwrap().starts_with(
            "https://store/pr-logs/pull/knative_serving/42/pull-serving-coverage/1001/artifacts/"
        ));
    }

    #[test]
    fn test_cmd_presubmit_requires_a_baseline() {
        let dir = tempfile::tempdir().unwrap();
        let (base, new) = write_profiles(dir.path());
        let mut args = presubmit_args(dir.path(), base, new);
        args.base_profile = None;

        assert!(cmd_presubmit(&args).is_err());
    }
}
