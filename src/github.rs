//! GitHub API helpers: the files a pull request touches, and the coverage
//! comment on it.

use anyhow::{bail, Context as _, Result};
use log::{debug, info};
use serde::Deserialize;

use crate::calc::{ConcernedFileSource, ConcernedFiles};
use crate::error::CovgateError;
use crate::publish::CommentPoster;

const COMMENT_MARKER: &str = "<!-- covgate-comment -->";

const API_URL: &str = "https://api.github.com";

/// Resolved pull request context.
pub struct Context {
    token: String,
    repo: String,
    pr_number: u64,
}

impl Context {
    pub fn new(token: impl Into<String>, repo: impl Into<String>, pr_number: u64) -> Self {
        Self {
            token: token.into(),
            repo: repo.into(),
            pr_number,
        }
    }

    /// Build a context from the environment. The token comes from
    /// `GITHUB_TOKEN`; the pull request from `GITHUB_REPOSITORY` and
    /// `GITHUB_REF` (GitHub Actions) or `REPO_OWNER`, `REPO_NAME` and
    /// `PULL_NUMBER` (Prow).
    pub fn from_env() -> Result<Self> {
        let token = std::env::var("GITHUB_TOKEN")
            .context("GITHUB_TOKEN environment variable is required")?;

        if let (Ok(owner), Ok(name), Ok(pr)) = (
            std::env::var("REPO_OWNER"),
            std::env::var("REPO_NAME"),
            std::env::var("PULL_NUMBER"),
        ) {
            let pr_number = pr
                .parse()
                .with_context(|| format!("PULL_NUMBER '{pr}' is not a number"))?;
            return Ok(Self::new(token, format!("{owner}/{name}"), pr_number));
        }

        let repo = std::env::var("GITHUB_REPOSITORY")
            .context("GITHUB_REPOSITORY (or REPO_OWNER/REPO_NAME) is required")?;
        let pr_number = std::env::var("GITHUB_REF")
            .ok()
            .as_deref()
            .and_then(pr_number_from_ref)
            .context("could not determine PR number from GITHUB_REF")?;
        Ok(Self::new(token, repo, pr_number))
    }

    fn request(&self, method: &str, url: &str) -> ureq::Request {
        ureq::request(method, url)
            .set("Authorization", &format!("Bearer {}", self.token))
            .set("Accept", "application/vnd.github+json")
            .set("User-Agent", "covgate")
            .set("X-GitHub-Api-Version", "2022-11-28")
    }

    /// List every file in the pull request.
    pub fn fetch_pr_files(&self) -> Result<Vec<PrFile>> {
        info!("Fetching files for {}/pull/{} ...", self.repo, self.pr_number);
        let mut files = Vec::new();
        let mut page = 1u32;
        loop {
            let url = format!(
                "{API_URL}/repos/{}/pulls/{}/files?per_page=100&page={page}",
                self.repo, self.pr_number
            );
            let batch: Vec<PrFile> = self
                .request("GET", &url)
                .call()
                .context("Failed to list PR files")?
                .into_json()
                .context("Failed to parse PR files JSON")?;
            if batch.is_empty() {
                break;
            }
            files.extend(batch);
            page += 1;
        }
        debug!("PR touches {} files", files.len());
        Ok(files)
    }

    /// Ids of comments we posted earlier.
    fn find_own_comments(&self) -> Result<Vec<u64>> {
        let mut ids = Vec::new();
        let mut page = 1u32;
        loop {
            let url = format!(
                "{API_URL}/repos/{}/issues/{}/comments?per_page=100&page={page}",
                self.repo, self.pr_number
            );
            let comments: Vec<Comment> = self
                .request("GET", &url)
                .call()
                .context("Failed to list PR comments")?
                .into_json()
                .context("Failed to parse comments JSON")?;
            if comments.is_empty() {
                break;
            }
            ids.extend(
                comments
                    .iter()
                    .filter(|c| c.body.as_deref().is_some_and(|b| b.contains(COMMENT_MARKER)))
                    .map(|c| c.id),
            );
            page += 1;
        }
        Ok(ids)
    }

    /// Delete earlier coverage comments and post a fresh one.
    pub fn clean_and_post_comment(&self, body: &str) -> Result<()> {
        for id in self.find_own_comments()? {
            let url = format!("{API_URL}/repos/{}/issues/comments/{id}", self.repo);
            check(self.request("DELETE", &url).call(), "deleting comment")?;
            debug!("deleted previous comment {id}");
        }

        let url = format!(
            "{API_URL}/repos/{}/issues/{}/comments",
            self.repo, self.pr_number
        );
        let body_with_marker = format!("{COMMENT_MARKER}\n{body}");
        check(
            self.request("POST", &url)
                .send_json(serde_json::json!({ "body": body_with_marker })),
            "creating comment",
        )?;
        info!("Comment posted to {}/pull/{}", self.repo, self.pr_number);
        Ok(())
    }
}

fn check(resp: std::result::Result<ureq::Response, ureq::Error>, what: &str) -> Result<()> {
    match resp {
        Ok(_) => Ok(()),
        Err(ureq::Error::Status(code, resp)) => {
            let body = resp.into_string().unwrap_or_default();
            bail!("GitHub API error {what} (HTTP {code}): {body}")
        }
        Err(e) => bail!("Failed {what}: {e}"),
    }
}

impl CommentPoster for Context {
    fn clean_and_post(&self, body: &str) -> crate::error::Result<()> {
        self.clean_and_post_comment(body)
            .map_err(|e| CovgateError::Publish(format!("{e:#}")))
    }
}

/// Extract PR number from a ref (e.g. "refs/pull/42/merge" → 42).
fn pr_number_from_ref(github_ref: &str) -> Option<u64> {
    let parts: Vec<&str> = github_ref.split('/').collect();
    if parts.len() >= 3 && parts[0] == "refs" && parts[1] == "pull" {
        parts[2].parse().ok()
    } else {
        None
    }
}

#[derive(Deserialize)]
struct Comment {
    id: u64,
    body: Option<String>,
}

/// One entry of a pull request's file list.
#[derive(Debug, Clone, Deserialize)]
pub struct PrFile {
    pub filename: String,
    pub status: String,
}

/// Go sources in the PR, mapped to profile paths by prepending `path_prefix`.
/// Deleted files are kept so their disappearance shows in the report.
#[must_use]
pub fn select_concerned(files: &[PrFile], path_prefix: Option<&str>) -> ConcernedFiles {
    files
        .iter()
        .map(|f| f.filename.as_str())
        .filter(|name| {
            name.ends_with(".go")
                && !name.ends_with("_test.go")
                && !name.starts_with("vendor/")
                && !name.contains("/vendor/")
        })
        .map(|name| match path_prefix {
            Some(prefix) => format!("{}/{name}", prefix.trim_end_matches('/')),
            None => name.to_string(),
        })
        .collect()
}

/// Concerned files read from a pull request.
pub struct PrConcernedFiles<'a> {
    pub context: &'a Context,
    pub path_prefix: Option<String>,
}

impl ConcernedFileSource for PrConcernedFiles<'_> {
    fn concerned_files(&self) -> crate::error::Result<ConcernedFiles> {
        let files = self
            .context
            .fetch_pr_files()
            .map_err(|e| CovgateError::Other(format!("{e:#}")))?;
        Ok(select_concerned(&files, self.path_prefix.as_deref()))
    }
}
