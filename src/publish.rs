//! Destinations for a rendered report.

use std::path::PathBuf;

use log::info;

use crate::config::REPORT_FILE_NAME;
use crate::error::Result;

/// Durable copy of every report, posted or not.
pub trait ReportArchive {
    /// Store the report and return where it went.
    fn write_report(&self, content: &str) -> Result<PathBuf>;
}

/// Review-system comment for the pull request.
pub trait CommentPoster {
    /// Remove earlier reports from this tool, then post `body`.
    fn clean_and_post(&self, body: &str) -> Result<()>;
}

/// Writes the report into the job's artifacts directory.
pub struct ArtifactWriter {
    pub dir: PathBuf,
}

impl ArtifactWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ReportArchive for ArtifactWriter {
    fn write_report(&self, content: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(REPORT_FILE_NAME);
        std::fs::write(&path, content)?;
        info!("wrote report to {}", path.display());
        Ok(path)
    }
}
