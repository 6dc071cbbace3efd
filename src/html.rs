//! Producing the line-coverage HTML page with `go tool cover`.

use std::path::{Path, PathBuf};
use std::process::Command;

use log::{error, info};

use crate::error::{CovgateError, Result};

/// Something that renders the line-coverage page for the new profile.
pub trait LineCovRenderer {
    /// Render `profile`, the new profile restricted to concerned files, so
    /// the page lists files in the same order the report links them.
    fn render(&self, profile: &[u8]) -> Result<()>;

    /// Where the page ends up.
    fn output(&self) -> &Path;
}

/// Writes the profile to `profile` and runs
/// `go tool cover -html=<profile> -o <output>`.
pub struct GoToolCover {
    pub go: PathBuf,
    pub profile: PathBuf,
    pub output: PathBuf,
}

impl GoToolCover {
    pub fn new(profile: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            go: PathBuf::from("go"),
            profile: profile.into(),
            output: output.into(),
        }
    }

    fn args(&self) -> Vec<String> {
        vec![
            "tool".to_string(),
            "cover".to_string(),
            format!("-html={}", self.profile.display()),
            "-o".to_string(),
            self.output.display().to_string(),
        ]
    }

    fn command_line(&self) -> String {
        format!("{} {}", self.go.display(), self.args().join(" "))
    }
}

impl LineCovRenderer for GoToolCover {
    fn render(&self, profile: &[u8]) -> Result<()> {
        if let Some(dir) = self.profile.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(&self.profile, profile)?;

        let command = self.command_line();
        info!("Running command '{command}'");

        let output = Command::new(&self.go)
            .args(self.args())
            .output()
            .map_err(|e| {
                error!("`{command}` could not be started: {e}");
                CovgateError::Render {
                    command: command.clone(),
                    output: e.to_string(),
                }
            })?;

        if !output.status.success() {
            let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
            error!("`{command}` exited with {}; combined output: {combined}", output.status);
            return Err(CovgateError::Render {
                command,
                output: combined,
            });
        }

        info!("Finished running '{command}'");
        Ok(())
    }

    fn output(&self) -> &Path {
        &self.output
    }
}
