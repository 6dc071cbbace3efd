//! Base URLs for the per-file links in a report.
//!
//! The pipeline only needs a base URL; each file's anchor is appended by
//! [`crate::calc::annotate_links`]. How the URL is hosted or signed is up
//! to the implementation.

use chrono::{DateTime, Duration, Utc};

use crate::error::{CovgateError, Result};

/// Mints the base URL of the rendered line-coverage page.
pub trait LinkTemplate {
    fn base_url(&self) -> Result<String>;
}

/// A fixed, already navigable URL.
pub struct StaticLink(pub String);

impl LinkTemplate for StaticLink {
    fn base_url(&self) -> Result<String> {
        if self.0.is_empty() {
            return Err(CovgateError::Link("empty link".to_string()));
        }
        Ok(self.0.clone())
    }
}

/// A link to an uploaded artifact that stops working after `ttl`.
///
/// The deadline is carried as the `e` query parameter (unix seconds), which
/// is what object stores with expiring download URLs check. Signing, if the
/// store needs it, happens in front of this.
pub struct ArtifactLink {
    storage_url: String,
    key: String,
    ttl: Duration,
    issued_at: DateTime<Utc>,
}

impl ArtifactLink {
    pub fn new(storage_url: impl Into<String>, key: impl Into<String>, ttl: Duration) -> Self {
        Self {
            storage_url: storage_url.into(),
            key: key.into(),
            ttl,
            issued_at: Utc::now(),
        }
    }

    /// Pin the issue time, so the deadline is reproducible.
    #[must_use]
    pub fn issued_at(mut self, at: DateTime<Utc>) -> Self {
        self.issued_at = at;
        self
    }

    /// When the link stops working. Fails when the lifetime is not
    /// positive or the deadline is past the representable range.
    pub fn deadline(&self) -> Result<DateTime<Utc>> {
        if self.ttl <= Duration::zero() {
            return Err(CovgateError::Link(format!(
                "link lifetime must be positive, got {}s",
                self.ttl.num_seconds()
            )));
        }
        self.issued_at
            .checked_add_signed(self.ttl)
            .ok_or_else(|| {
                CovgateError::Link(format!(
                    "link lifetime of {} days is out of range",
                    self.ttl.num_days()
                ))
            })
    }
}

impl LinkTemplate for ArtifactLink {
    fn base_url(&self) -> Result<String> {
        if self.storage_url.is_empty() {
            return Err(CovgateError::Link("no storage URL configured".to_string()));
        }
        let deadline = self.deadline()?;
        let base = self.storage_url.trim_end_matches('/');
        let key = self.key.trim_start_matches('/');
        Ok(format!("{base}/{key}?e={}", deadline.timestamp()))
    }
}
