//! Where profile bytes come from: a local file, memory, or the remote
//! store that holds postsubmit artifacts.

use std::io::Read;
use std::path::PathBuf;

use log::{info, warn};

use crate::cache::{BaselineCache, CacheKey};
use crate::error::{CovgateError, Result};

/// Supplies the raw bytes of one coverage profile.
pub trait ProfileSource {
    fn read_profile(&self) -> Result<Vec<u8>>;

    /// Human-readable origin, for logs.
    fn describe(&self) -> String;
}

/// A profile on the local filesystem.
pub struct LocalProfile {
    pub path: PathBuf,
}

impl LocalProfile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ProfileSource for LocalProfile {
    fn read_profile(&self) -> Result<Vec<u8>> {
        Ok(std::fs::read(&self.path)?)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// A profile already in memory.
pub struct InMemoryProfile(pub Vec<u8>);

impl ProfileSource for InMemoryProfile {
    fn read_profile(&self) -> Result<Vec<u8>> {
        Ok(self.0.clone())
    }

    fn describe(&self) -> String {
        format!("<{} bytes in memory>", self.0.len())
    }
}

/// The profile of the latest healthy postsubmit build.
///
/// Layout under `storage_url`:
///   logs/<job>/latest-build.txt              id of the latest healthy build
///   logs/<job>/<build>/artifacts/<profile>   that build's profile
pub struct RemoteProfile {
    pub storage_url: String,
    pub job: String,
    pub profile_name: String,
    agent: ureq::Agent,
    cache: Option<BaselineCache>,
}

impl RemoteProfile {
    pub fn new(
        storage_url: impl Into<String>,
        job: impl Into<String>,
        profile_name: impl Into<String>,
    ) -> Self {
        Self {
            storage_url: storage_url.into(),
            job: job.into(),
            profile_name: profile_name.into(),
            agent: ureq::AgentBuilder::new()
                .user_agent(concat!("covgate/", env!("CARGO_PKG_VERSION")))
                .build(),
            cache: None,
        }
    }

    /// Keep fetched profiles in `cache` and serve repeats from it.
    #[must_use]
    pub fn with_cache(mut self, cache: BaselineCache) -> Self {
        self.cache = Some(cache);
        self
    }

    fn job_url(&self) -> String {
        format!("{}/logs/{}", self.storage_url.trim_end_matches('/'), self.job)
    }

    fn latest_build_url(&self) -> String {
        format!("{}/latest-build.txt", self.job_url())
    }

    fn profile_url(&self, build_id: &str) -> String {
        format!(
            "{}/{}/artifacts/{}",
            self.job_url(),
            build_id,
            self.profile_name
        )
    }

    fn get(&self, url: &str) -> Result<ureq::Response> {
        match self.agent.get(url).call() {
            Ok(resp) => Ok(resp),
            Err(ureq::Error::Status(code, _)) => {
                Err(CovgateError::Fetch(format!("GET {url} returned HTTP {code}")))
            }
            Err(e) => Err(CovgateError::Fetch(format!("GET {url}: {e}"))),
        }
    }

    fn latest_build(&self) -> Result<String> {
        let url = self.latest_build_url();
        let body = self
            .get(&url)?
            .into_string()
            .map_err(|e| CovgateError::Fetch(format!("reading {url}: {e}")))?;
        let build_id = body.trim();
        if build_id.is_empty() {
            return Err(CovgateError::Fetch(format!("{url} is empty")));
        }
        Ok(build_id.to_string())
    }

    fn download(&self, build_id: &str) -> Result<Vec<u8>> {
        let url = self.profile_url(build_id);
        let mut content = Vec::new();
        self.get(&url)?
            .into_reader()
            .read_to_end(&mut content)
            .map_err(|e| CovgateError::Fetch(format!("reading {url}: {e}")))?;
        if content.is_empty() {
            return Err(CovgateError::Fetch(format!("{url} is empty")));
        }
        info!("fetched {} bytes from {url}", content.len());
        Ok(content)
    }
}

impl ProfileSource for RemoteProfile {
    fn read_profile(&self) -> Result<Vec<u8>> {
        let build_id = self.latest_build()?;
        let key = CacheKey {
            job: self.job.clone(),
            build_id: build_id.clone(),
            profile_name: self.profile_name.clone(),
        };

        if let Some(cache) = &self.cache {
            match cache.get(&key) {
                Ok(Some(content)) => return Ok(content),
                Ok(None) => {}
                Err(e) => warn!("baseline cache lookup failed, fetching instead: {e}"),
            }
        }

        let content = self.download(&build_id)?;

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.put(&key, &content) {
                warn!("could not cache baseline profile: {e}");
            }
        }
        Ok(content)
    }

    fn describe(&self) -> String {
        format!("{} ({})", self.job_url(), self.profile_name)
    }
}
