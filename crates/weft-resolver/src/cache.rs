//! Content-addressed store of fetched package sources.
//!
//! Each commit lives in `<root>/<commit_hash>`. Sources are fetched into a
//! staging directory next to it and renamed into place, so a present entry
//! is always complete. Concurrent requests for the same `(repo_url, commit)`
//! share a single fetch.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::OnceCell;
use weft_registry::GitFetcher;
use weft_util::errors::{WeftError, WeftResult};

type FetchKey = (String, String);

pub struct PackageCache {
    root: PathBuf,
    fetcher: Arc<dyn GitFetcher>,
    timeout: Option<Duration>,
    inflight: Mutex<HashMap<FetchKey, Arc<OnceCell<PathBuf>>>>,
}

impl PackageCache {
    pub fn new(root: impl Into<PathBuf>, fetcher: Arc<dyn GitFetcher>) -> Self {
        Self {
            root: root.into(),
            fetcher,
            timeout: None,
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Abort a single fetch that runs longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory a commit is stored under.
    pub fn entry_path(&self, commit_hash: &str) -> PathBuf {
        let name: String = commit_hash
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        self.root.join(name)
    }

    pub fn contains(&self, commit_hash: &str) -> bool {
        self.entry_path(commit_hash).is_dir()
    }

    /// Materialize `commit_hash` of `repo_url` and return its directory.
    pub async fn fetch(&self, repo_url: &str, commit_hash: &str) -> WeftResult<PathBuf> {
        if commit_hash.trim().is_empty() {
            return Err(WeftError::Registry {
                message: format!("{repo_url}: registry returned an empty commit hash"),
            });
        }

        let cell = {
            let mut inflight = self
                .inflight
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            inflight
                .entry((repo_url.to_string(), commit_hash.to_string()))
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        cell.get_or_try_init(|| self.fetch_uncached(repo_url, commit_hash))
            .await
            .cloned()
    }

    async fn fetch_uncached(&self, repo_url: &str, commit_hash: &str) -> WeftResult<PathBuf> {
        let entry = self.entry_path(commit_hash);
        if entry.is_dir() {
            tracing::debug!("cache hit for {repo_url}@{commit_hash}");
            return Ok(entry);
        }

        weft_util::fs::ensure_dir(&self.root)?;
        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(&self.root)?;
        let checkout = staging.path().join("src");

        tracing::info!("fetching {repo_url}@{commit_hash}");
        let fetch = self.fetcher.fetch_into(repo_url, commit_hash, &checkout);
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, fetch)
                .await
                .map_err(|_| WeftError::Timeout {
                    operation: format!("fetch of {repo_url}@{commit_hash}"),
                    seconds: limit.as_secs(),
                })??,
            None => fetch.await?,
        }

        if let Err(e) = std::fs::rename(&checkout, &entry) {
            // another process may have stored the same commit first
            if !entry.is_dir() {
                return Err(e.into());
            }
        }
        Ok(entry)
    }
}
