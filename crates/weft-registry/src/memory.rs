//! In-process collaborators.
//!
//! [`MemoryRegistry`] serves versions published through its API and
//! [`DirFetcher`] "fetches" commits by copying directories registered for
//! them. Both record call counts so tests can assert on traffic.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use weft_core::identity::PackageIdentity;
use weft_util::errors::{WeftError, WeftResult};

use crate::traits::{GitFetcher, RegistryClient, ResolvedRelease, VersionInfo};

#[derive(Debug, Clone)]
struct Release {
    info: VersionInfo,
    repo_url: String,
}

#[derive(Debug, Default)]
struct RegistryInner {
    packages: BTreeMap<PackageIdentity, Vec<Release>>,
    list_calls: usize,
    resolve_calls: usize,
}

/// Registry held in memory. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Publish `version` of `identity` at `commit_hash` in `repo_url`.
    pub fn publish(
        &self,
        identity: &PackageIdentity,
        version: &str,
        commit_hash: &str,
        repo_url: &str,
    ) {
        self.lock()
            .packages
            .entry(identity.clone())
            .or_default()
            .push(Release {
                info: VersionInfo {
                    version: version.to_string(),
                    commit_hash: commit_hash.to_string(),
                    yanked: false,
                    published_at: None,
                    repo_url: None,
                },
                repo_url: repo_url.to_string(),
            });
    }

    /// Flag a published version as yanked. Returns `false` if it was never published.
    pub fn yank(&self, identity: &PackageIdentity, version: &str) -> bool {
        let mut inner = self.lock();
        let Some(releases) = inner.packages.get_mut(identity) else {
            return false;
        };
        match releases.iter_mut().find(|r| r.info.version == version) {
            Some(release) => {
                release.info.yanked = true;
                true
            }
            None => false,
        }
    }

    pub fn list_calls(&self) -> usize {
        self.lock().list_calls
    }

    pub fn resolve_calls(&self) -> usize {
        self.lock().resolve_calls
    }
}

#[async_trait]
impl RegistryClient for MemoryRegistry {
    /// Only exact versions are understood; range selection happens client-side.
    async fn resolve(
        &self,
        identity: &PackageIdentity,
        specifier: &str,
    ) -> WeftResult<ResolvedRelease> {
        let mut inner = self.lock();
        inner.resolve_calls += 1;
        let wanted = specifier.trim().trim_start_matches('=');
        inner
            .packages
            .get(identity)
            .and_then(|releases| releases.iter().find(|r| r.info.version == wanted))
            .map(|r| ResolvedRelease {
                resolved_version: r.info.version.clone(),
                resolved_version_id: None,
                commit_hash: r.info.commit_hash.clone(),
                repo_url: r.repo_url.clone(),
                provider: "memory".to_string(),
                yanked: r.info.yanked,
                is_public: true,
                source_type: "git".to_string(),
            })
            .ok_or_else(|| WeftError::NotFound {
                identity: identity.to_string(),
                specifier: specifier.to_string(),
            })
    }

    async fn list_versions(&self, identity: &PackageIdentity) -> WeftResult<Vec<VersionInfo>> {
        let mut inner = self.lock();
        inner.list_calls += 1;
        inner
            .packages
            .get(identity)
            .map(|releases| {
                releases
                    .iter()
                    .map(|r| VersionInfo {
                        repo_url: Some(r.repo_url.clone()),
                        ..r.info.clone()
                    })
                    .collect()
            })
            .ok_or_else(|| WeftError::NotFound {
                identity: identity.to_string(),
                specifier: "*".to_string(),
            })
    }
}

#[derive(Debug, Default)]
struct FetcherInner {
    sources: HashMap<(String, String), PathBuf>,
    calls: HashMap<(String, String), usize>,
}

/// Serves commits by copying pre-registered directories.
#[derive(Debug, Clone, Default)]
pub struct DirFetcher {
    inner: Arc<Mutex<FetcherInner>>,
    delay: Option<Duration>,
}

impl DirFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every fetch, to widen race windows in tests.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FetcherInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make `dir` the content of `repo_url` at `commit_hash`.
    pub fn add(&self, repo_url: &str, commit_hash: &str, dir: &Path) {
        self.lock().sources.insert(
            (repo_url.to_string(), commit_hash.to_string()),
            dir.to_path_buf(),
        );
    }

    /// How many times `(repo_url, commit_hash)` was fetched.
    pub fn calls(&self, repo_url: &str, commit_hash: &str) -> usize {
        self.lock()
            .calls
            .get(&(repo_url.to_string(), commit_hash.to_string()))
            .copied()
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.lock().calls.values().sum()
    }
}

#[async_trait]
impl GitFetcher for DirFetcher {
    async fn fetch_into(&self, repo_url: &str, commit_hash: &str, dest: &Path) -> WeftResult<()> {
        let key = (repo_url.to_string(), commit_hash.to_string());
        let source = {
            let mut inner = self.lock();
            *inner.calls.entry(key.clone()).or_default() += 1;
            inner.sources.get(&key).cloned()
        };

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let source = source.ok_or_else(|| WeftError::Registry {
            message: format!("{repo_url} has no commit {commit_hash}"),
        })?;
        weft_util::fs::copy_dir_all(&source, dest)?;
        Ok(())
    }
}
