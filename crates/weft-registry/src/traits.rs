use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use weft_core::identity::PackageIdentity;
use weft_util::errors::WeftResult;

/// Answer of the registry's `resolve` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedRelease {
    pub resolved_version: String,
    #[serde(default)]
    pub resolved_version_id: Option<i64>,
    pub commit_hash: String,
    pub repo_url: String,
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub yanked: bool,
    #[serde(default = "default_true")]
    pub is_public: bool,
    #[serde(default)]
    pub source_type: String,
}

fn default_true() -> bool {
    true
}

/// One published version as listed by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub commit_hash: String,
    #[serde(default)]
    pub yanked: bool,
    #[serde(default)]
    pub published_at: Option<String>,
    /// Repository the commit lives in. Listings may omit it when every
    /// version shares the project's repository.
    #[serde(default)]
    pub repo_url: Option<String>,
}

/// Read-only view of the package registry.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Let the registry pick a release for `specifier`.
    async fn resolve(&self, identity: &PackageIdentity, specifier: &str)
        -> WeftResult<ResolvedRelease>;

    /// Every published version of `identity`, yanked ones included.
    async fn list_versions(&self, identity: &PackageIdentity) -> WeftResult<Vec<VersionInfo>>;
}

/// Materializes a repository at an exact commit.
#[async_trait]
pub trait GitFetcher: Send + Sync {
    /// Check out `commit_hash` of `repo_url` into `dest`, which does not exist yet.
    async fn fetch_into(&self, repo_url: &str, commit_hash: &str, dest: &Path) -> WeftResult<()>;
}
