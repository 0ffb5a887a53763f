pub mod ops_install;
pub mod ops_tree;

use std::path::Path;
use std::sync::Arc;

use weft_core::config::GlobalConfig;
use weft_registry::git::GitCli;
use weft_registry::http::HttpRegistry;
use weft_registry::{GitFetcher, RegistryClient};
use weft_resolver::cache::PackageCache;
use weft_resolver::resolver::GraphBuilder;
use weft_util::errors::WeftResult;

/// The registry and git implementations an operation talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub registry: Arc<dyn RegistryClient>,
    pub fetcher: Arc<dyn GitFetcher>,
}

impl Collaborators {
    /// HTTP registry and system `git`, configured from `config`.
    pub fn from_config(config: &GlobalConfig) -> WeftResult<Self> {
        let attempts = config.network.retries.saturating_add(1);
        let registry = HttpRegistry::new(&config.registry.url, config.network.timeout(), attempts)?;
        Ok(Self {
            registry: Arc::new(registry),
            fetcher: Arc::new(GitCli::new(attempts)),
        })
    }
}

/// Graph builder for a project, with its package cache and limits taken
/// from `config`.
pub fn graph_builder(
    project_root: &Path,
    config: &GlobalConfig,
    collaborators: &Collaborators,
) -> GraphBuilder {
    let cache = PackageCache::new(config.cache_dir(project_root), collaborators.fetcher.clone())
        .with_timeout(config.network.timeout());
    GraphBuilder::new(collaborators.registry.clone(), Arc::new(cache))
        .with_jobs(config.network.jobs)
}
