//! Operation: display the dependency tree.

use std::path::Path;

use weft_core::config::GlobalConfig;
use weft_core::lockfile::Lockfile;
use weft_core::manifest::Manifest;
use weft_resolver::lock::{fingerprint, LockReconciler};
use weft_util::errors::WeftError;
use weft_util::lock::ProjectLock;

use crate::{graph_builder, Collaborators};

/// Options for `weft tree`.
#[derive(Debug, Default, Clone)]
pub struct TreeOptions {
    /// Maximum tree depth to display.
    pub depth: Option<usize>,
}

/// Render the tree with the configured registry and system `git`.
pub async fn tree(project_root: &Path, opts: &TreeOptions) -> miette::Result<String> {
    let config = GlobalConfig::load()?;
    let collaborators = Collaborators::from_config(&config)?;
    tree_with(project_root, opts, &collaborators, &config).await
}

/// Resolve the project and render its dependency tree. Pins from
/// `Weft.lock` are honored while it matches the manifest; nothing is
/// written besides the package cache.
pub async fn tree_with(
    project_root: &Path,
    opts: &TreeOptions,
    collaborators: &Collaborators,
    config: &GlobalConfig,
) -> miette::Result<String> {
    let manifest = Manifest::load(project_root)?;
    let _lock = ProjectLock::acquire(project_root)?;
    let current = fingerprint(&manifest)?;
    let existing = Lockfile::load_optional(project_root)?.filter(|lock| lock.fingerprint == current);

    let builder = graph_builder(project_root, config, collaborators);
    let reconciler = LockReconciler::new(&builder);
    let reconciled = match existing {
        Some(lockfile) => {
            match reconciler
                .reconcile(project_root, &manifest, Some(&lockfile), true)
                .await
            {
                Err(WeftError::LockInconsistency { message }) => {
                    tracing::debug!("ignoring Weft.lock: {message}");
                    reconciler.reconcile(project_root, &manifest, None, false).await?
                }
                other => other?,
            }
        }
        None => reconciler.reconcile(project_root, &manifest, None, false).await?,
    };

    Ok(reconciled.graph.print_tree(opts.depth))
}
