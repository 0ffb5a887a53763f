//! Operation: resolve, lock, fetch and assemble.

use std::path::Path;

use weft_assemble::AssemblyReport;
use weft_core::config::GlobalConfig;
use weft_core::lockfile::{Lockfile, LOCKFILE_NAME};
use weft_core::manifest::Manifest;
use weft_resolver::lock::LockReconciler;
use weft_util::lock::ProjectLock;
use weft_util::progress::{spinner, status};

use crate::{graph_builder, Collaborators};

/// Options for `weft install`.
#[derive(Debug, Default, Clone)]
pub struct InstallOptions {
    /// Install exactly what `Weft.lock` pins; fail if it is missing or stale.
    pub locked: bool,
}

/// What an install did.
#[derive(Debug)]
pub struct InstallReport {
    /// Rendered dependency tree.
    pub tree: String,
    /// `Weft.lock` was created or rewritten.
    pub lockfile_written: bool,
    pub assembly: AssemblyReport,
}

/// Install with the configured registry and system `git`.
pub async fn install(project_root: &Path, opts: &InstallOptions) -> miette::Result<InstallReport> {
    let config = GlobalConfig::load()?;
    let collaborators = Collaborators::from_config(&config)?;
    install_with(project_root, opts, &collaborators, &config).await
}

/// Install using the given collaborators.
///
/// Holds the project lock for the whole run. The lockfile is rewritten only
/// outside `--locked` and only when its content changed.
pub async fn install_with(
    project_root: &Path,
    opts: &InstallOptions,
    collaborators: &Collaborators,
    config: &GlobalConfig,
) -> miette::Result<InstallReport> {
    let manifest = Manifest::load(project_root)?;
    let _lock = ProjectLock::acquire(project_root)?;
    let existing = Lockfile::load_optional(project_root)?;

    let builder = graph_builder(project_root, config, collaborators);
    let sp = spinner("Resolving dependencies...");
    let reconciled = LockReconciler::new(&builder)
        .reconcile(project_root, &manifest, existing.as_ref(), opts.locked)
        .await;
    sp.finish_and_clear();
    let reconciled = reconciled?;

    let packages = reconciled.graph.all_nodes().len();
    status(
        "Resolved",
        &format!(
            "{packages} package{}",
            if packages == 1 { "" } else { "s" }
        ),
    );

    let lockfile_written = !opts.locked && !reconciled.reused;
    if lockfile_written {
        reconciled
            .lockfile
            .write_to(&project_root.join(LOCKFILE_NAME))?;
        status("Locking", LOCKFILE_NAME);
    }

    let assembly = weft_assemble::assemble(project_root, &manifest, &reconciled.graph)?;
    for output in &assembly.outputs {
        let shown = output.strip_prefix(project_root).unwrap_or(output);
        status("Assembled", &shown.display().to_string());
    }
    tracing::info!(
        mode = ?assembly.mode,
        outputs = assembly.outputs.len(),
        headers = assembly.headers,
        "install finished"
    );

    Ok(InstallReport {
        tree: reconciled.graph.print_tree(None),
        lockfile_written,
        assembly,
    })
}
