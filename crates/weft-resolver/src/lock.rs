//! Reconciling `Weft.lock` with the manifest.

use std::path::Path;

use weft_core::lockfile::{LockedPackage, Lockfile};
use weft_core::manifest::{DependencySource, Manifest};
use weft_util::errors::{WeftError, WeftResult};

use crate::graph::{DependencyGraph, NodeSource};
use crate::resolver::GraphBuilder;

/// Digest of the manifest declarations a lockfile was produced from.
///
/// Covers `[dependencies]` and `[overrides]` only, so unrelated manifest
/// edits leave the lockfile valid. Keys are normalized to their identity,
/// so `json` and `@acme/json` in an `acme` manifest digest the same.
pub fn fingerprint(manifest: &Manifest) -> WeftResult<String> {
    let mut lines: Vec<String> = Vec::new();
    for decl in manifest.dependency_decls(Path::new(""))? {
        let source = match &decl.source {
            DependencySource::Registry { specifier } => specifier.clone(),
            DependencySource::Local { path } => format!("path {}", path.display()),
        };
        lines.push(format!("dep {}:{} {source}", decl.identity.target, decl.identity));
    }
    for decl in manifest.override_decls()? {
        lines.push(format!(
            "override {}:{} {}",
            decl.identity.target, decl.identity, decl.version
        ));
    }
    lines.sort();
    Ok(weft_util::hash::sha256_lines(&lines))
}

/// Lock entries for every registry node of `graph`.
pub fn lockfile_from_graph(graph: &DependencyGraph, fingerprint: String) -> Lockfile {
    let package = graph
        .all_nodes()
        .into_iter()
        .filter_map(|node| {
            let NodeSource::Registry { repo_url } = &node.source else {
                return None;
            };
            Some(LockedPackage {
                organization: node.identity.organization.clone(),
                name: node.identity.name.clone(),
                target: node.identity.target.clone(),
                version: node.version.as_ref()?.to_string(),
                commit_hash: node.commit_hash.clone()?,
                source: Some(repo_url.clone()),
            })
        })
        .collect();
    Lockfile::new(fingerprint, package)
}

/// Outcome of a reconciliation.
#[derive(Debug)]
pub struct Reconciled {
    pub graph: DependencyGraph,
    pub lockfile: Lockfile,
    /// The existing lockfile was reused as-is.
    pub reused: bool,
}

pub struct LockReconciler<'a> {
    builder: &'a GraphBuilder,
}

impl<'a> LockReconciler<'a> {
    pub fn new(builder: &'a GraphBuilder) -> Self {
        Self { builder }
    }

    /// Produce the graph and the lockfile describing it.
    ///
    /// With `strict`, the existing lockfile must exist, carry the manifest's
    /// fingerprint, and pin versions that still satisfy every specifier; it
    /// is then reused verbatim. Otherwise versions are selected afresh.
    pub async fn reconcile(
        &self,
        root_dir: &Path,
        manifest: &Manifest,
        existing: Option<&Lockfile>,
        strict: bool,
    ) -> WeftResult<Reconciled> {
        let fingerprint = fingerprint(manifest)?;

        if strict {
            let lockfile = existing.ok_or_else(|| WeftError::LockInconsistency {
                message: "no Weft.lock to install from".to_string(),
            })?;
            if lockfile.fingerprint != fingerprint {
                return Err(WeftError::LockInconsistency {
                    message: "dependencies or overrides changed since Weft.lock was written"
                        .to_string(),
                });
            }
            let graph = self.builder.build_locked(root_dir, manifest, lockfile).await?;
            return Ok(Reconciled {
                graph,
                lockfile: lockfile.clone(),
                reused: true,
            });
        }

        let graph = self.builder.build(root_dir, manifest).await?;
        let lockfile = lockfile_from_graph(&graph, fingerprint);
        let reused = existing == Some(&lockfile);
        Ok(Reconciled {
            graph,
            lockfile,
            reused,
        })
    }
}
