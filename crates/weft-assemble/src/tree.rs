//! Tree mode: mirror referenced headers into the project's `weft/include`.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use weft_core::manifest::Manifest;
use weft_util::errors::{WeftError, WeftResult};

use crate::header_graph::{HeaderGraph, HeaderRoot};
use crate::packages::{LocatedHeader, PackageSet, INCLUDE_DIR};

/// Copy the headers of every package the roots reach into `weft/include`,
/// preserving `<organization>/<name>/…` so directives and relative
/// `#include`s resolve locally.
pub fn assemble_tree(
    project_root: &Path,
    manifest: &Manifest,
    packages: &PackageSet,
) -> WeftResult<(Vec<PathBuf>, usize)> {
    let roots = tree_roots(project_root, manifest, packages)?;
    let graph = HeaderGraph::build(&roots, packages)?;
    let headers = mirrored_headers(&graph, packages)?;

    let out_dir = project_root.join(INCLUDE_DIR);
    if out_dir.exists() {
        std::fs::remove_dir_all(&out_dir)?;
    }

    let mut outputs = Vec::new();
    for header in headers {
        let dest = out_dir.join(&header.mirror);
        let bytes = std::fs::read(&header.path)?;
        weft_util::fs::write_atomic(&dest, &bytes)?;
        debug!(header = %header.mirror.display(), "mirrored header");
        outputs.push(dest);
    }
    outputs.sort();
    info!(headers = outputs.len(), dir = %out_dir.display(), "mirrored include tree");
    let headers = outputs.len();
    Ok((outputs, headers))
}

/// Every dependency header in `graph`, plus the whole package directory
/// each of them belongs to. The project's own headers are never mirrored.
fn mirrored_headers(graph: &HeaderGraph, packages: &PackageSet) -> WeftResult<Vec<LocatedHeader>> {
    let mut headers = Vec::new();
    let mut reached = BTreeSet::new();
    for idx in graph.all_in_order() {
        let node = graph.node(idx);
        let Some(mirror) = &node.mirror else {
            continue;
        };
        let mut components = mirror.iter();
        let (Some(organization), Some(name)) = (components.next(), components.next()) else {
            continue;
        };
        let package = (
            organization.to_string_lossy().into_owned(),
            name.to_string_lossy().into_owned(),
        );
        if packages.is_project(&package.0, &package.1) {
            continue;
        }
        headers.push(LocatedHeader {
            path: node.path.clone(),
            mirror: mirror.clone(),
        });
        reached.insert(package);
    }

    for (organization, name) in reached {
        headers.extend(packages.package_headers(&organization, &name)?);
    }
    headers.sort_by(|a, b| a.mirror.cmp(&b.mirror));
    headers.dedup_by(|a, b| a.mirror == b.mirror);
    Ok(headers)
}

/// Entrypoints when declared, otherwise every header dependencies publish.
fn tree_roots(
    project_root: &Path,
    manifest: &Manifest,
    packages: &PackageSet,
) -> WeftResult<Vec<HeaderRoot>> {
    if !manifest.entrypoints.is_empty() {
        return manifest
            .entrypoints
            .iter()
            .map(|entrypoint| {
                let path = project_root.join(entrypoint);
                if !path.is_file() {
                    return Err(WeftError::Manifest {
                        message: format!("entrypoint `{entrypoint}` does not exist"),
                    });
                }
                Ok(HeaderRoot {
                    path,
                    label: entrypoint.clone(),
                    mirror: None,
                })
            })
            .collect();
    }

    Ok(packages
        .published_headers()?
        .into_iter()
        .map(|header| HeaderRoot {
            label: header.mirror.to_string_lossy().replace('\\', "/"),
            path: header.path,
            mirror: Some(header.mirror),
        })
        .collect())
}
