//! Flat mode: one concatenated header per entrypoint under `weft/flat`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::info;
use weft_core::manifest::Manifest;
use weft_util::errors::{WeftError, WeftResult};

use crate::directive;
use crate::header_graph::{HeaderGraph, HeaderRoot};
use crate::packages::PackageSet;

/// Directory, relative to the project root, receiving flat headers.
pub const FLAT_DIR: &str = "weft/flat";

/// `Bot.mq5` becomes `Bot_flat.mq5`.
pub fn flat_file_name(entrypoint: &Path) -> WeftResult<String> {
    let stem = entrypoint
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| WeftError::Manifest {
            message: format!("entrypoint `{}` has no file name", entrypoint.display()),
        })?;
    Ok(match entrypoint.extension() {
        Some(ext) => format!("{stem}_flat.{}", ext.to_string_lossy()),
        None => format!("{stem}_flat"),
    })
}

/// Render the flat header for the single root of `graph`.
pub fn render(manifest: &Manifest, entrypoint: &str, graph: &HeaderGraph) -> String {
    let mut out = String::new();
    out.push_str("// Generated by weft. Do not edit.\n");
    out.push_str(&format!("// Project: {} v{}\n", manifest.identity(), manifest.version));
    out.push_str(&format!("// Entrypoint: {entrypoint}\n"));

    for &root in graph.roots() {
        for idx in graph.emission_order(root) {
            let node = graph.node(idx);
            out.push('\n');
            out.push_str(&format!("// ---- {} ----\n", node.label));
            let body = strip_directives(&node.text);
            out.push_str(&body);
            if !body.is_empty() && !body.ends_with('\n') {
                out.push('\n');
            }
        }
    }
    out
}

/// Drop every recognized directive line; everything else is kept as is.
fn strip_directives(text: &str) -> String {
    text.split_inclusive('\n')
        .filter(|line| directive::recognize(line).is_none())
        .collect()
}

/// Build every entrypoint's flat header and write them to `weft/flat`.
///
/// All graphs are built before anything is written, so a failing directive
/// leaves the previous output in place.
pub fn assemble_flat(
    project_root: &Path,
    manifest: &Manifest,
    packages: &PackageSet,
) -> WeftResult<(Vec<PathBuf>, usize)> {
    if manifest.entrypoints.is_empty() {
        return Err(WeftError::Manifest {
            message: "flat mode requires at least one entry in `entrypoints`".to_string(),
        });
    }

    let mut rendered = Vec::new();
    let mut names = HashSet::new();
    let mut headers = 0;
    for entrypoint in &manifest.entrypoints {
        let path = project_root.join(entrypoint);
        if !path.is_file() {
            return Err(WeftError::Manifest {
                message: format!("entrypoint `{entrypoint}` does not exist"),
            });
        }
        let name = flat_file_name(Path::new(entrypoint))?;
        if !names.insert(name.clone()) {
            return Err(WeftError::Manifest {
                message: format!("more than one entrypoint flattens to `{name}`"),
            });
        }
        let graph = HeaderGraph::build(
            &[HeaderRoot {
                path,
                label: entrypoint.clone(),
                mirror: None,
            }],
            packages,
        )?;
        headers += graph.len().saturating_sub(1);
        rendered.push((name, render(manifest, entrypoint, &graph)));
    }

    let out_dir = project_root.join(FLAT_DIR);
    if out_dir.exists() {
        std::fs::remove_dir_all(&out_dir)?;
    }
    weft_util::fs::ensure_dir(&out_dir)?;

    let mut outputs = Vec::new();
    for (name, text) in rendered {
        let path = out_dir.join(&name);
        weft_util::fs::write_atomic(&path, text.as_bytes())?;
        info!(output = %path.display(), "wrote flat header");
        outputs.push(path);
    }
    Ok((outputs, headers))
}
