//! Turns a resolved dependency graph into header artifacts the compiler can
//! consume: one flat header per entrypoint, or a mirrored include tree.

pub mod directive;
pub mod flat;
pub mod header_graph;
pub mod packages;
pub mod tree;

use std::path::{Path, PathBuf};

use weft_core::manifest::{IncludeMode, Manifest};
use weft_resolver::graph::DependencyGraph;
use weft_util::errors::WeftResult;

pub use packages::PackageSet;

/// What an assembly produced.
#[derive(Debug)]
pub struct AssemblyReport {
    pub mode: IncludeMode,
    /// Files written, sorted.
    pub outputs: Vec<PathBuf>,
    /// Dependency headers that went into the outputs.
    pub headers: usize,
}

/// Assemble headers for the project at `project_root` in its effective mode.
pub fn assemble(
    project_root: &Path,
    manifest: &Manifest,
    graph: &DependencyGraph,
) -> WeftResult<AssemblyReport> {
    let packages = PackageSet::from_graph(graph)?;
    let mode = manifest.effective_include_mode();
    let (outputs, headers) = match mode {
        IncludeMode::Flat => flat::assemble_flat(project_root, manifest, &packages)?,
        IncludeMode::Include => tree::assemble_tree(project_root, manifest, &packages)?,
    };
    Ok(AssemblyReport {
        mode,
        outputs,
        headers,
    })
}
