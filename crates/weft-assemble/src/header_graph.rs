//! Header include graph built by following directives.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use weft_util::errors::{WeftError, WeftResult};

use crate::directive::{self, IncludeDirective};
use crate::packages::PackageSet;

/// A starting point for the graph: an entrypoint or a published header.
#[derive(Debug, Clone)]
pub struct HeaderRoot {
    pub path: PathBuf,
    pub label: String,
    /// Location inside an include tree; `None` for project entrypoints.
    pub mirror: Option<PathBuf>,
}

#[derive(Debug)]
pub struct HeaderNode {
    /// Canonical path on disk.
    pub path: PathBuf,
    /// Directive target, or the entrypoint path for roots.
    pub label: String,
    pub mirror: Option<PathBuf>,
    pub bytes: Vec<u8>,
    pub text: String,
    pub directives: Vec<IncludeDirective>,
}

/// Headers reachable from a set of roots, with an edge per directive.
#[derive(Debug, Default)]
pub struct HeaderGraph {
    graph: DiGraph<HeaderNode, usize>,
    index: HashMap<PathBuf, NodeIndex>,
    roots: Vec<NodeIndex>,
}

impl HeaderGraph {
    /// Follow every directive reachable from `roots`.
    ///
    /// Fails with `UnresolvedDirective` for directives that do not resolve and
    /// with `CyclicDependency` when headers include each other.
    pub fn build(roots: &[HeaderRoot], packages: &PackageSet) -> WeftResult<Self> {
        let mut graph = Self::default();
        for root in roots {
            let path = root.path.canonicalize()?;
            let mut stack = Vec::new();
            let idx = graph.visit(path, &root.label, root.mirror.clone(), packages, &mut stack)?;
            if !graph.roots.contains(&idx) {
                graph.roots.push(idx);
            }
        }
        Ok(graph)
    }

    fn visit(
        &mut self,
        path: PathBuf,
        label: &str,
        mirror: Option<PathBuf>,
        packages: &PackageSet,
        stack: &mut Vec<NodeIndex>,
    ) -> WeftResult<NodeIndex> {
        if let Some(&idx) = self.index.get(&path) {
            if let Some(pos) = stack.iter().position(|&open| open == idx) {
                let mut cycle: Vec<String> = stack[pos..]
                    .iter()
                    .map(|&open| self.graph[open].label.clone())
                    .collect();
                cycle.push(label.to_string());
                return Err(WeftError::CyclicDependency { cycle });
            }
            return Ok(idx);
        }

        let bytes = std::fs::read(&path)?;
        let text = weft_util::fs::decode_source(&bytes).ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("{} is not valid UTF-8 or UTF-16 text", path.display()),
            )
        })?;
        let directives = directive::scan(&path, &text);
        let idx = self.graph.add_node(HeaderNode {
            path: path.clone(),
            label: label.to_string(),
            mirror,
            bytes,
            text,
            directives: directives.clone(),
        });
        self.index.insert(path, idx);

        stack.push(idx);
        for found in &directives {
            let located = packages.locate(found)?;
            let child = self.visit(located.path, &found.target, Some(located.mirror), packages, stack)?;
            self.graph.add_edge(idx, child, found.line);
        }
        stack.pop();
        Ok(idx)
    }

    pub fn roots(&self) -> &[NodeIndex] {
        &self.roots
    }

    pub fn node(&self, idx: NodeIndex) -> &HeaderNode {
        &self.graph[idx]
    }

    pub fn find(&self, path: &Path) -> Option<NodeIndex> {
        self.index.get(path).copied()
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Headers referenced by `idx`, in directive order.
    pub fn includes_of(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut edges: Vec<(usize, NodeIndex)> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| (*e.weight(), e.target()))
            .collect();
        edges.sort();
        edges.into_iter().map(|(_, target)| target).collect()
    }

    /// Headers reachable from `root`, each listed after everything it
    /// includes, `root` last.
    pub fn emission_order(&self, root: NodeIndex) -> Vec<NodeIndex> {
        let mut order = Vec::new();
        let mut seen = HashSet::new();
        self.post_order(root, &mut seen, &mut order);
        order
    }

    fn post_order(&self, idx: NodeIndex, seen: &mut HashSet<NodeIndex>, order: &mut Vec<NodeIndex>) {
        if !seen.insert(idx) {
            return;
        }
        for child in self.includes_of(idx) {
            self.post_order(child, seen, order);
        }
        order.push(idx);
    }

    /// Every header reachable from any root, in emission order.
    pub fn all_in_order(&self) -> Vec<NodeIndex> {
        let mut order = Vec::new();
        let mut seen = HashSet::new();
        for &root in &self.roots {
            self.post_order(root, &mut seen, &mut order);
        }
        order
    }
}
