//! Resolved package graph construction and traversal.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use weft_core::identity::PackageIdentity;

use crate::version::SemanticVersion;

/// Where a node's content came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeSource {
    /// The project being installed.
    Root,
    Registry { repo_url: String },
    Local,
}

/// A node in the resolved graph: one selected version per identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedNode {
    pub identity: PackageIdentity,
    /// `None` for local path dependencies, which carry no pinned version.
    pub version: Option<SemanticVersion>,
    pub commit_hash: Option<String>,
    /// Directory holding the package content.
    pub path: PathBuf,
    pub source: NodeSource,
}

impl fmt::Display for ResolvedNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.source, &self.version) {
            (NodeSource::Local, _) => write!(f, "{} (local {})", self.identity, self.path.display()),
            (_, Some(version)) => write!(f, "{} v{version}", self.identity),
            (_, None) => write!(f, "{}", self.identity),
        }
    }
}

/// Edge label: how the parent declared the dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepEdge {
    Registry { specifier: String },
    Local { path: PathBuf },
}

/// A resolved dependency graph backed by petgraph.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    graph: DiGraph<ResolvedNode, DepEdge>,
    index: HashMap<PackageIdentity, NodeIndex>,
    pub root: Option<NodeIndex>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or retrieve a node. If the identity already exists, returns the existing index.
    pub fn add_node(&mut self, node: ResolvedNode) -> NodeIndex {
        if let Some(&idx) = self.index.get(&node.identity) {
            return idx;
        }
        let identity = node.identity.clone();
        let idx = self.graph.add_node(node);
        self.index.insert(identity, idx);
        idx
    }

    pub fn set_root(&mut self, idx: NodeIndex) {
        self.root = Some(idx);
    }

    /// Add a dependency edge from `from` to `to`; repeated edges are ignored.
    pub fn add_edge(&mut self, from: NodeIndex, to: NodeIndex, edge: DepEdge) {
        if !self.graph.edges(from).any(|e| e.target() == to) {
            self.graph.add_edge(from, to, edge);
        }
    }

    pub fn find(&self, identity: &PackageIdentity) -> Option<NodeIndex> {
        self.index.get(identity).copied()
    }

    pub fn node(&self, idx: NodeIndex) -> &ResolvedNode {
        &self.graph[idx]
    }

    pub fn root_node(&self) -> Option<&ResolvedNode> {
        self.root.map(|idx| &self.graph[idx])
    }

    /// All resolved nodes (excluding root), sorted by identity.
    pub fn all_nodes(&self) -> Vec<&ResolvedNode> {
        let mut nodes: Vec<&ResolvedNode> = self
            .graph
            .node_indices()
            .filter(|&idx| Some(idx) != self.root)
            .map(|idx| &self.graph[idx])
            .collect();
        nodes.sort_by(|a, b| a.identity.cmp(&b.identity));
        nodes
    }

    /// Every node, root included.
    pub fn nodes_with_root(&self) -> impl Iterator<Item = &ResolvedNode> {
        self.graph.node_indices().map(|idx| &self.graph[idx])
    }

    /// Direct dependencies of a node, in declaration order.
    pub fn dependencies_of(&self, idx: NodeIndex) -> Vec<(NodeIndex, &DepEdge)> {
        let mut deps: Vec<(NodeIndex, &DepEdge)> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| (e.target(), e.weight()))
            .collect();
        // petgraph yields the most recently added edge first
        deps.reverse();
        deps
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Render the tree under the root. Subtrees already printed are shown once.
    pub fn print_tree(&self, max_depth: Option<usize>) -> String {
        let mut output = String::new();
        let root = match self.root {
            Some(r) => r,
            None => return output,
        };

        output.push_str(&format!("{}\n", self.graph[root]));

        let mut visited = HashSet::new();
        visited.insert(root);
        let deps = self.dependencies_of(root);
        let count = deps.len();
        for (i, (idx, _)) in deps.into_iter().enumerate() {
            self.print_subtree(&mut output, idx, "", i == count - 1, 1, max_depth, &mut visited);
        }
        output
    }

    #[allow(clippy::too_many_arguments)]
    fn print_subtree(
        &self,
        output: &mut String,
        idx: NodeIndex,
        prefix: &str,
        is_last: bool,
        depth: usize,
        max_depth: Option<usize>,
        visited: &mut HashSet<NodeIndex>,
    ) {
        let connector = if is_last { "└── " } else { "├── " };
        let node = &self.graph[idx];
        let deps = self.dependencies_of(idx);

        if !visited.insert(idx) {
            let marker = if deps.is_empty() { "" } else { " (*)" };
            output.push_str(&format!("{prefix}{connector}{node}{marker}\n"));
            return;
        }
        output.push_str(&format!("{prefix}{connector}{node}\n"));

        if let Some(max) = max_depth {
            if depth >= max {
                return;
            }
        }

        let child_prefix = format!("{prefix}{}", if is_last { "    " } else { "│   " });
        let count = deps.len();
        for (i, (child, _)) in deps.into_iter().enumerate() {
            self.print_subtree(
                output,
                child,
                &child_prefix,
                i == count - 1,
                depth + 1,
                max_depth,
                visited,
            );
        }
    }
}
