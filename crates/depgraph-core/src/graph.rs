//! Dependency graph wrapper using petgraph::StableDiGraph keyed by package name

use crate::export::{ExportEdge, ExportNode, GraphJson};
use crate::model::{DependencyEdge, PackageName};
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use petgraph::Direction;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// An edge endpoint was never added as a node.
    #[error("cannot add edge {from} -> {to}: node {missing} is not in the graph")]
    UnknownNode {
        from: PackageName,
        to: PackageName,
        missing: PackageName,
    },
}

/// A simple directed graph of packages (no parallel edges) with a
/// designated root that is always present.
pub struct DependencyGraph {
    inner: StableDiGraph<PackageName, ()>,
    index: HashMap<PackageName, NodeIndex>,
    root: PackageName,
}

impl std::fmt::Debug for DependencyGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyGraph")
            .field("root", &self.root)
            .field("node_count", &self.inner.node_count())
            .field("edge_count", &self.inner.edge_count())
            .finish()
    }
}

impl DependencyGraph {
    /// Create a graph whose only node is `root`.
    pub fn new(root: PackageName) -> Self {
        let mut graph = DependencyGraph {
            inner: StableDiGraph::new(),
            index: HashMap::new(),
            root: root.clone(),
        };
        graph.add_node(root);
        graph
    }

    pub fn root(&self) -> &PackageName {
        &self.root
    }

    /// Add a node. Adding an existing name is a no-op.
    pub fn add_node(&mut self, name: PackageName) -> bool {
        if self.index.contains_key(&name) {
            return false;
        }
        let idx = self.inner.add_node(name.clone());
        self.index.insert(name, idx);
        true
    }

    /// Add `from -> to`. Both endpoints must already be nodes.
    /// Returns `Ok(false)` when the edge already existed.
    pub fn add_edge(&mut self, from: &PackageName, to: &PackageName) -> Result<bool, GraphError> {
        let source = self.lookup(from, from, to)?;
        let target = self.lookup(to, from, to)?;
        if self.inner.find_edge(source, target).is_some() {
            return Ok(false);
        }
        self.inner.add_edge(source, target, ());
        Ok(true)
    }

    fn lookup(
        &self,
        name: &PackageName,
        from: &PackageName,
        to: &PackageName,
    ) -> Result<NodeIndex, GraphError> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| GraphError::UnknownNode {
                from: from.clone(),
                to: to.clone(),
                missing: name.clone(),
            })
    }

    pub fn contains_node(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn contains_edge(&self, from: &str, to: &str) -> bool {
        match (self.index.get(from), self.index.get(to)) {
            (Some(&source), Some(&target)) => self.inner.find_edge(source, target).is_some(),
            _ => false,
        }
    }

    /// Total number of nodes.
    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    /// Total number of edges.
    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    /// Iterate over all package names.
    pub fn nodes(&self) -> impl Iterator<Item = &PackageName> {
        self.inner
            .node_indices()
            .filter_map(move |idx| self.inner.node_weight(idx))
    }

    /// Iterate over all edges.
    pub fn edges(&self) -> impl Iterator<Item = DependencyEdge> + '_ {
        self.inner.edge_references().map(move |edge_ref| {
            DependencyEdge::new(
                self.inner[edge_ref.source()].clone(),
                self.inner[edge_ref.target()].clone(),
            )
        })
    }

    /// Direct dependencies of `name`, empty if the name is unknown.
    pub fn dependencies_of(&self, name: &str) -> Vec<&PackageName> {
        let Some(&idx) = self.index.get(name) else {
            return Vec::new();
        };
        self.inner
            .neighbors_directed(idx, Direction::Outgoing)
            .filter_map(|n| self.inner.node_weight(n))
            .collect()
    }

    /// Packages that depend directly on `name`.
    pub fn dependents_of(&self, name: &str) -> Vec<&PackageName> {
        let Some(&idx) = self.index.get(name) else {
            return Vec::new();
        };
        self.inner
            .neighbors_directed(idx, Direction::Incoming)
            .filter_map(|n| self.inner.node_weight(n))
            .collect()
    }

    /// Flatten into the render-ready form. Nodes and edges are sorted so that
    /// repeated exports of the same graph are identical.
    pub fn export(&self) -> GraphJson {
        let mut nodes: Vec<ExportNode> = self
            .nodes()
            .map(|name| ExportNode {
                id: name.to_string(),
                label: name.to_string(),
            })
            .collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));

        let mut edges: Vec<ExportEdge> = self
            .edges()
            .map(|edge| ExportEdge {
                from: edge.from.into_string(),
                to: edge.to.into_string(),
            })
            .collect();
        edges.sort();

        GraphJson {
            root_node_id: self.root.to_string(),
            nodes,
            edges,
        }
    }
}
