//! The in-memory citation graph.
//!
//! Nodes are paper handles and an edge `a -> b` means that `a` cites `b`.
//! The graph is a plain [`petgraph`] `DiGraph` with a handle index next to it,
//! so that the metrics can walk it by node index while callers address nodes
//! by handle.

use std::collections::HashMap;

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

use crate::construct::Database;
use crate::error::Result;

#[derive(Debug, Default, Clone)]
pub struct CitationGraph {
    graph: DiGraph<String, ()>,
    index: HashMap<String, NodeIndex>,
}

impl CitationGraph {
    pub fn new() -> Self {
        Self::default()
    }
    /// Returns the node for the handle, adding it if needed.
    pub fn add_node(&mut self, handle: &str) -> NodeIndex {
        if let Some(node) = self.index.get(handle) {
            return *node;
        }
        let node = self.graph.add_node(handle.to_owned());
        self.index.insert(handle.to_owned(), node);
        node
    }
    /// Adds `citing -> cited`. Self-loops and repeated edges are not added,
    /// in which case false is returned.
    pub fn add_edge(&mut self, citing: &str, cited: &str) -> bool {
        if citing == cited {
            return false;
        }
        let from = self.add_node(citing);
        let to = self.add_node(cited);
        if self.graph.contains_edge(from, to) {
            return false;
        }
        self.graph.add_edge(from, to, ());
        true
    }
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }
    pub fn node(&self, handle: &str) -> Option<NodeIndex> {
        self.index.get(handle).copied()
    }
    pub fn handle(&self, node: NodeIndex) -> Option<&str> {
        self.graph.node_weight(node).map(String::as_str)
    }
    /// Handles in node index order.
    pub fn handles(&self) -> impl Iterator<Item = &str> {
        self.graph.node_indices().map(|node| self.graph[node].as_str())
    }
    pub fn contains_edge(&self, citing: &str, cited: &str) -> bool {
        match (self.node(citing), self.node(cited)) {
            (Some(from), Some(to)) => self.graph.contains_edge(from, to),
            _ => false,
        }
    }
    /// Every edge as a (citing, cited) pair of handles.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.graph
            .edge_references()
            .map(|e| (self.graph[e.source()].as_str(), self.graph[e.target()].as_str()))
    }
    pub fn out_degree(&self, node: NodeIndex) -> usize {
        self.graph.edges_directed(node, Direction::Outgoing).count()
    }
    pub fn in_degree(&self, node: NodeIndex) -> usize {
        self.graph.edges_directed(node, Direction::Incoming).count()
    }
    pub fn inner(&self) -> &DiGraph<String, ()> {
        &self.graph
    }
}

/// Reads the persisted citations into a [`CitationGraph`].
pub struct GraphAssembler<'db> {
    db: &'db Database,
    include_isolated: bool,
}

impl<'db> GraphAssembler<'db> {
    pub fn new(db: &'db Database) -> Self {
        Self {
            db,
            include_isolated: false,
        }
    }
    /// Also add papers that neither cite nor are cited.
    pub fn include_isolated(mut self, include_isolated: bool) -> Self {
        self.include_isolated = include_isolated;
        self
    }
    pub fn build_graph(&self) -> Result<CitationGraph> {
        let mut graph = CitationGraph::new();
        if self.include_isolated {
            for handle in self.db.paper_handles()? {
                graph.add_node(&handle);
            }
        }
        for edge in self.db.citation_edges()? {
            graph.add_edge(edge.citing(), edge.cited());
        }
        tracing::debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "citation graph assembled"
        );
        Ok(graph)
    }
}
