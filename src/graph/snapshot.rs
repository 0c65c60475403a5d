//! GraphSnapshot: a read-only, indexed view of the committed graph
//!
//! Metric stages load one snapshot per run and traverse it in memory.
//! Building the snapshot checks referential integrity: every edge endpoint
//! must be a node of the snapshot.

use super::edge::Edge;
use super::node::{Node, NodeKey};
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("relationship {edge} references missing node {missing}")]
    DanglingEdge { edge: String, missing: String },

    #[error("duplicate node {0}")]
    DuplicateNode(String),
}

/// Indexed view over a fixed set of nodes and edges
#[derive(Debug, Clone, Default)]
pub struct GraphSnapshot {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    index: HashMap<NodeKey, usize>,
    /// Per node: indices into `edges` of outgoing relationships
    outgoing: Vec<Vec<usize>>,
    /// Per node: indices into `edges` of incoming relationships
    incoming: Vec<Vec<usize>>,
}

impl GraphSnapshot {
    pub fn build(nodes: Vec<Node>, edges: Vec<Edge>) -> Result<Self, SnapshotError> {
        let mut index = HashMap::with_capacity(nodes.len());
        for (i, node) in nodes.iter().enumerate() {
            if index.insert(node.key.clone(), i).is_some() {
                return Err(SnapshotError::DuplicateNode(node.key.to_string()));
            }
        }

        let mut outgoing = vec![Vec::new(); nodes.len()];
        let mut incoming = vec![Vec::new(); nodes.len()];

        for (e, edge) in edges.iter().enumerate() {
            let from = *index.get(edge.source()).ok_or_else(|| SnapshotError::DanglingEdge {
                edge: edge.key.to_string(),
                missing: edge.source().to_string(),
            })?;
            let to = *index.get(edge.target()).ok_or_else(|| SnapshotError::DanglingEdge {
                edge: edge.key.to_string(),
                missing: edge.target().to_string(),
            })?;
            outgoing[from].push(e);
            incoming[to].push(e);
        }

        Ok(Self {
            nodes,
            edges,
            index,
            outgoing,
            incoming,
        })
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    pub fn node(&self, idx: usize) -> &Node {
        &self.nodes[idx]
    }

    pub fn index_of(&self, key: &NodeKey) -> Option<usize> {
        self.index.get(key).copied()
    }

    pub fn get(&self, key: &NodeKey) -> Option<&Node> {
        self.index_of(key).map(|i| &self.nodes[i])
    }

    /// Indices of all nodes carrying `label`, in snapshot order
    pub fn indices_with_label<'a>(&'a self, label: &'a str) -> impl Iterator<Item = usize> + 'a {
        self.nodes
            .iter()
            .enumerate()
            .filter(move |(_, n)| n.label() == label)
            .map(|(i, _)| i)
    }

    pub fn outgoing(&self, idx: usize) -> impl Iterator<Item = &Edge> {
        self.outgoing[idx].iter().map(move |&e| &self.edges[e])
    }

    pub fn incoming(&self, idx: usize) -> impl Iterator<Item = &Edge> {
        self.incoming[idx].iter().map(move |&e| &self.edges[e])
    }

    /// Outgoing edges of one relationship type, paired with the target index
    pub fn out_via<'a>(&'a self, idx: usize, rel_type: &'a str) -> impl Iterator<Item = (usize, &'a Edge)> + 'a {
        self.outgoing(idx)
            .filter(move |e| e.rel_type() == rel_type)
            .filter_map(move |e| self.index_of(e.target()).map(|t| (t, e)))
    }

    /// Incoming edges of one relationship type, paired with the source index
    pub fn in_via<'a>(&'a self, idx: usize, rel_type: &'a str) -> impl Iterator<Item = (usize, &'a Edge)> + 'a {
        self.incoming(idx)
            .filter(move |e| e.rel_type() == rel_type)
            .filter_map(move |e| self.index_of(e.source()).map(|s| (s, e)))
    }

    /// Distinct relationship types present
    pub fn relationship_types(&self) -> BTreeSet<String> {
        self.edges.iter().map(|e| e.rel_type().to_string()).collect()
    }

    /// Distinct node labels present
    pub fn labels(&self) -> BTreeSet<String> {
        self.nodes.iter().map(|n| n.label().to_string()).collect()
    }
}
