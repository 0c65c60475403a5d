//! Storage trait definitions

use crate::graph::{Edge, Node, NodeKey, Properties};
use crate::sync::Mutation;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Relationship {edge} references missing node {missing}")]
    MissingEndpoint { edge: String, missing: String },

    #[error("Date parsing error: {0}")]
    DateParse(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Natural keys are unique within `label`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct UniquenessConstraint {
    pub label: String,
}

impl UniquenessConstraint {
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into() }
    }

    /// Store-side name of the constraint
    pub fn name(&self) -> String {
        format!("uniq_{}_natural_key", self.label)
    }
}

/// One atomic write: everything commits or nothing does
#[derive(Debug, Clone, Copy)]
pub struct WriteUnit<'a> {
    /// Recorded in the run ledger
    pub project: &'a str,
    pub mutations: &'a [Mutation],
    /// Created inside the same transaction; existing ones are left alone
    pub constraints: &'a [UniquenessConstraint],
    /// Clear all nodes and edges inside the same transaction first
    pub replace: bool,
}

/// Outcome of a committed write unit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommitStats {
    pub run_id: i64,
    /// Uniqueness constraints that did not exist before the commit
    pub constraints_created: usize,
    pub nodes_upserted: usize,
    pub edges_merged: usize,
    /// Nodes that did not exist before the commit
    pub nodes_created: usize,
    /// Edges that did not exist before the commit
    pub edges_created: usize,
}

/// Properties to merge onto an existing node
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyUpdate {
    pub key: NodeKey,
    pub properties: Properties,
}

impl PropertyUpdate {
    pub fn new(key: NodeKey) -> Self {
        Self {
            key,
            properties: Properties::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<crate::graph::PropertyValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// The full committed graph, as read back for metric computation
#[derive(Debug, Clone, Default)]
pub struct StoredGraph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

/// One row of the run ledger
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunRecord {
    pub id: i64,
    pub project: String,
    pub committed_at: DateTime<Utc>,
    pub replaced: bool,
    pub nodes_upserted: usize,
    pub edges_merged: usize,
}

/// Counts for `synesis-graph stats`
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreStats {
    pub nodes_by_label: BTreeMap<String, usize>,
    pub edges_by_type: BTreeMap<String, usize>,
    pub last_run: Option<RunRecord>,
}

impl StoreStats {
    pub fn node_count(&self) -> usize {
        self.nodes_by_label.values().sum()
    }

    pub fn edge_count(&self) -> usize {
        self.edges_by_type.values().sum()
    }
}

/// Trait for graph storage backends
///
/// Implementations must be thread-safe (Send + Sync) so that metric stages
/// for different node kinds can share one store handle.
pub trait GraphStore: Send + Sync {
    // === Write contract ===

    /// Apply a write unit atomically: uniqueness constraints, all node
    /// upserts, then all edge merges, then a run ledger row. Any failure
    /// rolls everything back, constraints included.
    fn commit(&self, unit: &WriteUnit<'_>) -> StorageResult<CommitStats>;

    /// Merge properties onto existing nodes in one transaction. Updates for
    /// unknown nodes are skipped; returns how many nodes changed.
    fn write_properties(&self, updates: &[PropertyUpdate]) -> StorageResult<usize>;

    /// Remove the named properties from every node; returns how many nodes
    /// had at least one of them.
    fn remove_properties(&self, names: &[&str]) -> StorageResult<usize>;

    // === Read contract ===

    /// Distinct relationship types present in the committed graph
    fn relationship_types(&self) -> StorageResult<BTreeSet<String>>;

    /// Every node and edge, ordered by key
    fn load_graph(&self) -> StorageResult<StoredGraph>;

    fn load_node(&self, key: &NodeKey) -> StorageResult<Option<Node>>;

    fn stats(&self) -> StorageResult<StoreStats>;
}

/// Extension trait for opening stores from paths
pub trait OpenStore: GraphStore + Sized {
    /// Open or create a store at the given path
    fn open(path: impl AsRef<Path>) -> StorageResult<Self>;

    /// Create an in-memory store (useful for testing)
    fn open_in_memory() -> StorageResult<Self>;
}
