//! Storage backends
//!
//! Every stage reaches the graph through the `GraphStore` trait. The
//! implementation is `SqliteStore`, a property graph over a single SQLite
//! file.

mod sqlite;
mod traits;

pub use sqlite::SqliteStore;
pub use traits::{
    CommitStats, GraphStore, OpenStore, PropertyUpdate, RunRecord, StorageError, StorageResult,
    StoreStats, StoredGraph, UniquenessConstraint, WriteUnit,
};
