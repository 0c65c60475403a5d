//! Core graph data structures

mod edge;
mod node;
mod snapshot;

#[cfg(test)]
mod tests;

pub use edge::{Edge, EdgeKey};
pub use node::{Node, NodeId, NodeKey, Properties, PropertyValue};
pub use snapshot::{GraphSnapshot, SnapshotError};

/// Base node labels present in every projected graph
pub mod label {
    pub const SOURCE: &str = "Source";
    pub const ITEM: &str = "Item";
    pub const DEFAULT_CONCEPT: &str = "Concept";

    /// Labels no template field may derive to
    pub const RESERVED: [&str; 2] = [SOURCE, ITEM];
}

/// Relationship types of the persisted layout
pub mod rel {
    pub const FROM_SOURCE: &str = "FROM_SOURCE";
    pub const MENTIONS: &str = "MENTIONS";
    pub const GROUPED_BY: &str = "GROUPED_BY";
    pub const QUALIFIED_BY: &str = "QUALIFIED_BY";
    pub const BELONGS_TO: &str = "BELONGS_TO";
    pub const RELATES_TO: &str = "RELATES_TO";
    pub const IS_LINKED_TO: &str = "IS_LINKED_TO";

    /// Concept → taxonomy relationship types
    pub const TAXONOMY: [&str; 3] = [GROUPED_BY, QUALIFIED_BY, BELONGS_TO];
}
