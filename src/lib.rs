//! synesis-graph: research corpora as a property graph
//!
//! Takes the records and template produced by a corpus compiler and turns
//! them into a graph whose labels come from the template at runtime, then
//! derives metrics over what was committed.
//!
//! # Run stages
//!
//! - **Schema**: the template resolves once into an immutable
//!   [`GraphSchemaDescriptor`] that every later stage borrows
//! - **Projection**: each record becomes node upserts and relationship merges
//! - **Sync**: the whole run commits as one atomic unit
//! - **Metrics**: native counts always; advanced scores when an algorithm
//!   capability is available
//!
//! # Example
//!
//! ```
//! use synesis_graph::{resolve, FieldDeclaration, FieldKind, Template};
//!
//! let schema = resolve(&Template::new(vec![
//!     FieldDeclaration::new("code", FieldKind::Code),
//!     FieldDeclaration::new("topic", FieldKind::Topic),
//! ]))
//! .unwrap();
//! assert_eq!(schema.primary_concept_label(), "Code");
//! ```

pub mod config;
pub mod corpus;
pub mod graph;
pub mod metrics;
pub mod pipeline;
pub mod schema;
pub mod storage;
pub mod sync;

pub use corpus::{CorpusError, FieldValue, Origin, ProjectBundle, Record, RecordScope};
pub use graph::{Edge, EdgeKey, GraphSnapshot, Node, NodeKey, Properties, PropertyValue};
pub use metrics::{
    compute_advanced, compute_native, select_strategy, AdvancedOutcome, AlgorithmProvider, MetricsError,
    ProjectionStrategy,
};
pub use pipeline::{Pipeline, PipelineError, RunReport};
pub use schema::{resolve, FieldDeclaration, FieldKind, FieldScope, GraphSchemaDescriptor, SchemaError, Template};
pub use storage::{GraphStore, OpenStore, SqliteStore, StorageError, StorageResult};
pub use sync::{project, project_all, Mutation, SyncEngine, SyncError, SyncResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
