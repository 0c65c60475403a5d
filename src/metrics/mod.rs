//! Graph metrics computed over the committed store
//!
//! Native metrics are plain counts and always run. Advanced metrics need
//! an algorithm capability that may be absent; see [`compute_advanced`].

mod advanced;
pub mod algorithms;
mod native;
mod projection;
mod strategy;

use crate::graph::SnapshotError;
use crate::storage::StorageError;
use thiserror::Error;

pub use advanced::{
    compute_advanced, AdvancedMetricsReport, AdvancedMetricsUnavailable, AdvancedOutcome, AdvancedScores,
    AlgorithmEngine, AlgorithmProvider, BuiltinEngine, BuiltinProvider, Capability, DisabledProvider, EngineError,
    ExternalProvider, UnavailableReason,
};
pub use algorithms::PageRankParams;
pub use native::{compute_native, NativeMetricsReport};
pub use projection::{Projection, WeightedEdge};
pub use strategy::{select_strategy, ProjectionStrategy};

/// Native metric failures. Either one means the committed graph broke an
/// invariant the sync stage should have upheld.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("committed graph is inconsistent: {0}")]
    DanglingEdge(#[from] SnapshotError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Node property names written by the metrics stages
pub mod property {
    pub const DEGREE: &str = "degree";
    pub const IN_DEGREE: &str = "in_degree";
    pub const OUT_DEGREE: &str = "out_degree";
    pub const MENTION_COUNT: &str = "mention_count";
    pub const SOURCE_COUNT: &str = "source_count";
    pub const CONCEPT_COUNT: &str = "concept_count";
    pub const WEIGHTED_DEGREE: &str = "weighted_degree";
    pub const ASPECT_DIVERSITY: &str = "aspect_diversity";
    pub const DIMENSION_DIVERSITY: &str = "dimension_diversity";
    pub const ITEM_COUNT: &str = "item_count";

    pub const PAGERANK: &str = "pagerank";
    pub const BETWEENNESS: &str = "betweenness";
    pub const COMMUNITY: &str = "community";

    /// Everything the advanced stage owns
    pub const ADVANCED: [&str; 3] = [PAGERANK, BETWEENNESS, COMMUNITY];
}
