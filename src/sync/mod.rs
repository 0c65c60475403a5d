//! Record projection and atomic synchronization into the graph store

mod engine;
mod links;
mod mutation;
mod projector;

pub use engine::{derive_constraints, SyncEngine, SyncError, SyncResult};
pub use links::derive_topic_links;
pub use mutation::Mutation;
pub use projector::{project, project_all};
