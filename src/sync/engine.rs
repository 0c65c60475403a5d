//! SyncEngine: applies one run's mutations as a single atomic unit

use super::links::derive_topic_links;
use super::mutation::Mutation;
use crate::graph::{EdgeKey, NodeKey};
use crate::schema::{is_valid_identifier, GraphSchemaDescriptor};
use crate::storage::{CommitStats, GraphStore, StorageError, UniquenessConstraint, WriteUnit};
use rusqlite::ErrorCode;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Fatal sync failures. The store is unchanged whenever one of these is
/// returned.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("mutation #{index} ({identity}) is invalid: {reason}")]
    InvalidMutation {
        index: usize,
        identity: String,
        reason: String,
    },

    #[error("relationship {edge} references missing node {missing}")]
    MissingEndpoint { edge: String, missing: String },

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("store unreachable: {0}")]
    Connectivity(String),

    #[error("store refused the write: {0}")]
    Authorization(String),

    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for SyncError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::MissingEndpoint { edge, missing } => Self::MissingEndpoint { edge, missing },
            StorageError::Io(e) => Self::Connectivity(e.to_string()),
            StorageError::Database(rusqlite::Error::SqliteFailure(failure, message)) => {
                let detail = message.unwrap_or_else(|| failure.to_string());
                match failure.code {
                    ErrorCode::ConstraintViolation => Self::ConstraintViolation(detail),
                    ErrorCode::PermissionDenied
                    | ErrorCode::ReadOnly
                    | ErrorCode::AuthorizationForStatementDenied => Self::Authorization(detail),
                    ErrorCode::CannotOpen
                    | ErrorCode::DatabaseBusy
                    | ErrorCode::DatabaseLocked
                    | ErrorCode::SystemIoFailure
                    | ErrorCode::NotADatabase => Self::Connectivity(detail),
                    _ => Self::Storage(StorageError::Database(rusqlite::Error::SqliteFailure(
                        failure,
                        Some(detail),
                    ))),
                }
            }
            other => Self::Storage(other),
        }
    }
}

/// What a successful sync did
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncResult {
    pub constraints: usize,
    pub constraints_created: usize,
    pub topic_links: usize,
    pub commit: CommitStats,
}

/// One uniqueness constraint per concept and taxonomy label
pub fn derive_constraints(schema: &GraphSchemaDescriptor) -> Vec<UniquenessConstraint> {
    let mut labels = schema.concept_labels();
    labels.extend(schema.taxonomy_labels());
    labels.into_iter().map(UniquenessConstraint::new).collect()
}

/// Sole writer for a run
pub struct SyncEngine {
    store: Arc<dyn GraphStore>,
    project: String,
    replace: bool,
}

impl SyncEngine {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self {
            store,
            project: String::new(),
            replace: false,
        }
    }

    /// Project name recorded in the run ledger
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = project.into();
        self
    }

    /// Clear the store inside the same unit before applying the run
    pub fn with_replace(mut self, replace: bool) -> Self {
        self.replace = replace;
        self
    }

    /// Validate, derive topic links, then commit constraints and the whole
    /// run at once. No retry on failure.
    pub fn sync(&self, mut run: Vec<Mutation>, schema: &GraphSchemaDescriptor) -> Result<SyncResult, SyncError> {
        validate(&run)?;

        let links = derive_topic_links(&run, schema);
        let topic_links = links.len();
        run.extend(links);

        let constraints = derive_constraints(schema);
        let commit = self.store.commit(&WriteUnit {
            project: &self.project,
            mutations: &run,
            constraints: &constraints,
            replace: self.replace,
        })?;
        debug!(
            total = constraints.len(),
            created = commit.constraints_created,
            "uniqueness constraints applied"
        );

        info!(
            run_id = commit.run_id,
            nodes = commit.nodes_upserted,
            edges = commit.edges_merged,
            nodes_created = commit.nodes_created,
            edges_created = commit.edges_created,
            topic_links,
            replace = self.replace,
            "sync committed"
        );

        Ok(SyncResult {
            constraints: constraints.len(),
            constraints_created: commit.constraints_created,
            topic_links,
            commit,
        })
    }
}

fn validate(run: &[Mutation]) -> Result<(), SyncError> {
    for (index, m) in run.iter().enumerate() {
        let problem = match m {
            Mutation::NodeUpsert { key, .. } => check_node_key(key),
            Mutation::EdgeMerge { key, .. } => check_edge_key(key),
        };
        if let Some(reason) = problem {
            return Err(SyncError::InvalidMutation {
                index,
                identity: m.identity(),
                reason,
            });
        }
    }
    Ok(())
}

fn check_node_key(key: &NodeKey) -> Option<String> {
    if !is_valid_identifier(&key.label) {
        return Some(format!("label '{}' is not a valid identifier", key.label));
    }
    if key.natural_key.trim().is_empty() {
        return Some("empty natural key".to_string());
    }
    None
}

fn check_edge_key(key: &EdgeKey) -> Option<String> {
    if !is_valid_identifier(&key.rel_type) {
        return Some(format!("relationship type '{}' is not a valid identifier", key.rel_type));
    }
    check_node_key(&key.from).or_else(|| check_node_key(&key.to))
}
