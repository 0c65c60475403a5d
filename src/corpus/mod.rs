//! Upstream input: records and templates produced by the corpus compiler

mod bundle;
mod record;

pub use bundle::{ProjectBundle, ProjectInfo};
pub use record::{normalize_source_ref, ChainLink, FieldValue, Origin, Record, RecordScope};

use crate::schema::SchemaError;
use thiserror::Error;

/// Errors raised while loading a compiled project
#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("record #{index} has no id")]
    MissingId { index: usize },

    #[error("record '{0}' has no origin (source_file and line are required)")]
    MissingOrigin(String),

    #[error("record '{0}' appears more than once")]
    DuplicateRecord(String),
}
