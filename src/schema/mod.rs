//! Schema resolution: from a runtime template to a concrete graph schema

mod label;
mod resolver;
mod template;

pub use label::{derive_label, is_valid_identifier, normalize_relation_type, sanitize_identifier};
pub use resolver::{resolve, FieldMapping, GraphRole, GraphSchemaDescriptor};
pub use template::{EnumValue, FieldDeclaration, FieldKind, FieldScope, Template};

use thiserror::Error;

/// Template problems. Always raised before any store interaction.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("fields '{first}' and '{second}' both derive label '{label}'")]
    LabelCollision {
        first: String,
        second: String,
        label: String,
    },

    #[error("field '{field}' derives reserved label '{label}'")]
    ReservedLabel { field: String, label: String },

    #[error("field name '{0}' yields no usable label")]
    InvalidLabel(String),

    #[error("field '{field}' has unknown kind '{kind}'")]
    UnknownFieldKind { field: String, kind: String },

    #[error("field '{field}' has unknown scope '{scope}'")]
    UnknownScope { field: String, scope: String },

    #[error("field '{0}' is declared more than once")]
    DuplicateField(String),

    #[error("malformed template: {0}")]
    Malformed(String),
}
