//! Graph mutation operations

use crate::graph::{EdgeKey, NodeKey, Properties, PropertyValue};
use serde::{Deserialize, Serialize};

/// One write against the graph, keyed for idempotent application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Mutation {
    /// Insert the node or merge `properties` into the existing one
    NodeUpsert { key: NodeKey, properties: Properties },
    /// Create the relationship or merge `properties` into the existing one
    EdgeMerge { key: EdgeKey, properties: Properties },
}

impl Mutation {
    pub fn node(key: NodeKey) -> Self {
        Self::NodeUpsert {
            key,
            properties: Properties::new(),
        }
    }

    pub fn edge(from: NodeKey, rel_type: impl Into<String>, to: NodeKey) -> Self {
        Self::EdgeMerge {
            key: EdgeKey::new(from, rel_type, to),
            properties: Properties::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties_mut().insert(key.into(), value.into());
        self
    }

    pub fn with_properties(mut self, props: Properties) -> Self {
        self.properties_mut().extend(props);
        self
    }

    pub fn properties(&self) -> &Properties {
        match self {
            Self::NodeUpsert { properties, .. } | Self::EdgeMerge { properties, .. } => properties,
        }
    }

    fn properties_mut(&mut self) -> &mut Properties {
        match self {
            Self::NodeUpsert { properties, .. } | Self::EdgeMerge { properties, .. } => properties,
        }
    }

    pub fn is_node(&self) -> bool {
        matches!(self, Self::NodeUpsert { .. })
    }

    /// Identity string; equal for two mutations addressing the same element
    pub fn identity(&self) -> String {
        match self {
            Self::NodeUpsert { key, .. } => key.to_string(),
            Self::EdgeMerge { key, .. } => key.to_string(),
        }
    }
}
