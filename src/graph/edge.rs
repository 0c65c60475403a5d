//! Relationship representation

use super::node::{NodeKey, Properties, PropertyValue};
use serde::{Deserialize, Serialize};

/// Identity of a relationship: at most one edge per `(from, rel_type, to)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeKey {
    pub from: NodeKey,
    pub rel_type: String,
    pub to: NodeKey,
}

impl EdgeKey {
    pub fn new(from: NodeKey, rel_type: impl Into<String>, to: NodeKey) -> Self {
        Self {
            from,
            rel_type: rel_type.into(),
            to,
        }
    }
}

impl std::fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-[{}]->{}", self.from, self.rel_type, self.to)
    }
}

/// A directed, typed relationship in the committed graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub key: EdgeKey,
    pub properties: Properties,
}

impl Edge {
    pub fn new(from: NodeKey, rel_type: impl Into<String>, to: NodeKey) -> Self {
        Self {
            key: EdgeKey::new(from, rel_type, to),
            properties: Properties::new(),
        }
    }

    /// Add a property to the edge
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn rel_type(&self) -> &str {
        &self.key.rel_type
    }

    pub fn source(&self) -> &NodeKey {
        &self.key.from
    }

    pub fn target(&self) -> &NodeKey {
        &self.key.to
    }

    /// Numeric `weight` property, or 1.0 when unset.
    pub fn weight(&self) -> f64 {
        self.properties
            .get("weight")
            .and_then(PropertyValue::as_f64)
            .unwrap_or(1.0)
    }
}
