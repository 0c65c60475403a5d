//! Parsed records as delivered by the upstream compiler

use crate::graph::{Properties, PropertyValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which block of source material a record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordScope {
    /// A coded excerpt attached to a bibliographic source
    #[default]
    Item,
    /// A concept definition from the project ontology
    Ontology,
}

/// Where a record was written
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Origin {
    pub source_file: String,
    pub line: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
}

impl Origin {
    pub fn new(source_file: impl Into<String>, line: u32) -> Self {
        Self {
            source_file: source_file.into(),
            line,
            column: None,
        }
    }

    pub fn with_column(mut self, column: u32) -> Self {
        self.column = Some(column);
        self
    }

    /// Origin metadata as node properties
    pub fn to_properties(&self) -> Properties {
        let mut props = Properties::new();
        props.insert("source_file".into(), self.source_file.as_str().into());
        props.insert("line".into(), self.line.into());
        if let Some(column) = self.column {
            props.insert("column".into(), column.into());
        }
        props
    }
}

/// A field value as written in the source
///
/// Variant order matters for untagged decoding: integers must be tried
/// before floats so `3` stays an integer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    List(Vec<FieldValue>),
}

impl FieldValue {
    /// Trimmed, non-empty text entries. A scalar yields itself; a list
    /// yields its text members in order.
    pub fn texts(&self) -> Vec<&str> {
        match self {
            Self::Text(s) => {
                let s = s.trim();
                if s.is_empty() {
                    Vec::new()
                } else {
                    vec![s]
                }
            }
            Self::List(items) => items.iter().flat_map(FieldValue::texts).collect(),
            _ => Vec::new(),
        }
    }

    /// Chain links carried by a CHAIN value.
    ///
    /// `["a", "rel", "b"]` is one link; `[["a", "rel", "b"], [...]]` is many.
    pub fn chain_links(&self) -> Vec<ChainLink> {
        match self {
            Self::List(items) if items.iter().all(|i| matches!(i, Self::List(_))) => items
                .iter()
                .flat_map(FieldValue::chain_links)
                .collect(),
            Self::List(_) => vec![ChainLink::new(self.texts().into_iter().map(str::to_string).collect())],
            _ => Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(s) => s.trim().is_empty(),
            Self::List(items) => items.iter().all(FieldValue::is_empty),
            _ => false,
        }
    }

    pub fn to_property(&self) -> PropertyValue {
        match self {
            Self::Bool(b) => PropertyValue::Bool(*b),
            Self::Integer(i) => PropertyValue::Int(*i),
            Self::Float(f) => PropertyValue::Float(*f),
            Self::Text(s) => PropertyValue::String(s.trim().to_string()),
            Self::List(items) => PropertyValue::Array(items.iter().map(FieldValue::to_property).collect()),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl<T: Into<FieldValue>> From<Vec<T>> for FieldValue {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

/// One explicit relationship chain: `concept (relation concept)+`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainLink {
    pub parts: Vec<String>,
}

impl ChainLink {
    pub fn new(parts: Vec<String>) -> Self {
        Self { parts }
    }

    /// Well-formed links alternate concept and relation, starting and
    /// ending on a concept, with at least one hop.
    pub fn is_well_formed(&self) -> bool {
        self.parts.len() >= 3 && self.parts.len() % 2 == 1
    }

    /// Concepts in chain order
    pub fn concepts(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().step_by(2).map(String::as_str)
    }

    /// `(from, relation, to)` for every hop
    pub fn hops(&self) -> impl Iterator<Item = (&str, &str, &str)> {
        self.parts
            .windows(3)
            .step_by(2)
            .map(|w| (w[0].as_str(), w[1].as_str(), w[2].as_str()))
    }
}

/// One parsed unit of source material. Read-only to this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    #[serde(default)]
    pub scope: RecordScope,
    /// Bibliography key of the record's source, with or without a leading `@`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_ref: Option<String>,
    pub origin: Origin,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldValue>,
    /// Bibliographic metadata for the source
    #[serde(default, skip_serializing_if = "Properties::is_empty")]
    pub source_metadata: Properties,
}

impl Record {
    pub fn item(id: impl Into<String>, origin: Origin) -> Self {
        Self {
            id: id.into(),
            scope: RecordScope::Item,
            source_ref: None,
            origin,
            fields: BTreeMap::new(),
            source_metadata: Properties::new(),
        }
    }

    pub fn ontology(id: impl Into<String>, origin: Origin) -> Self {
        Self {
            scope: RecordScope::Ontology,
            ..Self::item(id, origin)
        }
    }

    pub fn with_source(mut self, source_ref: impl Into<String>) -> Self {
        self.source_ref = Some(source_ref.into());
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn with_source_metadata(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.source_metadata.insert(key.into(), value.into());
        self
    }

    /// Natural key of the record's Source node.
    ///
    /// The bibliography reference without its `@`; records with no
    /// reference fall back to their source file.
    pub fn source_key(&self) -> &str {
        self.source_ref
            .as_deref()
            .map(normalize_source_ref)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| self.origin.source_file.trim())
    }

    /// Non-empty value of a field
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name).filter(|v| !v.is_empty())
    }
}

/// `"@smith2020"` → `"smith2020"`
pub fn normalize_source_ref(s: &str) -> &str {
    s.trim().trim_start_matches('@').trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_values_decode_from_json() {
        let fields: BTreeMap<String, FieldValue> = serde_json::from_str(
            r#"{"code": ["A", " B ", ""], "confidence": 2, "weight": 0.5, "note": "x",
                "chain": [["A", "enables", "B"], ["B", "blocks", "C", "leads to", "D"]]}"#,
        )
        .unwrap();

        assert_eq!(fields["code"].texts(), vec!["A", "B"]);
        assert_eq!(fields["confidence"], FieldValue::Integer(2));
        assert_eq!(fields["weight"], FieldValue::Float(0.5));
        let links = fields["chain"].chain_links();
        assert_eq!(links.len(), 2);
        assert_eq!(
            links[1].hops().collect::<Vec<_>>(),
            vec![("B", "blocks", "C"), ("C", "leads to", "D")]
        );
        assert_eq!(links[1].concepts().collect::<Vec<_>>(), vec!["B", "C", "D"]);
    }

    #[test]
    fn single_chain_link_is_one_link() {
        let value = FieldValue::from(vec!["A", "enables", "B"]);
        let links = value.chain_links();
        assert_eq!(links.len(), 1);
        assert!(links[0].is_well_formed());
        assert!(!ChainLink::new(vec!["A".into(), "enables".into()]).is_well_formed());
    }

    #[test]
    fn source_key_strips_at_sign_and_falls_back_to_file() {
        let r = Record::item("r1", Origin::new("a.syn", 3)).with_source("@smith2020");
        assert_eq!(r.source_key(), "smith2020");

        let bare = Record::item("r2", Origin::new("b.syn", 1));
        assert_eq!(bare.source_key(), "b.syn");
    }

    #[test]
    fn blank_fields_read_as_absent() {
        let r = Record::item("r1", Origin::new("a.syn", 1))
            .with_field("code", vec!["", "  "])
            .with_field("note", "kept");
        assert!(r.field("code").is_none());
        assert!(r.field("note").is_some());
    }

    #[test]
    fn origin_properties_omit_missing_column() {
        let props = Origin::new("a.syn", 7).to_properties();
        assert_eq!(props.len(), 2);
        let props = Origin::new("a.syn", 7).with_column(2).to_properties();
        assert_eq!(props.get("column"), Some(&PropertyValue::Int(2)));
    }
}
