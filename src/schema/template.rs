//! Template: the typed field declarations a corpus is coded against
//!
//! Templates arrive from the upstream compiler as JSON or YAML. Kinds and
//! scopes are read as plain strings and validated here so that an unknown
//! kind surfaces as a `SchemaError` naming the field, rather than as an
//! opaque deserialization failure.

use super::SchemaError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Declared kind of a template field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldKind {
    Code,
    Topic,
    Aspect,
    Dimension,
    Enumerated,
    Chain,
    Text,
    Memo,
}

impl FromStr for FieldKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CODE" => Ok(Self::Code),
            "TOPIC" => Ok(Self::Topic),
            "ASPECT" => Ok(Self::Aspect),
            "DIMENSION" => Ok(Self::Dimension),
            "ENUMERATED" => Ok(Self::Enumerated),
            "CHAIN" => Ok(Self::Chain),
            "TEXT" => Ok(Self::Text),
            "MEMO" => Ok(Self::Memo),
            other => Err(other.to_string()),
        }
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Code => "CODE",
            Self::Topic => "TOPIC",
            Self::Aspect => "ASPECT",
            Self::Dimension => "DIMENSION",
            Self::Enumerated => "ENUMERATED",
            Self::Chain => "CHAIN",
            Self::Text => "TEXT",
            Self::Memo => "MEMO",
        };
        f.write_str(s)
    }
}

/// Which block of the source material a field is written in.
///
/// The scope decides the field's subject node: `Item` fields hang off the
/// record's Item node, `Source` fields off its Source node, and `Ontology`
/// fields off the concept an ontology record defines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldScope {
    #[default]
    Item,
    Source,
    Ontology,
}

impl FromStr for FieldScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "" | "ITEM" => Ok(Self::Item),
            "SOURCE" => Ok(Self::Source),
            "ONTOLOGY" => Ok(Self::Ontology),
            other => Err(other.to_string()),
        }
    }
}

/// One entry of an ENUMERATED field's value map
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumValue {
    pub index: i64,
    pub label: String,
}

/// A validated field declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDeclaration {
    pub name: String,
    pub kind: FieldKind,
    pub scope: FieldScope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// CHAIN only: relation sub-type → free-text description
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub relations: BTreeMap<String, String>,
    /// ENUMERATED only: index → label map
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<EnumValue>,
}

impl FieldDeclaration {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            scope: FieldScope::default(),
            description: None,
            relations: BTreeMap::new(),
            values: Vec::new(),
        }
    }

    pub fn with_scope(mut self, scope: FieldScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_relation(mut self, sub_type: impl Into<String>, description: impl Into<String>) -> Self {
        self.relations.insert(sub_type.into(), description.into());
        self
    }

    pub fn with_value(mut self, index: i64, label: impl Into<String>) -> Self {
        self.values.push(EnumValue {
            index,
            label: label.into(),
        });
        self
    }

    /// Label for an enumerated index, if the value map declares one
    pub fn value_label(&self, index: i64) -> Option<&str> {
        self.values
            .iter()
            .find(|v| v.index == index)
            .map(|v| v.label.as_str())
    }
}

/// Field declaration as written by the upstream compiler
#[derive(Debug, Clone, Deserialize)]
struct RawFieldDeclaration {
    name: String,
    #[serde(alias = "type")]
    kind: String,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    relations: BTreeMap<String, String>,
    #[serde(default)]
    values: Vec<EnumValue>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawTemplate {
    #[serde(default)]
    fields: Vec<RawFieldDeclaration>,
}

/// An ordered list of field declarations, immutable for the run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub fields: Vec<FieldDeclaration>,
}

impl Template {
    pub fn new(fields: Vec<FieldDeclaration>) -> Self {
        Self { fields }
    }

    pub fn from_json_str(s: &str) -> Result<Self, SchemaError> {
        let raw: RawTemplate =
            serde_json::from_str(s).map_err(|e| SchemaError::Malformed(e.to_string()))?;
        Self::from_raw(raw)
    }

    pub fn from_yaml_str(s: &str) -> Result<Self, SchemaError> {
        let raw: RawTemplate =
            serde_yaml::from_str(s).map_err(|e| SchemaError::Malformed(e.to_string()))?;
        Self::from_raw(raw)
    }

    pub(crate) fn from_json_value(value: serde_json::Value) -> Result<Self, SchemaError> {
        let raw: RawTemplate =
            serde_json::from_value(value).map_err(|e| SchemaError::Malformed(e.to_string()))?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawTemplate) -> Result<Self, SchemaError> {
        let mut fields = Vec::with_capacity(raw.fields.len());
        for f in raw.fields {
            let kind = f.kind.parse::<FieldKind>().map_err(|kind| SchemaError::UnknownFieldKind {
                field: f.name.clone(),
                kind,
            })?;
            let scope = f
                .scope
                .as_deref()
                .unwrap_or_default()
                .parse::<FieldScope>()
                .map_err(|scope| SchemaError::UnknownScope {
                    field: f.name.clone(),
                    scope,
                })?;
            fields.push(FieldDeclaration {
                name: f.name,
                kind,
                scope,
                description: f.description,
                relations: f.relations,
                values: f.values,
            });
        }
        Ok(Self { fields })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_yaml_template() {
        let yaml = r#"
fields:
  - name: code
    kind: CODE
  - name: topic
    type: topic
    scope: ontology
  - name: chain
    kind: CHAIN
    relations:
      enables: "A makes B possible"
  - name: confidence
    kind: ENUMERATED
    values:
      - { index: 1, label: low }
      - { index: 2, label: high }
"#;
        let template = Template::from_yaml_str(yaml).unwrap();
        assert_eq!(template.fields.len(), 4);
        assert_eq!(template.fields[0].scope, FieldScope::Item);
        assert_eq!(template.fields[1].kind, FieldKind::Topic);
        assert_eq!(template.fields[1].scope, FieldScope::Ontology);
        assert_eq!(
            template.fields[2].relations.get("enables").map(String::as_str),
            Some("A makes B possible")
        );
        assert_eq!(template.fields[3].value_label(2), Some("high"));
        assert_eq!(template.fields[3].value_label(9), None);
    }

    #[test]
    fn unknown_kind_names_the_field() {
        let json = r#"{"fields": [{"name": "mood", "kind": "FEELING"}]}"#;
        match Template::from_json_str(json) {
            Err(SchemaError::UnknownFieldKind { field, kind }) => {
                assert_eq!(field, "mood");
                assert_eq!(kind, "FEELING");
            }
            other => panic!("expected UnknownFieldKind, got {other:?}"),
        }
    }

    #[test]
    fn malformed_template_is_rejected() {
        assert!(matches!(
            Template::from_json_str("{\"fields\": 3}"),
            Err(SchemaError::Malformed(_))
        ));
    }
}
