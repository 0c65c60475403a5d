//! Template-to-graph resolution
//!
//! `resolve()` turns a template into a `GraphSchemaDescriptor` once per run.
//! Every downstream stage reads labels and relationship types from the
//! descriptor; nothing re-derives them.

use super::label::derive_label;
use super::template::{FieldDeclaration, FieldKind, FieldScope, Template};
use super::SchemaError;
use crate::graph::{label, rel};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

/// The graph element a field becomes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum GraphRole {
    ConceptNode,
    TaxonomyNode,
    Property,
    ExplicitRelationship,
}

impl GraphRole {
    /// Role and owning relationship type for a field kind
    pub fn for_kind(kind: FieldKind) -> (Self, Option<&'static str>) {
        match kind {
            FieldKind::Code => (Self::ConceptNode, Some(rel::MENTIONS)),
            FieldKind::Topic => (Self::TaxonomyNode, Some(rel::GROUPED_BY)),
            FieldKind::Aspect => (Self::TaxonomyNode, Some(rel::QUALIFIED_BY)),
            FieldKind::Dimension => (Self::TaxonomyNode, Some(rel::BELONGS_TO)),
            FieldKind::Chain => (Self::ExplicitRelationship, Some(rel::RELATES_TO)),
            FieldKind::Enumerated | FieldKind::Text | FieldKind::Memo => (Self::Property, None),
        }
    }

    pub fn is_node(&self) -> bool {
        matches!(self, Self::ConceptNode | Self::TaxonomyNode)
    }
}

/// How one field is placed in the graph
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldMapping {
    pub derived_label: String,
    pub graph_role: GraphRole,
    pub relationship_type: Option<String>,
    pub declaration: FieldDeclaration,
}

impl FieldMapping {
    pub fn field_name(&self) -> &str {
        &self.declaration.name
    }

    pub fn kind(&self) -> FieldKind {
        self.declaration.kind
    }

    pub fn scope(&self) -> FieldScope {
        self.declaration.scope
    }
}

/// Immutable schema for one run
#[derive(Debug, Clone, Serialize)]
pub struct GraphSchemaDescriptor {
    mappings: Vec<FieldMapping>,
    #[serde(skip)]
    by_name: HashMap<String, usize>,
    primary_concept_label: String,
}

impl GraphSchemaDescriptor {
    /// Mappings in declaration order
    pub fn mappings(&self) -> &[FieldMapping] {
        &self.mappings
    }

    pub fn get(&self, field_name: &str) -> Option<&FieldMapping> {
        self.by_name.get(field_name).map(|&i| &self.mappings[i])
    }

    pub fn with_role(&self, role: GraphRole) -> impl Iterator<Item = &FieldMapping> {
        self.mappings.iter().filter(move |m| m.graph_role == role)
    }

    pub fn has_role(&self, role: GraphRole) -> bool {
        self.with_role(role).next().is_some()
    }

    /// Label used for chain endpoints and ontology-defined concepts
    pub fn primary_concept_label(&self) -> &str {
        &self.primary_concept_label
    }

    /// Every label that holds concept nodes
    pub fn concept_labels(&self) -> BTreeSet<&str> {
        let mut labels: BTreeSet<&str> = self
            .with_role(GraphRole::ConceptNode)
            .map(|m| m.derived_label.as_str())
            .collect();
        if self.has_role(GraphRole::ExplicitRelationship) || labels.is_empty() {
            labels.insert(self.primary_concept_label.as_str());
        }
        labels
    }

    pub fn taxonomy_labels(&self) -> BTreeSet<&str> {
        self.with_role(GraphRole::TaxonomyNode)
            .map(|m| m.derived_label.as_str())
            .collect()
    }

    /// Taxonomy mappings of one kind (e.g. all TOPIC fields)
    pub fn taxonomy_of_kind(&self, kind: FieldKind) -> impl Iterator<Item = &FieldMapping> {
        self.with_role(GraphRole::TaxonomyNode)
            .filter(move |m| m.kind() == kind)
    }
}

/// Resolve a template into a graph schema.
///
/// Fails on duplicate field names, unusable names, derived labels that
/// collide with each other or with a base label.
pub fn resolve(template: &Template) -> Result<GraphSchemaDescriptor, SchemaError> {
    let mut mappings = Vec::with_capacity(template.fields.len());
    let mut by_name = HashMap::with_capacity(template.fields.len());
    let mut by_label: HashMap<String, String> = HashMap::new();

    for decl in &template.fields {
        if by_name.contains_key(&decl.name) {
            return Err(SchemaError::DuplicateField(decl.name.clone()));
        }

        let derived_label =
            derive_label(&decl.name).ok_or_else(|| SchemaError::InvalidLabel(decl.name.clone()))?;

        if label::RESERVED.contains(&derived_label.as_str()) {
            return Err(SchemaError::ReservedLabel {
                field: decl.name.clone(),
                label: derived_label,
            });
        }

        if let Some(first) = by_label.get(&derived_label) {
            return Err(SchemaError::LabelCollision {
                first: first.clone(),
                second: decl.name.clone(),
                label: derived_label,
            });
        }
        by_label.insert(derived_label.clone(), decl.name.clone());

        let (graph_role, relationship_type) = GraphRole::for_kind(decl.kind);
        by_name.insert(decl.name.clone(), mappings.len());
        mappings.push(FieldMapping {
            derived_label,
            graph_role,
            relationship_type: relationship_type.map(str::to_string),
            declaration: decl.clone(),
        });
    }

    let primary_concept_label = mappings
        .iter()
        .find(|m| m.graph_role == GraphRole::ConceptNode)
        .or_else(|| {
            mappings
                .iter()
                .find(|m| m.graph_role == GraphRole::ExplicitRelationship)
        })
        .map(|m| m.derived_label.clone());

    // Without a concept field the implicit label is taken; a field may not
    // derive it too.
    let primary_concept_label = match primary_concept_label {
        Some(l) => l,
        None => {
            if let Some(field) = by_label.get(label::DEFAULT_CONCEPT) {
                return Err(SchemaError::ReservedLabel {
                    field: field.clone(),
                    label: label::DEFAULT_CONCEPT.to_string(),
                });
            }
            label::DEFAULT_CONCEPT.to_string()
        }
    };

    Ok(GraphSchemaDescriptor {
        mappings,
        by_name,
        primary_concept_label,
    })
}
