//! Record projector: one record in, the mutations that represent it out
//!
//! Projection is a pure function of `(record, schema)`. Mutation keys are
//! built from labels in the descriptor and trimmed field values only, so two
//! projections of the same record are identical.

use super::mutation::Mutation;
use crate::corpus::{ChainLink, FieldValue, Record, RecordScope};
use crate::graph::{label, rel, NodeKey, PropertyValue};
use crate::schema::{normalize_relation_type, FieldKind, FieldMapping, FieldScope, GraphRole, GraphSchemaDescriptor};
use rayon::prelude::*;
use tracing::warn;

/// Node upserts first, relationship merges after
#[derive(Debug, Default)]
struct Projection {
    nodes: Vec<Mutation>,
    edges: Vec<Mutation>,
}

impl Projection {
    fn upsert(&mut self, m: Mutation) {
        self.nodes.push(m);
    }

    fn merge(&mut self, m: Mutation) {
        self.edges.push(m);
    }

    fn into_mutations(mut self) -> Vec<Mutation> {
        self.nodes.append(&mut self.edges);
        self.nodes
    }
}

/// Project one record.
pub fn project(record: &Record, schema: &GraphSchemaDescriptor) -> Vec<Mutation> {
    match record.scope {
        RecordScope::Item => project_item(record, schema),
        RecordScope::Ontology => project_ontology(record, schema),
    }
}

/// Project every record of a run in parallel. Output keeps record order.
pub fn project_all(records: &[Record], schema: &GraphSchemaDescriptor) -> Vec<Mutation> {
    records
        .par_iter()
        .flat_map_iter(|record| project(record, schema))
        .collect()
}

fn project_item(record: &Record, schema: &GraphSchemaDescriptor) -> Vec<Mutation> {
    let mut out = Projection::default();

    let item = NodeKey::new(label::ITEM, record.id.trim());
    let source = NodeKey::new(label::SOURCE, record.source_key());

    let mut item_props = record.origin.to_properties();
    item_props.insert("id".into(), record.id.trim().into());

    let mut source_props = record.source_metadata.clone();
    source_props.insert("key".into(), record.source_key().into());
    source_props.insert("source_file".into(), record.origin.source_file.as_str().into());

    for mapping in schema.mappings() {
        let Some(value) = record.field(mapping.field_name()) else {
            continue;
        };
        let (subject, subject_props) = match mapping.scope() {
            FieldScope::Item => (&item, &mut item_props),
            FieldScope::Source => (&source, &mut source_props),
            FieldScope::Ontology => continue,
        };

        match mapping.graph_role {
            GraphRole::Property => {
                subject_props.insert(mapping.field_name().to_string(), property_value(mapping, value));
            }
            GraphRole::ConceptNode | GraphRole::TaxonomyNode => {
                attach_nodes(&mut out, subject, mapping, value);
            }
            GraphRole::ExplicitRelationship => {
                for link in value.chain_links() {
                    project_chain(&mut out, record, schema, mapping, &link, Some(subject));
                }
            }
        }
    }

    // Item and Source are unconditional; they carry the record's origin.
    out.nodes.insert(0, Mutation::node(source.clone()).with_properties(source_props));
    out.nodes.insert(0, Mutation::node(item.clone()).with_properties(item_props));
    out.merge(Mutation::edge(item, rel::FROM_SOURCE, source));

    out.into_mutations()
}

fn project_ontology(record: &Record, schema: &GraphSchemaDescriptor) -> Vec<Mutation> {
    let mut out = Projection::default();

    let concept = NodeKey::new(schema.primary_concept_label(), record.id.trim());
    let mut concept_props = record.origin.to_properties();
    concept_props.insert("name".into(), record.id.trim().into());

    for mapping in schema.mappings() {
        let Some(value) = record.field(mapping.field_name()) else {
            continue;
        };
        match mapping.graph_role {
            GraphRole::Property => {
                concept_props.insert(mapping.field_name().to_string(), property_value(mapping, value));
            }
            GraphRole::TaxonomyNode => attach_nodes(&mut out, &concept, mapping, value),
            GraphRole::ExplicitRelationship => {
                for link in value.chain_links() {
                    project_chain(&mut out, record, schema, mapping, &link, None);
                }
            }
            // Concepts do not mention concepts.
            GraphRole::ConceptNode => {}
        }
    }

    out.nodes.insert(0, Mutation::node(concept).with_properties(concept_props));
    out.into_mutations()
}

/// Upsert one node per text value and connect it to `subject`.
fn attach_nodes(out: &mut Projection, subject: &NodeKey, mapping: &FieldMapping, value: &FieldValue) {
    let Some(rel_type) = mapping.relationship_type.as_deref() else {
        return;
    };
    for text in value.texts() {
        let key = NodeKey::new(mapping.derived_label.as_str(), text);
        out.upsert(Mutation::node(key.clone()).with_property("name", text));
        out.merge(Mutation::edge(subject.clone(), rel_type, key));
    }
}

/// Project one chain link. `mentioned_by` is the Item whose excerpt
/// asserted the chain; each concept gets a MENTIONS from it.
fn project_chain(
    out: &mut Projection,
    record: &Record,
    schema: &GraphSchemaDescriptor,
    mapping: &FieldMapping,
    link: &ChainLink,
    mentioned_by: Option<&NodeKey>,
) {
    if !link.is_well_formed() {
        warn!(
            record = %record.id,
            field = mapping.field_name(),
            parts = link.parts.len(),
            "skipping malformed chain link"
        );
        return;
    }

    let concept_label = schema.primary_concept_label();
    let key = |name: &str| NodeKey::new(concept_label, name);

    for (order, name) in link.concepts().enumerate() {
        out.upsert(Mutation::node(key(name)).with_property("name", name));
        if let Some(item) = mentioned_by {
            out.merge(
                Mutation::edge(item.clone(), rel::MENTIONS, key(name)).with_property("order", order + 1),
            );
        }
    }

    for (from, relation, to) in link.hops() {
        let mut edge = Mutation::edge(key(from), rel::RELATES_TO, key(to))
            .with_property("type", normalize_relation_type(relation))
            .with_property("description", relation_description(mapping, relation));
        if mentioned_by.is_some() {
            edge = edge.with_property("item_id", record.id.trim());
        }
        out.merge(edge);
    }
}

/// Catalogue description for a chain relation, matched exactly first and
/// then by normalized type.
fn relation_description(mapping: &FieldMapping, relation: &str) -> String {
    let relations = &mapping.declaration.relations;
    relations
        .get(relation.trim())
        .or_else(|| {
            let wanted = normalize_relation_type(relation);
            relations
                .iter()
                .find(|(k, _)| normalize_relation_type(k) == wanted)
                .map(|(_, v)| v)
        })
        .cloned()
        .unwrap_or_default()
}

fn property_value(mapping: &FieldMapping, value: &FieldValue) -> PropertyValue {
    match (mapping.kind(), value) {
        (FieldKind::Enumerated, FieldValue::Integer(i)) => mapping
            .declaration
            .value_label(*i)
            .map(PropertyValue::from)
            .unwrap_or(PropertyValue::Int(*i)),
        (FieldKind::Enumerated, FieldValue::List(items)) => PropertyValue::Array(
            items.iter().map(|v| property_value(mapping, v)).collect(),
        ),
        _ => value.to_property(),
    }
}
