//! Native metrics: counts read straight off the committed graph

use super::{property, MetricsError};
use crate::graph::{label, rel, GraphSnapshot};
use crate::schema::{FieldKind, GraphSchemaDescriptor};
use crate::storage::{GraphStore, PropertyUpdate};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::info;

/// Nodes touched by a native metrics pass, per kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NativeMetricsReport {
    pub concepts: usize,
    pub taxonomy: usize,
    pub sources: usize,
    /// Nodes whose properties were written
    pub written: usize,
}

/// Recompute every native metric and overwrite the stored values.
///
/// A committed graph that fails to load into a consistent snapshot is an
/// invariant breach and fails the stage.
pub fn compute_native(store: &dyn GraphStore, schema: &GraphSchemaDescriptor) -> Result<NativeMetricsReport, MetricsError> {
    let stored = store.load_graph()?;
    let snapshot = GraphSnapshot::build(stored.nodes, stored.edges)?;

    let ((concepts, taxonomy), sources) = rayon::join(
        || {
            rayon::join(
                || concept_metrics(&snapshot, schema),
                || taxonomy_metrics(&snapshot, schema),
            )
        },
        || source_metrics(&snapshot, schema),
    );

    let mut report = NativeMetricsReport {
        concepts: concepts.len(),
        taxonomy: taxonomy.len(),
        sources: sources.len(),
        written: 0,
    };

    let mut updates = concepts;
    updates.extend(taxonomy);
    updates.extend(sources);
    report.written = store.write_properties(&updates)?;

    info!(
        concepts = report.concepts,
        taxonomy = report.taxonomy,
        sources = report.sources,
        written = report.written,
        "native metrics written"
    );
    Ok(report)
}

fn concept_metrics(snapshot: &GraphSnapshot, schema: &GraphSchemaDescriptor) -> Vec<PropertyUpdate> {
    let mut updates = Vec::new();
    for concept_label in schema.concept_labels() {
        for c in snapshot.indices_with_label(concept_label) {
            let targets: BTreeSet<usize> = snapshot.out_via(c, rel::RELATES_TO).map(|(t, _)| t).collect();
            let origins: BTreeSet<usize> = snapshot.in_via(c, rel::RELATES_TO).map(|(s, _)| s).collect();
            let degree = origins.len() + targets.len();

            let items: BTreeSet<usize> = snapshot
                .in_via(c, rel::MENTIONS)
                .map(|(i, _)| i)
                .filter(|&i| snapshot.node(i).label() == label::ITEM)
                .collect();
            let sources: BTreeSet<usize> = items
                .iter()
                .flat_map(|&i| snapshot.out_via(i, rel::FROM_SOURCE).map(|(s, _)| s))
                .collect();

            updates.push(
                PropertyUpdate::new(snapshot.node(c).key.clone())
                    .with_property(property::DEGREE, degree)
                    .with_property(property::IN_DEGREE, origins.len())
                    .with_property(property::OUT_DEGREE, targets.len())
                    .with_property(property::MENTION_COUNT, items.len())
                    .with_property(property::SOURCE_COUNT, sources.len()),
            );
        }
    }
    updates
}

fn taxonomy_metrics(snapshot: &GraphSnapshot, schema: &GraphSchemaDescriptor) -> Vec<PropertyUpdate> {
    let topics = labels_of(schema, FieldKind::Topic);
    let aspects = labels_of(schema, FieldKind::Aspect);
    let dimensions = labels_of(schema, FieldKind::Dimension);

    let mut updates = Vec::new();
    for taxonomy_label in schema.taxonomy_labels() {
        for t in snapshot.indices_with_label(taxonomy_label) {
            let members: BTreeSet<usize> = rel::TAXONOMY
                .into_iter()
                .flat_map(|r| snapshot.in_via(t, r))
                .map(|(m, _)| m)
                .collect();
            let weighted_degree: f64 = snapshot
                .out_via(t, rel::IS_LINKED_TO)
                .chain(snapshot.in_via(t, rel::IS_LINKED_TO))
                .map(|(_, e)| e.weight())
                .sum();

            let mut update = PropertyUpdate::new(snapshot.node(t).key.clone())
                .with_property(property::CONCEPT_COUNT, members.len())
                .with_property(property::WEIGHTED_DEGREE, weighted_degree);

            if topics.contains(taxonomy_label) {
                let children: BTreeSet<usize> = snapshot.in_via(t, rel::GROUPED_BY).map(|(c, _)| c).collect();
                if !aspects.is_empty() {
                    let n = reached(snapshot, &children, rel::QUALIFIED_BY, &aspects);
                    update = update.with_property(property::ASPECT_DIVERSITY, n);
                }
                if !dimensions.is_empty() {
                    let n = reached(snapshot, &children, rel::BELONGS_TO, &dimensions);
                    update = update.with_property(property::DIMENSION_DIVERSITY, n);
                }
            }
            updates.push(update);
        }
    }
    updates
}

fn labels_of(schema: &GraphSchemaDescriptor, kind: FieldKind) -> BTreeSet<&str> {
    schema.taxonomy_of_kind(kind).map(|m| m.derived_label.as_str()).collect()
}

/// Distinct nodes with a label in `labels` reached from `from` via `rel_type`
fn reached(snapshot: &GraphSnapshot, from: &BTreeSet<usize>, rel_type: &str, labels: &BTreeSet<&str>) -> usize {
    from.iter()
        .flat_map(|&c| snapshot.out_via(c, rel_type).map(|(n, _)| n))
        .filter(|&n| labels.contains(snapshot.node(n).label()))
        .collect::<BTreeSet<_>>()
        .len()
}

fn source_metrics(snapshot: &GraphSnapshot, schema: &GraphSchemaDescriptor) -> Vec<PropertyUpdate> {
    let concept_labels = schema.concept_labels();
    snapshot
        .indices_with_label(label::SOURCE)
        .map(|s| {
            let items: BTreeSet<usize> = snapshot
                .in_via(s, rel::FROM_SOURCE)
                .map(|(i, _)| i)
                .filter(|&i| snapshot.node(i).label() == label::ITEM)
                .collect();
            let concepts: BTreeSet<usize> = items
                .iter()
                .flat_map(|&i| snapshot.out_via(i, rel::MENTIONS).map(|(c, _)| c))
                .filter(|&c| concept_labels.contains(snapshot.node(c).label()))
                .collect();
            PropertyUpdate::new(snapshot.node(s).key.clone())
                .with_property(property::ITEM_COUNT, items.len())
                .with_property(property::CONCEPT_COUNT, concepts.len())
        })
        .collect()
}
