//! Shared fixtures for the integration tests
//!
//! Templates and record sets small enough to reason about by hand, plus
//! helpers for reading back what a run committed.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;
use synesis_graph::metrics::property;
use synesis_graph::schema::FieldScope;
use synesis_graph::storage::StoredGraph;
use synesis_graph::{
    FieldDeclaration, FieldKind, FieldValue, GraphStore, NodeKey, OpenStore, Origin, PropertyValue, Record,
    SqliteStore, Template,
};

pub fn memory_store() -> Arc<SqliteStore> {
    Arc::new(SqliteStore::open_in_memory().expect("in-memory store"))
}

/// CODE + CHAIN, so chain endpoints and coded concepts share the `Code` label
pub fn chain_template() -> Template {
    Template::new(vec![
        FieldDeclaration::new("code", FieldKind::Code),
        FieldDeclaration::new("chain", FieldKind::Chain).with_relation("influences", "A shapes B"),
        FieldDeclaration::new("note", FieldKind::Memo),
    ])
}

/// Three Items mention `A` from two Sources; one chain gives `A -> B`.
pub fn chain_records() -> Vec<Record> {
    vec![
        Record::item("r1", Origin::new("interviews.syn", 4).with_column(1))
            .with_source("@smith2020")
            .with_field("chain", FieldValue::from(vec!["A", "influences", "B"]))
            .with_field("note", "first excerpt"),
        Record::item("r2", Origin::new("interviews.syn", 12))
            .with_source("@smith2020")
            .with_field("code", FieldValue::from(vec!["A"])),
        Record::item("r3", Origin::new("survey.syn", 2))
            .with_source("@jones2021")
            .with_field("code", FieldValue::from(vec!["A"])),
    ]
}

/// CODE + TOPIC + ASPECT and a source-scoped property
pub fn taxonomy_template() -> Template {
    Template::new(vec![
        FieldDeclaration::new("code", FieldKind::Code),
        FieldDeclaration::new("topic", FieldKind::Topic),
        FieldDeclaration::new("aspect", FieldKind::Aspect),
        FieldDeclaration::new("country", FieldKind::Text).with_scope(FieldScope::Source),
    ])
}

pub fn taxonomy_records() -> Vec<Record> {
    vec![
        Record::item("e1", Origin::new("energy.syn", 1))
            .with_source("@lee2019")
            .with_field("code", FieldValue::from(vec!["solar", "storage"]))
            .with_field("topic", "transition")
            .with_field("aspect", "economic")
            .with_field("country", "BR"),
        Record::item("e2", Origin::new("energy.syn", 9))
            .with_source("@lee2019")
            .with_field("code", FieldValue::from(vec!["storage", "grid"]))
            .with_field("topic", "infrastructure"),
        Record::item("e3", Origin::new("policy.syn", 3))
            .with_source("@kim2022")
            .with_field("code", FieldValue::from(vec!["solar"]))
            .with_field("topic", "transition")
            .with_field("aspect", "social"),
    ]
}

pub fn node_int(store: &dyn GraphStore, key: &NodeKey, name: &str) -> Option<i64> {
    store
        .load_node(key)
        .expect("load node")
        .and_then(|n| n.property(name).and_then(PropertyValue::as_i64))
}

pub fn node_float(store: &dyn GraphStore, key: &NodeKey, name: &str) -> Option<f64> {
    store
        .load_node(key)
        .expect("load node")
        .and_then(|n| n.property(name).and_then(PropertyValue::as_f64))
}

/// Every node and edge with its properties, metric properties removed
pub fn graph_state(store: &dyn GraphStore) -> (Vec<String>, Vec<String>) {
    let StoredGraph { nodes, edges } = store.load_graph().expect("load graph");
    let metric_names = [
        property::DEGREE,
        property::IN_DEGREE,
        property::OUT_DEGREE,
        property::MENTION_COUNT,
        property::SOURCE_COUNT,
        property::CONCEPT_COUNT,
        property::WEIGHTED_DEGREE,
        property::ASPECT_DIVERSITY,
        property::DIMENSION_DIVERSITY,
        property::ITEM_COUNT,
        property::PAGERANK,
        property::BETWEENNESS,
        property::COMMUNITY,
    ];
    let strip = |props: &BTreeMap<String, PropertyValue>| -> String {
        let kept: BTreeMap<&String, &PropertyValue> = props
            .iter()
            .filter(|(k, _)| !metric_names.contains(&k.as_str()))
            .collect();
        serde_json::to_string(&kept).expect("serialize properties")
    };

    let nodes = nodes.iter().map(|n| format!("{} {}", n.key, strip(&n.properties))).collect();
    let edges = edges.iter().map(|e| format!("{} {}", e.key, strip(&e.properties))).collect();
    (nodes, edges)
}
