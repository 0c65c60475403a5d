//! The concept-similarity graph handed to an algorithm engine

use super::algorithms::Adjacency;
use super::strategy::ProjectionStrategy;
use crate::graph::{label, rel, GraphSnapshot, NodeKey};
use crate::schema::GraphSchemaDescriptor;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WeightedEdge {
    pub source: usize,
    pub target: usize,
    pub weight: f64,
}

/// Concept nodes plus weighted edges between them.
///
/// Co-occurrence strategies emit each pair in both directions, so every
/// projection is read as a directed graph.
#[derive(Debug, Clone, Serialize)]
pub struct Projection {
    pub strategy: ProjectionStrategy,
    pub nodes: Vec<NodeKey>,
    pub edges: Vec<WeightedEdge>,
}

impl Projection {
    /// Materialize `strategy` over the committed graph.
    pub fn build(snapshot: &GraphSnapshot, schema: &GraphSchemaDescriptor, strategy: ProjectionStrategy) -> Self {
        let concept_labels = schema.concept_labels();
        let concepts: Vec<usize> = concept_labels
            .iter()
            .flat_map(|l| snapshot.indices_with_label(l))
            .collect();
        let position: BTreeMap<usize, usize> = concepts.iter().enumerate().map(|(p, &i)| (i, p)).collect();

        let edges = match strategy {
            ProjectionStrategy::RelatesTo => relates_to_edges(snapshot, &concepts, &position),
            ProjectionStrategy::CoTaxonomy => {
                let taxonomy_labels = schema.taxonomy_labels();
                co_occurrence_edges(&concepts, |c| taxonomy_parents(snapshot, c, &taxonomy_labels))
            }
            ProjectionStrategy::CoCitation => co_occurrence_edges(&concepts, |c| citing_sources(snapshot, c)),
        };

        Self {
            strategy,
            nodes: concepts.iter().map(|&i| snapshot.node(i).key.clone()).collect(),
            edges,
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Nothing for an algorithm to work on
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() || self.edges.is_empty()
    }

    pub fn adjacency(&self) -> Adjacency {
        let mut adj = vec![Vec::new(); self.nodes.len()];
        for e in &self.edges {
            adj[e.source].push((e.target, e.weight));
        }
        adj
    }

    /// Wire form for external engines: node keys and edges by key
    pub fn to_json(&self) -> serde_json::Value {
        let edges: Vec<serde_json::Value> = self
            .edges
            .iter()
            .map(|e| {
                serde_json::json!({
                    "source": self.nodes[e.source],
                    "target": self.nodes[e.target],
                    "weight": e.weight,
                })
            })
            .collect();

        serde_json::json!({
            "strategy": self.strategy,
            "nodes": self.nodes,
            "edges": edges,
            "node_count": self.nodes.len(),
            "edge_count": edges.len(),
        })
    }
}

fn relates_to_edges(
    snapshot: &GraphSnapshot,
    concepts: &[usize],
    position: &BTreeMap<usize, usize>,
) -> Vec<WeightedEdge> {
    let mut edges = Vec::new();
    for (source, &c) in concepts.iter().enumerate() {
        let targets: BTreeSet<usize> = snapshot
            .out_via(c, rel::RELATES_TO)
            .filter_map(|(t, _)| position.get(&t).copied())
            .collect();
        edges.extend(targets.into_iter().map(|target| WeightedEdge {
            source,
            target,
            weight: 1.0,
        }));
    }
    edges
}

/// Link every pair of concepts whose context sets overlap, weighted by the
/// size of the overlap.
fn co_occurrence_edges<F>(concepts: &[usize], contexts_of: F) -> Vec<WeightedEdge>
where
    F: Fn(usize) -> BTreeSet<usize>,
{
    let mut members: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (p, &c) in concepts.iter().enumerate() {
        for ctx in contexts_of(c) {
            members.entry(ctx).or_default().push(p);
        }
    }

    let mut shared: BTreeMap<(usize, usize), f64> = BTreeMap::new();
    for group in members.values() {
        for (i, &a) in group.iter().enumerate() {
            for &b in &group[i + 1..] {
                *shared.entry((a, b)).or_insert(0.0) += 1.0;
            }
        }
    }

    let mut edges = Vec::with_capacity(shared.len() * 2);
    for ((a, b), weight) in shared {
        edges.push(WeightedEdge { source: a, target: b, weight });
        edges.push(WeightedEdge { source: b, target: a, weight });
    }
    edges
}

/// Taxonomy nodes classifying a concept, directly or through the Items
/// that mention it
fn taxonomy_parents(snapshot: &GraphSnapshot, concept: usize, taxonomy_labels: &BTreeSet<&str>) -> BTreeSet<usize> {
    let classified_by = |node: usize| {
        rel::TAXONOMY
            .into_iter()
            .flat_map(move |r| snapshot.out_via(node, r))
            .map(|(t, _)| t)
            .filter(|&t| taxonomy_labels.contains(snapshot.node(t).label()))
    };

    let mut parents: BTreeSet<usize> = classified_by(concept).collect();
    for (item, _) in snapshot.in_via(concept, rel::MENTIONS) {
        if snapshot.node(item).label() == label::ITEM {
            parents.extend(classified_by(item));
        }
    }
    parents
}

/// Sources of the Items that mention a concept
fn citing_sources(snapshot: &GraphSnapshot, concept: usize) -> BTreeSet<usize> {
    snapshot
        .in_via(concept, rel::MENTIONS)
        .filter(|(item, _)| snapshot.node(*item).label() == label::ITEM)
        .flat_map(|(item, _)| snapshot.out_via(item, rel::FROM_SOURCE).map(|(s, _)| s))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, Node};
    use crate::schema::{resolve, FieldDeclaration, FieldKind, Template};

    fn key(label: &str, k: &str) -> NodeKey {
        NodeKey::new(label, k)
    }

    fn schema() -> GraphSchemaDescriptor {
        resolve(&Template::new(vec![
            FieldDeclaration::new("code", FieldKind::Code),
            FieldDeclaration::new("topic", FieldKind::Topic),
        ]))
        .unwrap()
    }

    /// r1 (source s1) mentions A and B; r2 (source s1) mentions C;
    /// r3 (source s2) mentions A. A and B share topic t1 through r1.
    fn snapshot() -> GraphSnapshot {
        let nodes = ["A", "B", "C"]
            .iter()
            .map(|c| Node::new(key("Code", c)))
            .chain(["r1", "r2", "r3"].iter().map(|r| Node::new(key("Item", r))))
            .chain(["s1", "s2"].iter().map(|s| Node::new(key("Source", s))))
            .chain([Node::new(key("Topic", "t1"))])
            .collect();
        let edges = vec![
            Edge::new(key("Item", "r1"), "MENTIONS", key("Code", "A")),
            Edge::new(key("Item", "r1"), "MENTIONS", key("Code", "B")),
            Edge::new(key("Item", "r2"), "MENTIONS", key("Code", "C")),
            Edge::new(key("Item", "r3"), "MENTIONS", key("Code", "A")),
            Edge::new(key("Item", "r1"), "FROM_SOURCE", key("Source", "s1")),
            Edge::new(key("Item", "r2"), "FROM_SOURCE", key("Source", "s1")),
            Edge::new(key("Item", "r3"), "FROM_SOURCE", key("Source", "s2")),
            Edge::new(key("Item", "r1"), "GROUPED_BY", key("Topic", "t1")),
            Edge::new(key("Code", "A"), "RELATES_TO", key("Code", "C")),
        ];
        GraphSnapshot::build(nodes, edges).unwrap()
    }

    fn pairs(p: &Projection) -> Vec<(String, String, f64)> {
        p.edges
            .iter()
            .map(|e| (p.nodes[e.source].natural_key.clone(), p.nodes[e.target].natural_key.clone(), e.weight))
            .collect()
    }

    #[test]
    fn relates_to_uses_explicit_edges() {
        let p = Projection::build(&snapshot(), &schema(), ProjectionStrategy::RelatesTo);
        assert_eq!(p.node_count(), 3);
        assert_eq!(pairs(&p), vec![("A".into(), "C".into(), 1.0)]);
    }

    #[test]
    fn co_citation_links_concepts_sharing_a_source() {
        let p = Projection::build(&snapshot(), &schema(), ProjectionStrategy::CoCitation);
        let mut got = pairs(&p);
        got.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
        // every pair shares s1 once
        assert_eq!(
            got,
            vec![
                ("A".into(), "B".into(), 1.0),
                ("A".into(), "C".into(), 1.0),
                ("B".into(), "A".into(), 1.0),
                ("B".into(), "C".into(), 1.0),
                ("C".into(), "A".into(), 1.0),
                ("C".into(), "B".into(), 1.0),
            ]
        );
    }

    #[test]
    fn co_taxonomy_links_through_item_classification() {
        let p = Projection::build(&snapshot(), &schema(), ProjectionStrategy::CoTaxonomy);
        assert_eq!(
            pairs(&p),
            vec![("A".into(), "B".into(), 1.0), ("B".into(), "A".into(), 1.0)]
        );
    }

    #[test]
    fn empty_graph_projects_empty() {
        let p = Projection::build(&GraphSnapshot::default(), &schema(), ProjectionStrategy::RelatesTo);
        assert!(p.is_empty());
        assert_eq!(p.to_json()["node_count"], 0);
    }

    #[test]
    fn wire_form_names_endpoints_by_key() {
        let p = Projection::build(&snapshot(), &schema(), ProjectionStrategy::RelatesTo);
        let json = p.to_json();
        assert_eq!(json["strategy"], "RELATES_TO");
        assert_eq!(json["edges"][0]["source"]["natural_key"], "A");
        assert_eq!(json["edges"][0]["target"]["label"], "Code");
    }
}
