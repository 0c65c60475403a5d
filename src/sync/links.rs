//! Topic links derived from explicit concept relationships
//!
//! Two topics are linked when a concept grouped under one relates to a
//! concept grouped under the other. The link weight is the number of such
//! `t1 <-GROUPED_BY- c1 -RELATES_TO-> c2 -GROUPED_BY-> t2` paths in the batch.

use super::mutation::Mutation;
use crate::graph::{rel, NodeKey};
use crate::schema::{FieldKind, GraphSchemaDescriptor};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// IS_LINKED_TO merges for the batch, ordered by `(from, to)`.
///
/// Weights are recomputed from the batch each run and written with SET
/// semantics, so repeated runs do not accumulate.
pub fn derive_topic_links(mutations: &[Mutation], schema: &GraphSchemaDescriptor) -> Vec<Mutation> {
    let topic_labels: BTreeSet<&str> = schema
        .taxonomy_of_kind(FieldKind::Topic)
        .map(|m| m.derived_label.as_str())
        .collect();
    if topic_labels.is_empty() {
        return Vec::new();
    }
    let concept_labels = schema.concept_labels();

    let mut topics_of: HashMap<&NodeKey, BTreeSet<&NodeKey>> = HashMap::new();
    let mut relates: BTreeSet<(&NodeKey, &NodeKey)> = BTreeSet::new();

    for m in mutations {
        let Mutation::EdgeMerge { key, .. } = m else {
            continue;
        };
        if key.rel_type == rel::GROUPED_BY
            && concept_labels.contains(key.from.label.as_str())
            && topic_labels.contains(key.to.label.as_str())
        {
            topics_of.entry(&key.from).or_default().insert(&key.to);
        } else if key.rel_type == rel::RELATES_TO {
            relates.insert((&key.from, &key.to));
        }
    }

    let mut weights: BTreeMap<(&NodeKey, &NodeKey), i64> = BTreeMap::new();
    for (c1, c2) in relates {
        let (Some(from_topics), Some(to_topics)) = (topics_of.get(c1), topics_of.get(c2)) else {
            continue;
        };
        for &t1 in from_topics {
            for &t2 in to_topics {
                if t1 != t2 {
                    *weights.entry((t1, t2)).or_insert(0) += 1;
                }
            }
        }
    }

    weights
        .into_iter()
        .map(|((t1, t2), weight)| {
            Mutation::edge(t1.clone(), rel::IS_LINKED_TO, t2.clone()).with_property("weight", weight)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::PropertyValue;
    use crate::schema::{resolve, FieldDeclaration, FieldScope, Template};

    fn schema() -> GraphSchemaDescriptor {
        resolve(&Template::new(vec![
            FieldDeclaration::new("code", FieldKind::Code),
            FieldDeclaration::new("topic", FieldKind::Topic).with_scope(FieldScope::Ontology),
            FieldDeclaration::new("chain", FieldKind::Chain),
        ]))
        .unwrap()
    }

    fn code(k: &str) -> NodeKey {
        NodeKey::new("Code", k)
    }

    fn topic(k: &str) -> NodeKey {
        NodeKey::new("Topic", k)
    }

    #[test]
    fn counts_paths_between_distinct_topics() {
        let batch = vec![
            Mutation::edge(code("A"), "GROUPED_BY", topic("t1")),
            Mutation::edge(code("C"), "GROUPED_BY", topic("t1")),
            Mutation::edge(code("B"), "GROUPED_BY", topic("t2")),
            Mutation::edge(code("A"), "RELATES_TO", code("B")),
            Mutation::edge(code("C"), "RELATES_TO", code("B")),
            // same-topic relation produces no link
            Mutation::edge(code("A"), "RELATES_TO", code("C")),
            // repeated merge of the same relationship counts once
            Mutation::edge(code("A"), "RELATES_TO", code("B")),
        ];
        let links = derive_topic_links(&batch, &schema());

        assert_eq!(links.len(), 1);
        match &links[0] {
            Mutation::EdgeMerge { key, properties } => {
                assert_eq!(key.from, topic("t1"));
                assert_eq!(key.to, topic("t2"));
                assert_eq!(key.rel_type, "IS_LINKED_TO");
                assert_eq!(properties.get("weight"), Some(&PropertyValue::Int(2)));
            }
            other => panic!("unexpected mutation {other:?}"),
        }
    }

    #[test]
    fn no_topic_field_means_no_links() {
        let schema = resolve(&Template::new(vec![FieldDeclaration::new("chain", FieldKind::Chain)])).unwrap();
        let batch = vec![Mutation::edge(
            NodeKey::new("Chain", "A"),
            "RELATES_TO",
            NodeKey::new("Chain", "B"),
        )];
        assert!(derive_topic_links(&batch, &schema).is_empty());
    }
}
