//! Snapshot and serialization tests with stored-shape fixtures

use serde_json::{json, Value};

/// Fixture: a concept node as persisted in `properties_json`
fn stored_node_fixture() -> Value {
    json!({
        "key": { "label": "Code", "natural_key": "institutional_trust" },
        "properties": {
            "name": "institutional_trust",
            "mention_count": 3,
            "pagerank": 0.21
        }
    })
}

#[cfg(test)]
mod serialization_tests {
    use super::*;
    use crate::graph::{Edge, Node, NodeKey, PropertyValue};

    #[test]
    fn node_deserializes_from_stored_shape() {
        let node: Node = serde_json::from_value(stored_node_fixture()).unwrap();
        assert_eq!(node.label(), "Code");
        assert_eq!(node.key.natural_key, "institutional_trust");
        assert_eq!(node.property("mention_count"), Some(&PropertyValue::Int(3)));
        assert_eq!(node.property("pagerank"), Some(&PropertyValue::Float(0.21)));
    }

    #[test]
    fn properties_serialize_in_key_order() {
        let node = Node::new(NodeKey::new("Item", "r1"))
            .with_property("source_file", "a.syn")
            .with_property("column", 1u32)
            .with_property("line", 4u32);

        let json = serde_json::to_string(&node.properties).unwrap();
        assert_eq!(json, r#"{"column":1,"line":4,"source_file":"a.syn"}"#);
    }

    #[test]
    fn edge_properties_keep_types() {
        let edge = Edge::new(NodeKey::new("Code", "a"), "RELATES_TO", NodeKey::new("Code", "b"))
            .with_property("type", "ENABLES")
            .with_property("weight", 2.5);

        let value = serde_json::to_value(&edge).unwrap();
        assert_eq!(value["key"]["rel_type"], "RELATES_TO");
        assert_eq!(value["properties"]["type"], "ENABLES");
        assert_eq!(value["properties"]["weight"], 2.5);
    }
}

#[cfg(test)]
mod snapshot_tests {
    use crate::graph::{Edge, GraphSnapshot, Node, NodeKey, SnapshotError};

    fn key(label: &str, k: &str) -> NodeKey {
        NodeKey::new(label, k)
    }

    #[test]
    fn snapshot_indexes_both_directions() {
        let nodes = vec![
            Node::new(key("Item", "r1")),
            Node::new(key("Code", "A")),
            Node::new(key("Code", "B")),
        ];
        let edges = vec![
            Edge::new(key("Item", "r1"), "MENTIONS", key("Code", "A")),
            Edge::new(key("Code", "A"), "RELATES_TO", key("Code", "B")),
        ];
        let snap = GraphSnapshot::build(nodes, edges).unwrap();

        let a = snap.index_of(&key("Code", "A")).unwrap();
        assert_eq!(snap.outgoing(a).count(), 1);
        assert_eq!(snap.incoming(a).count(), 1);
        assert_eq!(snap.in_via(a, "MENTIONS").count(), 1);
        assert_eq!(snap.out_via(a, "MENTIONS").count(), 0);
        assert_eq!(snap.indices_with_label("Code").count(), 2);
        assert_eq!(
            snap.relationship_types().into_iter().collect::<Vec<_>>(),
            vec!["MENTIONS".to_string(), "RELATES_TO".to_string()]
        );
    }

    #[test]
    fn dangling_edge_is_rejected() {
        let nodes = vec![Node::new(key("Code", "A"))];
        let edges = vec![Edge::new(key("Code", "A"), "RELATES_TO", key("Code", "ghost"))];

        let err = GraphSnapshot::build(nodes, edges).unwrap_err();
        match err {
            SnapshotError::DanglingEdge { missing, .. } => assert_eq!(missing, "Code[ghost]"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn duplicate_node_is_rejected() {
        let nodes = vec![Node::new(key("Code", "A")), Node::new(key("Code", "A"))];
        assert!(matches!(
            GraphSnapshot::build(nodes, Vec::new()),
            Err(SnapshotError::DuplicateNode(_))
        ));
    }
}
