//! Property tests for the per-request aggregate.

use correlog::sink::MemorySink;
use correlog::{bind, Context, Node, Severity};
use proptest::prelude::*;
use std::sync::Arc;

fn severity() -> impl Strategy<Value = Severity> {
    prop_oneof![
        Just(Severity::Debug),
        Just(Severity::Info),
        Just(Severity::Warn),
        Just(Severity::Error),
    ]
}

proptest! {
    #[test]
    fn prop_aggregate_tracks_count_and_max(
        calls in prop::collection::vec((severity(), 0usize..4), 0..40)
    ) {
        let sink = Arc::new(MemorySink::new());
        let root = Node::root(sink.clone(), "trace");
        let ctx = bind(&Context::new(), root.clone());
        let nodes = vec![
            root.clone(),
            root.with_attribute("depth", 1).logger(),
            root.with_attribute("depth", 1).logger().with_attribute("depth", 2).logger(),
            root.with_attributes().logger(),
        ];

        for (severity, node) in &calls {
            nodes[*node].log(&ctx, *severity, "call");
        }

        prop_assert_eq!(root.log_count(), calls.len());
        prop_assert_eq!(root.max_severity(), calls.iter().map(|(s, _)| *s).max());
        prop_assert_eq!(sink.children().len(), calls.len());
        for node in &nodes {
            prop_assert_eq!(node.log_count(), calls.len());
        }
    }

    #[test]
    fn prop_request_attributes_keep_last_write(
        writes in prop::collection::vec(("[a-c]", any::<i64>()), 1..20)
    ) {
        let root = Node::root(Arc::new(MemorySink::new()), "trace");
        let child = root.with_attribute("user", "alice").logger();

        for (i, (key, value)) in writes.iter().enumerate() {
            let writer = if i % 2 == 0 { &root } else { &child };
            writer.add_request_attribute(key, *value);
        }

        let attributes = root.request_attributes();
        for (key, _) in &writes {
            let last = writes.iter().rev().find(|(k, _)| k == key).map(|(_, v)| *v);
            prop_assert_eq!(attributes.get(key).and_then(|v| v.as_i64()), last);
        }
        prop_assert!(child.attributes().get("user").is_some());
        prop_assert_eq!(child.attributes().len(), 1);
    }
}
