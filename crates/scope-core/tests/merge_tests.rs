//! Chain merge laws and built-in strategy semantics

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rstest::rstest;
use scope_core::strategy::{CHILD_OVERWRITES, KEEP_PARENT, PARENT_FALSE_WINS};
use scope_core::{DefaultPolicies, MergeEngine, Resolution, SchemaPolicies, StrategyRegistry};
use scope_model::{ComplexNode, ConfigTree, Property, SchemaRegistry};
use scope_test_utils::fixtures::{app, app_schemas, snapshot};
use std::collections::BTreeMap;

fn tree_strategy() -> impl Strategy<Value = ConfigTree> {
    (
        prop::collection::btree_map("[a-z]{1,6}", prop::option::of("[a-z0-9]{0,6}"), 0..6),
        prop::collection::btree_map("[a-z]{1,6}", "[a-z0-9]{0,6}", 0..4),
        1u64..50,
    )
        .prop_map(
            |(simple, nested, version): (
                BTreeMap<String, Option<String>>,
                BTreeMap<String, String>,
                u64,
            )| {
                let mut root = ComplexNode::new("App");
                for (name, value) in simple {
                    root.set_value(name, "string", value);
                }
                let mut child = ComplexNode::new("Nested");
                for (name, value) in nested {
                    child.set_value(name, "string", Some(value));
                }
                root.insert("nested_node", Property::complex(child));
                snapshot("global/user[id=p]", version, root)
            },
        )
}

proptest! {
    #[test]
    fn merging_a_single_snapshot_is_identity(tree in tree_strategy()) {
        let merged = MergeEngine::merge(std::slice::from_ref(&tree), &DefaultPolicies).unwrap();
        prop_assert!(merged.content_eq(&tree));
        prop_assert_eq!(merged.key(), tree.key());
        prop_assert_eq!(merged.version(), tree.version());
    }

    #[test]
    fn empty_descendant_inherits_everything(tree in tree_strategy()) {
        let empty = snapshot("global/user[id=p]/device[id=d]", 1, ComplexNode::new("App"));
        let merged = MergeEngine::merge(&[tree.clone(), empty], &DefaultPolicies).unwrap();
        prop_assert!(merged.root().content_eq(tree.root()));
        prop_assert_eq!(merged.defining_scope_path().len(), 3);
    }
}

#[rstest]
#[case(CHILD_OVERWRITES, Some("a"), Some("b"), Resolution::TakeChild)]
#[case(CHILD_OVERWRITES, Some("a"), None, Resolution::TakeChild)]
#[case(KEEP_PARENT, Some("a"), Some("b"), Resolution::KeepParent)]
#[case(KEEP_PARENT, None, Some("b"), Resolution::KeepParent)]
#[case(PARENT_FALSE_WINS, Some("false"), Some("true"), Resolution::KeepParent)]
#[case(PARENT_FALSE_WINS, Some("true"), Some("false"), Resolution::TakeChild)]
#[case(PARENT_FALSE_WINS, None, Some("true"), Resolution::TakeChild)]
fn built_in_strategies(
    #[case] name: &str,
    #[case] parent: Option<&str>,
    #[case] child: Option<&str>,
    #[case] expected: Resolution,
) {
    let registry = StrategyRegistry::with_defaults();
    assert_eq!(registry.get(name).unwrap().resolve(parent, child), expected);
}

#[test]
fn schema_strategies_apply_per_property() {
    let mut schemas = SchemaRegistry::new();
    for schema in app_schemas() {
        schemas.register(schema);
    }
    let strategies = StrategyRegistry::with_defaults();
    let policies = SchemaPolicies::new(&schemas, &strategies);

    let global = snapshot(
        "global",
        1,
        app()
            .simple("theme", "string", "dark")
            .simple("telemetry", "bool", "false")
            .simple("region", "string", "eu")
            .set("features", "string", ["a", "b"])
            .build(),
    );
    let user = snapshot(
        "global/user[id=u]",
        1,
        app()
            .simple("theme", "string", "light")
            .simple("telemetry", "bool", "true")
            .simple("region", "string", "us")
            .set("features", "string", ["c"])
            .build(),
    );

    let merged = MergeEngine::merge(&[global, user], &policies).unwrap();
    let root = merged.root();
    assert_eq!(root.value("theme"), Some("light"));
    assert_eq!(root.value("telemetry"), Some("false"));
    assert_eq!(root.value("region"), Some("eu"));
    let features = root.get("features").unwrap().as_collection().unwrap();
    assert_eq!(features.len(), 1);
    assert_eq!(features.items[0].as_str(), Some("c"));
}

#[test]
fn explicit_null_overrides_ancestor_value() {
    let global = snapshot("global", 1, app().simple("theme", "string", "dark").build());
    let user = snapshot("global/user[id=u]", 1, app().null("theme", "string").build());

    let merged = MergeEngine::merge(&[global, user], &DefaultPolicies).unwrap();
    assert_eq!(merged.root().simple("theme").unwrap().value(), None);
}
