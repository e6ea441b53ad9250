//! Reference graphs resolved through the service

use scope_core::ConfigService;
use scope_model::{ComplexNode, ConfigKey, TypeSchema};
use scope_store::{ConfigStorage, MemoryStorage};
use scope_test_utils::fixtures::{path, snapshot};
use std::sync::Arc;

fn service(storage: Arc<MemoryStorage>) -> ConfigService {
    ConfigService::builder(storage)
        .schema(
            TypeSchema::builder("Team")
                .simple("name", "string")
                .reference("lead", "Person")
                .build()
                .unwrap(),
        )
        .schema(
            TypeSchema::builder("Person")
                .simple("email", "string")
                .reference("team", "Team")
                .build()
                .unwrap(),
        )
        .build()
        .unwrap()
}

fn team(lead: &str) -> ComplexNode {
    ComplexNode::builder("Team")
        .simple("name", "string", "core")
        .simple("lead", "scope_path", lead)
        .build()
}

#[test]
fn cyclic_references_terminate_and_are_reported() {
    let storage = Arc::new(MemoryStorage::new());
    storage
        .save(&snapshot("global/team[id=core]", 1, team("global/user[id=alice]")))
        .unwrap();
    storage
        .save(&snapshot(
            "global/user[id=alice]",
            1,
            ComplexNode::builder("Person")
                .simple("team", "scope_path", "global/team[id=core]")
                .build(),
        ))
        .unwrap();
    let service = service(storage);

    let start = ConfigKey::new("Team", path("global/team[id=core]"));
    let graph = service.references(&start).unwrap();

    assert_eq!(graph.nodes().len(), 2);
    assert_eq!(graph.edges().len(), 2);
    assert!(graph.has_cycle());
    assert!(graph.cycle_members().contains(&start));
}

#[test]
fn references_resolve_through_inherited_values() {
    let storage = Arc::new(MemoryStorage::new());
    storage
        .save(&snapshot("global", 1, team("global/user[id=alice]")))
        .unwrap();
    let service = service(storage);

    let start = ConfigKey::new("Team", path("global/team[id=core]"));
    let graph = service.references(&start).unwrap();

    let edge = graph.references_from(&start).next().unwrap();
    assert_eq!(edge.property, "lead");
    assert_eq!(edge.to, ConfigKey::new("Person", path("global/user[id=alice]")));
    assert!(!graph.has_cycle());
}
