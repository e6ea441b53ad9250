//! Class version migration through the service and the tree editor

mod common;

use common::App;
use pretty_assertions::assert_eq;
use scope_core::{
    ConfigService, Error, MigrationRegistry, MigrationResolver, SaveOutcome, TransformError,
    TreeEditor,
};
use scope_store::{ConfigStorage, MemoryStorage};
use scope_test_utils::fixtures::{APP, app, app_schemas_at, database, key, path, snapshot};
use std::borrow::Cow;
use std::sync::Arc;

const ALICE: &str = "global/user[id=alice]";

/// Version 1 called the theme `colour`; version 3 renamed the old default.
fn migrations() -> MigrationRegistry {
    let mut migrations = MigrationRegistry::new();
    migrations
        .register(APP, 1, 2, |editor: &mut TreeEditor<'_>| {
            editor.rename("colour", "theme")
        })
        .unwrap()
        .register(APP, 2, 3, |editor: &mut TreeEditor<'_>| {
            editor.change_simple_value("theme", Some("blue"), Some("dark"));
            Ok(())
        })
        .unwrap();
    migrations
}

fn service_at(storage: Arc<MemoryStorage>, migrations: MigrationRegistry) -> ConfigService {
    let mut builder = ConfigService::builder(storage).migrations(migrations);
    for schema in app_schemas_at(3) {
        builder = builder.schema(schema);
    }
    builder.build().unwrap()
}

fn legacy_storage() -> Arc<MemoryStorage> {
    let storage = Arc::new(MemoryStorage::new());
    storage
        .save(&snapshot(
            "global",
            1,
            app().simple("colour", "string", "blue").build(),
        ))
        .unwrap();
    storage
}

#[test]
fn steps_apply_in_order() {
    let service = service_at(legacy_storage(), migrations());
    let resolved = service.resolve(&key(APP, "global")).unwrap();

    assert_eq!(resolved.effective.class_version(), 3);
    assert_eq!(resolved.effective.root().value("theme"), Some("dark"));
    assert!(!resolved.effective.root().contains("colour"));
    assert_eq!(service.load::<App>(&path("global")).unwrap().get().theme, "dark");
}

#[test]
fn migrated_snapshots_are_not_written_back_on_load() {
    let storage = legacy_storage();
    let service = service_at(storage.clone(), migrations());
    service.resolve(&key(APP, "global")).unwrap();

    let stored = storage.load(&key(APP, "global")).unwrap().unwrap();
    assert_eq!(stored.class_version(), 1);
    assert_eq!(stored.root().value("colour"), Some("blue"));
}

#[test]
fn every_chain_level_is_migrated_before_merging() {
    let storage = legacy_storage();
    storage
        .save(
            &snapshot(
                ALICE,
                1,
                app()
                    .simple("region", "string", "us")
                    .complex("database", database("replica", 5433))
                    .build(),
            )
            .with_class_version(3),
        )
        .unwrap();
    let service = service_at(storage, migrations());

    let app = service.load::<App>(&path(ALICE)).unwrap().into_inner();
    assert_eq!(app.theme, "dark");
    assert_eq!(app.database.host, "replica");
}

#[test]
fn missing_edge_is_reported() {
    let mut partial = MigrationRegistry::new();
    partial
        .register(APP, 1, 2, |editor: &mut TreeEditor<'_>| {
            editor.rename("colour", "theme")
        })
        .unwrap();
    let service = service_at(legacy_storage(), partial);

    let err = service.resolve(&key(APP, "global")).unwrap_err();
    assert!(matches!(
        err,
        Error::MigrationNotFound { from: 1, to: 3, .. }
    ));
}

#[test]
fn failing_step_aborts_and_leaves_storage_untouched() {
    let storage = legacy_storage();
    let mut failing = MigrationRegistry::new();
    failing
        .register(APP, 1, 3, |_: &mut TreeEditor<'_>| {
            Err(TransformError::custom("unsupported legacy layout"))
        })
        .unwrap();
    let service = service_at(storage.clone(), failing);

    let err = service.resolve(&key(APP, "global")).unwrap_err();
    assert!(matches!(err, Error::TransformFailed { from: 1, to: 3, .. }));
    assert!(!service.cache().contains(&key(APP, "global")));
    assert_eq!(
        storage.load(&key(APP, "global")).unwrap().unwrap().class_version(),
        1
    );
}

#[test]
fn backwards_edge_is_rejected() {
    let mut migrations = MigrationRegistry::new();
    let err = migrations
        .register(APP, 3, 2, |_: &mut TreeEditor<'_>| Ok(()))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidMigrationEdge { from: 3, to: 2, .. }));
}

#[test]
fn saving_an_unchanged_legacy_leaf_rewrites_it_migrated() {
    let storage = legacy_storage();
    let service = service_at(storage.clone(), migrations());
    let resolved = service.resolve(&key(APP, "global")).unwrap();

    let report = service.save(&resolved.effective, &resolved.chain).unwrap();
    assert_eq!(report.outcome, SaveOutcome::Update);
    assert_eq!(report.tree.version(), 2);

    let stored = storage.load(&key(APP, "global")).unwrap().unwrap();
    assert_eq!(stored.class_version(), 3);
    assert_eq!(stored.root().value("theme"), Some("dark"));
    assert!(!stored.root().contains("colour"));

    let again = service.resolve(&key(APP, "global")).unwrap();
    let report = service.save(&again.effective, &again.chain).unwrap();
    assert_eq!(report.outcome, SaveOutcome::Unchanged);
}

#[test]
fn current_snapshot_is_borrowed_unchanged() {
    let tree = snapshot("global", 1, app().build()).with_class_version(3);
    let migrated = MigrationResolver::migrate(&tree, 3, migrations().edges(APP)).unwrap();
    assert!(matches!(migrated, Cow::Borrowed(_)));
}

#[test]
fn rename_moves_the_node_itself() {
    let mut tree = snapshot(
        "global",
        1,
        app().complex("database", database("db", 1)).build(),
    );
    let before = tree.root().get("database").unwrap().clone();

    TreeEditor::new(&mut tree).rename("database", "primary").unwrap();

    assert!(tree.root().get("database").is_none());
    assert!(tree.root().get("primary").unwrap().ptr_eq(&before));
}

#[test]
fn compare_and_set_mismatch_leaves_tree_unchanged() {
    let mut tree = snapshot("global", 1, app().simple("theme", "string", "light").build());
    let before = tree.clone();

    let changed = TreeEditor::new(&mut tree).change_simple_value("theme", Some("blue"), Some("dark"));

    assert!(!changed);
    assert!(tree.content_eq(&before));
}
