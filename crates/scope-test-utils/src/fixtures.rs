//! Scope paths, schemas and snapshot builders.

use scope_model::{
    ComplexNode, ComplexNodeBuilder, ConfigKey, ConfigTree, ScopePath, StalenessPolicy,
    TypeSchema,
};

/// Type name of the sample root configuration.
pub const APP: &str = "App";
/// Type name of the complex `database` property of [`APP`].
pub const DATABASE: &str = "Database";

/// Parse a scope path, panicking on malformed input.
pub fn path(input: &str) -> ScopePath {
    input
        .parse()
        .unwrap_or_else(|e| panic!("invalid test scope path {input:?}: {e}"))
}

pub fn key(type_name: &str, input: &str) -> ConfigKey {
    ConfigKey::new(type_name, path(input))
}

/// Schemas of the sample `App` type at class version 1:
///
/// | property | kind | strategy | on conflict |
/// |----------|------|----------|-------------|
/// | `theme` | string | child overwrites | use parent |
/// | `retries` | u32 | child overwrites | merge |
/// | `telemetry` | bool | parent false wins | abort |
/// | `region` | string | keep parent | abort |
/// | `features` | set of string | | abort |
/// | `database` | `Database { host, port }` | | abort |
pub fn app_schemas() -> Vec<TypeSchema> {
    app_schemas_at(1)
}

/// [`app_schemas`] with the `App` schema declared at `class_version`.
pub fn app_schemas_at(class_version: u32) -> Vec<TypeSchema> {
    let app = TypeSchema::builder(APP)
        .class_version(class_version)
        .simple("theme", "string")
        .on_stale(StalenessPolicy::UseParent)
        .simple("retries", "u32")
        .on_stale(StalenessPolicy::Merge)
        .simple("telemetry", "bool")
        .merge_with("parent_false_wins")
        .simple("region", "string")
        .merge_with("keep_parent")
        .set("features", "string")
        .complex("database", DATABASE)
        .build();
    let database = TypeSchema::builder(DATABASE)
        .simple("host", "string")
        .simple("port", "u16")
        .build();
    match (app, database) {
        (Ok(app), Ok(database)) => vec![app, database],
        (Err(e), _) | (_, Err(e)) => panic!("invalid fixture schema: {e}"),
    }
}

/// Start an `App` root node.
pub fn app() -> ComplexNodeBuilder {
    ComplexNode::builder(APP)
}

/// A `Database` node with both properties set.
pub fn database(host: &str, port: u16) -> ComplexNode {
    ComplexNode::builder(DATABASE)
        .simple("host", "string", host)
        .simple("port", "u16", port.to_string())
        .build()
}

/// A persisted snapshot at `at` with the given version and root.
pub fn snapshot(at: &str, version: u64, root: ComplexNode) -> ConfigTree {
    let mut tree = ConfigTree::from_root(path(at), root);
    tree.set_version(version);
    tree
}
