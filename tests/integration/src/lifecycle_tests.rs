//! End-to-end load, save and migration over the file backend
//!
//! Each test opens services the way an application would: from settings,
//! with a typed configuration registered, and a fresh service standing in for
//! a restarted process.

use pretty_assertions::assert_eq;
use rstest::rstest;
use scope_core::{
    Backend, ConfigService, Configuration, MigrationRegistry, SaveOutcome, Settings, TreeEditor,
};
use scope_model::{ComplexNode, ConfigKey, StalenessPolicy, TypeSchema};
use scope_store::{ConfigStorage, FileStorage, StorageFormat};
use scope_test_utils::fixtures::{path, snapshot};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use tempfile::TempDir;

const PROFILE: &str = "Profile";
const ALICE: &str = "global/tenant[id=acme]/user[id=alice]";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct Notifications {
    email: bool,
    digest_hour: u8,
}

impl Default for Notifications {
    fn default() -> Self {
        Self {
            email: true,
            digest_hour: 8,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct Profile {
    display_name: String,
    locale: String,
    notifications: Notifications,
    shortcuts: BTreeMap<String, String>,
    recent: Vec<String>,
}

impl Configuration for Profile {
    fn schema() -> scope_model::Result<TypeSchema> {
        TypeSchema::builder(PROFILE)
            .class_version(2)
            .simple("display_name", "string")
            .simple("locale", "string")
            .on_stale(StalenessPolicy::UseParent)
            .complex("notifications", "Notifications")
            .map("shortcuts", "string")
            .list("recent", "string")
            .build()
    }

    fn nested_schemas() -> scope_model::Result<Vec<TypeSchema>> {
        Ok(vec![
            TypeSchema::builder("Notifications")
                .simple("email", "bool")
                .simple("digest_hour", "u8")
                .build()?,
        ])
    }
}

/// Class version 1 stored the locale as `language`.
fn migrations() -> MigrationRegistry {
    let mut migrations = MigrationRegistry::new();
    migrations
        .register(PROFILE, 1, 2, |editor: &mut TreeEditor<'_>| {
            editor.rename("language", "locale")
        })
        .unwrap();
    migrations
}

fn settings(dir: &TempDir, format: StorageFormat) -> Settings {
    let mut settings = Settings::default();
    settings.storage.backend = Backend::File;
    settings.storage.directory = Some(dir.path().to_path_buf());
    settings.storage.format = format;
    settings
}

fn open(settings: &Settings) -> ConfigService {
    ConfigService::from_settings(settings)
        .unwrap()
        .configuration::<Profile>()
        .unwrap()
        .migrations(migrations())
        .build()
        .unwrap()
}

#[rstest]
fn typed_profile_survives_a_restart(
    #[values(StorageFormat::Json, StorageFormat::Toml, StorageFormat::Yaml)] format: StorageFormat,
) {
    let dir = TempDir::new().unwrap();
    let settings = settings(&dir, format);

    {
        let service = open(&settings);
        let mut global = service.load::<Profile>(&path("global")).unwrap();
        global.set("locale", "en").unwrap();
        global.set("notifications.email", false).unwrap();
        assert_eq!(
            service.save_bound(&mut global).unwrap().unwrap().outcome,
            SaveOutcome::Create
        );

        let mut alice = service.load::<Profile>(&path(ALICE)).unwrap();
        alice.set("display_name", "Alice").unwrap();
        alice
            .set("shortcuts", BTreeMap::from([("save", "ctrl+s")]))
            .unwrap();
        alice.set("recent", ["b.txt", "a.txt"]).unwrap();
        service.save_bound(&mut alice).unwrap();
    }

    let service = open(&settings);
    let alice = service.load::<Profile>(&path(ALICE)).unwrap();
    assert_eq!(
        alice.get(),
        &Profile {
            display_name: "Alice".to_string(),
            locale: "en".to_string(),
            notifications: Notifications {
                email: false,
                digest_hour: 8,
            },
            shortcuts: BTreeMap::from([("save".to_string(), "ctrl+s".to_string())]),
            recent: vec!["b.txt".to_string(), "a.txt".to_string()],
        }
    );
    assert_eq!(alice.chain().len(), 2);
    assert_eq!(alice.chain()[1].parent_scope_name(), Some("global"));
}

#[test]
fn legacy_snapshots_migrate_on_load_and_rewrite_on_save() {
    let dir = TempDir::new().unwrap();
    let settings = settings(&dir, StorageFormat::Json);
    let storage = FileStorage::new(dir.path(), StorageFormat::Json);
    storage
        .save(&snapshot(
            "global",
            1,
            ComplexNode::builder(PROFILE)
                .simple("language", "string", "fr")
                .build(),
        ))
        .unwrap();

    let service = open(&settings);
    let mut global = service.load::<Profile>(&path("global")).unwrap();
    assert_eq!(global.get().locale, "fr");

    let key = ConfigKey::new(PROFILE, path("global"));
    assert_eq!(storage.load(&key).unwrap().unwrap().class_version(), 1);

    global.set("display_name", "Root").unwrap();
    service.save_bound(&mut global).unwrap();

    let stored = storage.load(&key).unwrap().unwrap();
    assert_eq!(stored.class_version(), 2);
    assert_eq!(stored.version(), 2);
    assert_eq!(stored.root().value("locale"), Some("fr"));
    assert!(!stored.root().contains("language"));
}

#[test]
fn descendants_inherit_until_they_override() {
    let dir = TempDir::new().unwrap();
    let service = open(&settings(&dir, StorageFormat::Yaml));

    let mut tenant = service
        .load::<Profile>(&path("global/tenant[id=acme]"))
        .unwrap();
    tenant.set("locale", "de").unwrap();
    tenant.set("notifications.digest_hour", 6).unwrap();
    service.save_bound(&mut tenant).unwrap();

    let mut alice = service.load::<Profile>(&path(ALICE)).unwrap();
    assert_eq!(alice.get().locale, "de");
    alice.set("notifications.email", false).unwrap();
    service.save_bound(&mut alice).unwrap();

    let alice = service.load::<Profile>(&path(ALICE)).unwrap().into_inner();
    assert_eq!(
        alice.notifications,
        Notifications {
            email: false,
            digest_hour: 6,
        }
    );

    let bob = service
        .load::<Profile>(&path("global/tenant[id=acme]/user[id=bob]"))
        .unwrap()
        .into_inner();
    assert!(bob.notifications.email);
    assert_eq!(bob.notifications.digest_hour, 6);
}

#[test]
fn settings_file_configures_the_service() {
    let dir = TempDir::new().unwrap();
    let store = dir.path().join("store");
    let config = dir.path().join("settings.toml");
    fs::write(
        &config,
        format!(
            "[cache]\ncapacity = 1\n\n[storage]\nbackend = \"file\"\ndirectory = {:?}\nformat = \"toml\"\n",
            store.display().to_string()
        ),
    )
    .unwrap();

    let settings = Settings::load(&config).unwrap();
    let service = open(&settings);
    assert_eq!(service.cache().capacity(), 1);

    let mut global = service.load::<Profile>(&path("global")).unwrap();
    global.set("locale", "nl").unwrap();
    service.save_bound(&mut global).unwrap();

    let written: Vec<_> = fs::read_dir(store.join(PROFILE))
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "toml"))
        .collect();
    assert_eq!(written.len(), 1);
}

#[test]
fn handle_defers_loading_until_first_use() {
    let dir = TempDir::new().unwrap();
    let settings = settings(&dir, StorageFormat::Json);
    let service = open(&settings);

    let handle = service.handle::<Profile>(path(ALICE));
    assert!(!handle.is_loaded());

    let mut global = service.load::<Profile>(&path("global")).unwrap();
    global.set("locale", "pt").unwrap();
    service.save_bound(&mut global).unwrap();

    assert_eq!(handle.get().unwrap().get().locale, "pt");
    assert!(handle.is_loaded());
}
