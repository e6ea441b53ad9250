//! Concurrent saves within one service and across services sharing a store

use scope_core::{ConfigService, Error, SaveOutcome};
use scope_model::{ConfigKey, ConfigTree, ScopePath};
use scope_store::{ConfigStorage, FileStorage, MemoryStorage, StorageFormat};
use scope_test_utils::fixtures::{APP, app, key, path, snapshot};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::TempDir;

const WRITERS: usize = 8;

fn counters_key() -> ConfigKey {
    ConfigKey::new("Counters", path("global/team[id=core]"))
}

/// Resolve, set `property`, save. Retries when another writer won the race.
fn write_property(service: &ConfigService, property: &str, value: &str) -> Result<usize, Error> {
    let key = counters_key();
    for attempt in 1..=50 {
        let resolved = service.resolve(&key)?;
        let mut local = resolved.effective.clone();
        local
            .root_mut()
            .set_value(property, "string", Some(value.to_string()));
        match service.save(&local, &resolved.chain) {
            Ok(_) => return Ok(attempt),
            Err(err) if err.is_stale() => continue,
            Err(err) => return Err(err),
        }
    }
    panic!("{property} never saved");
}

#[test]
fn saves_through_one_service_are_serialized_per_key() {
    let service = Arc::new(
        ConfigService::builder(Arc::new(MemoryStorage::new()))
            .build()
            .unwrap(),
    );
    let barrier = Arc::new(Barrier::new(WRITERS));

    let writers: Vec<_> = (0..WRITERS)
        .map(|i| {
            let service = Arc::clone(&service);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                write_property(&service, &format!("p{i}"), &i.to_string())
            })
        })
        .collect();

    for writer in writers {
        // The per-key lock means nobody ever loses a versioning race.
        assert_eq!(writer.join().unwrap().unwrap(), 1);
    }

    let resolved = service.resolve(&counters_key()).unwrap();
    assert_eq!(resolved.effective.root().len(), WRITERS);
    assert_eq!(resolved.chain[0].version(), WRITERS as u64);
}

#[test]
fn services_sharing_a_directory_converge_after_retries() {
    let dir = TempDir::new().unwrap();
    let barrier = Arc::new(Barrier::new(WRITERS));

    let writers: Vec<_> = (0..WRITERS)
        .map(|i| {
            let root = dir.path().to_path_buf();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let storage = FileStorage::new(root, StorageFormat::Json);
                let service = ConfigService::builder(Arc::new(storage)).build().unwrap();
                barrier.wait();
                write_property(&service, &format!("p{i}"), &i.to_string())
            })
        })
        .collect();

    for writer in writers {
        writer.join().unwrap().unwrap();
    }

    let storage = FileStorage::new(dir.path(), StorageFormat::Json);
    let service = ConfigService::builder(Arc::new(storage)).build().unwrap();
    let resolved = service.resolve(&counters_key()).unwrap();
    for i in 0..WRITERS {
        assert_eq!(
            resolved.effective.root().value(&format!("p{i}")),
            Some(i.to_string().as_str())
        );
    }
    assert_eq!(resolved.chain[0].version(), WRITERS as u64);
}

#[test]
fn stale_baseline_on_the_same_property_is_a_conflict() {
    let dir = TempDir::new().unwrap();
    let open = || {
        let storage = FileStorage::new(dir.path(), StorageFormat::Json);
        ConfigService::builder(Arc::new(storage)).build().unwrap()
    };
    let first = open();
    let second = open();
    let key = counters_key();

    write_property(&first, "owner", "ana").unwrap();

    let before = second.resolve(&key).unwrap();
    write_property(&first, "owner", "ben").unwrap();

    let mut local = before.effective.clone();
    local
        .root_mut()
        .set_value("owner", "string", Some("cho".to_string()));
    let err = second.save(&local, &before.chain).unwrap_err();
    assert!(matches!(err, Error::ConflictUnresolved { ref property, .. } if property == "owner"));

    let fresh = second.resolve(&key).unwrap();
    let mut retry = fresh.effective.clone();
    retry
        .root_mut()
        .set_value("owner", "string", Some("cho".to_string()));
    let report = second.save(&retry, &fresh.chain).unwrap();
    assert_eq!(report.outcome, SaveOutcome::Update);
    assert_eq!(report.tree.version(), 3);
}

/// Memory storage that, once armed, parks the next load of `held` after
/// reading it until the test releases it.
#[derive(Debug)]
struct PausingStorage {
    inner: MemoryStorage,
    held: ConfigKey,
    armed: AtomicBool,
    reached: Barrier,
    release: Barrier,
}

impl ConfigStorage for PausingStorage {
    fn load(&self, key: &ConfigKey) -> scope_store::Result<Option<ConfigTree>> {
        let found = self.inner.load(key)?;
        if *key == self.held && self.armed.swap(false, Ordering::SeqCst) {
            self.reached.wait();
            self.release.wait();
        }
        Ok(found)
    }

    fn save(&self, tree: &ConfigTree) -> scope_store::Result<()> {
        self.inner.save(tree)
    }

    fn update(&self, tree: &ConfigTree) -> scope_store::Result<()> {
        self.inner.update(tree)
    }

    fn delete(&self, key: &ConfigKey, delete_children: bool) -> scope_store::Result<usize> {
        self.inner.delete(key, delete_children)
    }

    fn list_scopes(
        &self,
        type_name: &str,
        scope_name: &str,
        properties: &BTreeMap<String, String>,
    ) -> scope_store::Result<Vec<ScopePath>> {
        self.inner.list_scopes(type_name, scope_name, properties)
    }
}

#[test]
fn slow_read_does_not_cache_over_a_newer_save() {
    let leaf = key(APP, "global/user[id=a]");
    let storage = Arc::new(PausingStorage {
        inner: MemoryStorage::new(),
        held: leaf.clone(),
        armed: AtomicBool::new(false),
        reached: Barrier::new(2),
        release: Barrier::new(2),
    });
    storage
        .inner
        .save(&snapshot(
            "global/user[id=a]",
            1,
            app().simple("theme", "string", "old").build(),
        ))
        .unwrap();

    let service = Arc::new(
        ConfigService::builder(Arc::clone(&storage) as Arc<dyn ConfigStorage>)
            .build()
            .unwrap(),
    );
    storage.armed.store(true, Ordering::SeqCst);

    let reader = {
        let service = Arc::clone(&service);
        let leaf = leaf.clone();
        thread::spawn(move || service.resolve(&leaf).map(|r| r.chain[0].version()))
    };

    // The reader holds v1 and has not cached it yet.
    storage.reached.wait();
    let resolved = service.resolve(&leaf).unwrap();
    let mut local = resolved.effective.clone();
    local
        .root_mut()
        .set_value("theme", "string", Some("new".to_string()));
    let report = service.save(&local, &resolved.chain).unwrap();
    assert_eq!(report.tree.version(), 2);
    storage.release.wait();

    // The reader may see either version, but must not cache the older one.
    assert!(reader.join().unwrap().unwrap() >= 1);
    let after = service.resolve(&leaf).unwrap();
    assert_eq!(after.chain[0].version(), 2);
    assert_eq!(after.effective.root().value("theme"), Some("new"));
}
