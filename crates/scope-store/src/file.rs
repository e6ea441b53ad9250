//! File-backed storage with advisory locking
//!
//! Layout under the storage root:
//!
//! ```text
//! <root>/<type name>/.lock
//! <root>/<type name>/<sha256 of the JSON-encoded key>.<ext>
//! ```
//!
//! Every operation holds the type directory's lock file: shared for reads,
//! exclusive for writes. Snapshots are written to a temp file and renamed
//! into place, so readers never see partial content.

use crate::storage::{check_save, check_update, scope_matches};
use crate::{ConfigStorage, Error, Result, StorageFormat};
use fs2::FileExt;
use scope_model::{ConfigKey, ConfigTree, ScopePath};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = ".lock";

/// Snapshots persisted as one file each under a root directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
    format: StorageFormat,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>, format: StorageFormat) -> Self {
        Self {
            root: root.into(),
            format,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn format(&self) -> StorageFormat {
        self.format
    }

    fn type_dir(&self, type_name: &str) -> PathBuf {
        let sanitized: String = type_name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.root.join(sanitized)
    }

    /// Location of the snapshot file for `key`.
    ///
    /// The file name hashes the structured key rather than its display form,
    /// and the type name is part of the hash since directory names are
    /// sanitized.
    pub fn snapshot_path(&self, key: &ConfigKey) -> Result<PathBuf> {
        let encoded = serde_json::to_vec(key).map_err(|e| Error::Serialize {
            key: key.clone(),
            format: "json".to_string(),
            message: e.to_string(),
        })?;
        let digest = Sha256::digest(&encoded);
        Ok(self
            .type_dir(&key.type_name)
            .join(format!("{digest:x}.{}", self.format.extension())))
    }

    fn lock(&self, type_name: &str, exclusive: bool) -> Result<Option<DirLock>> {
        let dir = self.type_dir(type_name);
        if !dir.is_dir() {
            if !exclusive {
                return Ok(None);
            }
            fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
        }
        DirLock::acquire(&dir.join(LOCK_FILE), exclusive).map(Some)
    }

    fn read_snapshot(&self, path: &Path) -> Result<Option<ConfigTree>> {
        match fs::read_to_string(path) {
            Ok(content) => self.format.decode(&content, path).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::io(path, e)),
        }
    }

    /// Read the snapshot stored for `key`, refusing one recorded under another key.
    fn read_keyed(&self, key: &ConfigKey) -> Result<Option<ConfigTree>> {
        let path = self.snapshot_path(key)?;
        let Some(tree) = self.read_snapshot(&path)? else {
            return Ok(None);
        };
        let stored = tree.key();
        if &stored != key {
            return Err(Error::KeyMismatch {
                path,
                expected: key.clone(),
                found: stored,
            });
        }
        Ok(Some(tree))
    }

    fn write_snapshot(&self, tree: &ConfigTree) -> Result<()> {
        let content = self.format.encode(tree)?;
        write_atomic(&self.snapshot_path(&tree.key())?, content.as_bytes())
    }

    /// Decode every snapshot of one type. Callers hold the directory lock.
    fn scan(&self, type_name: &str) -> Result<Vec<(PathBuf, ConfigTree)>> {
        let dir = self.type_dir(type_name);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::io(&dir, e)),
        };

        let mut snapshots = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| Error::io(&dir, e))?.path();
            let matches_format = path
                .extension()
                .and_then(|ext| ext.to_str())
                .and_then(StorageFormat::from_extension)
                == Some(self.format);
            if !matches_format {
                continue;
            }
            if let Some(tree) = self.read_snapshot(&path)? {
                snapshots.push((path, tree));
            }
        }
        Ok(snapshots)
    }
}

impl ConfigStorage for FileStorage {
    fn load(&self, key: &ConfigKey) -> Result<Option<ConfigTree>> {
        let Some(_lock) = self.lock(&key.type_name, false)? else {
            return Ok(None);
        };
        self.read_keyed(key)
    }

    fn save(&self, tree: &ConfigTree) -> Result<()> {
        let key = tree.key();
        let _lock = self.lock(&key.type_name, true)?;
        check_save(&key, self.snapshot_path(&key)?.exists())?;
        self.write_snapshot(tree)?;
        tracing::debug!(%key, version = tree.version(), "Saved snapshot file");
        Ok(())
    }

    fn update(&self, tree: &ConfigTree) -> Result<()> {
        let key = tree.key();
        let _lock = self.lock(&key.type_name, true)?;
        let stored = self.read_keyed(&key)?;
        check_update(&key, stored.as_ref(), tree)?;
        self.write_snapshot(tree)?;
        tracing::debug!(%key, version = tree.version(), "Updated snapshot file");
        Ok(())
    }

    fn delete(&self, key: &ConfigKey, delete_children: bool) -> Result<usize> {
        if !self.type_dir(&key.type_name).is_dir() {
            return Ok(0);
        }
        let _lock = self.lock(&key.type_name, true)?;

        let targets: Vec<PathBuf> = if delete_children {
            self.scan(&key.type_name)?
                .into_iter()
                .filter(|(_, tree)| tree.defining_scope_path().starts_with(&key.path))
                .map(|(path, _)| path)
                .collect()
        } else {
            vec![self.snapshot_path(key)?]
        };

        let mut removed = 0;
        for path in targets {
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(Error::io(&path, e)),
            }
        }
        tracing::debug!(%key, removed, "Deleted snapshot files");
        Ok(removed)
    }

    fn list_scopes(
        &self,
        type_name: &str,
        scope_name: &str,
        properties: &BTreeMap<String, String>,
    ) -> Result<Vec<ScopePath>> {
        let Some(_lock) = self.lock(type_name, false)? else {
            return Ok(Vec::new());
        };
        let mut paths: Vec<ScopePath> = self
            .scan(type_name)?
            .into_iter()
            .map(|(_, tree)| tree.defining_scope_path().clone())
            .filter(|path| scope_matches(path, scope_name, properties))
            .collect();
        paths.sort();
        Ok(paths)
    }
}

/// Advisory lock on a type directory, released on drop.
struct DirLock {
    file: File,
}

impl DirLock {
    fn acquire(path: &Path, exclusive: bool) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| Error::io(path, e))?;
        let locked = if exclusive {
            FileExt::lock_exclusive(&file)
        } else {
            FileExt::lock_shared(&file)
        };
        locked.map_err(|_| Error::LockFailed {
            path: path.to_path_buf(),
        })?;
        Ok(Self { file })
    }
}

impl Drop for DirLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Write content to a temp file next to `path`, then rename it into place.
fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;

    let temp_name = format!(
        ".{}.{}.tmp",
        path.file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default(),
        std::process::id()
    );
    let temp_path = path.with_file_name(temp_name);

    let mut temp_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&temp_path)
        .map_err(|e| Error::io(&temp_path, e))?;
    temp_file
        .write_all(content)
        .map_err(|e| Error::io(&temp_path, e))?;
    temp_file.sync_all().map_err(|e| Error::io(&temp_path, e))?;

    fs::rename(&temp_path, path).map_err(|e| Error::io(path, e))
}
