//! Local filesystem storage implementation
//!
//! Layout: `<base>/<sha256(user)>/<sha256(category)>/<sha256(key)>.rec`, one
//! bincode record per resource holding the key, payload and metadata
//! together. File names have a fixed length whatever the key. A write goes
//! to a temp file under `<base>/.tmp`, is fsynced, then renamed over the old
//! record, so readers see either the old or the new record in full. The last
//! revision handed out for a key lives next to it in `<sha256(key)>.rev` and
//! outlives deletes.

use crate::error::CabinetError;
use crate::storage::{DeleteOutcome, ObjectSummary, Storage, StoredObject, Version};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

const RECORD_EXTENSION: &str = "rec";
const REVISION_EXTENSION: &str = "rev";

#[derive(Debug, Serialize, Deserialize)]
struct Record {
    key: String,
    content_type: String,
    revision: u64,
    digest: String,
    modified_at: DateTime<Utc>,
    data: Vec<u8>,
}

impl Record {
    fn version(&self) -> Version {
        Version { revision: self.revision, digest: self.digest.clone() }
    }

    fn into_object(self) -> StoredObject {
        StoredObject {
            version: Version { revision: self.revision, digest: self.digest },
            content_type: self.content_type,
            last_modified: self.modified_at,
            data: self.data,
        }
    }
}

fn name_digest(part: &str) -> String {
    hex::encode(Sha256::digest(part.as_bytes()))
}

/// Filesystem-backed implementation of Storage
pub struct LocalResourceStore {
    storage_path: PathBuf,
    temp_path: PathBuf,
    // Serializes read-modify-write of revisions and the rename step
    write_lock: Mutex<()>,
    temp_counter: AtomicU64,
}

impl LocalResourceStore {
    pub fn open(base_path: impl AsRef<Path>) -> Result<Self, CabinetError> {
        let storage_path = base_path.as_ref().to_path_buf();
        let temp_path = storage_path.join(".tmp");
        fs::create_dir_all(&temp_path)?;
        info!("Using storage directory: {}", storage_path.display());

        Ok(Self {
            storage_path,
            temp_path,
            write_lock: Mutex::new(()),
            temp_counter: AtomicU64::new(0),
        })
    }

    fn category_dir(&self, user: &str, category: &str) -> PathBuf {
        self.storage_path.join(name_digest(user)).join(name_digest(category))
    }

    fn record_path(&self, user: &str, category: &str, key: &str) -> PathBuf {
        self.category_dir(user, category)
            .join(format!("{}.{}", name_digest(key), RECORD_EXTENSION))
    }

    fn revision_path(record_path: &Path) -> PathBuf {
        record_path.with_extension(REVISION_EXTENSION)
    }

    fn read_file(path: &Path) -> Result<Option<Vec<u8>>, CabinetError> {
        let mut file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer)?;
        Ok(Some(buffer))
    }

    fn read_record(path: &Path) -> Result<Option<Record>, CabinetError> {
        match Self::read_file(path)? {
            Some(buffer) => Ok(Some(bincode::deserialize(&buffer)?)),
            None => Ok(None),
        }
    }

    fn read_last_revision(path: &Path) -> Result<u64, CabinetError> {
        match Self::read_file(&Self::revision_path(path))? {
            Some(buffer) => Ok(bincode::deserialize(&buffer)?),
            None => Ok(0),
        }
    }

    /// Temp file + fsync + rename
    fn write_atomic(&self, path: &Path, encoded: &[u8]) -> Result<(), CabinetError> {
        let temp_file = self.temp_path.join(format!(
            "{}-{}.part",
            std::process::id(),
            self.temp_counter.fetch_add(1, Ordering::Relaxed)
        ));

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&temp_file)?;
        file.write_all(encoded)?;
        file.sync_all()?;
        drop(file);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        if let Err(e) = fs::rename(&temp_file, path) {
            warn!("Failed to move file into place at {}: {}", path.display(), e);
            let _ = fs::remove_file(&temp_file);
            return Err(e.into());
        }
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ()>, CabinetError> {
        self.write_lock
            .lock()
            .map_err(|_| CabinetError::unavailable("local store write lock poisoned"))
    }
}

impl Storage for LocalResourceStore {
    fn get_object(&self, user: &str, category: &str, key: &str) -> Result<Option<StoredObject>, CabinetError> {
        let record = Self::read_record(&self.record_path(user, category, key))?;
        Ok(record.map(Record::into_object))
    }

    fn put_object(&self, user: &str, category: &str, key: &str, data: &[u8], content_type: &str) -> Result<Version, CabinetError> {
        let path = self.record_path(user, category, key);
        let _guard = self.lock()?;

        let current = Self::read_record(&path)?.map(|existing| existing.revision).unwrap_or(0);
        let revision = current.max(Self::read_last_revision(&path)?) + 1;
        let version = Version::new(revision, data, content_type);
        let record = Record {
            key: key.to_string(),
            content_type: content_type.to_string(),
            revision,
            digest: version.digest.clone(),
            modified_at: Utc::now(),
            data: data.to_vec(),
        };
        self.write_atomic(&path, &bincode::serialize(&record)?)?;
        self.write_atomic(&Self::revision_path(&path), &bincode::serialize(&revision)?)?;

        debug!("Wrote record for {}/{}/{} at revision {} ({} bytes)", user, category, key, revision, data.len());
        Ok(version)
    }

    fn delete_object(&self, user: &str, category: &str, key: &str) -> Result<DeleteOutcome, CabinetError> {
        let path = self.record_path(user, category, key);
        let _guard = self.lock()?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(DeleteOutcome::Deleted),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(DeleteOutcome::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    fn object_exists(&self, user: &str, category: &str, key: &str) -> Result<bool, CabinetError> {
        match fs::metadata(self.record_path(user, category, key)) {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn list_objects(&self, user: &str, category: &str, prefix: &str) -> Result<Vec<ObjectSummary>, CabinetError> {
        let dir = self.category_dir(user, category);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut summaries = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            // Deleted between read_dir and open
            let record = match Self::read_record(&path)? {
                Some(record) => record,
                None => continue,
            };
            if !record.key.starts_with(prefix) {
                continue;
            }
            summaries.push(ObjectSummary {
                version: record.version(),
                size: record.data.len() as u64,
                key: record.key,
                content_type: record.content_type,
            });
        }
        summaries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_store_basic_operations() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalResourceStore::open(dir.path()).unwrap();

        let version = store.put_object("alice", "notes", "a/b/../c", b"Hello, local storage!", "text/plain").unwrap();
        assert_eq!(version.revision, 1);

        let object = store.get_object("alice", "notes", "a/b/../c").unwrap().unwrap();
        assert_eq!(object.data, b"Hello, local storage!");
        assert_eq!(object.content_type, "text/plain");

        // Keys never escape the store directory
        assert!(dir.path().join(name_digest("alice")).is_dir());
        assert_eq!(store.delete_object("alice", "notes", "a/b/../c").unwrap(), DeleteOutcome::Deleted);
    }

    #[test]
    fn test_local_store_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalResourceStore::open(dir.path()).unwrap();
        for i in 0..5 {
            store.put_object("alice", "notes", "todo", format!("v{}", i).as_bytes(), "text/plain").unwrap();
        }
        let leftovers = fs::read_dir(dir.path().join(".tmp")).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_local_store_file_names_have_fixed_length() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalResourceStore::open(dir.path()).unwrap();
        let key = "k".repeat(1000);
        store.put_object("alice", "notes", &key, b"long", "text/plain").unwrap();

        let path = store.record_path("alice", "notes", &key);
        assert_eq!(path.file_name().unwrap().len(), 64 + 1 + RECORD_EXTENSION.len());
        assert!(store.object_exists("alice", "notes", &key).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_local_store_exists_propagates_io_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalResourceStore::open(dir.path()).unwrap();
        store.put_object("alice", "notes", "todo", b"ok", "text/plain").unwrap();

        // A regular file where the user directory should be
        let user_dir = dir.path().join(name_digest("bob"));
        fs::write(&user_dir, b"not a directory").unwrap();
        let result = store.object_exists("bob", "notes", "todo");
        assert!(matches!(result, Err(CabinetError::BackendUnavailable(_))));
    }

    #[test]
    fn test_local_store_corrupt_record_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalResourceStore::open(dir.path()).unwrap();
        store.put_object("alice", "notes", "todo", b"ok", "text/plain").unwrap();

        fs::write(store.record_path("alice", "notes", "todo"), b"\x01").unwrap();
        let result = store.get_object("alice", "notes", "todo");
        assert!(matches!(result, Err(CabinetError::BackendUnavailable(_))));
    }
}
