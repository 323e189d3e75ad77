//! SQLite implementation of the Storage trait
//!
//! Each resource is one row of the `resources` table. Writes go through a
//! single mutex-guarded connection inside a transaction, so two puts to the
//! same triple are applied one after the other and get consecutive revisions.

use crate::error::CabinetError;
use crate::storage::{DeleteOutcome, ObjectSummary, Storage, StoredObject, Version};
use chrono::{DateTime, Utc};
use log::{debug, info};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

// `revisions` keeps the last revision of every triple ever written, so a
// re-created resource continues where the deleted one stopped
const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS resources (
    user TEXT NOT NULL,
    category TEXT NOT NULL,
    key TEXT NOT NULL,
    data BLOB NOT NULL,
    content_type TEXT NOT NULL,
    revision INTEGER NOT NULL,
    digest TEXT NOT NULL,
    modified_at TEXT NOT NULL,
    PRIMARY KEY (user, category, key)
);
CREATE TABLE IF NOT EXISTS revisions (
    user TEXT NOT NULL,
    category TEXT NOT NULL,
    key TEXT NOT NULL,
    revision INTEGER NOT NULL,
    PRIMARY KEY (user, category, key)
);";

/// SQLite implementation of Storage
pub struct SQLiteResourceStore {
    conn: Mutex<Connection>,
}

impl SQLiteResourceStore {
    /// Open (or create) the database file at `db_path`
    pub fn open(db_path: &str, wal_mode: bool) -> Result<Self, CabinetError> {
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(db_path)?;
        if wal_mode {
            let mode: String = conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
            info!("SQLite journal mode for {}: {}", db_path, mode);
        }
        Self::init(conn)
    }

    /// In-memory database, mostly for tests
    pub fn open_in_memory() -> Result<Self, CabinetError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, CabinetError> {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, CabinetError> {
        self.conn
            .lock()
            .map_err(|_| CabinetError::unavailable("sqlite connection lock poisoned"))
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, CabinetError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| CabinetError::unavailable(format!("bad timestamp in resources table: {}", e)))
}

impl Storage for SQLiteResourceStore {
    fn get_object(&self, user: &str, category: &str, key: &str) -> Result<Option<StoredObject>, CabinetError> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT data, content_type, revision, digest, modified_at FROM resources
                 WHERE user = ?1 AND category = ?2 AND key = ?3",
                params![user, category, key],
                |row| {
                    Ok((
                        row.get::<_, Vec<u8>>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((data, content_type, revision, digest, modified_at)) => Ok(Some(StoredObject {
                data,
                content_type,
                version: Version { revision: revision as u64, digest },
                last_modified: parse_timestamp(&modified_at)?,
            })),
            None => Ok(None),
        }
    }

    fn put_object(&self, user: &str, category: &str, key: &str, data: &[u8], content_type: &str) -> Result<Version, CabinetError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO revisions (user, category, key, revision)
             VALUES (?1, ?2, ?3, COALESCE(
                (SELECT revision FROM resources WHERE user = ?1 AND category = ?2 AND key = ?3), 0) + 1)
             ON CONFLICT(user, category, key) DO UPDATE SET revision = revisions.revision + 1",
            params![user, category, key],
        )?;
        let revision: i64 = tx.query_row(
            "SELECT revision FROM revisions WHERE user = ?1 AND category = ?2 AND key = ?3",
            params![user, category, key],
            |row| row.get(0),
        )?;
        let version = Version::new(revision as u64, data, content_type);
        tx.execute(
            "INSERT INTO resources (user, category, key, data, content_type, revision, digest, modified_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(user, category, key) DO UPDATE SET
                data = excluded.data,
                content_type = excluded.content_type,
                revision = excluded.revision,
                digest = excluded.digest,
                modified_at = excluded.modified_at",
            params![user, category, key, data, content_type, revision, version.digest, Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;

        debug!("Stored {} bytes for {}/{}/{} at revision {}", data.len(), user, category, key, revision);
        Ok(version)
    }

    fn delete_object(&self, user: &str, category: &str, key: &str) -> Result<DeleteOutcome, CabinetError> {
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM resources WHERE user = ?1 AND category = ?2 AND key = ?3",
            params![user, category, key],
        )?;
        Ok(if removed > 0 { DeleteOutcome::Deleted } else { DeleteOutcome::NotFound })
    }

    fn object_exists(&self, user: &str, category: &str, key: &str) -> Result<bool, CabinetError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM resources WHERE user = ?1 AND category = ?2 AND key = ?3",
            params![user, category, key],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn list_objects(&self, user: &str, category: &str, prefix: &str) -> Result<Vec<ObjectSummary>, CabinetError> {
        let conn = self.lock()?;
        // substr avoids LIKE wildcard escaping for keys containing % or _
        let mut stmt = conn.prepare(
            "SELECT key, content_type, length(data), revision, digest FROM resources
             WHERE user = ?1 AND category = ?2 AND substr(key, 1, length(?3)) = ?3
             ORDER BY key",
        )?;
        let rows = stmt.query_map(params![user, category, prefix], |row| {
            Ok(ObjectSummary {
                key: row.get(0)?,
                content_type: row.get(1)?,
                size: row.get::<_, i64>(2)? as u64,
                version: Version {
                    revision: row.get::<_, i64>(3)? as u64,
                    digest: row.get(4)?,
                },
            })
        })?;

        let mut summaries = Vec::new();
        for row in rows {
            summaries.push(row?);
        }
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested").join("resources.db");
        let db_path = db_path.to_string_lossy().into_owned();

        {
            let store = SQLiteResourceStore::open(&db_path, true).unwrap();
            store.put_object("alice", "notes", "todo", b"buy milk", "text/plain").unwrap();
            store.put_object("alice", "notes", "todo", b"buy bread", "text/plain").unwrap();
        }

        let store = SQLiteResourceStore::open(&db_path, true).unwrap();
        let object = store.get_object("alice", "notes", "todo").unwrap().unwrap();
        assert_eq!(object.data, b"buy bread");
        assert_eq!(object.version.revision, 2);
    }

    #[test]
    fn test_sqlite_store_prefix_with_wildcards() {
        let store = SQLiteResourceStore::open_in_memory().unwrap();
        store.put_object("alice", "notes", "100%/a", b"1", "text/plain").unwrap();
        store.put_object("alice", "notes", "100x/b", b"2", "text/plain").unwrap();

        let listed = store.list_objects("alice", "notes", "100%/").unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].key, "100%/a");
        assert_eq!(listed[0].size, 1);
    }
}
