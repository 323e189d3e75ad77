//! SQLite implementation of TokenStore

use crate::error::CabinetError;
use crate::token::{Permission, Token, TokenStore};
use chrono::{DateTime, Utc};
use log::info;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// SQLite implementation of TokenStore
pub struct SQLiteTokenStore {
    conn: Mutex<Connection>,
}

impl SQLiteTokenStore {
    pub fn open(db_path: &str) -> Result<Self, CabinetError> {
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        info!("Opening token database at {}", db_path);
        Self::init(Connection::open(db_path)?)
    }

    pub fn open_in_memory() -> Result<Self, CabinetError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, CabinetError> {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS tokens (
                token TEXT PRIMARY KEY,
                user TEXT NOT NULL,
                category TEXT NOT NULL,
                permission TEXT NOT NULL,
                issued_at TEXT NOT NULL
            )",
            [],
        )?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, CabinetError> {
        self.conn
            .lock()
            .map_err(|_| CabinetError::unavailable("token database lock poisoned"))
    }
}

impl TokenStore for SQLiteTokenStore {
    fn insert(&self, token: &Token) -> Result<bool, CabinetError> {
        let conn = self.lock()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO tokens (token, user, category, permission, issued_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                token.value,
                token.user,
                token.category,
                token.permission.as_str(),
                token.issued_at.to_rfc3339()
            ],
        )?;
        Ok(inserted == 1)
    }

    fn find(&self, value: &str) -> Result<Option<Token>, CabinetError> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT user, category, permission, issued_at FROM tokens WHERE token = ?1",
                params![value],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;

        let Some((user, category, permission, issued_at)) = row else {
            return Ok(None);
        };
        let permission: Permission = permission
            .parse()
            .map_err(|_| CabinetError::unavailable(format!("bad permission in tokens table: {}", permission)))?;
        let issued_at = DateTime::parse_from_rfc3339(&issued_at)
            .map_err(|e| CabinetError::unavailable(format!("bad timestamp in tokens table: {}", e)))?
            .with_timezone(&Utc);

        Ok(Some(Token {
            value: value.to_string(),
            user,
            category,
            permission,
            issued_at,
        }))
    }

    fn revoke(&self, value: &str) -> Result<bool, CabinetError> {
        let conn = self.lock()?;
        let removed = conn.execute("DELETE FROM tokens WHERE token = ?1", params![value])?;
        Ok(removed > 0)
    }
}
