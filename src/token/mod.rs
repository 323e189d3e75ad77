//! Token Store Abstraction
//!
//! Tokens are opaque bearer credentials bound to one `(user, category)` pair
//! with a permission level. The store only records and looks them up; the
//! decision about what a token grants lives in `crate::auth`.

pub mod sqlite_store;
pub mod mock_store;
pub mod config;

use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CabinetError;

/// Number of random bytes behind a token value
pub const TOKEN_BYTES: usize = 32;

/// Permission level carried by a token
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Permission {
    Read,
    ReadWrite,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Read => "r",
            Permission::ReadWrite => "rw",
        }
    }

    pub fn can_write(&self) -> bool {
        matches!(self, Permission::ReadWrite)
    }
}

impl Default for Permission {
    fn default() -> Self {
        Permission::ReadWrite
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Permission {
    type Err = CabinetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "r" | "read" => Ok(Permission::Read),
            "rw" | "read-write" | "readwrite" => Ok(Permission::ReadWrite),
            _ => Err(CabinetError::MalformedRequest(format!("Unknown permission level: {}", s))),
        }
    }
}

/// An issued token and its scope
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct Token {
    pub value: String,
    pub user: String,
    pub category: String,
    pub permission: Permission,
    pub issued_at: DateTime<Utc>,
}

impl Token {
    /// Mint a fresh random token for `(user, category)`
    pub fn generate(user: &str, category: &str, permission: Permission) -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self {
            value: hex::encode(bytes),
            user: user.to_string(),
            category: category.to_string(),
            permission,
            issued_at: Utc::now(),
        }
    }

    pub fn is_scoped_to(&self, user: &str, category: &str) -> bool {
        self.user == user && self.category == category
    }
}

// Token values are credentials; keep them out of debug output and logs
impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("user", &self.user)
            .field("category", &self.category)
            .field("permission", &self.permission)
            .field("issued_at", &self.issued_at)
            .finish_non_exhaustive()
    }
}

/// Trait defining the token storage interface.
///
/// Implementations must be safe under concurrent access: a lookup racing an
/// insert sees either no token or the complete token.
pub trait TokenStore: Send + Sync {
    /// Record a token; returns `false` if the value is already taken
    fn insert(&self, token: &Token) -> Result<bool, CabinetError>;

    /// Look a token up by its value
    fn find(&self, value: &str) -> Result<Option<Token>, CabinetError>;

    /// Delete a token; returns `false` if it did not exist
    fn revoke(&self, value: &str) -> Result<bool, CabinetError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_tokens_are_unique_hex() {
        let a = Token::generate("alice", "notes", Permission::ReadWrite);
        let b = Token::generate("alice", "notes", Permission::ReadWrite);
        assert_eq!(a.value.len(), TOKEN_BYTES * 2);
        assert!(a.value.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a.value, b.value);
    }

    #[test]
    fn test_permission_parsing() {
        assert_eq!("r".parse::<Permission>().unwrap(), Permission::Read);
        assert_eq!("READ".parse::<Permission>().unwrap(), Permission::Read);
        assert_eq!("rw".parse::<Permission>().unwrap(), Permission::ReadWrite);
        assert_eq!("read-write".parse::<Permission>().unwrap(), Permission::ReadWrite);
        assert!("admin".parse::<Permission>().is_err());
        assert_eq!(Permission::default(), Permission::ReadWrite);
    }

    #[test]
    fn test_debug_hides_token_value() {
        let token = Token::generate("alice", "notes", Permission::Read);
        let rendered = format!("{:?}", token);
        assert!(!rendered.contains(&token.value));
        assert!(rendered.contains("alice"));
    }

    #[test]
    fn test_scope_check() {
        let token = Token::generate("alice", "notes", Permission::Read);
        assert!(token.is_scoped_to("alice", "notes"));
        assert!(!token.is_scoped_to("alice", "tasks"));
        assert!(!token.is_scoped_to("bob", "notes"));
    }

    #[test]
    fn test_lookup_racing_issuance_sees_whole_tokens() {
        use std::sync::Arc;
        use std::thread;

        fn same_grant(a: &Token, b: &Token) -> bool {
            a.value == b.value && a.user == b.user && a.category == b.category && a.permission == b.permission
        }

        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("tokens.db").to_string_lossy().into_owned();
        let stores: Vec<(&str, Arc<dyn TokenStore>)> = vec![
            ("mock", Arc::new(mock_store::MockTokenStore::new())),
            ("sqlite", Arc::new(sqlite_store::SQLiteTokenStore::open(&db_path).unwrap())),
        ];

        for (name, store) in stores {
            let tokens: Arc<Vec<Token>> = Arc::new(
                (0..64)
                    .map(|i| {
                        let permission = if i % 2 == 0 { Permission::Read } else { Permission::ReadWrite };
                        Token::generate("alice", &format!("category{}", i), permission)
                    })
                    .collect(),
            );

            let writer = {
                let store = Arc::clone(&store);
                let tokens = Arc::clone(&tokens);
                thread::spawn(move || {
                    for token in tokens.iter() {
                        assert!(store.insert(token).unwrap());
                    }
                })
            };
            let readers: Vec<_> = (0..4)
                .map(|_| {
                    let store = Arc::clone(&store);
                    let tokens = Arc::clone(&tokens);
                    thread::spawn(move || {
                        for _ in 0..20 {
                            for token in tokens.iter() {
                                if let Some(found) = store.find(&token.value).unwrap() {
                                    assert!(same_grant(&found, token), "partially written token");
                                }
                            }
                        }
                    })
                })
                .collect();

            writer.join().unwrap();
            for reader in readers {
                reader.join().unwrap();
            }
            for token in tokens.iter() {
                let found = store.find(&token.value).unwrap();
                assert!(found.map_or(false, |found| same_grant(&found, token)), "{}", name);
            }
        }
    }
}
