//! Resource Storage Layer Abstraction
//!
//! This module provides an abstraction over resource storage engines,
//! allowing the service to use different implementations (SQLite documents,
//! local record files, in-memory maps) without affecting the request router.

pub mod local_store;
pub mod mock_store;
pub mod sqlite_store;
pub mod config;


use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CabinetError;

/// Version marker of a stored resource
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Version {
    /// Per-triple counter, incremented by every successful put and never
    /// reset by a delete
    pub revision: u64,
    /// MD5 hex digest of content type and payload
    pub digest: String,
}

impl Version {
    pub fn new(revision: u64, data: &[u8], content_type: &str) -> Self {
        Self {
            revision,
            digest: content_digest(data, content_type),
        }
    }

    /// Quoted form used in ETag headers
    pub fn etag(&self) -> String {
        format!("\"{}\"", self)
    }

    /// Compare against an entity tag as sent by a client, quoted or not
    pub fn matches_etag(&self, tag: &str) -> bool {
        let tag = tag.trim();
        let tag = tag.strip_prefix("W/").unwrap_or(tag);
        tag.trim_matches('"') == self.to_string()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.revision, self.digest)
    }
}

pub fn content_digest(data: &[u8], content_type: &str) -> String {
    let mut context = md5::Context::new();
    context.consume(content_type.as_bytes());
    context.consume(b"\n");
    context.consume(data);
    hex::encode(context.compute().0)
}

/// A resource as returned by a backend
#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub content_type: String,
    pub version: Version,
    pub last_modified: DateTime<Utc>,
}

/// Listing entry; carries everything but the payload
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectSummary {
    pub key: String,
    pub content_type: String,
    pub size: u64,
    pub version: Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

/// Trait defining the resource storage interface.
///
/// Every operation is keyed by the full `(user, category, key)` triple.
/// Implementations must serialize writes to the same triple, never expose a
/// partially written payload, and report failures as
/// `CabinetError::BackendUnavailable` rather than as a missing resource.
pub trait Storage: Send + Sync {
    /// Fetch a resource; `Ok(None)` when it does not exist
    fn get_object(&self, user: &str, category: &str, key: &str) -> Result<Option<StoredObject>, CabinetError>;

    /// Store (or overwrite) a resource and return its new version
    fn put_object(&self, user: &str, category: &str, key: &str, data: &[u8], content_type: &str) -> Result<Version, CabinetError>;

    /// Remove a resource
    fn delete_object(&self, user: &str, category: &str, key: &str) -> Result<DeleteOutcome, CabinetError>;

    /// Check if a resource exists
    fn object_exists(&self, user: &str, category: &str, key: &str) -> Result<bool, CabinetError>;

    /// List every resource in a category whose key starts with `prefix`
    fn list_objects(&self, user: &str, category: &str, prefix: &str) -> Result<Vec<ObjectSummary>, CabinetError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_display_and_etag() {
        let version = Version::new(3, b"buy milk", "text/plain");
        assert_eq!(version.digest.len(), 32);
        assert_eq!(version.to_string(), format!("3-{}", version.digest));
        assert_eq!(version.etag(), format!("\"3-{}\"", version.digest));
    }

    #[test]
    fn test_version_matches_etag() {
        let version = Version::new(1, b"data", "text/plain");
        assert!(version.matches_etag(&version.etag()));
        assert!(version.matches_etag(&version.to_string()));
        assert!(version.matches_etag(&format!("W/{}", version.etag())));
        assert!(!Version::new(2, b"data", "text/plain").matches_etag(&version.etag()));
    }

    #[test]
    fn test_digest_covers_content_type() {
        // md5("\n")
        assert_eq!(content_digest(b"", ""), "68b329da9893e34099c7d8ad5cb9c940");
        assert_ne!(content_digest(b"same", "text/plain"), content_digest(b"same", "application/json"));
    }
}
