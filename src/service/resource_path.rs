//! Resource addressing: `/{user}/{category}/{key}`

use std::fmt;

use crate::error::CabinetError;

/// A validated `(user, category, key)` triple
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePath {
    pub user: String,
    pub category: String,
    /// Empty or ending in `/` for folders
    pub key: String,
}

/// Check a single path segment (user or category)
pub fn validate_segment(what: &str, segment: &str) -> Result<(), CabinetError> {
    if segment.is_empty() {
        return Err(CabinetError::MalformedRequest(format!("{} must not be empty", what)));
    }
    if segment.contains('/') {
        return Err(CabinetError::MalformedRequest(format!("{} must not contain '/'", what)));
    }
    if segment == "." || segment == ".." {
        return Err(CabinetError::MalformedRequest(format!("{} must not be '{}'", what, segment)));
    }
    Ok(())
}

impl ResourcePath {
    /// Split a request path into its triple; leading `/` is optional
    pub fn parse(path: &str) -> Result<Self, CabinetError> {
        let trimmed = path.strip_prefix('/').unwrap_or(path);
        let mut parts = trimmed.splitn(3, '/');
        let (user, category, key) = match (parts.next(), parts.next(), parts.next()) {
            (Some(user), Some(category), Some(key)) => (user, category, key),
            _ => {
                return Err(CabinetError::MalformedRequest(
                    "expected a path of the form /{user}/{category}/{key}".to_string(),
                ))
            }
        };

        validate_segment("user", user)?;
        validate_segment("category", category)?;

        // Folder keys end with "/", so the last split piece may be empty
        let body = key.strip_suffix('/').unwrap_or(key);
        if !body.is_empty() {
            for segment in body.split('/') {
                if segment.is_empty() || segment == "." || segment == ".." {
                    return Err(CabinetError::MalformedRequest(format!("invalid key: {}", key)));
                }
            }
        }

        Ok(Self {
            user: user.to_string(),
            category: category.to_string(),
            key: key.to_string(),
        })
    }

    /// Folders are listed rather than fetched and cannot be written
    pub fn is_folder(&self) -> bool {
        self.key.is_empty() || self.key.ends_with('/')
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}/{}", self.user, self.category, self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_document_path() {
        let path = ResourcePath::parse("/alice/notes/todo").unwrap();
        assert_eq!(path.user, "alice");
        assert_eq!(path.category, "notes");
        assert_eq!(path.key, "todo");
        assert!(!path.is_folder());
        assert_eq!(path.to_string(), "/alice/notes/todo");
    }

    #[test]
    fn test_parse_hierarchical_key() {
        let path = ResourcePath::parse("alice/notes/work/2024/todo.txt").unwrap();
        assert_eq!(path.key, "work/2024/todo.txt");
    }

    #[test]
    fn test_parse_folders() {
        assert!(ResourcePath::parse("/alice/notes/").unwrap().is_folder());
        assert!(ResourcePath::parse("/alice/notes/work/").unwrap().is_folder());
    }

    #[test]
    fn test_malformed_paths() {
        for bad in [
            "",
            "/",
            "/alice",
            "/alice/notes",
            "//notes/todo",
            "/alice//todo",
            "/alice/notes/a//b",
            "/alice/notes/../secret",
            "/../notes/todo",
            "/alice/./todo",
        ] {
            let result = ResourcePath::parse(bad);
            assert!(matches!(result, Err(CabinetError::MalformedRequest(_))), "{:?} should be malformed", bad);
        }
    }
}
