//! In-memory implementation of TokenStore

use crate::error::CabinetError;
use crate::token::{Token, TokenStore};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Mock implementation of TokenStore for tests and ephemeral deployments
pub struct MockTokenStore {
    tokens: Arc<RwLock<HashMap<String, Token>>>,
}

impl MockTokenStore {
    pub fn new() -> Self {
        Self {
            tokens: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Get the number of live tokens
    pub fn token_count(&self) -> usize {
        self.tokens.read().map(|tokens| tokens.len()).unwrap_or(0)
    }
}

impl Default for MockTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> CabinetError {
    CabinetError::unavailable("token store lock poisoned")
}

impl TokenStore for MockTokenStore {
    fn insert(&self, token: &Token) -> Result<bool, CabinetError> {
        let mut tokens = self.tokens.write().map_err(poisoned)?;
        if tokens.contains_key(&token.value) {
            return Ok(false);
        }
        tokens.insert(token.value.clone(), token.clone());
        Ok(true)
    }

    fn find(&self, value: &str) -> Result<Option<Token>, CabinetError> {
        let tokens = self.tokens.read().map_err(poisoned)?;
        Ok(tokens.get(value).cloned())
    }

    fn revoke(&self, value: &str) -> Result<bool, CabinetError> {
        let mut tokens = self.tokens.write().map_err(poisoned)?;
        Ok(tokens.remove(value).is_some())
    }
}
