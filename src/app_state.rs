//! Application State Management
//!
//! This module provides the application state that contains all services
//! and their dependencies, following the dependency injection pattern.

use std::sync::Arc;
use log::info;

use crate::auth::issuer::TokenIssuer;
use crate::auth::password::{ConfiguredPasswords, PasswordVerifier};
use crate::auth::Authorizer;
use crate::config::AppConfig;
use crate::error::CabinetError;
use crate::service::storage_service::StorageService;
use crate::storage::mock_store::MockResourceStore;
use crate::storage::Storage;
use crate::token::mock_store::MockTokenStore;
use crate::token::TokenStore;

/// Application state containing all services and their dependencies
#[derive(Clone)]
pub struct AppState {
    pub storage_service: Arc<StorageService>,
    pub token_store: Arc<dyn TokenStore>,
    pub authorizer: Arc<Authorizer>,
    pub token_issuer: Arc<TokenIssuer>,
    pub max_payload_size: usize,
}

impl AppState {
    /// Build every backend named by the configuration; fails on the first
    /// invalid or unreachable one
    pub fn from_config(config: &AppConfig) -> Result<Self, CabinetError> {
        info!("Initializing application state with configuration");
        config.validate()?;

        let storage = config.storage.create_store()?;
        let tokens = config.tokens.create_store()?;
        let verifier: Arc<dyn PasswordVerifier> = Arc::new(ConfiguredPasswords::new(config.auth.users.clone()));

        let state = Self::from_parts(config, storage, tokens, verifier);
        info!("Application state initialized successfully");
        Ok(state)
    }

    /// Assemble state from already constructed backends
    pub fn from_parts(
        config: &AppConfig,
        storage: Arc<dyn Storage>,
        tokens: Arc<dyn TokenStore>,
        verifier: Arc<dyn PasswordVerifier>,
    ) -> Self {
        Self {
            storage_service: Arc::new(StorageService::new(storage, config.storage.timeout())),
            authorizer: Arc::new(Authorizer::new(Arc::clone(&tokens), &config.auth.public_suffix)),
            token_issuer: Arc::new(TokenIssuer::new(Arc::clone(&tokens), verifier)),
            token_store: tokens,
            max_payload_size: config.server.max_payload_size,
        }
    }

    /// Create application state for testing with mock backends
    pub fn new_for_testing(verifier: Arc<dyn PasswordVerifier>) -> Self {
        Self::from_parts(
            &AppConfig::for_testing(),
            Arc::new(MockResourceStore::new()),
            Arc::new(MockTokenStore::new()),
            verifier,
        )
    }
}
