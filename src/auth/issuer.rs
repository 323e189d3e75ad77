//! Token issuance and revocation

use log::{info, warn};
use std::sync::Arc;

use crate::auth::password::PasswordVerifier;
use crate::error::CabinetError;
use crate::service::resource_path::validate_segment;
use crate::token::{Permission, Token, TokenStore};

const MAX_MINT_ATTEMPTS: usize = 4;

pub struct TokenIssuer {
    tokens: Arc<dyn TokenStore>,
    verifier: Arc<dyn PasswordVerifier>,
}

impl TokenIssuer {
    pub fn new(tokens: Arc<dyn TokenStore>, verifier: Arc<dyn PasswordVerifier>) -> Self {
        Self { tokens, verifier }
    }

    /// Verify the password and mint a token for `(user, category)`.
    ///
    /// A wrong password yields `CabinetError::Unauthorized`.
    pub fn issue(&self, user: &str, password: &str, category: &str, permission: Permission) -> Result<Token, CabinetError> {
        validate_segment("user", user)?;
        validate_segment("category", category)?;

        if !self.verifier.verify_password(user, password) {
            warn!("Password check failed for user {}", user);
            return Err(CabinetError::Unauthorized("invalid credentials".to_string()));
        }

        for _ in 0..MAX_MINT_ATTEMPTS {
            let token = Token::generate(user, category, permission);
            if self.tokens.insert(&token)? {
                info!("Issued {} token for {}/{}", permission, user, category);
                return Ok(token);
            }
            warn!("Token value collision for {}/{}, retrying", user, category);
        }
        Err(CabinetError::unavailable("could not mint a unique token"))
    }

    /// Revoke `token` if it belongs to `user`
    pub fn revoke(&self, user: &str, token: &str) -> Result<(), CabinetError> {
        if token.is_empty() {
            return Err(CabinetError::Unauthorized("bearer token required".to_string()));
        }
        match self.tokens.find(token)? {
            Some(grant) if grant.user == user => {
                self.tokens.revoke(token)?;
                info!("Revoked token for {}/{}", grant.user, grant.category);
                Ok(())
            }
            _ => Err(CabinetError::Unauthorized("invalid bearer token".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::ConfiguredPasswords;
    use crate::token::mock_store::MockTokenStore;

    fn issuer() -> (TokenIssuer, Arc<MockTokenStore>) {
        let store = Arc::new(MockTokenStore::new());
        let verifier = Arc::new(ConfiguredPasswords::from_plaintext([("alice", "secret")]));
        (TokenIssuer::new(store.clone(), verifier), store)
    }

    #[test]
    fn test_issue_persists_scoped_token() {
        let (issuer, store) = issuer();
        let token = issuer.issue("alice", "secret", "notes", Permission::default()).unwrap();

        assert_eq!(token.permission, Permission::ReadWrite);
        let stored = store.find(&token.value).unwrap().unwrap();
        assert!(stored.is_scoped_to("alice", "notes"));
    }

    #[test]
    fn test_issue_rejects_bad_password() {
        let (issuer, store) = issuer();
        let result = issuer.issue("alice", "wrong", "notes", Permission::Read);
        assert!(matches!(result, Err(CabinetError::Unauthorized(_))));
        assert_eq!(store.token_count(), 0);
    }

    #[test]
    fn test_issue_rejects_bad_category() {
        let (issuer, _) = issuer();
        assert!(matches!(
            issuer.issue("alice", "secret", "a/b", Permission::Read),
            Err(CabinetError::MalformedRequest(_))
        ));
        assert!(issuer.issue("alice", "secret", "", Permission::Read).is_err());
    }

    #[test]
    fn test_revoke_only_own_tokens() {
        let (issuer, store) = issuer();
        let token = issuer.issue("alice", "secret", "notes", Permission::ReadWrite).unwrap();

        assert!(issuer.revoke("bob", &token.value).is_err());
        assert!(store.find(&token.value).unwrap().is_some());

        issuer.revoke("alice", &token.value).unwrap();
        assert!(store.find(&token.value).unwrap().is_none());
        assert!(issuer.revoke("alice", &token.value).is_err());
        assert!(issuer.revoke("alice", "").is_err());
    }
}
