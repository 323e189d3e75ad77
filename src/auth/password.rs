//! Password verification used by the token issuance flow

use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Capability supplied by the environment: checks a user's password
pub trait PasswordVerifier: Send + Sync {
    fn verify_password(&self, user: &str, password: &str) -> bool;
}

/// Lowercase hex SHA-256 of a password, the format stored in `auth.users`
pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

/// Verifier backed by the `auth.users` map of the configuration
#[derive(Debug, Clone, Default)]
pub struct ConfiguredPasswords {
    // user -> hex sha256 of password
    users: HashMap<String, String>,
}

impl ConfiguredPasswords {
    pub fn new(users: HashMap<String, String>) -> Self {
        let users = users
            .into_iter()
            .map(|(user, digest)| (user, digest.trim().to_lowercase()))
            .collect();
        Self { users }
    }

    /// Build from plaintext passwords; for tests and local setups
    pub fn from_plaintext<'a>(users: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            users: users
                .into_iter()
                .map(|(user, password)| (user.to_string(), hash_password(password)))
                .collect(),
        }
    }
}

impl PasswordVerifier for ConfiguredPasswords {
    fn verify_password(&self, user: &str, password: &str) -> bool {
        match self.users.get(user) {
            Some(expected) => {
                let actual = hash_password(password);
                // constant time
                expected.len() == actual.len()
                    && expected.bytes().zip(actual.bytes()).fold(0u8, |acc, (a, b)| acc | (a ^ b)) == 0
            }
            None => false,
        }
    }
}
