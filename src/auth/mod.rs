//! Authorization engine
//!
//! Decides whether a request for `(user, category)` with a bearer token may
//! use a given HTTP method. The decision is a pure function of the token
//! store contents and the public-category naming rule.

pub mod issuer;
pub mod password;

use actix_web::http::{header, Method};
use actix_web::HttpRequest;
use log::{debug, warn};
use std::sync::Arc;

use crate::error::CabinetError;
use crate::token::TokenStore;

/// Default suffix marking a category as world-readable
pub const DEFAULT_PUBLIC_SUFFIX: &str = "public";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// Empty or absent bearer token
    MissingToken,
    /// Token not present in the store (never issued or revoked)
    UnknownToken,
    /// Token issued for another user or category
    WrongScope,
    /// Read-only token used for a write
    InsufficientPermission,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthDecision {
    Allow,
    Deny(DenyReason),
}

impl AuthDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AuthDecision::Allow)
    }

    /// Map a denial onto the error taxonomy: 401 for missing or unknown
    /// credentials, 403 for credentials that do not cover the request
    pub fn into_result(self) -> Result<(), CabinetError> {
        match self {
            AuthDecision::Allow => Ok(()),
            AuthDecision::Deny(DenyReason::MissingToken) => {
                Err(CabinetError::Unauthorized("bearer token required".to_string()))
            }
            AuthDecision::Deny(DenyReason::UnknownToken) => {
                Err(CabinetError::Unauthorized("invalid bearer token".to_string()))
            }
            AuthDecision::Deny(DenyReason::WrongScope) | AuthDecision::Deny(DenyReason::InsufficientPermission) => {
                Err(CabinetError::Forbidden("token does not grant this access".to_string()))
            }
        }
    }
}

fn is_read(method: &Method) -> bool {
    *method == Method::GET || *method == Method::HEAD
}

/// Extract the bearer token; absent or unparsable headers yield ""
pub fn bearer_token(req: &HttpRequest) -> String {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split_whitespace().nth(1))
        .unwrap_or("")
        .to_string()
}

pub struct Authorizer {
    tokens: Arc<dyn TokenStore>,
    public_suffix: String,
}

impl Authorizer {
    pub fn new(tokens: Arc<dyn TokenStore>, public_suffix: &str) -> Self {
        Self {
            tokens,
            public_suffix: public_suffix.to_string(),
        }
    }

    pub fn is_public_category(&self, category: &str) -> bool {
        !self.public_suffix.is_empty() && category.ends_with(&self.public_suffix)
    }

    pub fn authorize(&self, user: &str, category: &str, token: &str, method: &Method) -> Result<AuthDecision, CabinetError> {
        if *method == Method::OPTIONS {
            return Ok(AuthDecision::Allow);
        }
        if is_read(method) && self.is_public_category(category) {
            debug!("Public read of {}/{}", user, category);
            return Ok(AuthDecision::Allow);
        }
        // The empty string is never a valid token, whatever the store holds
        if token.is_empty() {
            return Ok(AuthDecision::Deny(DenyReason::MissingToken));
        }

        let decision = match self.tokens.find(token)? {
            None => AuthDecision::Deny(DenyReason::UnknownToken),
            Some(grant) if !grant.is_scoped_to(user, category) => AuthDecision::Deny(DenyReason::WrongScope),
            Some(grant) if !is_read(method) && !grant.permission.can_write() => {
                AuthDecision::Deny(DenyReason::InsufficientPermission)
            }
            Some(_) => AuthDecision::Allow,
        };

        if let AuthDecision::Deny(reason) = decision {
            warn!("Denied {} on {}/{}: {:?}", method, user, category, reason);
        }
        Ok(decision)
    }
}
