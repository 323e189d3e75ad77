//! Error taxonomy shared by every layer of the service.
//!
//! Backends, the token store and the router all speak `CabinetError`; the
//! router turns it into an HTTP response through actix-web's `ResponseError`.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CabinetError {
    /// Request path or body does not have the expected shape
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// No usable credential was presented
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// A credential was presented but does not grant this access
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// The storage engine or token store could not serve the request
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Raised while loading configuration or wiring backends at startup
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl CabinetError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        CabinetError::BackendUnavailable(message.into())
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        CabinetError::InvalidConfiguration(message.into())
    }

    /// Text sent to the client; backend details stay in the server log
    pub fn client_message(&self) -> String {
        match self {
            CabinetError::BackendUnavailable(_) => "Backend unavailable".to_string(),
            CabinetError::InvalidConfiguration(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }

    /// True for the two authorization outcomes (401 and 403)
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, CabinetError::Unauthorized(_) | CabinetError::Forbidden(_))
    }
}

impl ResponseError for CabinetError {
    fn status_code(&self) -> StatusCode {
        match self {
            CabinetError::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            CabinetError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            CabinetError::Forbidden(_) => StatusCode::FORBIDDEN,
            CabinetError::NotFound(_) => StatusCode::NOT_FOUND,
            CabinetError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            CabinetError::BackendUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            CabinetError::InvalidConfiguration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .content_type("text/plain; charset=utf-8")
            .body(self.client_message())
    }
}

impl From<rusqlite::Error> for CabinetError {
    fn from(err: rusqlite::Error) -> Self {
        CabinetError::BackendUnavailable(format!("sqlite: {}", err))
    }
}

impl From<std::io::Error> for CabinetError {
    fn from(err: std::io::Error) -> Self {
        CabinetError::BackendUnavailable(format!("io: {}", err))
    }
}

impl From<bincode::Error> for CabinetError {
    fn from(err: bincode::Error) -> Self {
        CabinetError::BackendUnavailable(format!("corrupt record: {}", err))
    }
}
