//! Shared error type across hitcount crates.

use thiserror::Error;

use crate::key::ValidationError;

/// Client-facing error codes (stable API).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCode {
    /// Invalid input / malformed identifier or parameter.
    BadRequest,
    /// Missing or wrong admin credentials.
    AuthFailed,
    /// Counter does not exist (or has expired).
    NotFound,
    /// Counter already exists.
    AlreadyExists,
    /// Rate limited.
    RateLimited,
    /// Backing store unreachable; safe to retry with backoff.
    Unavailable,
    /// Unsupported config/protocol version.
    UnsupportedVersion,
    /// Internal server error.
    Internal,
}

impl ClientCode {
    /// String representation used in JSON responses.
    pub fn as_str(self) -> &'static str {
        match self {
            ClientCode::BadRequest => "BAD_REQUEST",
            ClientCode::AuthFailed => "AUTH_FAILED",
            ClientCode::NotFound => "NOT_FOUND",
            ClientCode::AlreadyExists => "ALREADY_EXISTS",
            ClientCode::RateLimited => "RATE_LIMITED",
            ClientCode::Unavailable => "UNAVAILABLE",
            ClientCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ClientCode::Internal => "INTERNAL",
        }
    }

    /// Whether a caller may retry the same request later.
    pub fn is_retryable(self) -> bool {
        matches!(self, ClientCode::RateLimited | ClientCode::Unavailable)
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, HitcountError>;

/// Unified error type used by core and gateway.
#[derive(Debug, Error)]
pub enum HitcountError {
    #[error("invalid identifier: {0}")]
    Validation(#[from] ValidationError),
    #[error("counter not found")]
    NotFound,
    #[error("counter already exists")]
    AlreadyExists,
    #[error("invalid ttl: {0}")]
    InvalidTtl(String),
    #[error("backing store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
    #[error("auth failed")]
    AuthFailed,
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unsupported version")]
    UnsupportedVersion,
    #[error("internal: {0}")]
    Internal(String),
}

impl HitcountError {
    /// Map internal error to a stable client-facing code.
    pub fn client_code(&self) -> ClientCode {
        match self {
            HitcountError::Validation(_) => ClientCode::BadRequest,
            HitcountError::NotFound => ClientCode::NotFound,
            HitcountError::AlreadyExists => ClientCode::AlreadyExists,
            HitcountError::InvalidTtl(_) => ClientCode::BadRequest,
            HitcountError::StoreUnavailable(_) => ClientCode::Unavailable,
            HitcountError::RateLimited { .. } => ClientCode::RateLimited,
            HitcountError::AuthFailed => ClientCode::AuthFailed,
            HitcountError::BadRequest(_) => ClientCode::BadRequest,
            HitcountError::UnsupportedVersion => ClientCode::UnsupportedVersion,
            HitcountError::Internal(_) => ClientCode::Internal,
        }
    }
}
