// src/utils/error.rs
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuthError {
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("No face detected in image")]
    NoFaceDetected,

    #[error("No iris detected in eye region")]
    NoIrisDetected,

    #[error("Image quality {score:.3} below required {threshold:.3}")]
    LowQuality { score: f64, threshold: f64 },

    #[error("No matching template")]
    NoMatch,

    #[error("Too many attempts, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Account locked until {locked_until}")]
    AccountLocked { locked_until: DateTime<Utc> },

    #[error("Template store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Unknown identity: {0}")]
    UnknownIdentity(String),

    #[error("Identity already exists: {0}")]
    IdentityExists(String),

    #[error("Password does not meet policy: {0}")]
    WeakPassword(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Session rejected: {0}")]
    InvalidSession(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Failures of the system rather than of the caller's attempt. These are
    /// logged as system errors and never reach the security audit trail.
    pub fn is_technical(&self) -> bool {
        matches!(
            self,
            AuthError::InvalidImage(_)
                | AuthError::StoreUnavailable(_)
                | AuthError::Config(_)
                | AuthError::Internal(_)
        )
    }

    /// Failures of a biometric attempt that count against the claimed identity.
    pub fn is_biometric_failure(&self) -> bool {
        matches!(
            self,
            AuthError::NoFaceDetected | AuthError::NoIrisDetected | AuthError::NoMatch
        )
    }

    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::InvalidImage(_) => 400,
            AuthError::NoFaceDetected | AuthError::NoIrisDetected => 422,
            AuthError::LowQuality { .. } => 422,
            AuthError::NoMatch | AuthError::InvalidCredentials | AuthError::InvalidSession(_) => 401,
            AuthError::RateLimited { .. } => 429,
            AuthError::AccountLocked { .. } => 423,
            AuthError::UnknownIdentity(_) => 404,
            AuthError::IdentityExists(_) => 409,
            AuthError::WeakPassword(_) => 400,
            AuthError::StoreUnavailable(_) => 503,
            AuthError::Config(_) | AuthError::Internal(_) => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
