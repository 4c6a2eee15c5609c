// src/api/types.rs
use actix_web::{
    http::{header, StatusCode},
    HttpResponse, ResponseError,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::identity::types::{BiometricTemplate, Identity};
use crate::utils::error::AuthError;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub identity_id: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub password: String,
}

/// Public view of an identity. The credential hash never leaves the process.
#[derive(Debug, Serialize)]
pub struct IdentityResponse {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    pub failed_attempts: u32,
    pub locked_until: Option<DateTime<Utc>>,
}

impl From<&Identity> for IdentityResponse {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.id.clone(),
            created_at: identity.created_at,
            last_login: identity.last_login,
            failed_attempts: identity.lockout.failed_attempts,
            locked_until: identity.lockout.locked_until,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EnrollmentResponse {
    pub template_id: Uuid,
    pub quality: f64,
}

/// Successful match. `token` is a session for the matched identity.
#[derive(Debug, Serialize)]
pub struct MatchResponse {
    pub identity_id: String,
    pub score: f64,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub identity_id: String,
    pub authenticated: bool,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Template metadata without the feature vector.
#[derive(Debug, Serialize)]
pub struct TemplateSummary {
    pub id: Uuid,
    pub captured_at: DateTime<Utc>,
    pub algorithm_version: String,
    pub quality_score: f64,
    pub active: bool,
}

impl From<&BiometricTemplate> for TemplateSummary {
    fn from(template: &BiometricTemplate) -> Self {
        Self {
            id: template.id,
            captured_at: template.metadata.captured_at,
            algorithm_version: template.metadata.algorithm_version.clone(),
            quality_score: template.metadata.quality_score,
            active: template.metadata.active,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: bool,
    pub message: String,
    pub status_code: u16,
    pub timestamp: DateTime<Utc>,
}

impl ErrorResponse {
    pub fn new(err: &AuthError) -> Self {
        // Internal detail stays in the logs.
        let message = match err {
            AuthError::StoreUnavailable(_) => "Service temporarily unavailable".to_string(),
            AuthError::Config(_) | AuthError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };
        Self {
            error: true,
            message,
            status_code: err.status_code(),
            timestamp: Utc::now(),
        }
    }
}

impl ResponseError for AuthError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(AuthError::status_code(self)).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        let mut response = HttpResponse::build(ResponseError::status_code(self));
        if let AuthError::RateLimited { retry_after_secs } = self {
            response.insert_header((header::RETRY_AFTER, retry_after_secs.to_string()));
        }
        response.json(ErrorResponse::new(self))
    }
}
