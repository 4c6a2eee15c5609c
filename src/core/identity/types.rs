// src/core/identity/types.rs
use serde::{Serialize, Deserialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

use crate::core::security::session::SessionToken;
use crate::utils::error::AuthError;

pub type IdentityId = String;

/// Concatenated filter-bank responses for both eyes.
pub type FeatureVector = Vec<f32>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

impl Point {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: i64,
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
}

impl BoundingBox {
    pub fn area(&self) -> i64 {
        (self.right - self.left).max(0) * (self.bottom - self.top).max(0)
    }
}

/// One detected face with its 68-point landmark set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Face {
    pub bounding_box: BoundingBox,
    pub landmarks: Vec<Point>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockoutState {
    pub failed_attempts: u32,
    pub locked_until: Option<DateTime<Utc>>,
}

impl LockoutState {
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.map_or(false, |until| until > now)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: IdentityId,
    pub credential_hash: String,
    pub lockout: LockoutState,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiometricTemplate {
    pub id: Uuid,
    pub identity_id: IdentityId,
    pub features: FeatureVector,
    pub metadata: TemplateMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateMetadata {
    pub captured_at: DateTime<Utc>,
    pub algorithm_version: String,
    pub quality_score: f64,
    /// Not persisted with the record; derived from the store's active index.
    #[serde(skip)]
    pub active: bool,
}

impl BiometricTemplate {
    pub fn verify_quality(&self, minimum_quality: f64) -> bool {
        self.metadata.quality_score >= minimum_quality
    }

    pub fn is_fresh(&self, now: DateTime<Utc>, max_age: chrono::Duration) -> bool {
        now - self.metadata.captured_at <= max_age
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EnrollmentResult {
    Accepted { template_id: Uuid, quality: f64 },
    Rejected { reason: AuthError },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum VerificationResult {
    Matched { identity_id: IdentityId, score: f64, session: SessionToken },
    NoMatch,
    Rejected { reason: AuthError },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LoginResult {
    Authenticated { identity_id: IdentityId, session: SessionToken },
    InvalidCredentials,
    Rejected { reason: AuthError },
}
