// src/storage/types.rs
use chrono::{DateTime, Utc};

use crate::core::identity::types::{BiometricTemplate, FeatureVector, Identity};
use crate::utils::error::Result;

/// Persistence for enrolled templates. At most one template per identity is
/// active; replacing it keeps the superseded record for audit.
///
/// Implementations must allow concurrent readers while a write for one
/// identity is in progress.
#[cfg_attr(test, mockall::automock)]
pub trait TemplateStore: Send + Sync {
    fn get_active_templates(&self) -> Result<Vec<BiometricTemplate>>;

    fn get_active_template(&self, identity_id: &str) -> Result<Option<BiometricTemplate>>;

    fn replace_active_template(
        &self,
        identity_id: &str,
        features: FeatureVector,
        quality: f64,
        captured_at: DateTime<Utc>,
    ) -> Result<BiometricTemplate>;

    /// Every template ever stored for the identity, oldest first.
    fn template_history(&self, identity_id: &str) -> Result<Vec<BiometricTemplate>>;

    /// Number of identities with an active template, read from the index
    /// without opening any record.
    fn count_active(&self) -> Result<usize>;
}

/// Persistence for registered identities and their lockout state.
#[cfg_attr(test, mockall::automock)]
pub trait IdentityStore: Send + Sync {
    fn load_identities(&self) -> Result<Vec<Identity>>;

    /// Inserts or overwrites the record for `identity.id`.
    fn save_identity(&self, identity: &Identity) -> Result<()>;
}
