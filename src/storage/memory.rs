// src/storage/memory.rs
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::core::identity::biometric::ALGORITHM_VERSION;
use crate::core::identity::types::{BiometricTemplate, FeatureVector, Identity, TemplateMetadata};
use crate::storage::types::{IdentityStore, TemplateStore};
use crate::utils::error::Result;

/// Unencrypted in-process store, for tests and benchmarks.
#[derive(Default)]
pub struct MemoryTemplateStore {
    // Per identity, oldest first; the last entry is active.
    templates: RwLock<HashMap<String, Vec<BiometricTemplate>>>,
    identities: RwLock<HashMap<String, Identity>>,
}

impl MemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TemplateStore for MemoryTemplateStore {
    fn get_active_templates(&self) -> Result<Vec<BiometricTemplate>> {
        let templates = self.templates.read();
        let mut active: Vec<_> = templates
            .values()
            .filter_map(|history| history.last().cloned())
            .collect();
        active.sort_by(|a, b| a.identity_id.cmp(&b.identity_id));
        Ok(active)
    }

    fn get_active_template(&self, identity_id: &str) -> Result<Option<BiometricTemplate>> {
        Ok(self
            .templates
            .read()
            .get(identity_id)
            .and_then(|history| history.last().cloned()))
    }

    fn replace_active_template(
        &self,
        identity_id: &str,
        features: FeatureVector,
        quality: f64,
        captured_at: DateTime<Utc>,
    ) -> Result<BiometricTemplate> {
        let template = BiometricTemplate {
            id: Uuid::new_v4(),
            identity_id: identity_id.to_string(),
            features,
            metadata: TemplateMetadata {
                captured_at,
                algorithm_version: ALGORITHM_VERSION.to_string(),
                quality_score: quality,
                active: true,
            },
        };

        let mut templates = self.templates.write();
        let history = templates.entry(identity_id.to_string()).or_default();
        if let Some(previous) = history.last_mut() {
            previous.metadata.active = false;
        }
        history.push(template.clone());
        Ok(template)
    }

    fn template_history(&self, identity_id: &str) -> Result<Vec<BiometricTemplate>> {
        Ok(self.templates.read().get(identity_id).cloned().unwrap_or_default())
    }

    fn count_active(&self) -> Result<usize> {
        Ok(self.templates.read().values().filter(|history| !history.is_empty()).count())
    }
}

impl IdentityStore for MemoryTemplateStore {
    fn load_identities(&self) -> Result<Vec<Identity>> {
        let mut identities: Vec<_> = self.identities.read().values().cloned().collect();
        identities.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(identities)
    }

    fn save_identity(&self, identity: &Identity) -> Result<()> {
        self.identities.write().insert(identity.id.clone(), identity.clone());
        Ok(())
    }
}
