// src/storage/encrypted/store.rs
use super::{cipher::RecordCipher, errors::*};
use crate::core::identity::biometric::ALGORITHM_VERSION;
use crate::core::identity::types::{BiometricTemplate, FeatureVector, Identity, TemplateMetadata};
use crate::core::security::keyed::KeyedState;
use crate::storage::types::{IdentityStore, TemplateStore};
use crate::utils::error::AuthError;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rocksdb::{Direction, IteratorMode, Options, WriteBatch, DB};
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

const RECORD_PREFIX: &str = "template/";
const ACTIVE_PREFIX: &str = "active/";
const IDENTITY_PREFIX: &str = "identity/";

/// Template and identity store on RocksDB with every record sealed by
/// `RecordCipher` against its own key.
///
/// Layout:
/// - `template/<hex id>/<capture micros>/<uuid>` holds an encrypted template
///   and is never rewritten except by key rotation.
/// - `active/<hex id>` names the record key of the active template.
/// - `identity/<hex id>` holds the encrypted identity with its credential
///   hash and lockout state.
pub struct EncryptedTemplateStore {
    db: DB,
    cipher: RwLock<RecordCipher>,
    writers: KeyedState<String, ()>,
}

fn record_prefix(identity_id: &str) -> String {
    format!("{}{}/", RECORD_PREFIX, hex::encode(identity_id))
}

fn active_key(identity_id: &str) -> String {
    format!("{}{}", ACTIVE_PREFIX, hex::encode(identity_id))
}

fn identity_key(identity_id: &str) -> String {
    format!("{}{}", IDENTITY_PREFIX, hex::encode(identity_id))
}

impl EncryptedTemplateStore {
    pub fn open<P: AsRef<Path>>(path: P, secret: &[u8]) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);

        let db = DB::open(&opts, path)?;
        let cipher = RecordCipher::new(secret)?;

        Ok(Self {
            db,
            cipher: RwLock::new(cipher),
            writers: KeyedState::new(),
        })
    }

    fn scan_prefix(&self, prefix: &str) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut entries = Vec::new();
        let iter = self.db.iterator(IteratorMode::From(prefix.as_bytes(), Direction::Forward));
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(prefix.as_bytes()) {
                break;
            }
            entries.push((key.to_vec(), value.to_vec()));
        }
        Ok(entries)
    }

    /// Counts keys under `prefix` without opening their values.
    fn count_prefix(&self, prefix: &str) -> Result<usize> {
        let mut count = 0;
        for item in self.db.iterator(IteratorMode::From(prefix.as_bytes(), Direction::Forward)) {
            let (key, _) = item?;
            if !key.starts_with(prefix.as_bytes()) {
                break;
            }
            count += 1;
        }
        Ok(count)
    }

    fn open_record<T: serde::de::DeserializeOwned>(
        &self,
        cipher: &RecordCipher,
        key: &[u8],
        sealed: &[u8],
    ) -> Result<T> {
        let plaintext = cipher.open(key, sealed)?;
        serde_json::from_slice(&plaintext).map_err(|e| StorageError::InvalidFormat(e.to_string()))
    }

    fn load_active(&self, cipher: &RecordCipher, pointer: &[u8]) -> Result<BiometricTemplate> {
        let sealed = self.db.get(pointer)?.ok_or_else(|| {
            StorageError::InvalidFormat(format!(
                "active index points at missing record {}",
                String::from_utf8_lossy(pointer)
            ))
        })?;
        let mut template: BiometricTemplate = self.open_record(cipher, pointer, &sealed)?;
        template.metadata.active = true;
        Ok(template)
    }

    pub fn active_templates(&self) -> Result<Vec<BiometricTemplate>> {
        let cipher = self.cipher.read();
        self.scan_prefix(ACTIVE_PREFIX)?
            .into_iter()
            .map(|(_, pointer)| self.load_active(&cipher, &pointer))
            .collect()
    }

    pub fn active_template(&self, identity_id: &str) -> Result<Option<BiometricTemplate>> {
        let cipher = self.cipher.read();
        match self.db.get(active_key(identity_id))? {
            Some(pointer) => self.load_active(&cipher, &pointer).map(Some),
            None => Ok(None),
        }
    }

    pub fn replace_active(
        &self,
        identity_id: &str,
        features: FeatureVector,
        quality: f64,
        captured_at: DateTime<Utc>,
    ) -> Result<BiometricTemplate> {
        let writer = self.writers.get_or_insert_with(identity_id.to_string(), || ());
        let _guard = writer.lock();

        let mut template = BiometricTemplate {
            id: Uuid::new_v4(),
            identity_id: identity_id.to_string(),
            features,
            metadata: TemplateMetadata {
                captured_at,
                algorithm_version: ALGORITHM_VERSION.to_string(),
                quality_score: quality,
                active: false,
            },
        };

        let record_key = format!(
            "{}{:020}/{}",
            record_prefix(identity_id),
            captured_at.timestamp_micros().max(0),
            template.id
        );
        let serialized = serde_json::to_vec(&template)
            .map_err(|e| StorageError::InvalidFormat(e.to_string()))?;

        let cipher = self.cipher.read();
        let sealed = cipher.seal(record_key.as_bytes(), &serialized)?;

        let mut batch = WriteBatch::default();
        batch.put(record_key.as_bytes(), &sealed);
        batch.put(active_key(identity_id).as_bytes(), record_key.as_bytes());
        self.db.write(batch)?;

        debug!(identity = identity_id, template = %template.id, "active template replaced");
        template.metadata.active = true;
        Ok(template)
    }

    pub fn history(&self, identity_id: &str) -> Result<Vec<BiometricTemplate>> {
        let cipher = self.cipher.read();
        let active = self.db.get(active_key(identity_id))?;

        self.scan_prefix(&record_prefix(identity_id))?
            .into_iter()
            .map(|(key, sealed)| {
                let mut template: BiometricTemplate = self.open_record(&cipher, &key, &sealed)?;
                template.metadata.active = active.as_deref() == Some(key.as_slice());
                Ok::<_, StorageError>(template)
            })
            .collect()
    }

    pub fn active_count(&self) -> Result<usize> {
        self.count_prefix(ACTIVE_PREFIX)
    }

    pub fn identities(&self) -> Result<Vec<Identity>> {
        let cipher = self.cipher.read();
        self.scan_prefix(IDENTITY_PREFIX)?
            .into_iter()
            .map(|(key, sealed)| self.open_record(&cipher, &key, &sealed))
            .collect()
    }

    pub fn put_identity(&self, identity: &Identity) -> Result<()> {
        let key = identity_key(&identity.id);
        let serialized = serde_json::to_vec(identity)
            .map_err(|e| StorageError::InvalidFormat(e.to_string()))?;

        let cipher = self.cipher.read();
        let sealed = cipher.seal(key.as_bytes(), &serialized)?;
        self.db.put(key.as_bytes(), &sealed)?;
        Ok(())
    }

    /// Re-seals every template and identity record under `new_secret` in one
    /// write batch. Returns the number of records rewritten.
    pub fn rotate_encryption_key(&self, new_secret: &[u8]) -> Result<usize> {
        let new_cipher = RecordCipher::new(new_secret)?;
        let mut cipher = self.cipher.write();

        let mut batch = WriteBatch::default();
        let mut rewritten = 0;
        for prefix in [RECORD_PREFIX, IDENTITY_PREFIX] {
            for (key, sealed) in self.scan_prefix(prefix)? {
                let plaintext = cipher.open(&key, &sealed)?;
                batch.put(&key, new_cipher.seal(&key, &plaintext)?);
                rewritten += 1;
            }
        }

        self.db.write(batch)?;
        *cipher = new_cipher;

        info!(records = rewritten, "store re-encrypted");
        Ok(rewritten)
    }

    /// Raw stored bytes for a key, as persisted.
    pub fn raw(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.db.get(key)?)
    }
}

impl TemplateStore for EncryptedTemplateStore {
    fn get_active_templates(&self) -> crate::utils::error::Result<Vec<BiometricTemplate>> {
        self.active_templates().map_err(AuthError::from)
    }

    fn get_active_template(&self, identity_id: &str) -> crate::utils::error::Result<Option<BiometricTemplate>> {
        self.active_template(identity_id).map_err(AuthError::from)
    }

    fn replace_active_template(
        &self,
        identity_id: &str,
        features: FeatureVector,
        quality: f64,
        captured_at: DateTime<Utc>,
    ) -> crate::utils::error::Result<BiometricTemplate> {
        self.replace_active(identity_id, features, quality, captured_at)
            .map_err(AuthError::from)
    }

    fn template_history(&self, identity_id: &str) -> crate::utils::error::Result<Vec<BiometricTemplate>> {
        self.history(identity_id).map_err(AuthError::from)
    }

    fn count_active(&self) -> crate::utils::error::Result<usize> {
        self.active_count().map_err(AuthError::from)
    }
}

impl IdentityStore for EncryptedTemplateStore {
    fn load_identities(&self) -> crate::utils::error::Result<Vec<Identity>> {
        self.identities().map_err(AuthError::from)
    }

    fn save_identity(&self, identity: &Identity) -> crate::utils::error::Result<()> {
        self.put_identity(identity).map_err(AuthError::from)
    }
}
