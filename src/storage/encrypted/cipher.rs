// src/storage/encrypted/cipher.rs
use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Key, Nonce,
};
use rand::{rngs::OsRng, RngCore};
use sha3::{Digest, Sha3_256};

use super::errors::{Result, StorageError};

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Seals store records with AES-256-GCM under the SHA3-256 digest of the
/// configured secret.
///
/// Each sealed value is `nonce || ciphertext || tag`. The rocksdb key the
/// value is written under is bound as associated data, and every key embeds
/// the owning identity, so a value copied under another key (or another
/// identity) fails to open.
pub struct RecordCipher {
    aead: Aes256Gcm,
}

impl RecordCipher {
    pub fn new(secret: &[u8]) -> Result<Self> {
        if secret.is_empty() {
            return Err(StorageError::KeyError("encryption secret is empty".to_string()));
        }
        let digest = Sha3_256::digest(secret);
        Ok(Self { aead: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&digest)) })
    }

    pub fn seal(&self, record_key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let body = self
            .aead
            .encrypt(Nonce::from_slice(&nonce), Payload { msg: plaintext, aad: record_key })
            .map_err(|e| StorageError::EncryptionError(e.to_string()))?;

        let mut sealed = nonce.to_vec();
        sealed.extend(body);
        Ok(sealed)
    }

    pub fn open(&self, record_key: &[u8], sealed: &[u8]) -> Result<Vec<u8>> {
        if sealed.len() < NONCE_LEN + TAG_LEN {
            return Err(StorageError::DecryptionError(format!(
                "sealed record is {} bytes, shorter than nonce and tag",
                sealed.len()
            )));
        }

        let (nonce, body) = sealed.split_at(NONCE_LEN);
        self.aead
            .decrypt(Nonce::from_slice(nonce), Payload { msg: body, aad: record_key })
            .map_err(|_| {
                StorageError::DecryptionError(format!(
                    "record {} failed authentication",
                    String::from_utf8_lossy(record_key)
                ))
            })
    }
}
