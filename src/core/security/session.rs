// src/core/security/session.rs
//! Signed, expiring session tokens issued after a successful password login
//! or iris match.
//!
//! A token is `<claims hex>.<tag hex>` where the tag is HMAC-SHA256 over the
//! claims bytes. The signing key is derived from the configured storage
//! secret with its own domain label, so it never equals the record key.

use chrono::{DateTime, TimeZone, Utc};
use ring::hmac;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use uuid::Uuid;

use crate::core::identity::types::IdentityId;
use crate::utils::config::Config;
use crate::utils::error::{AuthError, Result};

const KEY_LABEL: &[u8] = b"biolock/session/v1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionToken {
    pub token: String,
    pub identity_id: IdentityId,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: IdentityId,
    iat: i64,
    exp: i64,
    jti: Uuid,
}

pub struct SessionIssuer {
    key: hmac::Key,
    ttl: chrono::Duration,
}

impl SessionIssuer {
    pub fn new(secret: &[u8], ttl: chrono::Duration) -> Result<Self> {
        if secret.is_empty() {
            return Err(AuthError::Config("session secret is empty".into()));
        }
        if ttl <= chrono::Duration::zero() {
            return Err(AuthError::Config("session lifetime must be positive".into()));
        }

        let mut hasher = Sha3_256::new();
        hasher.update(KEY_LABEL);
        hasher.update(secret);
        let key = hmac::Key::new(hmac::HMAC_SHA256, hasher.finalize().as_slice());
        Ok(Self { key, ttl })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.storage.encryption_key.as_bytes(), config.security.session_ttl()?)
    }

    pub fn issue(&self, identity_id: &str, now: DateTime<Utc>) -> Result<SessionToken> {
        let expires_at = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| AuthError::Internal("session expiry out of range".into()))?;
        let claims = Claims {
            sub: identity_id.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4(),
        };
        let payload = serde_json::to_vec(&claims).map_err(|e| AuthError::Internal(e.to_string()))?;
        let tag = hmac::sign(&self.key, &payload);

        Ok(SessionToken {
            token: format!("{}.{}", hex::encode(&payload), hex::encode(tag.as_ref())),
            identity_id: identity_id.to_string(),
            expires_at: Utc
                .timestamp_opt(claims.exp, 0)
                .single()
                .ok_or_else(|| AuthError::Internal("session expiry out of range".into()))?,
        })
    }

    /// Returns the identity the token was issued to, if the signature holds
    /// and the token has not expired at `now`.
    pub fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<IdentityId> {
        let (payload, tag) = token
            .split_once('.')
            .ok_or_else(|| AuthError::InvalidSession("malformed token".into()))?;
        let (Ok(payload), Ok(tag)) = (hex::decode(payload), hex::decode(tag)) else {
            return Err(AuthError::InvalidSession("malformed token".into()));
        };

        hmac::verify(&self.key, &payload, &tag)
            .map_err(|_| AuthError::InvalidSession("bad signature".into()))?;

        let claims: Claims = serde_json::from_slice(&payload)
            .map_err(|_| AuthError::InvalidSession("malformed claims".into()))?;
        if now.timestamp() >= claims.exp {
            return Err(AuthError::InvalidSession("expired".into()));
        }
        Ok(claims.sub)
    }

    /// Like `validate`, but also requires the token to belong to `identity_id`.
    pub fn authorize(&self, token: &str, identity_id: &str, now: DateTime<Utc>) -> Result<()> {
        let subject = self.validate(token, now)?;
        if subject != identity_id {
            return Err(AuthError::InvalidSession("issued to another identity".into()));
        }
        Ok(())
    }
}
