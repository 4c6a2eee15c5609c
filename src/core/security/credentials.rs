// src/core/security/credentials.rs
use std::num::NonZeroU32;

use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};

use crate::utils::error::{AuthError, Result};

const SCHEME: &str = "pbkdf2-sha256";
const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;

pub trait CredentialHasher: Send + Sync {
    fn hash(&self, password: &str) -> Result<String>;
    fn verify(&self, password: &str, encoded: &str) -> bool;
}

/// PBKDF2-HMAC-SHA256 with a random salt, encoded as
/// `pbkdf2-sha256$<iterations>$<salt hex>$<hash hex>`.
pub struct Pbkdf2Hasher {
    iterations: NonZeroU32,
    rng: SystemRandom,
}

impl Pbkdf2Hasher {
    pub fn new(iterations: u32) -> Result<Self> {
        let iterations = NonZeroU32::new(iterations)
            .ok_or_else(|| AuthError::Config("credential iterations must be positive".into()))?;
        Ok(Self { iterations, rng: SystemRandom::new() })
    }
}

impl CredentialHasher for Pbkdf2Hasher {
    fn hash(&self, password: &str) -> Result<String> {
        let mut salt = [0u8; SALT_LEN];
        self.rng
            .fill(&mut salt)
            .map_err(|_| AuthError::Internal("failed to generate salt".into()))?;

        let mut hash = [0u8; HASH_LEN];
        pbkdf2::derive(
            pbkdf2::PBKDF2_HMAC_SHA256,
            self.iterations,
            &salt,
            password.as_bytes(),
            &mut hash,
        );

        Ok(format!("{}${}${}${}", SCHEME, self.iterations, hex::encode(salt), hex::encode(hash)))
    }

    fn verify(&self, password: &str, encoded: &str) -> bool {
        let mut parts = encoded.split('$');
        let (Some(scheme), Some(iterations), Some(salt), Some(hash), None) =
            (parts.next(), parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return false;
        };
        if scheme != SCHEME {
            return false;
        }

        let Some(iterations) = iterations.parse::<u32>().ok().and_then(NonZeroU32::new) else {
            return false;
        };
        let (Ok(salt), Ok(hash)) = (hex::decode(salt), hex::decode(hash)) else {
            return false;
        };

        pbkdf2::verify(
            pbkdf2::PBKDF2_HMAC_SHA256,
            iterations,
            &salt,
            password.as_bytes(),
            &hash,
        )
        .is_ok()
    }
}

/// Minimum length plus one character from each class.
#[derive(Debug, Clone, Copy)]
pub struct PasswordPolicy {
    pub min_length: usize,
}

impl PasswordPolicy {
    pub fn validate(&self, password: &str) -> Result<()> {
        if password.chars().count() < self.min_length {
            return Err(AuthError::WeakPassword(format!(
                "must be at least {} characters long",
                self.min_length
            )));
        }
        if !password.chars().any(|c| c.is_uppercase()) {
            return Err(AuthError::WeakPassword("must contain an uppercase letter".into()));
        }
        if !password.chars().any(|c| c.is_lowercase()) {
            return Err(AuthError::WeakPassword("must contain a lowercase letter".into()));
        }
        if !password.chars().any(|c| c.is_ascii_digit()) {
            return Err(AuthError::WeakPassword("must contain a digit".into()));
        }
        if !password.chars().any(|c| !c.is_alphanumeric()) {
            return Err(AuthError::WeakPassword("must contain a special character".into()));
        }
        Ok(())
    }
}
