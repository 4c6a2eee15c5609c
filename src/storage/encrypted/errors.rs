// src/storage/encrypted/errors.rs
use thiserror::Error;

use crate::utils::error::AuthError;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Encryption error: {0}")]
    EncryptionError(String),

    #[error("Decryption error: {0}")]
    DecryptionError(String),

    #[error("Key management error: {0}")]
    KeyError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<rocksdb::Error> for StorageError {
    fn from(err: rocksdb::Error) -> Self {
        StorageError::DatabaseError(err.to_string())
    }
}

impl From<StorageError> for AuthError {
    fn from(err: StorageError) -> Self {
        AuthError::StoreUnavailable(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;
