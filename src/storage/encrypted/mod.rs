// src/storage/encrypted/mod.rs
mod store;
mod cipher;
mod errors;

pub use store::EncryptedTemplateStore;
pub use cipher::RecordCipher;
pub use errors::StorageError;
