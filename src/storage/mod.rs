// src/storage/mod.rs
pub mod encrypted;
pub mod memory;
pub mod types;

pub use encrypted::{EncryptedTemplateStore, StorageError};
pub use memory::MemoryTemplateStore;
pub use types::{IdentityStore, TemplateStore};
