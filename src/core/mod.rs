// src/core/mod.rs
pub mod clock;
pub mod identity;
pub mod imaging;
pub mod security;
pub mod services;
