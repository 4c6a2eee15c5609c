// src/core/services/mod.rs
pub mod authenticator;
pub mod health;

pub use authenticator::IrisAuthenticator;
pub use health::{HealthMetrics, HealthService};
