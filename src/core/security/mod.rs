// src/core/security/mod.rs
pub mod audit;
pub mod context;
pub mod credentials;
pub mod keyed;
pub mod lockout;
pub mod rate_limit;
pub mod session;

pub use audit::{AuditSink, AuthMethod, FanoutAuditSink, MemoryAuditLog, SecurityEventKind, Severity, TracingAuditSink};
pub use context::RequestContext;
pub use credentials::{CredentialHasher, PasswordPolicy, Pbkdf2Hasher};
pub use lockout::{AttemptPolicy, IdentityRegistry, LockoutPolicy};
pub use rate_limit::{RateLimitConfig, RateLimiter};
pub use session::{SessionIssuer, SessionToken};
