// src/core/security/context.rs
use std::net::IpAddr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info_span, Span};
use uuid::Uuid;

use super::audit::{AuditSink, AuthAttempt, AuthMethod, SecurityEvent, SecurityEventKind, Severity};
use crate::core::clock::Clock;

/// Per-request handle carrying the request id, the caller's origin and the
/// audit capability. Created once per entry-point call and dropped with it.
#[derive(Clone)]
pub struct RequestContext {
    pub request_id: Uuid,
    pub origin: Option<IpAddr>,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
}

impl RequestContext {
    pub fn new(origin: Option<IpAddr>, audit: Arc<dyn AuditSink>, clock: Arc<dyn Clock>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            origin,
            audit,
            clock,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn span(&self, operation: &'static str) -> Span {
        info_span!("request", request_id = %self.request_id, operation, origin = ?self.origin)
    }

    pub fn record_attempt(&self, identity_id: Option<&str>, success: bool, method: AuthMethod) {
        self.audit.record_auth_attempt(&AuthAttempt {
            id: Uuid::new_v4(),
            request_id: self.request_id,
            identity_id: identity_id.map(str::to_string),
            success,
            origin: self.origin,
            method,
            timestamp: self.now(),
        });
    }

    pub fn security_event(
        &self,
        kind: SecurityEventKind,
        severity: Severity,
        identity_id: Option<&str>,
        detail: impl Into<String>,
    ) {
        self.audit.record_security_event(&SecurityEvent {
            id: Uuid::new_v4(),
            request_id: self.request_id,
            kind,
            severity,
            detail: detail.into(),
            origin: self.origin,
            identity_id: identity_id.map(str::to_string),
            timestamp: self.now(),
        });
    }
}
