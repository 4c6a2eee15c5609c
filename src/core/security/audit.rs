// src/core/security/audit.rs

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn, error};
use uuid::Uuid;

use crate::core::clock::Clock;
use crate::core::identity::types::IdentityId;

#[derive(Debug, Error, PartialEq)]
pub enum AuditError {
    #[error("Invalid audit period")]
    InvalidPeriod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    Password,
    Biometric,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityEventKind {
    FailedLogin,
    AccountLocked,
    LockedAccountAccess,
    RateLimitExceeded,
    EnrollmentRejected,
    TemplateReplaced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthAttempt {
    pub id: Uuid,
    pub request_id: Uuid,
    pub identity_id: Option<IdentityId>,
    pub success: bool,
    pub origin: Option<IpAddr>,
    pub method: AuthMethod,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityEvent {
    pub id: Uuid,
    pub request_id: Uuid,
    pub kind: SecurityEventKind,
    pub severity: Severity,
    pub detail: String,
    pub origin: Option<IpAddr>,
    pub identity_id: Option<IdentityId>,
    pub timestamp: DateTime<Utc>,
}

/// Destination for authentication attempts and security events.
#[cfg_attr(test, mockall::automock)]
pub trait AuditSink: Send + Sync {
    fn record_auth_attempt(&self, attempt: &AuthAttempt);
    fn record_security_event(&self, event: &SecurityEvent);
}

/// Writes audit records to the `security` tracing target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record_auth_attempt(&self, attempt: &AuthAttempt) {
        info!(
            target: "security",
            request_id = %attempt.request_id,
            identity = attempt.identity_id.as_deref().unwrap_or("-"),
            success = attempt.success,
            origin = ?attempt.origin,
            method = ?attempt.method,
            "auth attempt"
        );
    }

    fn record_security_event(&self, event: &SecurityEvent) {
        let identity = event.identity_id.as_deref().unwrap_or("-");
        match event.severity {
            Severity::Info => info!(
                target: "security",
                request_id = %event.request_id,
                kind = ?event.kind,
                identity,
                origin = ?event.origin,
                "{}", event.detail
            ),
            Severity::Warning => warn!(
                target: "security",
                request_id = %event.request_id,
                kind = ?event.kind,
                identity,
                origin = ?event.origin,
                "{}", event.detail
            ),
            Severity::Critical => error!(
                target: "security",
                request_id = %event.request_id,
                kind = ?event.kind,
                identity,
                origin = ?event.origin,
                "{}", event.detail
            ),
        }
    }
}

/// Forwards every record to each of its sinks in order.
#[derive(Clone, Default)]
pub struct FanoutAuditSink {
    sinks: Vec<Arc<dyn AuditSink>>,
}

impl FanoutAuditSink {
    pub fn new(sinks: Vec<Arc<dyn AuditSink>>) -> Self {
        Self { sinks }
    }

    pub fn with(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl AuditSink for FanoutAuditSink {
    fn record_auth_attempt(&self, attempt: &AuthAttempt) {
        for sink in &self.sinks {
            sink.record_auth_attempt(attempt);
        }
    }

    fn record_security_event(&self, event: &SecurityEvent) {
        for sink in &self.sinks {
            sink.record_security_event(event);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditRecord {
    Attempt(AuthAttempt),
    Security(SecurityEvent),
}

impl AuditRecord {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            AuditRecord::Attempt(a) => a.timestamp,
            AuditRecord::Security(e) => e.timestamp,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditSummary {
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub total_events: usize,
    pub successful_attempts: usize,
    pub failed_attempts: usize,
    pub events_by_kind: HashMap<SecurityEventKind, usize>,
}

/// Records kept by default before the oldest are dropped.
pub const DEFAULT_AUDIT_CAPACITY: usize = 100_000;

/// In-memory audit trail, oldest first, bounded by both age and count.
pub struct MemoryAuditLog {
    records: RwLock<VecDeque<AuditRecord>>,
    retention_period: chrono::Duration,
    capacity: usize,
    clock: Arc<dyn Clock>,
}

impl MemoryAuditLog {
    pub fn new(retention_period: chrono::Duration, clock: Arc<dyn Clock>) -> Self {
        Self::with_capacity(retention_period, DEFAULT_AUDIT_CAPACITY, clock)
    }

    pub fn with_capacity(retention_period: chrono::Duration, capacity: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            records: RwLock::new(VecDeque::new()),
            retention_period,
            capacity: capacity.max(1),
            clock,
        }
    }

    fn push(&self, record: AuditRecord) {
        let cutoff = self.clock.now() - self.retention_period;
        let mut records = self.records.write();
        while records.front().map_or(false, |r| r.timestamp() < cutoff) {
            records.pop_front();
        }
        if records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.read().iter().cloned().collect()
    }

    pub fn attempts(&self) -> Vec<AuthAttempt> {
        self.records
            .read()
            .iter()
            .filter_map(|r| match r {
                AuditRecord::Attempt(a) => Some(a.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn security_events(&self) -> Vec<SecurityEvent> {
        self.records
            .read()
            .iter()
            .filter_map(|r| match r {
                AuditRecord::Security(e) => Some(e.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn events_of(&self, kind: SecurityEventKind) -> Vec<SecurityEvent> {
        self.security_events().into_iter().filter(|e| e.kind == kind).collect()
    }

    pub fn get_events(
        &self,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<Vec<AuditRecord>, AuditError> {
        if end_time < start_time {
            return Err(AuditError::InvalidPeriod);
        }

        Ok(self
            .records
            .read()
            .iter()
            .filter(|r| r.timestamp() >= start_time && r.timestamp() <= end_time)
            .cloned()
            .collect())
    }

    pub fn get_summary(
        &self,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<AuditSummary, AuditError> {
        let records = self.get_events(start_time, end_time)?;
        let mut summary = AuditSummary {
            period_start: start_time,
            period_end: end_time,
            total_events: records.len(),
            successful_attempts: 0,
            failed_attempts: 0,
            events_by_kind: HashMap::new(),
        };

        for record in &records {
            match record {
                AuditRecord::Attempt(a) if a.success => summary.successful_attempts += 1,
                AuditRecord::Attempt(_) => summary.failed_attempts += 1,
                AuditRecord::Security(e) => *summary.events_by_kind.entry(e.kind).or_insert(0) += 1,
            }
        }

        Ok(summary)
    }
}

impl AuditSink for MemoryAuditLog {
    fn record_auth_attempt(&self, attempt: &AuthAttempt) {
        self.push(AuditRecord::Attempt(attempt.clone()));
    }

    fn record_security_event(&self, event: &SecurityEvent) {
        self.push(AuditRecord::Security(event.clone()));
    }
}
