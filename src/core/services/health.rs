// src/core/services/health.rs
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::storage::types::TemplateStore;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthMetrics {
    pub status: &'static str,
    pub uptime: i64,
    pub processed_requests: u64,
    pub enrolled_identities: Option<usize>,
}

pub struct HealthService {
    start_time: i64,
    processed_requests: AtomicU64,
    store: Arc<dyn TemplateStore>,
}

impl HealthService {
    pub fn new(store: Arc<dyn TemplateStore>) -> Self {
        Self {
            start_time: chrono::Utc::now().timestamp(),
            processed_requests: AtomicU64::new(0),
            store,
        }
    }

    pub fn record_request(&self) {
        self.processed_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Reports `degraded` when the template store cannot be read. Only the
    /// active index is consulted; no template is decrypted.
    pub fn get_metrics(&self) -> HealthMetrics {
        let enrolled = self.store.count_active().ok();
        HealthMetrics {
            status: if enrolled.is_some() { "ok" } else { "degraded" },
            uptime: chrono::Utc::now().timestamp() - self.start_time,
            processed_requests: self.processed_requests.load(Ordering::Relaxed),
            enrolled_identities: enrolled,
        }
    }
}
