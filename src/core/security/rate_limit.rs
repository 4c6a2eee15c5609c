// src/core/security/rate_limit.rs
//! Fixed-window request limiting per origin address.
//!
//! Each address gets a window that starts with its first request. Requests
//! are admitted until the window's count reaches `max_attempts`; later
//! requests are rejected without being counted until the window elapses,
//! at which point the next request opens a new window.
//!
//! Expired windows are pruned every `cleanup_interval` checks so spoofed
//! addresses cannot grow the table without bound.

use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::audit::{SecurityEventKind, Severity};
use super::context::RequestContext;
use super::keyed::KeyedState;
use crate::utils::config::SecurityConfig;
use crate::utils::error::{AuthError, Result};

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub max_attempts: u32,
    pub window: chrono::Duration,
    pub cleanup_interval: u64,
}

impl RateLimitConfig {
    pub fn from_config(config: &SecurityConfig) -> Result<Self> {
        Ok(Self {
            max_attempts: config.rate_limit_max_attempts,
            window: config.rate_limit_window()?,
            cleanup_interval: config.rate_limit_cleanup_interval,
        })
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window: chrono::Duration::seconds(3600),
            cleanup_interval: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptWindow {
    pub started_at: DateTime<Utc>,
    pub count: u32,
}

pub struct RateLimiter {
    config: RateLimitConfig,
    windows: KeyedState<IpAddr, AttemptWindow>,
    checks: AtomicU64,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: KeyedState::new(),
            checks: AtomicU64::new(0),
        }
    }

    /// Admits and counts one request from `origin`, or rejects it with
    /// `RateLimited`.
    pub fn check(&self, ctx: &RequestContext, origin: IpAddr) -> Result<()> {
        let now = ctx.now();

        let count = self.checks.fetch_add(1, Ordering::Relaxed) + 1;
        if self.config.cleanup_interval > 0 && count % self.config.cleanup_interval == 0 {
            debug!(checks = count, "running periodic rate limiter cleanup");
            self.cleanup(now);
        }

        let entry = self
            .windows
            .get_or_insert_with(origin, || AttemptWindow { started_at: now, count: 0 });

        let rejected = {
            let mut window = entry.lock();
            if now - window.started_at >= self.config.window {
                *window = AttemptWindow { started_at: now, count: 0 };
            }
            if window.count >= self.config.max_attempts {
                Some(window.started_at.checked_add_signed(self.config.window))
            } else {
                window.count += 1;
                None
            }
        };

        if let Some(resets_at) = rejected {
            let resets_at = resets_at
                .ok_or_else(|| AuthError::Internal("rate limit window end out of range".into()))?;
            let remaining = resets_at - now;
            let retry_after_secs = (remaining.num_milliseconds().max(0) as u64 + 999) / 1000;
            warn!(%origin, retry_after_secs, max = self.config.max_attempts, "rate limit exceeded");
            ctx.security_event(
                SecurityEventKind::RateLimitExceeded,
                Severity::Warning,
                None,
                format!("{} exceeded {} attempts per window", origin, self.config.max_attempts),
            );
            return Err(AuthError::RateLimited { retry_after_secs: retry_after_secs.max(1) });
        }
        Ok(())
    }

    /// Drops windows that have fully elapsed.
    pub fn cleanup(&self, now: DateTime<Utc>) {
        let window = self.config.window;
        self.windows.retain(|_, w| now - w.started_at < window);
    }

    pub fn window(&self, origin: &IpAddr) -> Option<AttemptWindow> {
        self.windows.get(origin).map(|entry| *entry.lock())
    }

    pub fn tracked_origins(&self) -> usize {
        self.windows.len()
    }
}
