// src/core/security/lockout.rs
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::audit::{AuthMethod, SecurityEventKind, Severity};
use super::context::RequestContext;
use super::keyed::KeyedState;
use crate::core::identity::types::{Identity, IdentityId, LockoutState};
use crate::storage::types::IdentityStore;
use crate::utils::config::SecurityConfig;
use crate::utils::error::{AuthError, Result};

#[derive(Debug, Clone, Copy)]
pub struct LockoutPolicy {
    pub attempt_limit: u32,
    pub lock_duration: chrono::Duration,
    /// Clear the failure counter when an expired lock is observed. When
    /// false the counter survives expiry and the next failure re-locks.
    pub reset_counter_on_expiry: bool,
}

impl LockoutPolicy {
    pub fn from_config(config: &SecurityConfig) -> Result<Self> {
        Ok(Self {
            attempt_limit: config.lockout_attempt_limit,
            lock_duration: config.lockout_duration()?,
            reset_counter_on_expiry: config.reset_counter_on_expiry,
        })
    }
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            attempt_limit: 5,
            lock_duration: chrono::Duration::minutes(30),
            reset_counter_on_expiry: false,
        }
    }
}

/// Registered identities, each behind its own lock. With a backing store
/// every change is written through before it becomes visible.
#[derive(Default)]
pub struct IdentityRegistry {
    identities: KeyedState<IdentityId, Identity>,
    store: Option<Arc<dyn IdentityStore>>,
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry backed by `store`, preloaded with every persisted identity.
    pub fn load(store: Arc<dyn IdentityStore>) -> Result<Self> {
        let identities = KeyedState::new();
        let records = store.load_identities()?;
        let count = records.len();
        for identity in records {
            identities.insert_new(identity.id.clone(), identity);
        }

        info!(identities = count, "identity registry loaded");
        Ok(Self { identities, store: Some(store) })
    }

    pub fn register(&self, identity: Identity) -> Result<()> {
        let id = identity.id.clone();
        if !self.identities.insert_new(id.clone(), identity) {
            return Err(AuthError::IdentityExists(id));
        }

        if let Some(store) = &self.store {
            let entry = self.entry(&id)?;
            let saved = store.save_identity(&entry.lock());
            if let Err(err) = saved {
                self.identities.remove(&id);
                return Err(err);
            }
        }
        Ok(())
    }

    /// Applies `change` to a copy of the identity under its lock. A changed
    /// copy is persisted first and only then replaces the stored identity,
    /// so a failed write leaves memory untouched.
    pub fn update<R>(&self, id: &str, change: impl FnOnce(&mut Identity) -> Result<R>) -> Result<R> {
        let entry = self.entry(id)?;
        let mut current = entry.lock();
        let mut updated = current.clone();
        let result = change(&mut updated)?;

        if updated != *current {
            if let Some(store) = &self.store {
                store.save_identity(&updated)?;
            }
            *current = updated;
        }
        Ok(result)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.identities.contains(&id.to_string())
    }

    /// Snapshot of the identity as currently stored.
    pub fn get(&self, id: &str) -> Option<Identity> {
        self.identities.get(&id.to_string()).map(|entry| entry.lock().clone())
    }

    fn entry(&self, id: &str) -> Result<Arc<Mutex<Identity>>> {
        self.identities
            .get(&id.to_string())
            .ok_or_else(|| AuthError::UnknownIdentity(id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }
}

/// Per-identity failed-attempt counter and lock timer.
///
/// `check` runs before any credential or biometric evaluation and rejects
/// locked identities; `record` commits the outcome of an evaluated attempt.
/// Both mutate the identity under its own lock and release it before any
/// audit record is written.
pub struct AttemptPolicy {
    policy: LockoutPolicy,
    registry: Arc<IdentityRegistry>,
}

impl AttemptPolicy {
    pub fn new(policy: LockoutPolicy, registry: Arc<IdentityRegistry>) -> Self {
        Self { policy, registry }
    }

    pub fn registry(&self) -> &Arc<IdentityRegistry> {
        &self.registry
    }

    pub fn policy(&self) -> LockoutPolicy {
        self.policy
    }

    pub fn check(&self, ctx: &RequestContext, id: &str, method: AuthMethod) -> Result<()> {
        let now = ctx.now();

        let locked_until = self.registry.update(id, |identity| {
            Ok(match identity.lockout.locked_until {
                Some(until) if until > now => Some(until),
                Some(_) => {
                    identity.lockout.locked_until = None;
                    if self.policy.reset_counter_on_expiry {
                        identity.lockout.failed_attempts = 0;
                    }
                    debug!(identity = id, "lock expired");
                    None
                }
                None => None,
            })
        })?;

        if let Some(locked_until) = locked_until {
            warn!(identity = id, %locked_until, "attempt on locked identity");
            ctx.record_attempt(Some(id), false, method);
            ctx.security_event(
                SecurityEventKind::LockedAccountAccess,
                Severity::Warning,
                Some(id),
                format!("attempt while locked until {}", locked_until),
            );
            return Err(AuthError::AccountLocked { locked_until });
        }
        Ok(())
    }

    pub fn record(
        &self,
        ctx: &RequestContext,
        id: &str,
        success: bool,
        method: AuthMethod,
    ) -> Result<LockoutState> {
        let now = ctx.now();

        let (state, newly_locked) = self.registry.update(id, |identity| {
            let mut newly_locked = false;
            if success {
                identity.lockout = LockoutState::default();
                identity.last_login = Some(now);
            } else {
                let lockout = &mut identity.lockout;
                lockout.failed_attempts = lockout.failed_attempts.saturating_add(1);
                if lockout.failed_attempts >= self.policy.attempt_limit && !lockout.is_locked(now) {
                    let until = now
                        .checked_add_signed(self.policy.lock_duration)
                        .ok_or_else(|| AuthError::Internal("lock expiry out of range".into()))?;
                    lockout.locked_until = Some(until);
                    newly_locked = true;
                }
            }
            Ok((identity.lockout.clone(), newly_locked))
        })?;

        ctx.record_attempt(Some(id), success, method);
        if !success {
            ctx.security_event(
                SecurityEventKind::FailedLogin,
                Severity::Warning,
                Some(id),
                format!("failed {:?} attempt {}", method, state.failed_attempts),
            );
        }
        if let (true, Some(until)) = (newly_locked, state.locked_until) {
            warn!(identity = id, failed_attempts = state.failed_attempts, %until, "identity locked");
            ctx.security_event(
                SecurityEventKind::AccountLocked,
                Severity::Critical,
                Some(id),
                format!("locked after {} failed attempts until {}", state.failed_attempts, until),
            );
        }

        Ok(state)
    }
}
