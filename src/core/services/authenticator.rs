// src/core/services/authenticator.rs
use std::net::IpAddr;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::{
    core::{
        clock::Clock,
        identity::{
            biometric::{BiometricProcessor, BiometricSample},
            matcher::Matcher,
            types::{EnrollmentResult, Identity, LockoutState, LoginResult, VerificationResult},
        },
        security::{
            audit::{AuditSink, AuthMethod, SecurityEventKind, Severity},
            context::RequestContext,
            credentials::{CredentialHasher, PasswordPolicy, Pbkdf2Hasher},
            lockout::{AttemptPolicy, IdentityRegistry, LockoutPolicy},
            rate_limit::{RateLimitConfig, RateLimiter},
            session::SessionIssuer,
        },
    },
    storage::types::{IdentityStore, TemplateStore},
    utils::{
        config::Config,
        error::{AuthError, Result},
    },
};

/// Failures that abort the call instead of becoming a rejected outcome.
fn is_fatal(err: &AuthError) -> bool {
    matches!(
        err,
        AuthError::StoreUnavailable(_) | AuthError::Internal(_) | AuthError::Config(_)
    )
}

/// Enrollment and verification flows over the biometric pipeline, gated by
/// per-origin rate limiting and per-identity lockout. Successful logins and
/// matches issue a session; enrollment requires one.
pub struct IrisAuthenticator {
    processor: Arc<BiometricProcessor>,
    store: Arc<dyn TemplateStore>,
    matcher: Matcher,
    attempts: AttemptPolicy,
    rate_limiter: RateLimiter,
    sessions: SessionIssuer,
    hasher: Arc<dyn CredentialHasher>,
    password_policy: PasswordPolicy,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
    quality_threshold: f64,
}

impl IrisAuthenticator {
    pub fn new(
        config: &Config,
        processor: Arc<BiometricProcessor>,
        store: Arc<dyn TemplateStore>,
        audit: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let hasher = Arc::new(Pbkdf2Hasher::new(config.security.credential_iterations)?);
        Ok(Self {
            processor,
            store,
            matcher: Matcher::from_config(&config.biometric),
            attempts: AttemptPolicy::new(
                LockoutPolicy::from_config(&config.security)?,
                Arc::new(IdentityRegistry::new()),
            ),
            rate_limiter: RateLimiter::new(RateLimitConfig::from_config(&config.security)?),
            sessions: SessionIssuer::from_config(config)?,
            hasher,
            password_policy: PasswordPolicy { min_length: config.security.min_password_length },
            audit,
            clock,
            quality_threshold: config.biometric.quality_threshold,
        })
    }

    pub fn with_hasher(mut self, hasher: Arc<dyn CredentialHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    /// Keeps identities and their lockout state in `store`, loading what it
    /// already holds.
    pub fn with_identity_store(mut self, store: Arc<dyn IdentityStore>) -> Result<Self> {
        let registry = IdentityRegistry::load(store)?;
        self.attempts = AttemptPolicy::new(self.attempts.policy(), Arc::new(registry));
        Ok(self)
    }

    fn context(&self, origin: Option<IpAddr>) -> RequestContext {
        RequestContext::new(origin, self.audit.clone(), self.clock.clone())
    }

    pub fn registry(&self) -> &Arc<IdentityRegistry> {
        self.attempts.registry()
    }

    pub fn store(&self) -> &Arc<dyn TemplateStore> {
        &self.store
    }

    pub fn sessions(&self) -> &SessionIssuer {
        &self.sessions
    }

    /// Checks that `token` is a live session of `identity_id`.
    pub fn authorize(&self, identity_id: &str, token: &str) -> Result<()> {
        self.sessions.authorize(token, identity_id, self.clock.now()).map_err(|err| {
            warn!(identity = identity_id, error = %err, "session rejected");
            err
        })
    }

    pub fn identity(&self, id: &str) -> Option<Identity> {
        self.registry().get(id)
    }

    pub fn register_identity(&self, id: &str, password: &str) -> Result<Identity> {
        self.password_policy.validate(password)?;
        if self.registry().contains(id) {
            return Err(AuthError::IdentityExists(id.to_string()));
        }

        let identity = Identity {
            id: id.to_string(),
            credential_hash: self.hasher.hash(password)?,
            lockout: LockoutState::default(),
            created_at: self.clock.now(),
            last_login: None,
        };
        self.registry().register(identity.clone())?;

        info!(identity = id, "identity registered");
        Ok(identity)
    }

    /// Runs the pipeline and turns a failed attempt into a rejected outcome.
    /// Technical failures are logged here and never audited.
    fn run_pipeline(&self, ctx: &RequestContext, image: &[u8]) -> Result<std::result::Result<BiometricSample, AuthError>> {
        match self.processor.process(image) {
            Ok(sample) => Ok(Ok(sample)),
            Err(err) if is_fatal(&err) => {
                error!(request_id = %ctx.request_id, error = %err, "biometric pipeline failed");
                Err(err)
            }
            Err(err) => {
                if err.is_technical() {
                    error!(request_id = %ctx.request_id, error = %err, "rejected unusable image");
                }
                Ok(Err(err))
            }
        }
    }

    /// Replaces the identity's active template. The caller must present a
    /// session issued to that identity.
    pub fn enroll(
        &self,
        identity_id: &str,
        session_token: &str,
        image: &[u8],
        origin: IpAddr,
    ) -> Result<EnrollmentResult> {
        let ctx = self.context(Some(origin));
        let span = ctx.span("enroll");
        let _enter = span.enter();

        if let Err(reason) = self.rate_limiter.check(&ctx, origin) {
            return Ok(EnrollmentResult::Rejected { reason });
        }

        if let Err(reason) = self.sessions.authorize(session_token, identity_id, ctx.now()) {
            warn!(identity = identity_id, error = %reason, "enrollment without a valid session");
            ctx.security_event(
                SecurityEventKind::EnrollmentRejected,
                Severity::Warning,
                Some(identity_id),
                reason.to_string(),
            );
            return Ok(EnrollmentResult::Rejected { reason });
        }

        match self.attempts.check(&ctx, identity_id, AuthMethod::Biometric) {
            Ok(()) => {}
            Err(reason @ AuthError::AccountLocked { .. }) => {
                return Ok(EnrollmentResult::Rejected { reason });
            }
            Err(err) => return Err(err),
        }

        let sample = match self.run_pipeline(&ctx, image)? {
            Ok(sample) => sample,
            Err(reason) => {
                if !reason.is_technical() {
                    ctx.security_event(
                        SecurityEventKind::EnrollmentRejected,
                        Severity::Info,
                        Some(identity_id),
                        reason.to_string(),
                    );
                }
                return Ok(EnrollmentResult::Rejected { reason });
            }
        };

        if sample.quality < self.quality_threshold {
            let reason = AuthError::LowQuality { score: sample.quality, threshold: self.quality_threshold };
            warn!(identity = identity_id, quality = sample.quality, "enrollment below quality gate");
            ctx.security_event(
                SecurityEventKind::EnrollmentRejected,
                Severity::Info,
                Some(identity_id),
                reason.to_string(),
            );
            return Ok(EnrollmentResult::Rejected { reason });
        }

        let template = self
            .store
            .replace_active_template(identity_id, sample.features, sample.quality, ctx.now())
            .map_err(|err| {
                error!(identity = identity_id, error = %err, "failed to store template");
                err
            })?;

        ctx.security_event(
            SecurityEventKind::TemplateReplaced,
            Severity::Info,
            Some(identity_id),
            format!("template {} is now active", template.id),
        );
        info!(identity = identity_id, template = %template.id, quality = sample.quality, "enrollment accepted");

        Ok(EnrollmentResult::Accepted { template_id: template.id, quality: sample.quality })
    }

    /// 1:N verification: finds which enrolled identity the image belongs to.
    pub fn verify(&self, image: &[u8], origin: IpAddr) -> Result<VerificationResult> {
        let ctx = self.context(Some(origin));
        let span = ctx.span("verify");
        let _enter = span.enter();

        if let Err(reason) = self.rate_limiter.check(&ctx, origin) {
            return Ok(VerificationResult::Rejected { reason });
        }

        let sample = match self.run_pipeline(&ctx, image)? {
            Ok(sample) => sample,
            Err(reason) => {
                if !reason.is_technical() {
                    ctx.record_attempt(None, false, AuthMethod::Biometric);
                    ctx.security_event(
                        SecurityEventKind::FailedLogin,
                        Severity::Warning,
                        None,
                        reason.to_string(),
                    );
                }
                return Ok(VerificationResult::Rejected { reason });
            }
        };

        let templates = self.store.get_active_templates().map_err(|err| {
            error!(error = %err, "failed to read active templates");
            err
        })?;

        let Some(candidate) = self.matcher.find_match(&sample.features, &templates) else {
            ctx.record_attempt(None, false, AuthMethod::Biometric);
            ctx.security_event(
                SecurityEventKind::FailedLogin,
                Severity::Warning,
                None,
                format!("no template among {} cleared the threshold", templates.len()),
            );
            return Ok(VerificationResult::NoMatch);
        };

        if let Err(reason) = self.attempts.check(&ctx, &candidate.identity_id, AuthMethod::Biometric) {
            if is_fatal(&reason) {
                return Err(reason);
            }
            if let AuthError::UnknownIdentity(_) = reason {
                warn!(identity = %candidate.identity_id, "template matched an unregistered identity");
                ctx.record_attempt(Some(&candidate.identity_id), false, AuthMethod::Biometric);
            }
            return Ok(VerificationResult::Rejected { reason });
        }

        self.attempts.record(&ctx, &candidate.identity_id, true, AuthMethod::Biometric)?;
        let session = self.sessions.issue(&candidate.identity_id, ctx.now())?;
        info!(identity = %candidate.identity_id, score = candidate.score, "verified");
        Ok(VerificationResult::Matched {
            identity_id: candidate.identity_id,
            score: candidate.score,
            session,
        })
    }

    /// 1:1 verification against the claimed identity's active template.
    pub fn verify_identity(&self, identity_id: &str, image: &[u8], origin: IpAddr) -> Result<VerificationResult> {
        let ctx = self.context(Some(origin));
        let span = ctx.span("verify_identity");
        let _enter = span.enter();

        if let Err(reason) = self.rate_limiter.check(&ctx, origin) {
            return Ok(VerificationResult::Rejected { reason });
        }
        match self.attempts.check(&ctx, identity_id, AuthMethod::Biometric) {
            Ok(()) => {}
            Err(reason @ AuthError::AccountLocked { .. }) => {
                return Ok(VerificationResult::Rejected { reason });
            }
            Err(err) => return Err(err),
        }

        let sample = match self.run_pipeline(&ctx, image)? {
            Ok(sample) => sample,
            Err(reason) => {
                if reason.is_biometric_failure() {
                    self.attempts.record(&ctx, identity_id, false, AuthMethod::Biometric)?;
                }
                return Ok(VerificationResult::Rejected { reason });
            }
        };

        let score = self
            .store
            .get_active_template(identity_id)?
            .and_then(|template| self.matcher.compare(&sample.features, &template));

        match score {
            Some(score) => {
                self.attempts.record(&ctx, identity_id, true, AuthMethod::Biometric)?;
                let session = self.sessions.issue(identity_id, ctx.now())?;
                info!(identity = identity_id, score, "claimed identity verified");
                Ok(VerificationResult::Matched { identity_id: identity_id.to_string(), score, session })
            }
            None => {
                self.attempts.record(&ctx, identity_id, false, AuthMethod::Biometric)?;
                Ok(VerificationResult::NoMatch)
            }
        }
    }

    pub fn authenticate_password(&self, identity_id: &str, password: &str, origin: IpAddr) -> Result<LoginResult> {
        let ctx = self.context(Some(origin));
        let span = ctx.span("authenticate_password");
        let _enter = span.enter();

        if let Err(reason) = self.rate_limiter.check(&ctx, origin) {
            return Ok(LoginResult::Rejected { reason });
        }

        match self.attempts.check(&ctx, identity_id, AuthMethod::Password) {
            Ok(()) => {}
            Err(reason @ AuthError::AccountLocked { .. }) => return Ok(LoginResult::Rejected { reason }),
            Err(AuthError::UnknownIdentity(_)) => {
                // Same answer as a wrong password.
                ctx.record_attempt(Some(identity_id), false, AuthMethod::Password);
                ctx.security_event(
                    SecurityEventKind::FailedLogin,
                    Severity::Warning,
                    Some(identity_id),
                    "login for unknown identity",
                );
                return Ok(LoginResult::InvalidCredentials);
            }
            Err(err) => return Err(err),
        }

        let hash = self
            .identity(identity_id)
            .map(|identity| identity.credential_hash)
            .ok_or_else(|| AuthError::UnknownIdentity(identity_id.to_string()))?;

        if self.hasher.verify(password, &hash) {
            self.attempts.record(&ctx, identity_id, true, AuthMethod::Password)?;
            let session = self.sessions.issue(identity_id, ctx.now())?;
            info!(identity = identity_id, "password login");
            Ok(LoginResult::Authenticated { identity_id: identity_id.to_string(), session })
        } else {
            self.attempts.record(&ctx, identity_id, false, AuthMethod::Password)?;
            Ok(LoginResult::InvalidCredentials)
        }
    }
}
