// tests/integration/lockout_tests.rs
use biolock::core::clock::Clock;
use biolock::core::identity::{LoginResult, VerificationResult};
use biolock::core::security::SecurityEventKind;
use biolock::utils::error::AuthError;

use crate::common::*;

#[test]
fn test_biometric_failures_lock_claimed_identity() {
    let ctx = TestContext::new();
    ctx.register("alice");
    let image = two_eyes_png();
    let negated = features_of(&image).into_iter().map(|v| -v).collect();
    ctx.auth()
        .store()
        .replace_active_template("alice", negated, 0.9, ctx.clock.now())
        .unwrap();

    for _ in 0..5 {
        assert_eq!(
            ctx.auth().verify_identity("alice", &image, origin(1)).unwrap(),
            VerificationResult::NoMatch
        );
    }

    let sixth = ctx.auth().verify_identity("alice", &image, origin(1)).unwrap();
    match sixth {
        VerificationResult::Rejected { reason: AuthError::AccountLocked { locked_until } } => {
            assert_eq!(locked_until, ctx.clock.now() + chrono::Duration::minutes(30));
        }
        other => panic!("expected lockout, got {:?}", other),
    }

    assert_eq!(ctx.audit().events_of(SecurityEventKind::AccountLocked).len(), 1);
    assert_eq!(ctx.audit().events_of(SecurityEventKind::LockedAccountAccess).len(), 1);
    assert_eq!(ctx.auth().identity("alice").unwrap().lockout.failed_attempts, 5);
}

#[test]
fn test_lock_expires_after_duration() {
    let ctx = TestContext::new();
    ctx.register("alice");
    for _ in 0..5 {
        ctx.auth().authenticate_password("alice", WRONG_PASSWORD, origin(1)).unwrap();
    }

    ctx.clock.advance(chrono::Duration::minutes(29));
    assert!(matches!(
        ctx.auth().authenticate_password("alice", PASSWORD, origin(1)).unwrap(),
        LoginResult::Rejected { reason: AuthError::AccountLocked { .. } }
    ));

    ctx.clock.advance(chrono::Duration::minutes(1));
    assert!(matches!(
        ctx.auth().authenticate_password("alice", PASSWORD, origin(1)).unwrap(),
        LoginResult::Authenticated { ref identity_id, .. } if identity_id == "alice"
    ));

    let identity = ctx.auth().identity("alice").unwrap();
    assert_eq!(identity.lockout.failed_attempts, 0);
    assert_eq!(identity.last_login, Some(ctx.clock.now()));
}

#[test]
fn test_failure_after_expiry_relocks() {
    let ctx = TestContext::new();
    ctx.register("alice");
    for _ in 0..5 {
        ctx.auth().authenticate_password("alice", WRONG_PASSWORD, origin(1)).unwrap();
    }
    ctx.clock.advance(chrono::Duration::minutes(31));

    assert_eq!(
        ctx.auth().authenticate_password("alice", WRONG_PASSWORD, origin(1)).unwrap(),
        LoginResult::InvalidCredentials
    );
    let identity = ctx.auth().identity("alice").unwrap();
    assert_eq!(identity.lockout.failed_attempts, 6);
    assert!(identity.lockout.is_locked(ctx.clock.now()));
}

#[test]
fn test_concurrent_failures_are_all_counted() {
    let ctx = TestContext::with_config(|config| {
        config.security.lockout_attempt_limit = 1_000;
        config.security.rate_limit_max_attempts = 1_000;
    });
    ctx.register("alice");

    std::thread::scope(|scope| {
        for thread in 0..8u8 {
            let ctx = &ctx;
            scope.spawn(move || {
                for _ in 0..5 {
                    ctx.auth()
                        .authenticate_password("alice", WRONG_PASSWORD, origin(thread))
                        .unwrap();
                }
            });
        }
    });

    assert_eq!(ctx.auth().identity("alice").unwrap().lockout.failed_attempts, 40);
    assert_eq!(ctx.audit().attempts().len(), 40);
}

#[test]
fn test_rate_limit_gates_each_origin() {
    let ctx = TestContext::with_config(|config| {
        config.security.rate_limit_max_attempts = 5;
        config.security.lockout_attempt_limit = 100;
    });
    ctx.register("alice");

    for _ in 0..5 {
        ctx.auth().authenticate_password("alice", WRONG_PASSWORD, origin(1)).unwrap();
    }
    assert_eq!(
        ctx.auth().authenticate_password("alice", PASSWORD, origin(1)).unwrap(),
        LoginResult::Rejected { reason: AuthError::RateLimited { retry_after_secs: 3600 } }
    );
    // The rejected request never reached the identity.
    assert_eq!(ctx.auth().identity("alice").unwrap().lockout.failed_attempts, 5);

    assert!(matches!(
        ctx.auth().authenticate_password("alice", PASSWORD, origin(2)).unwrap(),
        LoginResult::Authenticated { .. }
    ));

    ctx.clock.advance(chrono::Duration::seconds(3600));
    assert!(matches!(
        ctx.auth().authenticate_password("alice", PASSWORD, origin(1)).unwrap(),
        LoginResult::Authenticated { .. }
    ));
}

#[test]
fn test_rate_limit_preempts_lockout() {
    let ctx = TestContext::with_config(|config| config.security.rate_limit_max_attempts = 5);
    ctx.register("alice");
    for _ in 0..5 {
        ctx.auth().authenticate_password("alice", WRONG_PASSWORD, origin(1)).unwrap();
    }

    // Locked and rate limited at once: the rate limit answers first.
    assert!(matches!(
        ctx.auth().verify_identity("alice", &two_eyes_png(), origin(1)).unwrap(),
        VerificationResult::Rejected { reason: AuthError::RateLimited { .. } }
    ));
    assert!(matches!(
        ctx.auth().verify_identity("alice", &two_eyes_png(), origin(2)).unwrap(),
        VerificationResult::Rejected { reason: AuthError::AccountLocked { .. } }
    ));
}
