// tests/integration/identity_tests.rs
use std::sync::Arc;

use biolock::core::clock::Clock;
use biolock::core::identity::{cosine_similarity, EnrollmentResult, VerificationResult};
use biolock::core::security::SecurityEventKind;
use biolock::utils::{config::MatchPolicyKind, error::AuthError};

use crate::common::*;

#[test_log::test]
fn test_enroll_then_verify_matches() {
    let ctx = TestContext::new();
    ctx.register("alice");
    let image = two_eyes_png();

    let enrolled = ctx.enroll("alice", &image);
    assert!(matches!(enrolled, EnrollmentResult::Accepted { quality, .. } if quality >= 0.7));

    match ctx.auth().verify(&image, origin(1)).unwrap() {
        VerificationResult::Matched { identity_id, score, session } => {
            assert_eq!(identity_id, "alice");
            assert!(score >= 0.8);
            ctx.auth().authorize("alice", &session.token).unwrap();
        }
        other => panic!("expected a match, got {:?}", other),
    }

    let claimed = ctx.auth().verify_identity("alice", &image, origin(1)).unwrap();
    assert!(matches!(claimed, VerificationResult::Matched { .. }));

    let successes = ctx.audit().attempts().iter().filter(|a| a.success).count();
    assert_eq!(successes, 2);
}

#[test]
fn test_no_iris_never_scans_store() {
    let store = Arc::new(ScanCountingStore::default());
    let (auth, audit) = authenticator_with(store.clone());

    let result = auth.verify(&flat_png(), origin(1)).unwrap();
    assert_eq!(result, VerificationResult::Rejected { reason: AuthError::NoIrisDetected });
    assert_eq!(store.scans(), 0);
    assert_eq!(audit.events_of(SecurityEventKind::FailedLogin).len(), 1);

    auth.verify(&two_eyes_png(), origin(1)).unwrap();
    assert_eq!(store.scans(), 1);
}

#[test]
fn test_reenroll_replaces_the_matching_template() {
    let first = two_eyes_png();
    let second = two_eyes_png_with_radius(26.0);
    let similarity = cosine_similarity(&features_of(&first), &features_of(&second));
    assert!(similarity < 0.999, "captures are too alike: {}", similarity);

    // Each capture matches itself but not the other one.
    let ctx = TestContext::with_config(|config| {
        config.biometric.match_threshold = (similarity + 1.0) / 2.0;
        config.biometric.quality_threshold = 0.0;
    });
    ctx.register("alice");

    assert!(matches!(ctx.enroll("alice", &first), EnrollmentResult::Accepted { .. }));
    assert!(matches!(
        ctx.auth().verify(&first, origin(1)).unwrap(),
        VerificationResult::Matched { ref identity_id, .. } if identity_id == "alice"
    ));

    ctx.clock.advance(chrono::Duration::seconds(10));
    let replacement = match ctx.enroll("alice", &second) {
        EnrollmentResult::Accepted { template_id, .. } => template_id,
        other => panic!("re-enrollment rejected: {:?}", other),
    };

    let history = ctx.auth().store().template_history("alice").unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history.iter().filter(|t| t.metadata.active).count(), 1);
    assert_eq!(history[1].id, replacement);
    let active = ctx.auth().store().get_active_templates().unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, replacement);

    assert_eq!(ctx.auth().verify(&first, origin(1)).unwrap(), VerificationResult::NoMatch);
    match ctx.auth().verify(&second, origin(1)).unwrap() {
        VerificationResult::Matched { identity_id, score, .. } => {
            assert_eq!(identity_id, "alice");
            assert!(score > similarity);
        }
        other => panic!("expected the new template to match, got {:?}", other),
    }
}

#[test]
fn test_opposite_template_does_not_match() {
    let ctx = TestContext::new();
    ctx.register("bob");
    let negated = features_of(&two_eyes_png()).into_iter().map(|v| -v).collect();
    ctx.auth()
        .store()
        .replace_active_template("bob", negated, 0.9, ctx.clock.now())
        .unwrap();

    let result = ctx.auth().verify(&two_eyes_png(), origin(1)).unwrap();
    assert_eq!(result, VerificationResult::NoMatch);

    let attempts = ctx.audit().attempts();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].identity_id, None);
    assert!(!attempts[0].success);
}

#[test]
fn test_best_match_rejects_ambiguous_identities() {
    let ctx = TestContext::with_config(|config| {
        config.biometric.match_policy = MatchPolicyKind::Best;
        config.biometric.best_match_margin = 0.05;
    });
    ctx.register("alice");
    ctx.register("bob");
    let image = two_eyes_png();
    ctx.enroll("alice", &image);
    ctx.enroll("bob", &image);

    assert_eq!(ctx.auth().verify(&image, origin(1)).unwrap(), VerificationResult::NoMatch);
}

#[test]
fn test_first_match_takes_first_candidate() {
    let ctx = TestContext::new();
    ctx.register("alice");
    ctx.register("bob");
    let image = two_eyes_png();
    ctx.enroll("bob", &image);
    ctx.enroll("alice", &image);

    // The active index is ordered by hex-encoded identity, not by enrollment.
    let order: Vec<String> = ctx
        .auth()
        .store()
        .get_active_templates()
        .unwrap()
        .into_iter()
        .map(|t| t.identity_id)
        .collect();
    assert_eq!(order, ["alice", "bob"]);

    match ctx.auth().verify(&image, origin(1)).unwrap() {
        VerificationResult::Matched { identity_id, session, .. } => {
            assert_eq!(identity_id, "alice");
            assert_eq!(session.identity_id, "alice");
        }
        other => panic!("expected a match, got {:?}", other),
    }
    assert_eq!(ctx.auth().identity("alice").unwrap().last_login, Some(ctx.clock.now()));
    assert_eq!(ctx.auth().identity("bob").unwrap().last_login, None);
}

#[test]
fn test_invalid_image_is_rejected_without_audit() {
    let ctx = TestContext::new();
    ctx.register("alice");

    let result = ctx.enroll("alice", b"definitely not a png");
    assert!(matches!(
        result,
        EnrollmentResult::Rejected { reason: AuthError::InvalidImage(_) }
    ));
    assert!(ctx.audit().records().is_empty());
}

#[test]
fn test_enroll_without_a_session_is_refused() {
    let ctx = TestContext::new();
    ctx.register("alice");
    ctx.register("mallory");
    let image = two_eyes_png();

    for token in [String::new(), ctx.token("mallory")] {
        let result = ctx.auth().enroll("alice", &token, &image, origin(7)).unwrap();
        assert!(matches!(
            result,
            EnrollmentResult::Rejected { reason: AuthError::InvalidSession(_) }
        ));
    }
    assert!(ctx.auth().store().template_history("alice").unwrap().is_empty());
    assert_eq!(ctx.audit().events_of(SecurityEventKind::EnrollmentRejected).len(), 2);
}
