// tests/integration/storage_tests.rs
use std::sync::Arc;

use biolock::core::clock::Clock;
use biolock::core::identity::{EnrollmentResult, LoginResult, VerificationResult};
use biolock::storage::{EncryptedTemplateStore, StorageError, TemplateStore};
use biolock::utils::error::AuthError;
use biolock::Application;
use chrono::Utc;

use crate::common::*;

#[test]
fn test_templates_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir);

    let template_id = {
        let app = Application::new(config.clone()).unwrap();
        let auth = app.authenticator();
        auth.register_identity("alice", PASSWORD).unwrap();
        let token = auth.sessions().issue("alice", Utc::now()).unwrap().token;
        match auth.enroll("alice", &token, &two_eyes_png(), origin(1)).unwrap() {
            EnrollmentResult::Accepted { template_id, .. } => template_id,
            other => panic!("enrollment rejected: {:?}", other),
        }
    };

    let app = Application::new(config).unwrap();
    let active = app.authenticator().store().get_active_template("alice").unwrap().unwrap();
    assert_eq!(active.id, template_id);
    assert!(active.metadata.active);
}

#[test]
fn test_identities_and_lockout_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir);
    let image = two_eyes_png();

    {
        let app = Application::new(config.clone()).unwrap();
        let auth = app.authenticator();
        auth.register_identity("alice", PASSWORD).unwrap();
        let token = auth.sessions().issue("alice", Utc::now()).unwrap().token;
        auth.enroll("alice", &token, &image, origin(1)).unwrap();
        for _ in 0..5 {
            auth.authenticate_password("alice", WRONG_PASSWORD, origin(1)).unwrap();
        }
    }

    let app = Application::new(config).unwrap();
    let auth = app.authenticator();
    let alice = auth.identity("alice").unwrap();
    assert_eq!(alice.lockout.failed_attempts, 5);
    assert!(alice.lockout.is_locked(Utc::now()));

    // Restarting neither forgets the identity nor lifts the lock.
    assert!(matches!(
        auth.authenticate_password("alice", PASSWORD, origin(1)).unwrap(),
        LoginResult::Rejected { reason: AuthError::AccountLocked { .. } }
    ));
    assert!(matches!(
        auth.verify(&image, origin(1)).unwrap(),
        VerificationResult::Rejected { reason: AuthError::AccountLocked { .. } }
    ));
    assert_eq!(
        auth.register_identity("alice", PASSWORD).unwrap_err(),
        AuthError::IdentityExists("alice".into())
    );
}

#[test]
fn test_key_rotation_through_application() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(&dir);

    {
        let app = Application::new(config.clone()).unwrap();
        let store = app.authenticator().store();
        store.replace_active_template("alice", vec![0.5; 32], 0.9, Utc::now()).unwrap();
        store.replace_active_template("bob", vec![0.25; 32], 0.8, Utc::now()).unwrap();
        assert_eq!(app.rotate_encryption_key("rotated-secret").unwrap(), 2);
        assert_eq!(store.get_active_templates().unwrap().len(), 2);
    }

    let stale = EncryptedTemplateStore::open(&config.storage.path, b"integration-secret").unwrap();
    assert!(matches!(stale.active_templates(), Err(StorageError::DecryptionError(_))));
    drop(stale);

    config.storage.encryption_key = "rotated-secret".into();
    let app = Application::new(config).unwrap();
    let alice = app.authenticator().store().get_active_template("alice").unwrap().unwrap();
    assert_eq!(alice.features, vec![0.5; 32]);
}

#[test]
fn test_concurrent_replacements_keep_one_active() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(EncryptedTemplateStore::open(dir.path(), b"secret").unwrap());
    let base = Utc::now();

    std::thread::scope(|scope| {
        for writer in 0..8i64 {
            let store = store.clone();
            scope.spawn(move || {
                let identity = if writer % 2 == 0 { "alice" } else { "bob" };
                store
                    .replace_active(
                        identity,
                        vec![writer as f32; 16],
                        0.9,
                        base + chrono::Duration::milliseconds(writer),
                    )
                    .unwrap();
                // Readers run alongside writers.
                store.active_templates().unwrap();
            });
        }
    });

    for identity in ["alice", "bob"] {
        let history = store.history(identity).unwrap();
        assert_eq!(history.len(), 4);
        assert_eq!(history.iter().filter(|t| t.metadata.active).count(), 1);
    }
    assert_eq!(store.active_templates().unwrap().len(), 2);
}

#[test]
fn test_enrollment_timestamp_comes_from_clock() {
    let ctx = TestContext::new();
    ctx.register("alice");
    ctx.enroll("alice", &two_eyes_png());

    let template = ctx.auth().store().get_active_template("alice").unwrap().unwrap();
    assert_eq!(template.metadata.captured_at, ctx.clock.now());
    assert_eq!(template.metadata.algorithm_version, "iris-gabor-v1");
}
