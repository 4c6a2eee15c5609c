// tests/integration/api_tests.rs
use std::net::SocketAddr;

use actix_web::{http::StatusCode, test, App};
use biolock::api::{security_headers, types::ErrorResponse};
use serde_json::{json, Value};

use crate::common::*;

fn peer(last: u8) -> SocketAddr {
    SocketAddr::new(origin(last), 40_000)
}

macro_rules! init_app {
    ($ctx:expr) => {{
        let state = $ctx.app.api_state();
        test::init_service(
            App::new()
                .wrap(security_headers())
                .configure(move |cfg| state.configure(cfg)),
        )
        .await
    }};
}

#[actix_rt::test]
async fn test_register_identity() {
    let ctx = TestContext::new();
    let app = init_app!(ctx);

    let req = test::TestRequest::post()
        .uri("/identity")
        .set_json(json!({ "identity_id": "alice", "password": PASSWORD }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["id"], "alice");
    assert!(body.get("credential_hash").is_none());

    let req = test::TestRequest::post()
        .uri("/identity")
        .set_json(json!({ "identity_id": "alice", "password": PASSWORD }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);

    let req = test::TestRequest::post()
        .uri("/identity")
        .set_json(json!({ "identity_id": "bob", "password": "weak" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let error: ErrorResponse = test::read_body_json(resp).await;
    assert!(error.error);
    assert_eq!(error.status_code, 400);
}

#[actix_rt::test]
async fn test_enroll_and_verify_over_http() {
    let ctx = TestContext::new();
    ctx.register("alice");
    let app = init_app!(ctx);

    let req = test::TestRequest::post()
        .uri("/identity/alice/login")
        .peer_addr(peer(1))
        .set_json(json!({ "password": PASSWORD }))
        .to_request();
    let login: Value = test::call_and_read_body_json(&app, req).await;
    let token = login["token"].as_str().unwrap().to_string();
    assert!(login["expires_at"].is_string());

    let req = test::TestRequest::post()
        .uri("/identity/alice/enroll")
        .peer_addr(peer(1))
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .set_payload(two_eyes_png())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["quality"].as_f64().unwrap() >= 0.7);

    let req = test::TestRequest::post()
        .uri("/verify")
        .peer_addr(peer(1))
        .set_payload(two_eyes_png())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["identity_id"], "alice");
    let match_token = body["token"].as_str().unwrap().to_string();

    let req = test::TestRequest::get()
        .uri("/identity/alice/templates")
        .insert_header(("Authorization", format!("Bearer {}", match_token)))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert!(body[0].get("features").is_none());
}

#[actix_rt::test]
async fn test_identity_routes_require_a_session() {
    let ctx = TestContext::new();
    ctx.register("alice");
    ctx.register("mallory");
    let app = init_app!(ctx);
    let foreign = format!("Bearer {}", ctx.token("mallory"));

    for authorization in [None, Some("Bearer not-a-token".to_string()), Some(foreign)] {
        let with_auth = |req: test::TestRequest| match &authorization {
            Some(value) => req.insert_header(("Authorization", value.clone())),
            None => req,
        };

        let req = with_auth(test::TestRequest::post().uri("/identity/alice/enroll").peer_addr(peer(4)))
            .set_payload(two_eyes_png())
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

        let req = with_auth(test::TestRequest::get().uri("/identity/alice")).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

        let req = with_auth(test::TestRequest::get().uri("/identity/alice/templates")).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);
    }
    assert!(ctx.auth().store().template_history("alice").unwrap().is_empty());
}

#[actix_rt::test]
async fn test_enroll_rejections() {
    let ctx = TestContext::new();
    ctx.register("alice");
    let app = init_app!(ctx);
    let bearer = |id: &str| ("Authorization", format!("Bearer {}", ctx.token(id)));

    let req = test::TestRequest::post()
        .uri("/identity/ghost/enroll")
        .set_payload(two_eyes_png())
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::post()
        .uri("/identity/ghost/enroll")
        .insert_header(bearer("ghost"))
        .set_payload(two_eyes_png())
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::post()
        .uri("/identity/alice/enroll")
        .insert_header(bearer("alice"))
        .set_payload(flat_png())
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::UNPROCESSABLE_ENTITY
    );

    let req = test::TestRequest::post()
        .uri("/identity/alice/enroll")
        .insert_header(bearer("alice"))
        .set_payload("garbage")
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
}

#[actix_rt::test]
async fn test_oversized_image_is_refused() {
    let ctx = TestContext::with_config(|config| config.server.max_image_bytes = 64);
    ctx.register("alice");
    let app = init_app!(ctx);

    let req = test::TestRequest::post()
        .uri("/verify")
        .peer_addr(peer(1))
        .set_payload(vec![0u8; 1024])
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[actix_rt::test]
async fn test_login_and_lockout_statuses() {
    let ctx = TestContext::new();
    ctx.register("alice");
    let app = init_app!(ctx);

    let login = |password: &str| {
        test::TestRequest::post()
            .uri("/identity/alice/login")
            .peer_addr(peer(1))
            .set_json(json!({ "password": password }))
            .to_request()
    };

    let resp = test::call_service(&app, login(PASSWORD)).await;
    assert_eq!(resp.status(), StatusCode::OK);

    for _ in 0..5 {
        let resp = test::call_service(&app, login(WRONG_PASSWORD)).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
    let resp = test::call_service(&app, login(PASSWORD)).await;
    assert_eq!(resp.status(), StatusCode::LOCKED);
    let error: ErrorResponse = test::read_body_json(resp).await;
    assert_eq!(error.status_code, 423);

    let req = test::TestRequest::get()
        .uri("/identity/alice")
        .insert_header(("Authorization", format!("Bearer {}", ctx.token("alice"))))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["failed_attempts"], 5);
    assert!(!body["locked_until"].is_null());
}

#[actix_rt::test]
async fn test_rate_limit_status_and_retry_after() {
    let ctx = TestContext::with_config(|config| config.security.rate_limit_max_attempts = 2);
    let app = init_app!(ctx);

    for _ in 0..2 {
        let req = test::TestRequest::post()
            .uri("/verify")
            .peer_addr(peer(9))
            .set_payload("junk")
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    }

    let req = test::TestRequest::post()
        .uri("/verify")
        .peer_addr(peer(9))
        .set_payload("junk")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(resp.headers().get("Retry-After").unwrap(), "3600");
}

#[actix_rt::test]
async fn test_verify_without_match_is_unauthorized() {
    let ctx = TestContext::new();
    let app = init_app!(ctx);

    let req = test::TestRequest::post()
        .uri("/verify")
        .peer_addr(peer(3))
        .set_payload(two_eyes_png())
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);
}

#[actix_rt::test]
async fn test_health_and_security_headers() {
    let ctx = TestContext::new();
    let app = init_app!(ctx);

    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get("X-Content-Type-Options").unwrap(), "nosniff");
    assert_eq!(resp.headers().get("X-Frame-Options").unwrap(), "DENY");

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["enrolled_identities"], 0);
}
