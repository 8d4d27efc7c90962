mod common;

use axum::http::header::AUTHORIZATION;
use axum::http::StatusCode;
use axum_test::TestServer;

// ---------------------------------------------------------------------------
// POST /api/auth/login
// ---------------------------------------------------------------------------

#[tokio::test]
async fn login_returns_tokens_and_user() {
    let (app, state, keys) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let user_id = unionvote_common::id::prefixed_ulid("usr");
    let token = common::mint_identity_token(
        &keys,
        &state.config.identity_url,
        &user_id,
        &state.config.service_id,
        "organizer1",
    );

    let resp = server
        .post("/api/auth/login")
        .json(&serde_json::json!({ "identity_token": token }))
        .await;

    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    assert!(body["access_token"].as_str().unwrap().starts_with("uvat_"));
    assert!(body["refresh_token"].as_str().unwrap().starts_with("uvrt_"));
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["user"]["id"], user_id);
    assert_eq!(body["user"]["username"], "organizer1");
}

#[tokio::test]
async fn login_rejects_expired_token() {
    let (app, state, keys) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let user_id = unionvote_common::id::prefixed_ulid("usr");
    let token = common::mint_expired_identity_token(
        &keys,
        &state.config.identity_url,
        &user_id,
        &state.config.service_id,
    );

    let resp = server
        .post("/api/auth/login")
        .json(&serde_json::json!({ "identity_token": token }))
        .await;

    resp.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_rejects_wrong_audience() {
    let (app, state, keys) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let user_id = unionvote_common::id::prefixed_ulid("usr");
    let token = common::mint_identity_token(
        &keys,
        &state.config.identity_url,
        &user_id,
        "svc_other_service",
        "organizer2",
    );

    let resp = server
        .post("/api/auth/login")
        .json(&serde_json::json!({ "identity_token": token }))
        .await;

    resp.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_rejects_replayed_token() {
    let (app, state, keys) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let user_id = unionvote_common::id::prefixed_ulid("usr");
    let token = common::mint_identity_token(
        &keys,
        &state.config.identity_url,
        &user_id,
        &state.config.service_id,
        "organizer3",
    );

    let first = server
        .post("/api/auth/login")
        .json(&serde_json::json!({ "identity_token": token }))
        .await;
    first.assert_status_ok();

    // Same jti a second time.
    let second = server
        .post("/api/auth/login")
        .json(&serde_json::json!({ "identity_token": token }))
        .await;
    second.assert_status(StatusCode::UNAUTHORIZED);
}

// ---------------------------------------------------------------------------
// POST /api/auth/refresh
// ---------------------------------------------------------------------------

#[tokio::test]
async fn refresh_rotates_tokens() {
    let (app, state, keys) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let user_id = unionvote_common::id::prefixed_ulid("usr");
    let token = common::mint_identity_token(
        &keys,
        &state.config.identity_url,
        &user_id,
        &state.config.service_id,
        "organizer4",
    );
    let login: serde_json::Value = server
        .post("/api/auth/login")
        .json(&serde_json::json!({ "identity_token": token }))
        .await
        .json();
    let refresh_token = login["refresh_token"].as_str().unwrap();

    let resp = server
        .post("/api/auth/refresh")
        .json(&serde_json::json!({ "refresh_token": refresh_token }))
        .await;
    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    assert_ne!(body["access_token"], login["access_token"]);

    // Refresh tokens are single-use.
    let replay = server
        .post("/api/auth/refresh")
        .json(&serde_json::json!({ "refresh_token": refresh_token }))
        .await;
    replay.assert_status(StatusCode::UNAUTHORIZED);

    // The new access token works on a protected route.
    let new_access = body["access_token"].as_str().unwrap();
    let create = server
        .post("/api/unions")
        .add_header(AUTHORIZATION, format!("Bearer {new_access}"))
        .json(&serde_json::json!({ "name": "Refreshed Union" }))
        .await;
    create.assert_status(StatusCode::CREATED);
}

// ---------------------------------------------------------------------------
// Protected routes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn protected_route_requires_bearer_token() {
    let (app, _state, _keys) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let resp = server
        .post("/api/unions")
        .json(&serde_json::json!({ "name": "No Auth Union" }))
        .await;
    resp.assert_status(StatusCode::UNAUTHORIZED);

    let resp = server
        .post("/api/unions")
        .add_header(AUTHORIZATION, "Bearer uvat_bogus")
        .json(&serde_json::json!({ "name": "Bad Token Union" }))
        .await;
    resp.assert_status(StatusCode::UNAUTHORIZED);
}
