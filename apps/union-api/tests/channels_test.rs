mod common;

use axum::http::header::AUTHORIZATION;
use axum::http::StatusCode;
use axum_test::TestServer;

// ---------------------------------------------------------------------------
// POST /api/unions/:union_id/channels
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_channel_succeeds_for_member() {
    let (app, state, keys) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let user_id = unionvote_common::id::prefixed_ulid("usr");
    let token = common::login_test_user(&server, &keys, &state.config, &user_id, "ch_maker").await;
    let union_id = common::create_test_union(&server, &token, "Channel Union").await;

    let resp = server
        .post(&format!("/api/unions/{union_id}/channels"))
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .json(&serde_json::json!({
            "name": "Strategy",
            "description": "Campaign planning",
            "kind": "voice",
        }))
        .await;
    resp.assert_status(StatusCode::CREATED);
    let channel: serde_json::Value = resp.json();
    assert_eq!(channel["union_id"], union_id);
    assert_eq!(channel["creator_id"], user_id);
    assert_eq!(channel["kind"], 1);
    assert!(channel["id"].as_str().unwrap().starts_with("ch_"));
}

#[tokio::test]
async fn create_channel_defaults_to_text() {
    let (app, state, keys) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let user_id = unionvote_common::id::prefixed_ulid("usr");
    let token = common::login_test_user(&server, &keys, &state.config, &user_id, "ch_text").await;
    let union_id = common::create_test_union(&server, &token, "Text Union").await;

    let resp = server
        .post(&format!("/api/unions/{union_id}/channels"))
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .json(&serde_json::json!({ "name": "announcements" }))
        .await;
    resp.assert_status(StatusCode::CREATED);
    let channel: serde_json::Value = resp.json();
    assert_eq!(channel["kind"], 0);
}

#[tokio::test]
async fn create_channel_requires_membership() {
    let (app, state, keys) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let owner_id = unionvote_common::id::prefixed_ulid("usr");
    let owner_token =
        common::login_test_user(&server, &keys, &state.config, &owner_id, "ch_owner").await;
    let union_id = common::create_test_union(&server, &owner_token, "Closed Union").await;

    let outsider_id = unionvote_common::id::prefixed_ulid("usr");
    let outsider_token =
        common::login_test_user(&server, &keys, &state.config, &outsider_id, "ch_out").await;

    let resp = server
        .post(&format!("/api/unions/{union_id}/channels"))
        .add_header(AUTHORIZATION, format!("Bearer {outsider_token}"))
        .json(&serde_json::json!({ "name": "intruders" }))
        .await;
    resp.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn create_channel_validates_name() {
    let (app, state, keys) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let user_id = unionvote_common::id::prefixed_ulid("usr");
    let token = common::login_test_user(&server, &keys, &state.config, &user_id, "ch_val").await;
    let union_id = common::create_test_union(&server, &token, "Valid Union").await;

    let resp = server
        .post(&format!("/api/unions/{union_id}/channels"))
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .json(&serde_json::json!({ "name": "" }))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);

    let long_name = "x".repeat(101);
    let resp = server
        .post(&format!("/api/unions/{union_id}/channels"))
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .json(&serde_json::json!({ "name": long_name }))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// GET /api/unions/:union_id/channels
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_channels_is_public() {
    let (app, state, keys) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let user_id = unionvote_common::id::prefixed_ulid("usr");
    let token = common::login_test_user(&server, &keys, &state.config, &user_id, "ch_list").await;
    let union_id = common::create_test_union(&server, &token, "Public Union").await;
    common::create_test_channel(&server, &token, &union_id, "media", "video").await;

    // No auth header.
    let resp = server.get(&format!("/api/unions/{union_id}/channels")).await;
    resp.assert_status_ok();
    let channels: Vec<serde_json::Value> = resp.json();
    assert_eq!(channels.len(), 2); // general + media
}

// ---------------------------------------------------------------------------
// DELETE /api/channels/:id
// ---------------------------------------------------------------------------

#[tokio::test]
async fn delete_channel_allowed_for_creator() {
    let (app, state, keys) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let user_id = unionvote_common::id::prefixed_ulid("usr");
    let token = common::login_test_user(&server, &keys, &state.config, &user_id, "ch_del").await;
    let union_id = common::create_test_union(&server, &token, "Delete Union").await;
    let channel_id =
        common::create_test_channel(&server, &token, &union_id, "doomed", "text").await;

    let resp = server
        .delete(&format!("/api/channels/{channel_id}"))
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .await;
    resp.assert_status(StatusCode::NO_CONTENT);

    let gone = server.get(&format!("/api/channels/{channel_id}")).await;
    gone.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_channel_removes_home_posts() {
    let (app, state, keys) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let user_id = unionvote_common::id::prefixed_ulid("usr");
    let token = common::login_test_user(&server, &keys, &state.config, &user_id, "ch_casc").await;
    let union_id = common::create_test_union(&server, &token, "Cascade Union").await;
    let channel_id =
        common::create_test_channel(&server, &token, &union_id, "ephemeral", "text").await;
    let post_id = common::create_test_post(&server, &token, &channel_id).await;

    server
        .delete(&format!("/api/channels/{channel_id}"))
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let gone = server.get(&format!("/api/posts/{post_id}")).await;
    gone.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_channel_forbidden_for_plain_member() {
    let (app, state, keys) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let owner_id = unionvote_common::id::prefixed_ulid("usr");
    let owner_token =
        common::login_test_user(&server, &keys, &state.config, &owner_id, "ch_own2").await;
    let union_id = common::create_test_union(&server, &owner_token, "Guard Union").await;
    let channel_id =
        common::create_test_channel(&server, &owner_token, &union_id, "guarded", "text").await;

    let member_id = unionvote_common::id::prefixed_ulid("usr");
    let member_token = common::join_second_user(
        &server,
        &keys,
        &state.config,
        &union_id,
        &member_id,
        "ch_member",
    )
    .await;

    let resp = server
        .delete(&format!("/api/channels/{channel_id}"))
        .add_header(AUTHORIZATION, format!("Bearer {member_token}"))
        .await;
    resp.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn delete_channel_allowed_for_union_owner() {
    let (app, state, keys) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let owner_id = unionvote_common::id::prefixed_ulid("usr");
    let owner_token =
        common::login_test_user(&server, &keys, &state.config, &owner_id, "ch_own3").await;
    let union_id = common::create_test_union(&server, &owner_token, "Moderated Union").await;

    let member_id = unionvote_common::id::prefixed_ulid("usr");
    let member_token = common::join_second_user(
        &server,
        &keys,
        &state.config,
        &union_id,
        &member_id,
        "ch_member2",
    )
    .await;
    let channel_id =
        common::create_test_channel(&server, &member_token, &union_id, "member-made", "text")
            .await;

    // The union owner may delete a channel they did not create.
    let resp = server
        .delete(&format!("/api/channels/{channel_id}"))
        .add_header(AUTHORIZATION, format!("Bearer {owner_token}"))
        .await;
    resp.assert_status(StatusCode::NO_CONTENT);
}
