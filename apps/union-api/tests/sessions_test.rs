mod common;

use axum::http::header::AUTHORIZATION;
use axum::http::StatusCode;
use axum_test::TestServer;

// ---------------------------------------------------------------------------
// POST /api/channels/:channel_id/session
// ---------------------------------------------------------------------------

#[tokio::test]
async fn first_join_creates_session_and_participant() {
    let (app, state, keys) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let user_id = unionvote_common::id::prefixed_ulid("usr");
    let token = common::login_test_user(&server, &keys, &state.config, &user_id, "s_first").await;
    let union_id = common::create_test_union(&server, &token, "Call Union").await;
    let channel_id =
        common::create_test_channel(&server, &token, &union_id, "war room", "voice").await;

    let resp = server
        .post(&format!("/api/channels/{channel_id}/session"))
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .await;
    resp.assert_status(StatusCode::CREATED);
    let body: serde_json::Value = resp.json();
    assert!(body["session"]["id"].as_str().unwrap().starts_with("ses_"));
    assert_eq!(body["session"]["channel_id"], channel_id);
    assert_eq!(body["session"]["is_active"], true);
    assert!(body["session"]["room_url"].as_str().unwrap().contains("rooms.test"));
    assert!(body["session"]["room_name"].as_str().unwrap().starts_with("war-room-"));
    assert_eq!(body["participant"]["user_id"], user_id);
    assert_eq!(body["participant"]["is_active"], true);
}

#[tokio::test]
async fn second_join_reuses_the_session() {
    let (app, state, keys) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let a_id = unionvote_common::id::prefixed_ulid("usr");
    let a_token = common::login_test_user(&server, &keys, &state.config, &a_id, "s_alice").await;
    let union_id = common::create_test_union(&server, &a_token, "Reuse Union").await;
    let channel_id =
        common::create_test_channel(&server, &a_token, &union_id, "standup", "video").await;

    let first: serde_json::Value = server
        .post(&format!("/api/channels/{channel_id}/session"))
        .add_header(AUTHORIZATION, format!("Bearer {a_token}"))
        .await
        .json();
    let session_id = first["session"]["id"].as_str().unwrap().to_string();

    let b_id = unionvote_common::id::prefixed_ulid("usr");
    let b_token =
        common::join_second_user(&server, &keys, &state.config, &union_id, &b_id, "s_bob").await;

    // Same session, no second room.
    let resp = server
        .post(&format!("/api/channels/{channel_id}/session"))
        .add_header(AUTHORIZATION, format!("Bearer {b_token}"))
        .await;
    resp.assert_status_ok();
    let second: serde_json::Value = resp.json();
    assert_eq!(second["session"]["id"].as_str().unwrap(), session_id);
    assert_eq!(second["session"]["room_url"], first["session"]["room_url"]);

    let participants: Vec<serde_json::Value> = server
        .get(&format!("/api/sessions/{session_id}/participants"))
        .await
        .json();
    assert_eq!(participants.len(), 2);
}

#[tokio::test]
async fn sessions_are_rejected_for_text_channels() {
    let (app, state, keys) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let user_id = unionvote_common::id::prefixed_ulid("usr");
    let token = common::login_test_user(&server, &keys, &state.config, &user_id, "s_text").await;
    let union_id = common::create_test_union(&server, &token, "Text Only").await;
    let channel_id =
        common::create_test_channel(&server, &token, &union_id, "chat", "text").await;

    let resp = server
        .post(&format!("/api/channels/{channel_id}/session"))
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn session_join_requires_membership() {
    let (app, state, keys) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let owner_id = unionvote_common::id::prefixed_ulid("usr");
    let owner_token =
        common::login_test_user(&server, &keys, &state.config, &owner_id, "s_own").await;
    let union_id = common::create_test_union(&server, &owner_token, "Private Call").await;
    let channel_id =
        common::create_test_channel(&server, &owner_token, &union_id, "private", "voice").await;

    let outsider_id = unionvote_common::id::prefixed_ulid("usr");
    let outsider_token =
        common::login_test_user(&server, &keys, &state.config, &outsider_id, "s_out").await;

    server
        .post(&format!("/api/channels/{channel_id}/session"))
        .add_header(AUTHORIZATION, format!("Bearer {outsider_token}"))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    // Membership is also required to view the active session.
    server
        .post(&format!("/api/channels/{channel_id}/session"))
        .add_header(AUTHORIZATION, format!("Bearer {owner_token}"))
        .await
        .assert_status(StatusCode::CREATED);
    server
        .get(&format!("/api/channels/{channel_id}/session"))
        .add_header(AUTHORIZATION, format!("Bearer {outsider_token}"))
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

// ---------------------------------------------------------------------------
// DELETE /api/sessions/:id/leave
// ---------------------------------------------------------------------------

#[tokio::test]
async fn leaving_marks_only_the_caller_inactive() {
    let (app, state, keys) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let a_id = unionvote_common::id::prefixed_ulid("usr");
    let a_token = common::login_test_user(&server, &keys, &state.config, &a_id, "s_leave_a").await;
    let union_id = common::create_test_union(&server, &a_token, "Leave Union").await;
    let channel_id =
        common::create_test_channel(&server, &a_token, &union_id, "exits", "voice").await;

    let opened: serde_json::Value = server
        .post(&format!("/api/channels/{channel_id}/session"))
        .add_header(AUTHORIZATION, format!("Bearer {a_token}"))
        .await
        .json();
    let session_id = opened["session"]["id"].as_str().unwrap().to_string();

    let b_id = unionvote_common::id::prefixed_ulid("usr");
    let b_token = common::join_second_user(
        &server,
        &keys,
        &state.config,
        &union_id,
        &b_id,
        "s_leave_b",
    )
    .await;
    server
        .post(&format!("/api/sessions/{session_id}/join"))
        .add_header(AUTHORIZATION, format!("Bearer {b_token}"))
        .await
        .assert_status_ok();

    // A leaves.
    server
        .delete(&format!("/api/sessions/{session_id}/leave"))
        .add_header(AUTHORIZATION, format!("Bearer {a_token}"))
        .await
        .assert_status(StatusCode::NO_CONTENT);

    // Session still active; only B remains in the active list.
    let view: serde_json::Value = server
        .get(&format!("/api/channels/{channel_id}/session"))
        .add_header(AUTHORIZATION, format!("Bearer {b_token}"))
        .await
        .json();
    assert_eq!(view["session"]["is_active"], true);
    let participants = view["participants"].as_array().unwrap();
    assert_eq!(participants.len(), 1);
    assert_eq!(participants[0]["user_id"], b_id);

    // Leaving twice is a no-op, not an error.
    server
        .delete(&format!("/api/sessions/{session_id}/leave"))
        .add_header(AUTHORIZATION, format!("Bearer {a_token}"))
        .await
        .assert_status(StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn rejoining_reactivates_the_same_participant_row() {
    let (app, state, keys) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let user_id = unionvote_common::id::prefixed_ulid("usr");
    let token = common::login_test_user(&server, &keys, &state.config, &user_id, "s_back").await;
    let union_id = common::create_test_union(&server, &token, "Rejoin Union").await;
    let channel_id =
        common::create_test_channel(&server, &token, &union_id, "revolving", "voice").await;

    let opened: serde_json::Value = server
        .post(&format!("/api/channels/{channel_id}/session"))
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .await
        .json();
    let session_id = opened["session"]["id"].as_str().unwrap().to_string();

    server
        .delete(&format!("/api/sessions/{session_id}/leave"))
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let rejoined: serde_json::Value = server
        .post(&format!("/api/sessions/{session_id}/join"))
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .await
        .json();
    assert_eq!(rejoined["participant"]["is_active"], true);
    assert!(rejoined["participant"]["left_at"].is_null());

    // Still a single participant row for this user.
    let participants: Vec<serde_json::Value> = server
        .get(&format!("/api/sessions/{session_id}/participants"))
        .await
        .json();
    assert_eq!(participants.len(), 1);
    assert_eq!(participants[0]["user_id"], user_id);
}

// ---------------------------------------------------------------------------
// DELETE /api/channels/:channel_id/session
// ---------------------------------------------------------------------------

#[tokio::test]
async fn only_the_channel_creator_can_end_a_session() {
    let (app, state, keys) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let creator_id = unionvote_common::id::prefixed_ulid("usr");
    let creator_token =
        common::login_test_user(&server, &keys, &state.config, &creator_id, "s_creator").await;
    let union_id = common::create_test_union(&server, &creator_token, "End Union").await;
    let channel_id =
        common::create_test_channel(&server, &creator_token, &union_id, "finale", "video").await;

    server
        .post(&format!("/api/channels/{channel_id}/session"))
        .add_header(AUTHORIZATION, format!("Bearer {creator_token}"))
        .await
        .assert_status(StatusCode::CREATED);

    let member_id = unionvote_common::id::prefixed_ulid("usr");
    let member_token = common::join_second_user(
        &server,
        &keys,
        &state.config,
        &union_id,
        &member_id,
        "s_member",
    )
    .await;
    server
        .post(&format!("/api/channels/{channel_id}/session"))
        .add_header(AUTHORIZATION, format!("Bearer {member_token}"))
        .await
        .assert_status_ok();

    // A mere participant cannot end it.
    server
        .delete(&format!("/api/channels/{channel_id}/session"))
        .add_header(AUTHORIZATION, format!("Bearer {member_token}"))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    // The creator can; every active participant is cascaded out.
    let ended: serde_json::Value = server
        .delete(&format!("/api/channels/{channel_id}/session"))
        .add_header(AUTHORIZATION, format!("Bearer {creator_token}"))
        .await
        .json();
    assert_eq!(ended["is_active"], false);
    assert!(ended["ended_at"].is_string());

    let session_id = ended["id"].as_str().unwrap();
    let participants: Vec<serde_json::Value> = server
        .get(&format!("/api/sessions/{session_id}/participants"))
        .await
        .json();
    assert!(participants.is_empty());

    // No active session left on the channel.
    server
        .get(&format!("/api/channels/{channel_id}/session"))
        .add_header(AUTHORIZATION, format!("Bearer {creator_token}"))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    // Joining the ended session by id fails.
    server
        .post(&format!("/api/sessions/{session_id}/join"))
        .add_header(AUTHORIZATION, format!("Bearer {member_token}"))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    // A fresh session can be opened afterwards.
    server
        .post(&format!("/api/channels/{channel_id}/session"))
        .add_header(AUTHORIZATION, format!("Bearer {member_token}"))
        .await
        .assert_status(StatusCode::CREATED);
}

// ---------------------------------------------------------------------------
// PATCH /api/sessions/:id/participant
// ---------------------------------------------------------------------------

#[tokio::test]
async fn participants_can_update_their_media_flags() {
    let (app, state, keys) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let user_id = unionvote_common::id::prefixed_ulid("usr");
    let token = common::login_test_user(&server, &keys, &state.config, &user_id, "s_flags").await;
    let union_id = common::create_test_union(&server, &token, "Flag Union").await;
    let channel_id =
        common::create_test_channel(&server, &token, &union_id, "mics", "voice").await;

    let opened: serde_json::Value = server
        .post(&format!("/api/channels/{channel_id}/session"))
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .await
        .json();
    let session_id = opened["session"]["id"].as_str().unwrap().to_string();
    assert_eq!(opened["participant"]["muted"], false);
    assert_eq!(opened["participant"]["video_off"], true);

    let updated: serde_json::Value = server
        .patch(&format!("/api/sessions/{session_id}/participant"))
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .json(&serde_json::json!({ "muted": true }))
        .await
        .json();
    assert_eq!(updated["muted"], true);
    // Unspecified flags are left alone.
    assert_eq!(updated["video_off"], true);

    // After leaving there is no active participant row to update.
    server
        .delete(&format!("/api/sessions/{session_id}/leave"))
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .await
        .assert_status(StatusCode::NO_CONTENT);
    server
        .patch(&format!("/api/sessions/{session_id}/participant"))
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .json(&serde_json::json!({ "muted": false }))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}
