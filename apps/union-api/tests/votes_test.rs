mod common;

use axum::http::header::AUTHORIZATION;
use axum::http::StatusCode;
use axum_test::TestServer;

// ---------------------------------------------------------------------------
// POST /api/posts/:post_id/vote
// ---------------------------------------------------------------------------

#[tokio::test]
async fn upvote_increments_post_counter() {
    let (app, state, keys) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let user_id = unionvote_common::id::prefixed_ulid("usr");
    let token = common::login_test_user(&server, &keys, &state.config, &user_id, "v_up").await;
    let union_id = common::create_test_union(&server, &token, "Vote Union").await;
    let channel_id =
        common::create_test_channel(&server, &token, &union_id, "votes", "text").await;
    let post_id = common::create_test_post(&server, &token, &channel_id).await;

    let resp = server
        .post(&format!("/api/posts/{post_id}/vote"))
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .json(&serde_json::json!({ "vote_type": "upvote" }))
        .await;
    resp.assert_status_ok();
    let vote: serde_json::Value = resp.json();
    assert!(vote["id"].as_str().unwrap().starts_with("vote_"));
    assert_eq!(vote["post_id"].as_i64().unwrap(), post_id);
    assert!(vote["comment_id"].is_null());

    let post: serde_json::Value = server.get(&format!("/api/posts/{post_id}")).await.json();
    assert_eq!(post["upvotes"], 1);
    assert_eq!(post["downvotes"], 0);
}

#[tokio::test]
async fn repeat_vote_of_same_type_is_idempotent() {
    let (app, state, keys) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let user_id = unionvote_common::id::prefixed_ulid("usr");
    let token = common::login_test_user(&server, &keys, &state.config, &user_id, "v_dup").await;
    let union_id = common::create_test_union(&server, &token, "Dup Union").await;
    let channel_id = common::create_test_channel(&server, &token, &union_id, "dup", "text").await;
    let post_id = common::create_test_post(&server, &token, &channel_id).await;

    let first: serde_json::Value = server
        .post(&format!("/api/posts/{post_id}/vote"))
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .json(&serde_json::json!({ "vote_type": "upvote" }))
        .await
        .json();
    let second: serde_json::Value = server
        .post(&format!("/api/posts/{post_id}/vote"))
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .json(&serde_json::json!({ "vote_type": "upvote" }))
        .await
        .json();
    assert_eq!(first["id"], second["id"]);

    // Still exactly one upvote, no double counting.
    let post: serde_json::Value = server.get(&format!("/api/posts/{post_id}")).await.json();
    assert_eq!(post["upvotes"], 1);
}

#[tokio::test]
async fn opposite_vote_switches_and_moves_the_count() {
    let (app, state, keys) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let user_id = unionvote_common::id::prefixed_ulid("usr");
    let token = common::login_test_user(&server, &keys, &state.config, &user_id, "v_flip").await;
    let union_id = common::create_test_union(&server, &token, "Flip Union").await;
    let channel_id = common::create_test_channel(&server, &token, &union_id, "flip", "text").await;
    let post_id = common::create_test_post(&server, &token, &channel_id).await;

    server
        .post(&format!("/api/posts/{post_id}/vote"))
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .json(&serde_json::json!({ "vote_type": "upvote" }))
        .await
        .assert_status_ok();

    server
        .post(&format!("/api/posts/{post_id}/vote"))
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .json(&serde_json::json!({ "vote_type": "downvote" }))
        .await
        .assert_status_ok();

    let post: serde_json::Value = server.get(&format!("/api/posts/{post_id}")).await.json();
    assert_eq!(post["upvotes"], 0);
    assert_eq!(post["downvotes"], 1);
}

#[tokio::test]
async fn voting_requires_membership_and_existing_post() {
    let (app, state, keys) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let owner_id = unionvote_common::id::prefixed_ulid("usr");
    let owner_token =
        common::login_test_user(&server, &keys, &state.config, &owner_id, "v_owner").await;
    let union_id = common::create_test_union(&server, &owner_token, "Gate Union").await;
    let channel_id =
        common::create_test_channel(&server, &owner_token, &union_id, "gate", "text").await;
    let post_id = common::create_test_post(&server, &owner_token, &channel_id).await;

    let outsider_id = unionvote_common::id::prefixed_ulid("usr");
    let outsider_token =
        common::login_test_user(&server, &keys, &state.config, &outsider_id, "v_out").await;

    server
        .post(&format!("/api/posts/{post_id}/vote"))
        .add_header(AUTHORIZATION, format!("Bearer {outsider_token}"))
        .json(&serde_json::json!({ "vote_type": "upvote" }))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    server
        .post("/api/posts/999999999/vote")
        .add_header(AUTHORIZATION, format!("Bearer {owner_token}"))
        .json(&serde_json::json!({ "vote_type": "upvote" }))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    server
        .post(&format!("/api/posts/{post_id}/vote"))
        .json(&serde_json::json!({ "vote_type": "upvote" }))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

// ---------------------------------------------------------------------------
// POST /api/comments/:comment_id/vote
// ---------------------------------------------------------------------------

#[tokio::test]
async fn comment_votes_track_their_own_counters() {
    let (app, state, keys) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let user_id = unionvote_common::id::prefixed_ulid("usr");
    let token = common::login_test_user(&server, &keys, &state.config, &user_id, "v_cmt").await;
    let union_id = common::create_test_union(&server, &token, "CVote Union").await;
    let channel_id = common::create_test_channel(&server, &token, &union_id, "cv", "text").await;
    let post_id = common::create_test_post(&server, &token, &channel_id).await;

    let comment: serde_json::Value = server
        .post(&format!("/api/posts/{post_id}/comments"))
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .json(&serde_json::json!({ "content": "vote on me" }))
        .await
        .json();
    let comment_id = comment["id"].as_i64().unwrap();

    let vote: serde_json::Value = server
        .post(&format!("/api/comments/{comment_id}/vote"))
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .json(&serde_json::json!({ "vote_type": "downvote" }))
        .await
        .json();
    assert_eq!(vote["comment_id"].as_i64().unwrap(), comment_id);
    assert!(vote["post_id"].is_null());

    let flat: Vec<serde_json::Value> = server
        .get(&format!("/api/posts/{post_id}/comments"))
        .await
        .json();
    assert_eq!(flat[0]["downvotes"], 1);
    assert_eq!(flat[0]["upvotes"], 0);

    // The post's own counters are untouched.
    let post: serde_json::Value = server.get(&format!("/api/posts/{post_id}")).await.json();
    assert_eq!(post["upvotes"], 0);
    assert_eq!(post["downvotes"], 0);
}

// ---------------------------------------------------------------------------
// DELETE /api/votes/:id
// ---------------------------------------------------------------------------

#[tokio::test]
async fn deleting_a_vote_restores_the_counter() {
    let (app, state, keys) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let user_id = unionvote_common::id::prefixed_ulid("usr");
    let token = common::login_test_user(&server, &keys, &state.config, &user_id, "v_del").await;
    let union_id = common::create_test_union(&server, &token, "Undo Union").await;
    let channel_id = common::create_test_channel(&server, &token, &union_id, "undo", "text").await;
    let post_id = common::create_test_post(&server, &token, &channel_id).await;

    let vote: serde_json::Value = server
        .post(&format!("/api/posts/{post_id}/vote"))
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .json(&serde_json::json!({ "vote_type": "upvote" }))
        .await
        .json();
    let vote_id = vote["id"].as_str().unwrap();

    let resp = server
        .delete(&format!("/api/votes/{vote_id}"))
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .await;
    resp.assert_status(StatusCode::NO_CONTENT);

    // Back to zero, never negative.
    let post: serde_json::Value = server.get(&format!("/api/posts/{post_id}")).await.json();
    assert_eq!(post["upvotes"], 0);

    // Deleting again is a 404 now that the record is gone.
    server
        .delete(&format!("/api/votes/{vote_id}"))
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn votes_can_only_be_deleted_by_their_owner() {
    let (app, state, keys) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let owner_id = unionvote_common::id::prefixed_ulid("usr");
    let owner_token =
        common::login_test_user(&server, &keys, &state.config, &owner_id, "v_mine").await;
    let union_id = common::create_test_union(&server, &owner_token, "Mine Union").await;
    let channel_id =
        common::create_test_channel(&server, &owner_token, &union_id, "mine", "text").await;
    let post_id = common::create_test_post(&server, &owner_token, &channel_id).await;

    let vote: serde_json::Value = server
        .post(&format!("/api/posts/{post_id}/vote"))
        .add_header(AUTHORIZATION, format!("Bearer {owner_token}"))
        .json(&serde_json::json!({ "vote_type": "upvote" }))
        .await
        .json();
    let vote_id = vote["id"].as_str().unwrap();

    let other_id = unionvote_common::id::prefixed_ulid("usr");
    let other_token = common::join_second_user(
        &server,
        &keys,
        &state.config,
        &union_id,
        &other_id,
        "v_thief",
    )
    .await;

    server
        .delete(&format!("/api/votes/{vote_id}"))
        .add_header(AUTHORIZATION, format!("Bearer {other_token}"))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    // The vote still counts.
    let post: serde_json::Value = server.get(&format!("/api/posts/{post_id}")).await.json();
    assert_eq!(post["upvotes"], 1);
}
