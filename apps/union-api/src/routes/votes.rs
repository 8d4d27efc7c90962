//! Vote endpoints.
//!
//! Re-voting with the same type is idempotent; the opposite type switches
//! the existing vote and moves one count across. The target's counters are
//! adjusted in the same transaction as the vote row.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::auth::middleware::AuthUser;
use crate::error::{ApiError, ApiErrorBody};
use crate::models::vote::{Vote, VoteType};
use crate::permissions;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/posts/{id}/vote", post(vote_on_post))
        .route("/comments/{id}/vote", post(vote_on_comment))
        .route("/votes/{id}", axum::routing::delete(delete_vote))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CastVoteRequest {
    /// `upvote` or `downvote`.
    pub vote_type: VoteType,
}

// ---------------------------------------------------------------------------
// POST /api/posts/:post_id/vote
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/api/posts/{id}/vote",
    tag = "Votes",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "Post ID")),
    request_body = CastVoteRequest,
    responses(
        (status = 200, description = "The caller's vote on the post", body = Vote),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 403, description = "Not a union member", body = ApiErrorBody),
        (status = 404, description = "Post not found", body = ApiErrorBody),
    ),
)]
pub async fn vote_on_post(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    Json(body): Json<CastVoteRequest>,
) -> Result<Json<Vote>, ApiError> {
    let post = state
        .storage
        .get_post(post_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Post not found"))?;

    permissions::require_member(state.storage.as_ref(), &post.union_id, &user_id).await?;

    let vote = state
        .storage
        .cast_post_vote(post_id, &user_id, body.vote_type)
        .await?;

    Ok(Json(vote))
}

// ---------------------------------------------------------------------------
// POST /api/comments/:comment_id/vote
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/api/comments/{id}/vote",
    tag = "Votes",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "Comment ID")),
    request_body = CastVoteRequest,
    responses(
        (status = 200, description = "The caller's vote on the comment", body = Vote),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 403, description = "Not a union member", body = ApiErrorBody),
        (status = 404, description = "Comment not found", body = ApiErrorBody),
    ),
)]
pub async fn vote_on_comment(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Path(comment_id): Path<i64>,
    Json(body): Json<CastVoteRequest>,
) -> Result<Json<Vote>, ApiError> {
    let comment = state
        .storage
        .get_comment(comment_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Comment not found"))?;

    let post = state
        .storage
        .get_post(comment.post_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Post not found"))?;

    permissions::require_member(state.storage.as_ref(), &post.union_id, &user_id).await?;

    let vote = state
        .storage
        .cast_comment_vote(comment_id, &user_id, body.vote_type)
        .await?;

    Ok(Json(vote))
}

// ---------------------------------------------------------------------------
// DELETE /api/votes/:id
// ---------------------------------------------------------------------------

#[utoipa::path(
    delete,
    path = "/api/votes/{id}",
    tag = "Votes",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "Vote ID")),
    responses(
        (status = 204, description = "Vote removed"),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 403, description = "Not the vote's owner", body = ApiErrorBody),
        (status = 404, description = "Vote not found", body = ApiErrorBody),
    ),
)]
pub async fn delete_vote(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let vote = state
        .storage
        .get_vote(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Vote not found"))?;

    if vote.user_id != user_id {
        return Err(ApiError::forbidden("You can only remove your own votes"));
    }

    state.storage.delete_vote(&id).await?;

    Ok(StatusCode::NO_CONTENT)
}
