//! Comment endpoints.
//!
//! Comments are returned as the full flat set for a post; nesting is
//! reconstructed by the display layer by grouping on `parent_comment_id`.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::auth::middleware::AuthUser;
use crate::error::{ApiError, ApiErrorBody, FieldError};
use crate::models::comment::Comment;
use crate::permissions;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/posts/{id}/comments",
            axum::routing::post(create_comment).get(list_comments),
        )
        .route("/comments/{id}", axum::routing::delete(delete_comment))
}

const MAX_COMMENT_LEN: usize = 4000;

// ---------------------------------------------------------------------------
// POST /api/posts/:post_id/comments
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCommentRequest {
    pub content: String,
    /// When set, the new comment is a reply; the parent must belong to the
    /// same post.
    pub parent_comment_id: Option<i64>,
}

#[utoipa::path(
    post,
    path = "/api/posts/{id}/comments",
    tag = "Comments",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "Post ID")),
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Comment created", body = Comment),
        (status = 400, description = "Validation failed", body = ApiErrorBody),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 403, description = "Not a union member", body = ApiErrorBody),
        (status = 404, description = "Post or parent comment not found", body = ApiErrorBody),
    ),
)]
pub async fn create_comment(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    Json(body): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    let post = state
        .storage
        .get_post(post_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Post not found"))?;

    permissions::require_member(state.storage.as_ref(), &post.union_id, &user_id).await?;

    let content = body.content.trim().to_string();
    if content.is_empty() {
        return Err(ApiError::validation(vec![FieldError {
            field: "content".to_string(),
            message: "Comment content is required".to_string(),
        }]));
    }
    if content.len() > MAX_COMMENT_LEN {
        return Err(ApiError::validation(vec![FieldError {
            field: "content".to_string(),
            message: format!("Comment content must be {MAX_COMMENT_LEN} characters or fewer"),
        }]));
    }

    let comment = state
        .storage
        .create_comment(post_id, &user_id, &content, body.parent_comment_id)
        .await?;

    Ok((StatusCode::CREATED, Json(comment)))
}

// ---------------------------------------------------------------------------
// GET /api/posts/:post_id/comments
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/posts/{id}/comments",
    tag = "Comments",
    params(("id" = i64, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Flat comment set, ascending by id", body = [Comment]),
        (status = 404, description = "Post not found", body = ApiErrorBody),
    ),
)]
pub async fn list_comments(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> Result<Json<Vec<Comment>>, ApiError> {
    state
        .storage
        .get_post(post_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Post not found"))?;

    Ok(Json(state.storage.list_comments(post_id).await?))
}

// ---------------------------------------------------------------------------
// DELETE /api/comments/:id
// ---------------------------------------------------------------------------

#[utoipa::path(
    delete,
    path = "/api/comments/{id}",
    tag = "Comments",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "Comment ID")),
    responses(
        (status = 204, description = "Comment and its replies deleted"),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 403, description = "Not the author or union owner", body = ApiErrorBody),
        (status = 404, description = "Comment not found", body = ApiErrorBody),
    ),
)]
pub async fn delete_comment(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let comment = state
        .storage
        .get_comment(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Comment not found"))?;

    let post = state
        .storage
        .get_post(comment.post_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Post not found"))?;

    if comment.author_id != user_id
        && !permissions::is_union_owner(state.storage.as_ref(), &post.union_id, &user_id).await?
    {
        return Err(ApiError::forbidden(
            "Only the author or union owner can delete a comment",
        ));
    }

    state.storage.delete_comment(id).await?;

    Ok(StatusCode::NO_CONTENT)
}
