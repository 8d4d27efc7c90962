//! Post endpoints, including cross-channel tagging.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::auth::middleware::AuthUser;
use crate::error::{ApiError, ApiErrorBody, FieldError};
use crate::models::post::Post;
use crate::permissions;
use crate::ranking::{self, PostSort};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/channels/{id}/posts",
            axum::routing::post(create_post).get(list_channel_posts),
        )
        .route("/unions/{id}/posts", get(list_union_posts))
        .route(
            "/posts/{id}",
            get(get_post).patch(update_post).delete(delete_post),
        )
        .route(
            "/posts/{id}/channels/{channel_id}",
            axum::routing::put(tag_post).delete(untag_post),
        )
}

const MAX_TITLE_LEN: usize = 300;
const MAX_CONTENT_LEN: usize = 10_000;

// ---------------------------------------------------------------------------
// POST /api/channels/:channel_id/posts
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePostRequest {
    pub title: String,
    pub content: String,
}

#[utoipa::path(
    post,
    path = "/api/channels/{id}/posts",
    tag = "Posts",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "Home channel ID")),
    request_body = CreatePostRequest,
    responses(
        (status = 201, description = "Post created", body = Post),
        (status = 400, description = "Validation failed", body = ApiErrorBody),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 403, description = "Not a union member", body = ApiErrorBody),
        (status = 404, description = "Channel not found", body = ApiErrorBody),
    ),
)]
pub async fn create_post(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
    Json(body): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<Post>), ApiError> {
    let channel = state
        .storage
        .get_channel(&channel_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Channel not found"))?;

    permissions::require_member(state.storage.as_ref(), &channel.union_id, &user_id).await?;

    let title = body.title.trim().to_string();
    let content = body.content.trim().to_string();
    let mut errors = Vec::new();
    if title.is_empty() {
        errors.push(FieldError {
            field: "title".to_string(),
            message: "Post title is required".to_string(),
        });
    } else if title.len() > MAX_TITLE_LEN {
        errors.push(FieldError {
            field: "title".to_string(),
            message: format!("Post title must be {MAX_TITLE_LEN} characters or fewer"),
        });
    }
    if content.is_empty() {
        errors.push(FieldError {
            field: "content".to_string(),
            message: "Post content is required".to_string(),
        });
    } else if content.len() > MAX_CONTENT_LEN {
        errors.push(FieldError {
            field: "content".to_string(),
            message: format!("Post content must be {MAX_CONTENT_LEN} characters or fewer"),
        });
    }
    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }

    // The post's union is inherited from its home channel.
    let post = state
        .storage
        .create_post(&channel.union_id, &channel_id, &user_id, &title, &content)
        .await?;

    Ok((StatusCode::CREATED, Json(post)))
}

// ---------------------------------------------------------------------------
// GET /api/channels/:channel_id/posts
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ListPostsParams {
    pub sort: Option<String>,
    pub since: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/channels/{id}/posts",
    tag = "Posts",
    params(
        ("id" = String, Path, description = "Channel ID"),
        ("sort" = Option<String>, Query, description = "new | top | trending"),
        ("since" = Option<String>, Query, description = "hour | day | week | month | year | all"),
    ),
    responses(
        (status = 200, description = "Posts homed in or tagged into the channel", body = [Post]),
        (status = 400, description = "Unknown sort or time range", body = ApiErrorBody),
        (status = 404, description = "Channel not found", body = ApiErrorBody),
    ),
)]
pub async fn list_channel_posts(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
    Query(params): Query<ListPostsParams>,
) -> Result<Json<Vec<Post>>, ApiError> {
    state
        .storage
        .get_channel(&channel_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Channel not found"))?;

    let now = Utc::now();
    let sort = PostSort::parse(params.sort.as_deref())?;
    let cutoff = ranking::window_cutoff(params.since.as_deref(), now)?;

    let mut posts = state.storage.list_channel_posts(&channel_id, cutoff).await?;
    ranking::sort_posts(&mut posts, sort, now);

    Ok(Json(posts))
}

// ---------------------------------------------------------------------------
// GET /api/unions/:union_id/posts (the "all" pseudo-channel)
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/unions/{id}/posts",
    tag = "Posts",
    params(
        ("id" = String, Path, description = "Union ID"),
        ("sort" = Option<String>, Query, description = "new | top | trending"),
        ("since" = Option<String>, Query, description = "hour | day | week | month | year | all"),
    ),
    responses(
        (status = 200, description = "Every post in the union", body = [Post]),
        (status = 400, description = "Unknown sort or time range", body = ApiErrorBody),
        (status = 404, description = "Union not found", body = ApiErrorBody),
    ),
)]
pub async fn list_union_posts(
    State(state): State<AppState>,
    Path(union_id): Path<String>,
    Query(params): Query<ListPostsParams>,
) -> Result<Json<Vec<Post>>, ApiError> {
    state
        .storage
        .get_union(&union_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Union not found"))?;

    let now = Utc::now();
    let sort = PostSort::parse(params.sort.as_deref())?;
    let cutoff = ranking::window_cutoff(params.since.as_deref(), now)?;

    let mut posts = state.storage.list_union_posts(&union_id, cutoff).await?;
    ranking::sort_posts(&mut posts, sort, now);

    Ok(Json(posts))
}

// ---------------------------------------------------------------------------
// GET /api/posts/:id
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/posts/{id}",
    tag = "Posts",
    params(("id" = i64, Path, description = "Post ID")),
    responses(
        (status = 200, description = "The post", body = Post),
        (status = 404, description = "Post not found", body = ApiErrorBody),
    ),
)]
pub async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Post>, ApiError> {
    let post = state
        .storage
        .get_post(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Post not found"))?;
    Ok(Json(post))
}

// ---------------------------------------------------------------------------
// PATCH /api/posts/:id
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub content: Option<String>,
}

#[utoipa::path(
    patch,
    path = "/api/posts/{id}",
    tag = "Posts",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "Post ID")),
    request_body = UpdatePostRequest,
    responses(
        (status = 200, description = "Updated post", body = Post),
        (status = 400, description = "Validation failed", body = ApiErrorBody),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 403, description = "Not the author", body = ApiErrorBody),
        (status = 404, description = "Post not found", body = ApiErrorBody),
    ),
)]
pub async fn update_post(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdatePostRequest>,
) -> Result<Json<Post>, ApiError> {
    let post = state
        .storage
        .get_post(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Post not found"))?;

    if post.author_id != user_id {
        return Err(ApiError::forbidden("You can only edit your own posts"));
    }

    let title = body.title.map(|t| t.trim().to_string());
    let content = body.content.map(|c| c.trim().to_string());

    if let Some(ref title) = title {
        if title.is_empty() {
            return Err(ApiError::validation(vec![FieldError {
                field: "title".to_string(),
                message: "Post title cannot be empty".to_string(),
            }]));
        }
        if title.len() > MAX_TITLE_LEN {
            return Err(ApiError::validation(vec![FieldError {
                field: "title".to_string(),
                message: format!("Post title must be {MAX_TITLE_LEN} characters or fewer"),
            }]));
        }
    }
    if let Some(ref content) = content {
        if content.is_empty() {
            return Err(ApiError::validation(vec![FieldError {
                field: "content".to_string(),
                message: "Post content cannot be empty".to_string(),
            }]));
        }
        if content.len() > MAX_CONTENT_LEN {
            return Err(ApiError::validation(vec![FieldError {
                field: "content".to_string(),
                message: format!("Post content must be {MAX_CONTENT_LEN} characters or fewer"),
            }]));
        }
    }

    let updated = state
        .storage
        .update_post(id, title, content)
        .await?
        .ok_or_else(|| ApiError::not_found("Post not found"))?;

    Ok(Json(updated))
}

// ---------------------------------------------------------------------------
// DELETE /api/posts/:id
// ---------------------------------------------------------------------------

#[utoipa::path(
    delete,
    path = "/api/posts/{id}",
    tag = "Posts",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "Post ID")),
    responses(
        (status = 204, description = "Post deleted"),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 403, description = "Not the author or union owner", body = ApiErrorBody),
        (status = 404, description = "Post not found", body = ApiErrorBody),
    ),
)]
pub async fn delete_post(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let post = state
        .storage
        .get_post(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Post not found"))?;

    if post.author_id != user_id
        && !permissions::is_union_owner(state.storage.as_ref(), &post.union_id, &user_id).await?
    {
        return Err(ApiError::forbidden(
            "Only the author or union owner can delete a post",
        ));
    }

    state.storage.delete_post(id).await?;

    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// PUT /api/posts/:id/channels/:channel_id
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct TagPath {
    pub id: i64,
    pub channel_id: String,
}

#[utoipa::path(
    put,
    path = "/api/posts/{id}/channels/{channel_id}",
    tag = "Posts",
    security(("bearer" = [])),
    params(
        ("id" = i64, Path, description = "Post ID"),
        ("channel_id" = String, Path, description = "Channel to tag the post into"),
    ),
    responses(
        (status = 204, description = "Post tagged (idempotent)"),
        (status = 400, description = "Home channel or cross-union tag", body = ApiErrorBody),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 403, description = "Not a union member", body = ApiErrorBody),
        (status = 404, description = "Post or channel not found", body = ApiErrorBody),
    ),
)]
pub async fn tag_post(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Path(path): Path<TagPath>,
) -> Result<StatusCode, ApiError> {
    let post = state
        .storage
        .get_post(path.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Post not found"))?;

    let channel = state
        .storage
        .get_channel(&path.channel_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Channel not found"))?;

    if channel.union_id != post.union_id {
        return Err(ApiError::bad_request(
            "Posts can only be tagged into channels of the same union",
        ));
    }
    // Home-channel membership is implicit, never a tag row.
    if channel.id == post.channel_id {
        return Err(ApiError::bad_request(
            "A post is always visible in its home channel",
        ));
    }

    permissions::require_member(state.storage.as_ref(), &post.union_id, &user_id).await?;

    state.storage.tag_post(path.id, &path.channel_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// DELETE /api/posts/:id/channels/:channel_id
// ---------------------------------------------------------------------------

#[utoipa::path(
    delete,
    path = "/api/posts/{id}/channels/{channel_id}",
    tag = "Posts",
    security(("bearer" = [])),
    params(
        ("id" = i64, Path, description = "Post ID"),
        ("channel_id" = String, Path, description = "Channel to untag the post from"),
    ),
    responses(
        (status = 204, description = "Tag removed"),
        (status = 400, description = "Cannot untag from the home channel", body = ApiErrorBody),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 403, description = "Not a union member", body = ApiErrorBody),
        (status = 404, description = "Post, channel or tag not found", body = ApiErrorBody),
    ),
)]
pub async fn untag_post(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Path(path): Path<TagPath>,
) -> Result<StatusCode, ApiError> {
    let post = state
        .storage
        .get_post(path.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Post not found"))?;

    if path.channel_id == post.channel_id {
        return Err(ApiError::bad_request(
            "A post cannot be untagged from its home channel",
        ));
    }

    permissions::require_member(state.storage.as_ref(), &post.union_id, &user_id).await?;

    let removed = state.storage.untag_post(path.id, &path.channel_id).await?;
    if !removed {
        return Err(ApiError::not_found("Post is not tagged into this channel"));
    }

    Ok(StatusCode::NO_CONTENT)
}
