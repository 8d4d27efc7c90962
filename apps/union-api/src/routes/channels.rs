//! Channel endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::auth::middleware::AuthUser;
use crate::error::{ApiError, ApiErrorBody, FieldError};
use crate::models::channel::{Channel, ChannelKind};
use crate::permissions;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/unions/{id}/channels",
            axum::routing::post(create_channel).get(list_channels),
        )
        .route(
            "/channels/{id}",
            get(get_channel).delete(delete_channel),
        )
}

// ---------------------------------------------------------------------------
// POST /api/unions/:union_id/channels
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateChannelRequest {
    pub name: String,
    pub description: Option<String>,
    /// One of `text`, `voice`, `video`. Fixed at creation; defaults to a
    /// text channel.
    pub kind: Option<ChannelKind>,
}

#[utoipa::path(
    post,
    path = "/api/unions/{id}/channels",
    tag = "Channels",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "Union ID")),
    request_body = CreateChannelRequest,
    responses(
        (status = 201, description = "Channel created", body = Channel),
        (status = 400, description = "Validation failed", body = ApiErrorBody),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 403, description = "Not a union member", body = ApiErrorBody),
        (status = 404, description = "Union not found", body = ApiErrorBody),
    ),
)]
pub async fn create_channel(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Path(union_id): Path<String>,
    Json(body): Json<CreateChannelRequest>,
) -> Result<(StatusCode, Json<Channel>), ApiError> {
    state
        .storage
        .get_union(&union_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Union not found"))?;

    permissions::require_member(state.storage.as_ref(), &union_id, &user_id).await?;

    let name = body.name.trim().to_string();
    let mut errors = Vec::new();
    if name.is_empty() {
        errors.push(FieldError {
            field: "name".to_string(),
            message: "Channel name is required".to_string(),
        });
    } else if name.len() > 100 {
        errors.push(FieldError {
            field: "name".to_string(),
            message: "Channel name must be 100 characters or fewer".to_string(),
        });
    }
    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }

    let kind = body.kind.unwrap_or(ChannelKind::Text);

    let channel = state
        .storage
        .create_channel(
            &union_id,
            &user_id,
            &name,
            body.description.as_deref(),
            kind.as_i16(),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(channel)))
}

// ---------------------------------------------------------------------------
// GET /api/unions/:union_id/channels
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/unions/{id}/channels",
    tag = "Channels",
    params(("id" = String, Path, description = "Union ID")),
    responses(
        (status = 200, description = "Channels in the union", body = [Channel]),
        (status = 404, description = "Union not found", body = ApiErrorBody),
    ),
)]
pub async fn list_channels(
    State(state): State<AppState>,
    Path(union_id): Path<String>,
) -> Result<Json<Vec<Channel>>, ApiError> {
    state
        .storage
        .get_union(&union_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Union not found"))?;

    Ok(Json(state.storage.list_channels(&union_id).await?))
}

// ---------------------------------------------------------------------------
// GET /api/channels/:id
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/channels/{id}",
    tag = "Channels",
    params(("id" = String, Path, description = "Channel ID")),
    responses(
        (status = 200, description = "The channel", body = Channel),
        (status = 404, description = "Channel not found", body = ApiErrorBody),
    ),
)]
pub async fn get_channel(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Channel>, ApiError> {
    let channel = state
        .storage
        .get_channel(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Channel not found"))?;
    Ok(Json(channel))
}

// ---------------------------------------------------------------------------
// DELETE /api/channels/:id
// ---------------------------------------------------------------------------

#[utoipa::path(
    delete,
    path = "/api/channels/{id}",
    tag = "Channels",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "Channel ID")),
    responses(
        (status = 204, description = "Channel deleted"),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 403, description = "Not the creator or union owner", body = ApiErrorBody),
        (status = 404, description = "Channel not found", body = ApiErrorBody),
    ),
)]
pub async fn delete_channel(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let channel = state
        .storage
        .get_channel(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Channel not found"))?;

    if channel.creator_id != user_id
        && !permissions::is_union_owner(state.storage.as_ref(), &channel.union_id, &user_id)
            .await?
    {
        return Err(ApiError::forbidden(
            "Only the channel creator or union owner can delete a channel",
        ));
    }

    state.storage.delete_channel(&id).await?;

    Ok(StatusCode::NO_CONTENT)
}
