//! Live call session endpoints.
//!
//! A voice/video channel has at most one active session. The first join
//! allocates a room at the call provider and persists the session; later
//! joins reuse it. Presence is tracked locally and can drift from the
//! provider's connected set if a client drops without calling leave.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::middleware::AuthUser;
use crate::error::{ApiError, ApiErrorBody};
use crate::models::channel::Channel;
use crate::models::session::{ChannelSession, SessionParticipant};
use crate::permissions;
use crate::rooms;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/channels/{id}/session",
            post(open_session)
                .get(get_channel_session)
                .delete(end_channel_session),
        )
        .route("/sessions/{id}/join", post(join_session))
        .route("/sessions/{id}/leave", axum::routing::delete(leave_session))
        .route("/sessions/{id}/participants", get(list_participants))
        .route(
            "/sessions/{id}/participant",
            axum::routing::patch(update_participant),
        )
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub session: ChannelSession,
    pub participant: SessionParticipant,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionWithParticipants {
    pub session: ChannelSession,
    pub participants: Vec<SessionParticipant>,
}

async fn callable_channel(state: &AppState, channel_id: &str) -> Result<Channel, ApiError> {
    let channel = state
        .storage
        .get_channel(channel_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Channel not found"))?;

    match channel.kind() {
        Some(kind) if kind.supports_sessions() => Ok(channel),
        _ => Err(ApiError::bad_request(
            "Live sessions are only available in voice and video channels",
        )),
    }
}

// ---------------------------------------------------------------------------
// POST /api/channels/:channel_id/session
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/api/channels/{id}/session",
    tag = "Sessions",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "Channel ID")),
    responses(
        (status = 200, description = "Joined the existing session", body = SessionResponse),
        (status = 201, description = "Session created and joined", body = SessionResponse),
        (status = 400, description = "Not a voice/video channel", body = ApiErrorBody),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 403, description = "Not a union member", body = ApiErrorBody),
        (status = 404, description = "Channel not found", body = ApiErrorBody),
        (status = 500, description = "Call provider failure", body = ApiErrorBody),
    ),
)]
pub async fn open_session(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let channel = callable_channel(&state, &channel_id).await?;

    permissions::require_member(state.storage.as_ref(), &channel.union_id, &user_id).await?;

    // Reuse the active session when one exists; never a second room.
    if let Some(session) = state.storage.get_active_session(&channel_id).await? {
        let participant = state.storage.join_session(&session.id, &user_id).await?;
        return Ok((
            StatusCode::OK,
            Json(SessionResponse {
                session,
                participant,
            }),
        ));
    }

    // First join: allocate a room at the provider, then persist. The
    // provider call is attempted once; failures propagate to the caller.
    let room_name =
        rooms::room_name_for_channel(&channel.name, &channel.id, Utc::now().timestamp());
    let room = state.rooms.create_room(&room_name).await?;

    let session = state
        .storage
        .create_session(&channel_id, &user_id, &room.name, &room.url)
        .await?;
    let participant = state.storage.join_session(&session.id, &user_id).await?;

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            session,
            participant,
        }),
    ))
}

// ---------------------------------------------------------------------------
// GET /api/channels/:channel_id/session
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/channels/{id}/session",
    tag = "Sessions",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "Channel ID")),
    responses(
        (status = 200, description = "The active session", body = SessionWithParticipants),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 403, description = "Not a union member", body = ApiErrorBody),
        (status = 404, description = "Channel or active session not found", body = ApiErrorBody),
    ),
)]
pub async fn get_channel_session(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
) -> Result<Json<SessionWithParticipants>, ApiError> {
    let channel = state
        .storage
        .get_channel(&channel_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Channel not found"))?;

    permissions::require_member(state.storage.as_ref(), &channel.union_id, &user_id).await?;

    let session = state
        .storage
        .get_active_session(&channel_id)
        .await?
        .ok_or_else(|| ApiError::not_found("No active session for this channel"))?;

    let participants = state.storage.list_active_participants(&session.id).await?;

    Ok(Json(SessionWithParticipants {
        session,
        participants,
    }))
}

// ---------------------------------------------------------------------------
// DELETE /api/channels/:channel_id/session
// ---------------------------------------------------------------------------

#[utoipa::path(
    delete,
    path = "/api/channels/{id}/session",
    tag = "Sessions",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "Channel ID")),
    responses(
        (status = 200, description = "Session ended", body = ChannelSession),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 403, description = "Not the channel creator", body = ApiErrorBody),
        (status = 404, description = "Channel or active session not found", body = ApiErrorBody),
    ),
)]
pub async fn end_channel_session(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
) -> Result<Json<ChannelSession>, ApiError> {
    let channel = state
        .storage
        .get_channel(&channel_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Channel not found"))?;

    // Ending is gated to the channel creator, not mere membership.
    if channel.creator_id != user_id {
        return Err(ApiError::forbidden(
            "Only the channel creator can end the session",
        ));
    }

    let session = state
        .storage
        .get_active_session(&channel_id)
        .await?
        .ok_or_else(|| ApiError::not_found("No active session for this channel"))?;

    let ended = state
        .storage
        .end_session(&session.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Session not found"))?;

    Ok(Json(ended))
}

// ---------------------------------------------------------------------------
// POST /api/sessions/:id/join
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/api/sessions/{id}/join",
    tag = "Sessions",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Joined", body = SessionResponse),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 403, description = "Not a union member", body = ApiErrorBody),
        (status = 404, description = "Session not found or ended", body = ApiErrorBody),
    ),
)]
pub async fn join_session(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state
        .storage
        .get_session(&id)
        .await?
        .filter(|s| s.is_active)
        .ok_or_else(|| ApiError::not_found("Session not found or already ended"))?;

    let channel = state
        .storage
        .get_channel(&session.channel_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Channel not found"))?;

    permissions::require_member(state.storage.as_ref(), &channel.union_id, &user_id).await?;

    let participant = state.storage.join_session(&session.id, &user_id).await?;

    Ok(Json(SessionResponse {
        session,
        participant,
    }))
}

// ---------------------------------------------------------------------------
// DELETE /api/sessions/:id/leave
// ---------------------------------------------------------------------------

#[utoipa::path(
    delete,
    path = "/api/sessions/{id}/leave",
    tag = "Sessions",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "Session ID")),
    responses(
        (status = 204, description = "Marked inactive (idempotent)"),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 404, description = "Session not found", body = ApiErrorBody),
    ),
)]
pub async fn leave_session(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .storage
        .get_session(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Session not found"))?;

    // Leaving never ends the session, even for the last participant.
    state.storage.leave_session(&id, &user_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// GET /api/sessions/:id/participants
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/sessions/{id}/participants",
    tag = "Sessions",
    params(("id" = String, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Active participants", body = [SessionParticipant]),
        (status = 404, description = "Session not found", body = ApiErrorBody),
    ),
)]
pub async fn list_participants(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<SessionParticipant>>, ApiError> {
    state
        .storage
        .get_session(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Session not found"))?;

    Ok(Json(state.storage.list_active_participants(&id).await?))
}

// ---------------------------------------------------------------------------
// PATCH /api/sessions/:id/participant
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateParticipantRequest {
    pub muted: Option<bool>,
    pub video_off: Option<bool>,
}

#[utoipa::path(
    patch,
    path = "/api/sessions/{id}/participant",
    tag = "Sessions",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "Session ID")),
    request_body = UpdateParticipantRequest,
    responses(
        (status = 200, description = "Updated participant", body = SessionParticipant),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 404, description = "No active participant record", body = ApiErrorBody),
    ),
)]
pub async fn update_participant(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UpdateParticipantRequest>,
) -> Result<Json<SessionParticipant>, ApiError> {
    state
        .storage
        .get_session(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Session not found"))?;

    let participant = state
        .storage
        .update_participant_flags(&id, &user_id, body.muted, body.video_off)
        .await?
        .ok_or_else(|| {
            ApiError::not_found("You are not an active participant of this session")
        })?;

    Ok(Json(participant))
}
