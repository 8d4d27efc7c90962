use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use utoipa::ToSchema;

use crate::db::schema::{channel_sessions, session_participants};

/// One active (or past) call bound to a voice/video channel.
///
/// At most one row per channel has `is_active = true`; joiners reuse the
/// active row instead of allocating a second room.
#[derive(Debug, Clone, Queryable, Selectable, Serialize, ToSchema)]
#[diesel(table_name = channel_sessions)]
pub struct ChannelSession {
    pub id: String,
    pub channel_id: String,
    pub room_name: String,
    pub room_url: String,
    pub created_by: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = channel_sessions)]
pub struct NewChannelSession<'a> {
    pub id: &'a str,
    pub channel_id: &'a str,
    pub room_name: &'a str,
    pub room_url: &'a str,
    pub created_by: &'a str,
    pub started_at: DateTime<Utc>,
    pub is_active: bool,
}

/// A user's presence within a session, tracked independently of the call
/// provider's own participant view. Rejoining reactivates the row rather
/// than duplicating it, so participant identity is stable across
/// disconnects. The mute/video flags are client-reported.
#[derive(Debug, Clone, Queryable, Selectable, Serialize, ToSchema)]
#[diesel(table_name = session_participants)]
pub struct SessionParticipant {
    pub session_id: String,
    pub user_id: String,
    pub joined_at: DateTime<Utc>,
    pub left_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub muted: bool,
    pub video_off: bool,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = session_participants)]
pub struct NewSessionParticipant<'a> {
    pub session_id: &'a str,
    pub user_id: &'a str,
    pub joined_at: DateTime<Utc>,
    pub is_active: bool,
    pub muted: bool,
    pub video_off: bool,
}
