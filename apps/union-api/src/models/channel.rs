use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::schema::channels;

/// Channel kind, fixed at creation.
///
/// Stored as a SmallInt column; the request layer accepts the lowercase
/// names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Text,
    Voice,
    Video,
}

impl ChannelKind {
    pub fn as_i16(self) -> i16 {
        match self {
            ChannelKind::Text => 0,
            ChannelKind::Voice => 1,
            ChannelKind::Video => 2,
        }
    }

    pub fn from_i16(value: i16) -> Option<Self> {
        match value {
            0 => Some(ChannelKind::Text),
            1 => Some(ChannelKind::Voice),
            2 => Some(ChannelKind::Video),
            _ => None,
        }
    }

    /// Whether a live call session can be opened in a channel of this kind.
    pub fn supports_sessions(self) -> bool {
        matches!(self, ChannelKind::Voice | ChannelKind::Video)
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize, ToSchema)]
#[diesel(table_name = channels)]
pub struct Channel {
    pub id: String,
    pub union_id: String,
    pub creator_id: String,
    pub name: String,
    pub description: Option<String>,
    pub kind: i16,
    pub created_at: DateTime<Utc>,
}

impl Channel {
    pub fn kind(&self) -> Option<ChannelKind> {
        ChannelKind::from_i16(self.kind)
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = channels)]
pub struct NewChannel<'a> {
    pub id: &'a str,
    pub union_id: &'a str,
    pub creator_id: &'a str,
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub kind: i16,
    pub created_at: DateTime<Utc>,
}
