use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::schema::votes;

/// Vote direction. Stored as a SmallInt column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum VoteType {
    Upvote,
    Downvote,
}

impl VoteType {
    pub fn as_i16(self) -> i16 {
        match self {
            VoteType::Upvote => 0,
            VoteType::Downvote => 1,
        }
    }

    pub fn from_i16(value: i16) -> Option<Self> {
        match value {
            0 => Some(VoteType::Upvote),
            1 => Some(VoteType::Downvote),
            _ => None,
        }
    }
}

/// One user's stance on exactly one target: a post or a comment, never
/// both. At most one live vote exists per (user, target) pair.
#[derive(Debug, Clone, Queryable, Selectable, Serialize, ToSchema)]
#[diesel(table_name = votes)]
pub struct Vote {
    pub id: String,
    pub user_id: String,
    pub post_id: Option<i64>,
    pub comment_id: Option<i64>,
    pub vote_type: i16,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = votes)]
pub struct NewVote<'a> {
    pub id: &'a str,
    pub user_id: &'a str,
    pub post_id: Option<i64>,
    pub comment_id: Option<i64>,
    pub vote_type: i16,
    pub created_at: DateTime<Utc>,
}
