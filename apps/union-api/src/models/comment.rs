use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use utoipa::ToSchema;

use crate::db::schema::comments;

/// One comment in a post's discussion forest.
///
/// `parent_comment_id` is null for top-level comments; a reply's `depth` is
/// its parent's depth plus one. The flat set for a post is returned as-is
/// and grouped into a tree by the display layer.
#[derive(Debug, Clone, Queryable, Selectable, Serialize, ToSchema)]
#[diesel(table_name = comments)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub author_id: String,
    pub content: String,
    pub parent_comment_id: Option<i64>,
    pub depth: i32,
    pub upvotes: i32,
    pub downvotes: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = comments)]
pub struct NewComment<'a> {
    pub id: i64,
    pub post_id: i64,
    pub author_id: &'a str,
    pub content: &'a str,
    pub parent_comment_id: Option<i64>,
    pub depth: i32,
    pub upvotes: i32,
    pub downvotes: i32,
    pub created_at: DateTime<Utc>,
}
