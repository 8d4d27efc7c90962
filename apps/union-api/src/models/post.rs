use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use utoipa::ToSchema;

use crate::db::schema::posts;

/// A post lives in exactly one home channel; it may additionally be tagged
/// into other channels of the same union. The `upvotes`/`downvotes`/
/// `comment_count` columns mirror the live vote and comment rows and are
/// adjusted in the same transaction as the rows they count.
#[derive(Debug, Clone, Queryable, Selectable, Serialize, ToSchema)]
#[diesel(table_name = posts)]
pub struct Post {
    pub id: i64,
    pub union_id: String,
    pub channel_id: String,
    pub author_id: String,
    pub title: String,
    pub content: String,
    pub upvotes: i32,
    pub downvotes: i32,
    pub comment_count: i32,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = posts)]
pub struct NewPost<'a> {
    pub id: i64,
    pub union_id: &'a str,
    pub channel_id: &'a str,
    pub author_id: &'a str,
    pub title: &'a str,
    pub content: &'a str,
    pub upvotes: i32,
    pub downvotes: i32,
    pub comment_count: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, AsChangeset)]
#[diesel(table_name = posts)]
pub struct UpdatePost {
    pub title: Option<String>,
    pub content: Option<String>,
    pub edited_at: DateTime<Utc>,
}
