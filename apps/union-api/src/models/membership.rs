use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use utoipa::ToSchema;

use crate::db::schema::union_members;

#[derive(Debug, Clone, Queryable, Selectable, Serialize, ToSchema)]
#[diesel(table_name = union_members)]
pub struct UnionMember {
    pub union_id: String,
    pub user_id: String,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = union_members)]
pub struct NewUnionMember<'a> {
    pub union_id: &'a str,
    pub user_id: &'a str,
    pub joined_at: DateTime<Utc>,
}

/// Membership row enriched with user info for member listings.
#[derive(Debug, Serialize, ToSchema)]
pub struct UnionMemberInfo {
    pub union_id: String,
    pub user_id: String,
    pub username: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub joined_at: DateTime<Utc>,
}
