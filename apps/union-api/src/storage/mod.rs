//! Storage backends.
//!
//! All entity state lives behind the [`Storage`] trait: Postgres in
//! production, an in-memory map for single-process deployments and tests.
//! The backend is chosen once at startup and injected into `AppState`;
//! handlers never know which one they are talking to.
//!
//! Lookups return `Ok(None)` for missing rows and the route layer decides
//! the 404 policy; compound mutations (row + counter, session end +
//! participant cascade, vote switch) are atomic within each backend.

mod memory;
mod postgres;

pub use memory::MemoryStorage;
pub use postgres::PgStorage;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::ApiError;
use crate::models::channel::Channel;
use crate::models::comment::Comment;
use crate::models::membership::{UnionMember, UnionMemberInfo};
use crate::models::post::Post;
use crate::models::session::{ChannelSession, SessionParticipant};
use crate::models::union::Union;
use crate::models::user::User;
use crate::models::vote::{Vote, VoteType};

#[async_trait]
pub trait Storage: Send + Sync {
    // -- users --------------------------------------------------------------

    /// Create or refresh a user record from Identity Gateway claims.
    async fn upsert_user(
        &self,
        id: &str,
        username: &str,
        display_name: &str,
        avatar_url: Option<&str>,
    ) -> Result<User, ApiError>;

    async fn get_user(&self, id: &str) -> Result<Option<User>, ApiError>;

    // -- unions -------------------------------------------------------------

    /// Create a union, enrol the owner as its first member, and create the
    /// default `general` text channel, atomically.
    async fn create_union(
        &self,
        owner_id: &str,
        name: &str,
        description: Option<&str>,
    ) -> Result<Union, ApiError>;

    async fn get_union(&self, id: &str) -> Result<Option<Union>, ApiError>;

    async fn list_unions(&self) -> Result<Vec<Union>, ApiError>;

    /// Enrol a user. Fails with `CONFLICT` if they are already a member.
    async fn join_union(&self, union_id: &str, user_id: &str) -> Result<UnionMember, ApiError>;

    /// Remove a membership. Returns `false` if the user was not a member.
    async fn leave_union(&self, union_id: &str, user_id: &str) -> Result<bool, ApiError>;

    async fn is_member(&self, union_id: &str, user_id: &str) -> Result<bool, ApiError>;

    async fn list_members(&self, union_id: &str) -> Result<Vec<UnionMemberInfo>, ApiError>;

    // -- channels -----------------------------------------------------------

    async fn create_channel(
        &self,
        union_id: &str,
        creator_id: &str,
        name: &str,
        description: Option<&str>,
        kind: i16,
    ) -> Result<Channel, ApiError>;

    async fn get_channel(&self, id: &str) -> Result<Option<Channel>, ApiError>;

    async fn list_channels(&self, union_id: &str) -> Result<Vec<Channel>, ApiError>;

    /// Delete a channel together with its home posts (and their comments,
    /// votes and tags), its tag rows, and its sessions.
    async fn delete_channel(&self, id: &str) -> Result<bool, ApiError>;

    // -- posts --------------------------------------------------------------

    async fn create_post(
        &self,
        union_id: &str,
        channel_id: &str,
        author_id: &str,
        title: &str,
        content: &str,
    ) -> Result<Post, ApiError>;

    async fn get_post(&self, id: i64) -> Result<Option<Post>, ApiError>;

    async fn update_post(
        &self,
        id: i64,
        title: Option<String>,
        content: Option<String>,
    ) -> Result<Option<Post>, ApiError>;

    /// Delete a post with its comments, votes and tag rows.
    async fn delete_post(&self, id: i64) -> Result<bool, ApiError>;

    /// Posts whose home channel is `channel_id`, plus posts tagged into it,
    /// created at or after `cutoff` when one is given. Unsorted; the route
    /// layer applies the requested order.
    async fn list_channel_posts(
        &self,
        channel_id: &str,
        cutoff: Option<DateTime<Utc>>,
    ) -> Result<Vec<Post>, ApiError>;

    /// Every post in the union regardless of home channel (the `all`
    /// pseudo-channel).
    async fn list_union_posts(
        &self,
        union_id: &str,
        cutoff: Option<DateTime<Utc>>,
    ) -> Result<Vec<Post>, ApiError>;

    /// Tag a post into an additional channel. Idempotent.
    async fn tag_post(&self, post_id: i64, channel_id: &str) -> Result<(), ApiError>;

    /// Remove a tag. Returns `false` if no such tag existed.
    async fn untag_post(&self, post_id: i64, channel_id: &str) -> Result<bool, ApiError>;

    // -- comments -----------------------------------------------------------

    /// Insert a comment and bump the post's `comment_count`, atomically.
    /// A reply's parent must be a comment of the same post; its depth is
    /// parent depth + 1.
    async fn create_comment(
        &self,
        post_id: i64,
        author_id: &str,
        content: &str,
        parent_comment_id: Option<i64>,
    ) -> Result<Comment, ApiError>;

    async fn get_comment(&self, id: i64) -> Result<Option<Comment>, ApiError>;

    /// The full flat comment set for a post, ascending by id.
    async fn list_comments(&self, post_id: i64) -> Result<Vec<Comment>, ApiError>;

    /// Delete a comment and its descendant subtree (plus votes on each
    /// removed comment) and decrement the post's `comment_count` by the
    /// number removed, atomically. Returns the number of comments removed.
    async fn delete_comment(&self, id: i64) -> Result<usize, ApiError>;

    // -- votes --------------------------------------------------------------

    /// Record a vote on a post and adjust its counters, atomically. A
    /// repeat vote of the same type returns the existing record; a vote of
    /// the opposite type switches the existing record and moves one count
    /// across.
    async fn cast_post_vote(
        &self,
        post_id: i64,
        user_id: &str,
        vote_type: VoteType,
    ) -> Result<Vote, ApiError>;

    /// As [`cast_post_vote`](Storage::cast_post_vote), for a comment.
    async fn cast_comment_vote(
        &self,
        comment_id: i64,
        user_id: &str,
        vote_type: VoteType,
    ) -> Result<Vote, ApiError>;

    async fn get_vote(&self, id: &str) -> Result<Option<Vote>, ApiError>;

    /// Remove a vote and decrement the matching counter, clamped at zero.
    /// Returns `false` if the vote no longer exists.
    async fn delete_vote(&self, id: &str) -> Result<bool, ApiError>;

    // -- sessions -----------------------------------------------------------

    async fn get_active_session(
        &self,
        channel_id: &str,
    ) -> Result<Option<ChannelSession>, ApiError>;

    async fn get_session(&self, id: &str) -> Result<Option<ChannelSession>, ApiError>;

    /// Persist a new active session for a channel. If a concurrent caller
    /// won the race to create one, the winner's row is returned instead of
    /// a second active session.
    async fn create_session(
        &self,
        channel_id: &str,
        created_by: &str,
        room_name: &str,
        room_url: &str,
    ) -> Result<ChannelSession, ApiError>;

    /// Mark a session ended and cascade every active participant to
    /// inactive, atomically. Returns the ended session, or `None` if it
    /// does not exist.
    async fn end_session(&self, id: &str) -> Result<Option<ChannelSession>, ApiError>;

    /// Add a participant, or reactivate their existing row (fresh
    /// `joined_at`, cleared `left_at`). One row per (session, user).
    async fn join_session(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> Result<SessionParticipant, ApiError>;

    /// Mark the caller's participant row inactive. A no-op when the row is
    /// already inactive or absent.
    async fn leave_session(&self, session_id: &str, user_id: &str) -> Result<(), ApiError>;

    async fn list_active_participants(
        &self,
        session_id: &str,
    ) -> Result<Vec<SessionParticipant>, ApiError>;

    /// Update the caller's client-reported media flags. Returns `None` if
    /// they have no active participant row.
    async fn update_participant_flags(
        &self,
        session_id: &str,
        user_id: &str,
        muted: Option<bool>,
        video_off: Option<bool>,
    ) -> Result<Option<SessionParticipant>, ApiError>;
}
