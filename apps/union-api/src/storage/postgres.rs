//! Postgres storage backend.
//!
//! Compound mutations (row insert/delete + counter adjustment, vote switch,
//! end-session cascade) run inside a database transaction so counters never
//! drift from the rows they mirror. The one-active-session-per-channel
//! invariant is backed by a partial unique index; a losing racer re-reads
//! the winner's row.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError, OptionalExtension};
use diesel_async::AsyncConnection;
use scoped_futures::ScopedFutureExt;

use unionvote_common::id::{prefix, prefixed_ulid};
use unionvote_common::SnowflakeGenerator;

use crate::db::pool::DbPool;
use crate::db::schema::{
    channel_sessions, channels, comments, post_channels, posts, session_participants,
    union_members, unions, users, votes,
};
use crate::error::ApiError;
use crate::models::channel::{Channel, NewChannel};
use crate::models::comment::{Comment, NewComment};
use crate::models::membership::{NewUnionMember, UnionMember, UnionMemberInfo};
use crate::models::post::{NewPost, Post, UpdatePost};
use crate::models::session::{ChannelSession, NewChannelSession, NewSessionParticipant, SessionParticipant};
use crate::models::union::{NewUnion, Union};
use crate::models::user::{NewUser, User};
use crate::models::vote::{NewVote, Vote, VoteType};

use super::Storage;

pub struct PgStorage {
    pool: DbPool,
    snowflake: Arc<SnowflakeGenerator>,
}

impl PgStorage {
    pub fn new(pool: DbPool, snowflake: Arc<SnowflakeGenerator>) -> Self {
        Self { pool, snowflake }
    }
}

fn is_unique_violation(err: &DieselError) -> bool {
    matches!(
        err,
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)
    )
}

#[async_trait]
impl Storage for PgStorage {
    // -- users --------------------------------------------------------------

    async fn upsert_user(
        &self,
        id: &str,
        username: &str,
        display_name: &str,
        avatar_url: Option<&str>,
    ) -> Result<User, ApiError> {
        let now = Utc::now();
        let mut conn = self.pool.get().await?;

        let query = diesel::insert_into(users::table)
            .values(NewUser {
                id,
                username,
                display_name,
                avatar_url,
                first_seen_at: now,
                last_seen_at: now,
            })
            .on_conflict(users::id)
            .do_update()
            .set((
                users::username.eq(username),
                users::display_name.eq(display_name),
                users::avatar_url.eq(avatar_url),
                users::last_seen_at.eq(now),
            ))
            .returning(User::as_returning());

        let user: User = diesel_async::RunQueryDsl::get_result(query, &mut conn).await?;

        Ok(user)
    }

    async fn get_user(&self, id: &str) -> Result<Option<User>, ApiError> {
        let mut conn = self.pool.get().await?;
        let user: Option<User> = diesel_async::RunQueryDsl::get_result(
            users::table.find(id).select(User::as_select()),
            &mut conn,
        )
        .await
        .optional()?;
        Ok(user)
    }

    // -- unions -------------------------------------------------------------

    async fn create_union(
        &self,
        owner_id: &str,
        name: &str,
        description: Option<&str>,
    ) -> Result<Union, ApiError> {
        let now = Utc::now();
        let union_id = prefixed_ulid(prefix::UNION);
        let channel_id = prefixed_ulid(prefix::CHANNEL);

        let mut conn = self.pool.get().await?;

        let union = conn
            .transaction::<_, ApiError, _>(|conn| {
                async move {
                    let union: Union = diesel_async::RunQueryDsl::get_result(
                        diesel::insert_into(unions::table)
                            .values(NewUnion {
                                id: &union_id,
                                name,
                                description,
                                owner_id,
                                member_count: 1,
                                created_at: now,
                                updated_at: now,
                            })
                            .returning(Union::as_returning()),
                        conn,
                    )
                    .await?;

                    diesel_async::RunQueryDsl::execute(
                        diesel::insert_into(union_members::table).values(NewUnionMember {
                            union_id: &union_id,
                            user_id: owner_id,
                            joined_at: now,
                        }),
                        conn,
                    )
                    .await?;

                    diesel_async::RunQueryDsl::execute(
                        diesel::insert_into(channels::table).values(NewChannel {
                            id: &channel_id,
                            union_id: &union_id,
                            creator_id: owner_id,
                            name: "general",
                            description: None,
                            kind: 0,
                            created_at: now,
                        }),
                        conn,
                    )
                    .await?;

                    Ok(union)
                }
                .scope_boxed()
            })
            .await?;

        Ok(union)
    }

    async fn get_union(&self, id: &str) -> Result<Option<Union>, ApiError> {
        let mut conn = self.pool.get().await?;
        let union: Option<Union> = diesel_async::RunQueryDsl::get_result(
            unions::table.find(id).select(Union::as_select()),
            &mut conn,
        )
        .await
        .optional()?;
        Ok(union)
    }

    async fn list_unions(&self) -> Result<Vec<Union>, ApiError> {
        let mut conn = self.pool.get().await?;
        let list: Vec<Union> = diesel_async::RunQueryDsl::load(
            unions::table.order(unions::id.asc()).select(Union::as_select()),
            &mut conn,
        )
        .await?;
        Ok(list)
    }

    async fn join_union(&self, union_id: &str, user_id: &str) -> Result<UnionMember, ApiError> {
        let now = Utc::now();
        let mut conn = self.pool.get().await?;

        let member = conn
            .transaction::<_, ApiError, _>(|conn| {
                async move {
                    let insert = diesel_async::RunQueryDsl::get_result(
                        diesel::insert_into(union_members::table)
                            .values(NewUnionMember {
                                union_id,
                                user_id,
                                joined_at: now,
                            })
                            .returning(UnionMember::as_returning()),
                        conn,
                    )
                    .await;

                    let member: UnionMember = match insert {
                        Ok(member) => member,
                        Err(ref e) if is_unique_violation(e) => {
                            return Err(ApiError::conflict(
                                "You are already a member of this union",
                            ));
                        }
                        Err(e) => return Err(e.into()),
                    };

                    diesel_async::RunQueryDsl::execute(
                        diesel::update(unions::table.find(union_id))
                            .set(unions::member_count.eq(unions::member_count + 1)),
                        conn,
                    )
                    .await?;

                    Ok(member)
                }
                .scope_boxed()
            })
            .await?;

        Ok(member)
    }

    async fn leave_union(&self, union_id: &str, user_id: &str) -> Result<bool, ApiError> {
        let mut conn = self.pool.get().await?;

        let removed = conn
            .transaction::<_, ApiError, _>(|conn| {
                async move {
                    let deleted = diesel_async::RunQueryDsl::execute(
                        diesel::delete(union_members::table.find((union_id, user_id))),
                        conn,
                    )
                    .await?;

                    if deleted == 0 {
                        return Ok(false);
                    }

                    let count: i32 = diesel_async::RunQueryDsl::get_result(
                        unions::table.find(union_id).select(unions::member_count),
                        conn,
                    )
                    .await?;
                    diesel_async::RunQueryDsl::execute(
                        diesel::update(unions::table.find(union_id))
                            .set(unions::member_count.eq((count - 1).max(0))),
                        conn,
                    )
                    .await?;

                    Ok(true)
                }
                .scope_boxed()
            })
            .await?;

        Ok(removed)
    }

    async fn is_member(&self, union_id: &str, user_id: &str) -> Result<bool, ApiError> {
        let mut conn = self.pool.get().await?;
        let count: i64 = diesel_async::RunQueryDsl::get_result(
            union_members::table.find((union_id, user_id)).count(),
            &mut conn,
        )
        .await?;
        Ok(count > 0)
    }

    async fn list_members(&self, union_id: &str) -> Result<Vec<UnionMemberInfo>, ApiError> {
        let mut conn = self.pool.get().await?;

        let rows: Vec<(UnionMember, String, String, Option<String>)> =
            diesel_async::RunQueryDsl::load(
                union_members::table
                    .inner_join(users::table)
                    .filter(union_members::union_id.eq(union_id))
                    .order(union_members::joined_at.asc())
                    .select((
                        UnionMember::as_select(),
                        users::username,
                        users::display_name,
                        users::avatar_url,
                    )),
                &mut conn,
            )
            .await?;

        Ok(rows
            .into_iter()
            .map(|(m, username, display_name, avatar_url)| UnionMemberInfo {
                union_id: m.union_id,
                user_id: m.user_id,
                username,
                display_name,
                avatar_url,
                joined_at: m.joined_at,
            })
            .collect())
    }

    // -- channels -----------------------------------------------------------

    async fn create_channel(
        &self,
        union_id: &str,
        creator_id: &str,
        name: &str,
        description: Option<&str>,
        kind: i16,
    ) -> Result<Channel, ApiError> {
        let now = Utc::now();
        let channel_id = prefixed_ulid(prefix::CHANNEL);
        let mut conn = self.pool.get().await?;

        let channel: Channel = diesel_async::RunQueryDsl::get_result(
            diesel::insert_into(channels::table)
                .values(NewChannel {
                    id: &channel_id,
                    union_id,
                    creator_id,
                    name,
                    description,
                    kind,
                    created_at: now,
                })
                .returning(Channel::as_returning()),
            &mut conn,
        )
        .await?;

        Ok(channel)
    }

    async fn get_channel(&self, id: &str) -> Result<Option<Channel>, ApiError> {
        let mut conn = self.pool.get().await?;
        let channel: Option<Channel> = diesel_async::RunQueryDsl::get_result(
            channels::table.find(id).select(Channel::as_select()),
            &mut conn,
        )
        .await
        .optional()?;
        Ok(channel)
    }

    async fn list_channels(&self, union_id: &str) -> Result<Vec<Channel>, ApiError> {
        let mut conn = self.pool.get().await?;
        let list: Vec<Channel> = diesel_async::RunQueryDsl::load(
            channels::table
                .filter(channels::union_id.eq(union_id))
                .order(channels::id.asc())
                .select(Channel::as_select()),
            &mut conn,
        )
        .await?;
        Ok(list)
    }

    async fn delete_channel(&self, id: &str) -> Result<bool, ApiError> {
        let mut conn = self.pool.get().await?;
        // Posts, tags, sessions and participants go with it via FK cascades.
        let deleted = diesel_async::RunQueryDsl::execute(
            diesel::delete(channels::table.find(id)),
            &mut conn,
        )
        .await?;
        Ok(deleted > 0)
    }

    // -- posts --------------------------------------------------------------

    async fn create_post(
        &self,
        union_id: &str,
        channel_id: &str,
        author_id: &str,
        title: &str,
        content: &str,
    ) -> Result<Post, ApiError> {
        let id = self.snowflake.generate();
        let now = Utc::now();
        let mut conn = self.pool.get().await?;

        let post: Post = diesel_async::RunQueryDsl::get_result(
            diesel::insert_into(posts::table)
                .values(NewPost {
                    id,
                    union_id,
                    channel_id,
                    author_id,
                    title,
                    content,
                    upvotes: 0,
                    downvotes: 0,
                    comment_count: 0,
                    created_at: now,
                })
                .returning(Post::as_returning()),
            &mut conn,
        )
        .await?;

        Ok(post)
    }

    async fn get_post(&self, id: i64) -> Result<Option<Post>, ApiError> {
        let mut conn = self.pool.get().await?;
        let post: Option<Post> = diesel_async::RunQueryDsl::get_result(
            posts::table.find(id).select(Post::as_select()),
            &mut conn,
        )
        .await
        .optional()?;
        Ok(post)
    }

    async fn update_post(
        &self,
        id: i64,
        title: Option<String>,
        content: Option<String>,
    ) -> Result<Option<Post>, ApiError> {
        let mut conn = self.pool.get().await?;

        let changeset = UpdatePost {
            title,
            content,
            edited_at: Utc::now(),
        };

        let updated: Option<Post> = diesel_async::RunQueryDsl::get_result(
            diesel::update(posts::table.find(id))
                .set(&changeset)
                .returning(Post::as_returning()),
            &mut conn,
        )
        .await
        .optional()?;

        Ok(updated)
    }

    async fn delete_post(&self, id: i64) -> Result<bool, ApiError> {
        let mut conn = self.pool.get().await?;
        // Comments, votes and tags go with it via FK cascades.
        let deleted =
            diesel_async::RunQueryDsl::execute(diesel::delete(posts::table.find(id)), &mut conn)
                .await?;
        Ok(deleted > 0)
    }

    async fn list_channel_posts(
        &self,
        channel_id: &str,
        cutoff: Option<DateTime<Utc>>,
    ) -> Result<Vec<Post>, ApiError> {
        let mut conn = self.pool.get().await?;

        let mut home = posts::table
            .filter(posts::channel_id.eq(channel_id))
            .select(Post::as_select())
            .into_boxed();
        if let Some(cutoff) = cutoff {
            home = home.filter(posts::created_at.ge(cutoff));
        }
        let mut list: Vec<Post> = diesel_async::RunQueryDsl::load(home, &mut conn).await?;

        let tagged_ids: Vec<i64> = diesel_async::RunQueryDsl::load(
            post_channels::table
                .filter(post_channels::channel_id.eq(channel_id))
                .select(post_channels::post_id),
            &mut conn,
        )
        .await?;

        if !tagged_ids.is_empty() {
            let mut tagged = posts::table
                .filter(posts::id.eq_any(tagged_ids))
                .select(Post::as_select())
                .into_boxed();
            if let Some(cutoff) = cutoff {
                tagged = tagged.filter(posts::created_at.ge(cutoff));
            }
            let tagged: Vec<Post> = diesel_async::RunQueryDsl::load(tagged, &mut conn).await?;
            // A tag into the home channel cannot exist, but dedup anyway.
            for post in tagged {
                if !list.iter().any(|p| p.id == post.id) {
                    list.push(post);
                }
            }
        }

        Ok(list)
    }

    async fn list_union_posts(
        &self,
        union_id: &str,
        cutoff: Option<DateTime<Utc>>,
    ) -> Result<Vec<Post>, ApiError> {
        let mut conn = self.pool.get().await?;

        let mut query = posts::table
            .filter(posts::union_id.eq(union_id))
            .select(Post::as_select())
            .into_boxed();
        if let Some(cutoff) = cutoff {
            query = query.filter(posts::created_at.ge(cutoff));
        }

        let list: Vec<Post> = diesel_async::RunQueryDsl::load(query, &mut conn).await?;
        Ok(list)
    }

    async fn tag_post(&self, post_id: i64, channel_id: &str) -> Result<(), ApiError> {
        let mut conn = self.pool.get().await?;
        diesel_async::RunQueryDsl::execute(
            diesel::insert_into(post_channels::table)
                .values((
                    post_channels::post_id.eq(post_id),
                    post_channels::channel_id.eq(channel_id),
                    post_channels::tagged_at.eq(Utc::now()),
                ))
                .on_conflict((post_channels::post_id, post_channels::channel_id))
                .do_nothing(),
            &mut conn,
        )
        .await?;
        Ok(())
    }

    async fn untag_post(&self, post_id: i64, channel_id: &str) -> Result<bool, ApiError> {
        let mut conn = self.pool.get().await?;
        let deleted = diesel_async::RunQueryDsl::execute(
            diesel::delete(post_channels::table.find((post_id, channel_id))),
            &mut conn,
        )
        .await?;
        Ok(deleted > 0)
    }

    // -- comments -----------------------------------------------------------

    async fn create_comment(
        &self,
        post_id: i64,
        author_id: &str,
        content: &str,
        parent_comment_id: Option<i64>,
    ) -> Result<Comment, ApiError> {
        let id = self.snowflake.generate();
        let now = Utc::now();
        let mut conn = self.pool.get().await?;

        let comment = conn
            .transaction::<_, ApiError, _>(|conn| {
                async move {
                    diesel_async::RunQueryDsl::get_result::<i64>(
                        posts::table.find(post_id).select(posts::id),
                        conn,
                    )
                    .await
                    .optional()?
                    .ok_or_else(|| ApiError::not_found("Post not found"))?;

                    let depth = match parent_comment_id {
                        Some(parent_id) => {
                            let parent_depth: Option<i32> =
                                diesel_async::RunQueryDsl::get_result(
                                    comments::table
                                        .filter(comments::id.eq(parent_id))
                                        .filter(comments::post_id.eq(post_id))
                                        .select(comments::depth),
                                    conn,
                                )
                                .await
                                .optional()?;
                            parent_depth
                                .ok_or_else(|| ApiError::not_found("Parent comment not found"))?
                                + 1
                        }
                        None => 0,
                    };

                    let comment: Comment = diesel_async::RunQueryDsl::get_result(
                        diesel::insert_into(comments::table)
                            .values(NewComment {
                                id,
                                post_id,
                                author_id,
                                content,
                                parent_comment_id,
                                depth,
                                upvotes: 0,
                                downvotes: 0,
                                created_at: now,
                            })
                            .returning(Comment::as_returning()),
                        conn,
                    )
                    .await?;

                    diesel_async::RunQueryDsl::execute(
                        diesel::update(posts::table.find(post_id))
                            .set(posts::comment_count.eq(posts::comment_count + 1)),
                        conn,
                    )
                    .await?;

                    Ok(comment)
                }
                .scope_boxed()
            })
            .await?;

        Ok(comment)
    }

    async fn get_comment(&self, id: i64) -> Result<Option<Comment>, ApiError> {
        let mut conn = self.pool.get().await?;
        let comment: Option<Comment> = diesel_async::RunQueryDsl::get_result(
            comments::table.find(id).select(Comment::as_select()),
            &mut conn,
        )
        .await
        .optional()?;
        Ok(comment)
    }

    async fn list_comments(&self, post_id: i64) -> Result<Vec<Comment>, ApiError> {
        let mut conn = self.pool.get().await?;
        let list: Vec<Comment> = diesel_async::RunQueryDsl::load(
            comments::table
                .filter(comments::post_id.eq(post_id))
                .order(comments::id.asc())
                .select(Comment::as_select()),
            &mut conn,
        )
        .await?;
        Ok(list)
    }

    async fn delete_comment(&self, id: i64) -> Result<usize, ApiError> {
        let mut conn = self.pool.get().await?;

        let removed = conn
            .transaction::<_, ApiError, _>(|conn| {
                async move {
                    let target: Option<(i64, i64)> = diesel_async::RunQueryDsl::get_result(
                        comments::table
                            .find(id)
                            .select((comments::id, comments::post_id)),
                        conn,
                    )
                    .await
                    .optional()?;

                    let Some((root, post_id)) = target else {
                        return Ok(0);
                    };

                    // Walk the forest in memory to collect the subtree.
                    let edges: Vec<(i64, Option<i64>)> = diesel_async::RunQueryDsl::load(
                        comments::table
                            .filter(comments::post_id.eq(post_id))
                            .select((comments::id, comments::parent_comment_id)),
                        conn,
                    )
                    .await?;

                    let mut children: std::collections::HashMap<i64, Vec<i64>> =
                        std::collections::HashMap::new();
                    for (cid, parent) in &edges {
                        if let Some(parent) = parent {
                            children.entry(*parent).or_default().push(*cid);
                        }
                    }
                    let mut subtree = Vec::new();
                    let mut stack = vec![root];
                    while let Some(cid) = stack.pop() {
                        subtree.push(cid);
                        if let Some(kids) = children.get(&cid) {
                            stack.extend(kids);
                        }
                    }

                    diesel_async::RunQueryDsl::execute(
                        diesel::delete(
                            votes::table.filter(votes::comment_id.eq_any(&subtree)),
                        ),
                        conn,
                    )
                    .await?;
                    let removed = diesel_async::RunQueryDsl::execute(
                        diesel::delete(comments::table.filter(comments::id.eq_any(&subtree))),
                        conn,
                    )
                    .await?;

                    let count: i32 = diesel_async::RunQueryDsl::get_result(
                        posts::table.find(post_id).select(posts::comment_count),
                        conn,
                    )
                    .await?;
                    diesel_async::RunQueryDsl::execute(
                        diesel::update(posts::table.find(post_id))
                            .set(posts::comment_count.eq((count - removed as i32).max(0))),
                        conn,
                    )
                    .await?;

                    Ok(removed)
                }
                .scope_boxed()
            })
            .await?;

        Ok(removed)
    }

    // -- votes --------------------------------------------------------------

    async fn cast_post_vote(
        &self,
        post_id: i64,
        user_id: &str,
        vote_type: VoteType,
    ) -> Result<Vote, ApiError> {
        let vote_id = prefixed_ulid(prefix::VOTE);
        let now = Utc::now();
        let mut conn = self.pool.get().await?;

        let vote = conn
            .transaction::<_, ApiError, _>(|conn| {
                async move {
                    let post: Option<(i32, i32)> = diesel_async::RunQueryDsl::get_result(
                        posts::table
                            .find(post_id)
                            .select((posts::upvotes, posts::downvotes)),
                        conn,
                    )
                    .await
                    .optional()?;
                    let (upvotes, downvotes) =
                        post.ok_or_else(|| ApiError::not_found("Post not found"))?;

                    let existing: Option<Vote> = diesel_async::RunQueryDsl::get_result(
                        votes::table
                            .filter(votes::post_id.eq(post_id))
                            .filter(votes::user_id.eq(user_id))
                            .select(Vote::as_select()),
                        conn,
                    )
                    .await
                    .optional()?;

                    if let Some(existing) = existing {
                        let old_type = VoteType::from_i16(existing.vote_type)
                            .ok_or_else(|| ApiError::internal("corrupt vote record"))?;
                        if old_type == vote_type {
                            return Ok(existing);
                        }

                        // Switch: move one count across.
                        let (new_up, new_down) = match vote_type {
                            VoteType::Upvote => (upvotes + 1, (downvotes - 1).max(0)),
                            VoteType::Downvote => ((upvotes - 1).max(0), downvotes + 1),
                        };
                        let updated: Vote = diesel_async::RunQueryDsl::get_result(
                            diesel::update(votes::table.find(&existing.id))
                                .set((
                                    votes::vote_type.eq(vote_type.as_i16()),
                                    votes::created_at.eq(now),
                                ))
                                .returning(Vote::as_returning()),
                            conn,
                        )
                        .await?;
                        diesel_async::RunQueryDsl::execute(
                            diesel::update(posts::table.find(post_id)).set((
                                posts::upvotes.eq(new_up),
                                posts::downvotes.eq(new_down),
                            )),
                            conn,
                        )
                        .await?;
                        return Ok(updated);
                    }

                    let insert = diesel_async::RunQueryDsl::get_result(
                        diesel::insert_into(votes::table)
                            .values(NewVote {
                                id: &vote_id,
                                user_id,
                                post_id: Some(post_id),
                                comment_id: None,
                                vote_type: vote_type.as_i16(),
                                created_at: now,
                            })
                            .returning(Vote::as_returning()),
                        conn,
                    )
                    .await;

                    let vote: Vote = match insert {
                        Ok(vote) => vote,
                        Err(ref e) if is_unique_violation(e) => {
                            return Err(ApiError::conflict("Vote already recorded"));
                        }
                        Err(e) => return Err(e.into()),
                    };

                    match vote_type {
                        VoteType::Upvote => {
                            diesel_async::RunQueryDsl::execute(
                                diesel::update(posts::table.find(post_id))
                                    .set(posts::upvotes.eq(posts::upvotes + 1)),
                                conn,
                            )
                            .await?;
                        }
                        VoteType::Downvote => {
                            diesel_async::RunQueryDsl::execute(
                                diesel::update(posts::table.find(post_id))
                                    .set(posts::downvotes.eq(posts::downvotes + 1)),
                                conn,
                            )
                            .await?;
                        }
                    }

                    Ok(vote)
                }
                .scope_boxed()
            })
            .await?;

        Ok(vote)
    }

    async fn cast_comment_vote(
        &self,
        comment_id: i64,
        user_id: &str,
        vote_type: VoteType,
    ) -> Result<Vote, ApiError> {
        let vote_id = prefixed_ulid(prefix::VOTE);
        let now = Utc::now();
        let mut conn = self.pool.get().await?;

        let vote = conn
            .transaction::<_, ApiError, _>(|conn| {
                async move {
                    let comment: Option<(i32, i32)> = diesel_async::RunQueryDsl::get_result(
                        comments::table
                            .find(comment_id)
                            .select((comments::upvotes, comments::downvotes)),
                        conn,
                    )
                    .await
                    .optional()?;
                    let (upvotes, downvotes) =
                        comment.ok_or_else(|| ApiError::not_found("Comment not found"))?;

                    let existing: Option<Vote> = diesel_async::RunQueryDsl::get_result(
                        votes::table
                            .filter(votes::comment_id.eq(comment_id))
                            .filter(votes::user_id.eq(user_id))
                            .select(Vote::as_select()),
                        conn,
                    )
                    .await
                    .optional()?;

                    if let Some(existing) = existing {
                        let old_type = VoteType::from_i16(existing.vote_type)
                            .ok_or_else(|| ApiError::internal("corrupt vote record"))?;
                        if old_type == vote_type {
                            return Ok(existing);
                        }

                        let (new_up, new_down) = match vote_type {
                            VoteType::Upvote => (upvotes + 1, (downvotes - 1).max(0)),
                            VoteType::Downvote => ((upvotes - 1).max(0), downvotes + 1),
                        };
                        let updated: Vote = diesel_async::RunQueryDsl::get_result(
                            diesel::update(votes::table.find(&existing.id))
                                .set((
                                    votes::vote_type.eq(vote_type.as_i16()),
                                    votes::created_at.eq(now),
                                ))
                                .returning(Vote::as_returning()),
                            conn,
                        )
                        .await?;
                        diesel_async::RunQueryDsl::execute(
                            diesel::update(comments::table.find(comment_id)).set((
                                comments::upvotes.eq(new_up),
                                comments::downvotes.eq(new_down),
                            )),
                            conn,
                        )
                        .await?;
                        return Ok(updated);
                    }

                    let insert = diesel_async::RunQueryDsl::get_result(
                        diesel::insert_into(votes::table)
                            .values(NewVote {
                                id: &vote_id,
                                user_id,
                                post_id: None,
                                comment_id: Some(comment_id),
                                vote_type: vote_type.as_i16(),
                                created_at: now,
                            })
                            .returning(Vote::as_returning()),
                        conn,
                    )
                    .await;

                    let vote: Vote = match insert {
                        Ok(vote) => vote,
                        Err(ref e) if is_unique_violation(e) => {
                            return Err(ApiError::conflict("Vote already recorded"));
                        }
                        Err(e) => return Err(e.into()),
                    };

                    match vote_type {
                        VoteType::Upvote => {
                            diesel_async::RunQueryDsl::execute(
                                diesel::update(comments::table.find(comment_id))
                                    .set(comments::upvotes.eq(comments::upvotes + 1)),
                                conn,
                            )
                            .await?;
                        }
                        VoteType::Downvote => {
                            diesel_async::RunQueryDsl::execute(
                                diesel::update(comments::table.find(comment_id))
                                    .set(comments::downvotes.eq(comments::downvotes + 1)),
                                conn,
                            )
                            .await?;
                        }
                    }

                    Ok(vote)
                }
                .scope_boxed()
            })
            .await?;

        Ok(vote)
    }

    async fn get_vote(&self, id: &str) -> Result<Option<Vote>, ApiError> {
        let mut conn = self.pool.get().await?;
        let vote: Option<Vote> = diesel_async::RunQueryDsl::get_result(
            votes::table.find(id).select(Vote::as_select()),
            &mut conn,
        )
        .await
        .optional()?;
        Ok(vote)
    }

    async fn delete_vote(&self, id: &str) -> Result<bool, ApiError> {
        let mut conn = self.pool.get().await?;

        let deleted = conn
            .transaction::<_, ApiError, _>(|conn| {
                async move {
                    let vote: Option<Vote> = diesel_async::RunQueryDsl::get_result(
                        diesel::delete(votes::table.find(id)).returning(Vote::as_returning()),
                        conn,
                    )
                    .await
                    .optional()?;

                    let Some(vote) = vote else {
                        return Ok(false);
                    };
                    let Some(vote_type) = VoteType::from_i16(vote.vote_type) else {
                        return Ok(true);
                    };

                    if let Some(post_id) = vote.post_id {
                        let counts: Option<(i32, i32)> = diesel_async::RunQueryDsl::get_result(
                            posts::table
                                .find(post_id)
                                .select((posts::upvotes, posts::downvotes)),
                            conn,
                        )
                        .await
                        .optional()?;
                        if let Some((up, down)) = counts {
                            let (up, down) = match vote_type {
                                VoteType::Upvote => ((up - 1).max(0), down),
                                VoteType::Downvote => (up, (down - 1).max(0)),
                            };
                            diesel_async::RunQueryDsl::execute(
                                diesel::update(posts::table.find(post_id))
                                    .set((posts::upvotes.eq(up), posts::downvotes.eq(down))),
                                conn,
                            )
                            .await?;
                        }
                    }

                    if let Some(comment_id) = vote.comment_id {
                        let counts: Option<(i32, i32)> = diesel_async::RunQueryDsl::get_result(
                            comments::table
                                .find(comment_id)
                                .select((comments::upvotes, comments::downvotes)),
                            conn,
                        )
                        .await
                        .optional()?;
                        if let Some((up, down)) = counts {
                            let (up, down) = match vote_type {
                                VoteType::Upvote => ((up - 1).max(0), down),
                                VoteType::Downvote => (up, (down - 1).max(0)),
                            };
                            diesel_async::RunQueryDsl::execute(
                                diesel::update(comments::table.find(comment_id))
                                    .set((comments::upvotes.eq(up), comments::downvotes.eq(down))),
                                conn,
                            )
                            .await?;
                        }
                    }

                    Ok(true)
                }
                .scope_boxed()
            })
            .await?;

        Ok(deleted)
    }

    // -- sessions -----------------------------------------------------------

    async fn get_active_session(
        &self,
        channel_id: &str,
    ) -> Result<Option<ChannelSession>, ApiError> {
        let mut conn = self.pool.get().await?;
        let session: Option<ChannelSession> = diesel_async::RunQueryDsl::get_result(
            channel_sessions::table
                .filter(channel_sessions::channel_id.eq(channel_id))
                .filter(channel_sessions::is_active.eq(true))
                .limit(1)
                .select(ChannelSession::as_select()),
            &mut conn,
        )
        .await
        .optional()?;
        Ok(session)
    }

    async fn get_session(&self, id: &str) -> Result<Option<ChannelSession>, ApiError> {
        let mut conn = self.pool.get().await?;
        let session: Option<ChannelSession> = diesel_async::RunQueryDsl::get_result(
            channel_sessions::table
                .find(id)
                .select(ChannelSession::as_select()),
            &mut conn,
        )
        .await
        .optional()?;
        Ok(session)
    }

    async fn create_session(
        &self,
        channel_id: &str,
        created_by: &str,
        room_name: &str,
        room_url: &str,
    ) -> Result<ChannelSession, ApiError> {
        let session_id = prefixed_ulid(prefix::SESSION);
        let now = Utc::now();
        let mut conn = self.pool.get().await?;

        let insert = diesel_async::RunQueryDsl::get_result(
            diesel::insert_into(channel_sessions::table)
                .values(NewChannelSession {
                    id: &session_id,
                    channel_id,
                    room_name,
                    room_url,
                    created_by,
                    started_at: now,
                    is_active: true,
                })
                .returning(ChannelSession::as_returning()),
            &mut conn,
        )
        .await;

        match insert {
            Ok(session) => Ok(session),
            // The partial unique index on (channel_id) WHERE is_active means
            // a concurrent first-join beat us; hand back the winner's row.
            Err(ref e) if is_unique_violation(e) => self
                .get_active_session(channel_id)
                .await?
                .ok_or_else(|| ApiError::internal("active session vanished")),
            Err(e) => Err(e.into()),
        }
    }

    async fn end_session(&self, id: &str) -> Result<Option<ChannelSession>, ApiError> {
        let now = Utc::now();
        let mut conn = self.pool.get().await?;

        let session = conn
            .transaction::<_, ApiError, _>(|conn| {
                async move {
                    let ended: Option<ChannelSession> = diesel_async::RunQueryDsl::get_result(
                        diesel::update(
                            channel_sessions::table
                                .find(id)
                                .filter(channel_sessions::is_active.eq(true)),
                        )
                        .set((
                            channel_sessions::is_active.eq(false),
                            channel_sessions::ended_at.eq(now),
                        ))
                        .returning(ChannelSession::as_returning()),
                        conn,
                    )
                    .await
                    .optional()?;

                    let Some(ended) = ended else {
                        // Already ended, or missing entirely.
                        let existing: Option<ChannelSession> =
                            diesel_async::RunQueryDsl::get_result(
                                channel_sessions::table
                                    .find(id)
                                    .select(ChannelSession::as_select()),
                                conn,
                            )
                            .await
                            .optional()?;
                        return Ok(existing);
                    };

                    diesel_async::RunQueryDsl::execute(
                        diesel::update(
                            session_participants::table
                                .filter(session_participants::session_id.eq(id))
                                .filter(session_participants::is_active.eq(true)),
                        )
                        .set((
                            session_participants::is_active.eq(false),
                            session_participants::left_at.eq(now),
                        )),
                        conn,
                    )
                    .await?;

                    Ok(Some(ended))
                }
                .scope_boxed()
            })
            .await?;

        Ok(session)
    }

    async fn join_session(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> Result<SessionParticipant, ApiError> {
        let now = Utc::now();
        let mut conn = self.pool.get().await?;

        let participant = conn
            .transaction::<_, ApiError, _>(|conn| {
                async move {
                    let existing: Option<SessionParticipant> =
                        diesel_async::RunQueryDsl::get_result(
                            session_participants::table
                                .find((session_id, user_id))
                                .select(SessionParticipant::as_select()),
                            conn,
                        )
                        .await
                        .optional()?;

                    match existing {
                        Some(p) if p.is_active => Ok(p),
                        Some(_) => {
                            // Rejoin: reactivate the same row so participant
                            // identity survives the disconnect.
                            let reactivated: SessionParticipant =
                                diesel_async::RunQueryDsl::get_result(
                                    diesel::update(
                                        session_participants::table.find((session_id, user_id)),
                                    )
                                    .set((
                                        session_participants::is_active.eq(true),
                                        session_participants::joined_at.eq(now),
                                        session_participants::left_at
                                            .eq(None::<DateTime<Utc>>),
                                    ))
                                    .returning(SessionParticipant::as_returning()),
                                    conn,
                                )
                                .await?;
                            Ok(reactivated)
                        }
                        None => {
                            let created: SessionParticipant =
                                diesel_async::RunQueryDsl::get_result(
                                    diesel::insert_into(session_participants::table)
                                        .values(NewSessionParticipant {
                                            session_id,
                                            user_id,
                                            joined_at: now,
                                            is_active: true,
                                            muted: false,
                                            video_off: true,
                                        })
                                        .returning(SessionParticipant::as_returning()),
                                    conn,
                                )
                                .await?;
                            Ok(created)
                        }
                    }
                }
                .scope_boxed()
            })
            .await?;

        Ok(participant)
    }

    async fn leave_session(&self, session_id: &str, user_id: &str) -> Result<(), ApiError> {
        let mut conn = self.pool.get().await?;
        diesel_async::RunQueryDsl::execute(
            diesel::update(
                session_participants::table
                    .find((session_id, user_id))
                    .filter(session_participants::is_active.eq(true)),
            )
            .set((
                session_participants::is_active.eq(false),
                session_participants::left_at.eq(Utc::now()),
            )),
            &mut conn,
        )
        .await?;
        Ok(())
    }

    async fn list_active_participants(
        &self,
        session_id: &str,
    ) -> Result<Vec<SessionParticipant>, ApiError> {
        let mut conn = self.pool.get().await?;
        let list: Vec<SessionParticipant> = diesel_async::RunQueryDsl::load(
            session_participants::table
                .filter(session_participants::session_id.eq(session_id))
                .filter(session_participants::is_active.eq(true))
                .order(session_participants::joined_at.asc())
                .select(SessionParticipant::as_select()),
            &mut conn,
        )
        .await?;
        Ok(list)
    }

    async fn update_participant_flags(
        &self,
        session_id: &str,
        user_id: &str,
        muted: Option<bool>,
        video_off: Option<bool>,
    ) -> Result<Option<SessionParticipant>, ApiError> {
        let mut conn = self.pool.get().await?;

        let existing: Option<SessionParticipant> = diesel_async::RunQueryDsl::get_result(
            session_participants::table
                .find((session_id, user_id))
                .filter(session_participants::is_active.eq(true))
                .select(SessionParticipant::as_select()),
            &mut conn,
        )
        .await
        .optional()?;

        let Some(current) = existing else {
            return Ok(None);
        };

        let updated: SessionParticipant = diesel_async::RunQueryDsl::get_result(
            diesel::update(session_participants::table.find((session_id, user_id)))
                .set((
                    session_participants::muted.eq(muted.unwrap_or(current.muted)),
                    session_participants::video_off.eq(video_off.unwrap_or(current.video_off)),
                ))
                .returning(SessionParticipant::as_returning()),
            &mut conn,
        )
        .await?;

        Ok(Some(updated))
    }
}
