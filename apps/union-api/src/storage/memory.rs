//! In-memory storage backend.
//!
//! A single `RwLock` over the whole dataset: every mutation runs under the
//! write lock, which is what makes the compound updates (row + counter,
//! end-session cascade) atomic here.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use unionvote_common::id::{prefix, prefixed_ulid};
use unionvote_common::SnowflakeGenerator;

use crate::error::ApiError;
use crate::models::channel::Channel;
use crate::models::comment::Comment;
use crate::models::membership::{UnionMember, UnionMemberInfo};
use crate::models::post::Post;
use crate::models::session::{ChannelSession, SessionParticipant};
use crate::models::union::Union;
use crate::models::user::User;
use crate::models::vote::{Vote, VoteType};

use super::Storage;

#[derive(Default)]
struct Inner {
    users: HashMap<String, User>,
    unions: HashMap<String, Union>,
    members: HashMap<(String, String), UnionMember>,
    channels: HashMap<String, Channel>,
    posts: BTreeMap<i64, Post>,
    post_tags: HashMap<(i64, String), DateTime<Utc>>,
    comments: BTreeMap<i64, Comment>,
    votes: HashMap<String, Vote>,
    sessions: HashMap<String, ChannelSession>,
    participants: HashMap<(String, String), SessionParticipant>,
}

pub struct MemoryStorage {
    snowflake: Arc<SnowflakeGenerator>,
    inner: RwLock<Inner>,
}

impl MemoryStorage {
    pub fn new(snowflake: Arc<SnowflakeGenerator>) -> Self {
        Self {
            snowflake,
            inner: RwLock::new(Inner::default()),
        }
    }
}

/// Apply a vote-count delta to a post or comment, clamped at zero.
fn adjust_counts(upvotes: &mut i32, downvotes: &mut i32, vote_type: VoteType, delta: i32) {
    let counter = match vote_type {
        VoteType::Upvote => upvotes,
        VoteType::Downvote => downvotes,
    };
    *counter = (*counter + delta).max(0);
}

impl Inner {
    /// Ids of `root` and every comment below it.
    fn comment_subtree(&self, post_id: i64, root: i64) -> Vec<i64> {
        let mut children: HashMap<i64, Vec<i64>> = HashMap::new();
        for c in self.comments.values().filter(|c| c.post_id == post_id) {
            if let Some(parent) = c.parent_comment_id {
                children.entry(parent).or_default().push(c.id);
            }
        }

        let mut ids = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            ids.push(id);
            if let Some(kids) = children.get(&id) {
                stack.extend(kids);
            }
        }
        ids
    }

    fn remove_post(&mut self, post_id: i64) {
        self.posts.remove(&post_id);
        self.comments.retain(|_, c| c.post_id != post_id);
        self.post_tags.retain(|(pid, _), _| *pid != post_id);
        let comments = &self.comments;
        self.votes.retain(|_, v| {
            v.post_id != Some(post_id)
                && v.comment_id.is_none_or(|cid| comments.contains_key(&cid))
        });
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    // -- users --------------------------------------------------------------

    async fn upsert_user(
        &self,
        id: &str,
        username: &str,
        display_name: &str,
        avatar_url: Option<&str>,
    ) -> Result<User, ApiError> {
        let now = Utc::now();
        let mut inner = self.inner.write();
        let user = inner
            .users
            .entry(id.to_string())
            .and_modify(|u| {
                u.username = username.to_string();
                u.display_name = display_name.to_string();
                u.avatar_url = avatar_url.map(str::to_string);
                u.last_seen_at = now;
            })
            .or_insert_with(|| User {
                id: id.to_string(),
                username: username.to_string(),
                display_name: display_name.to_string(),
                avatar_url: avatar_url.map(str::to_string),
                first_seen_at: now,
                last_seen_at: now,
            });
        Ok(user.clone())
    }

    async fn get_user(&self, id: &str) -> Result<Option<User>, ApiError> {
        Ok(self.inner.read().users.get(id).cloned())
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

        let union = Union {
            id: union_id.clone(),
            name: name.to_string(),
            description: description.map(str::to_string),
            owner_id: owner_id.to_string(),
            member_count: 1,
            created_at: now,
            updated_at: now,
        };

        let mut inner = self.inner.write();
        inner.unions.insert(union_id.clone(), union.clone());
        inner.members.insert(
            (union_id.clone(), owner_id.to_string()),
            UnionMember {
                union_id: union_id.clone(),
                user_id: owner_id.to_string(),
                joined_at: now,
            },
        );
        inner.channels.insert(
            channel_id.clone(),
            Channel {
                id: channel_id,
                union_id,
                creator_id: owner_id.to_string(),
                name: "general".to_string(),
                description: None,
                kind: 0,
                created_at: now,
            },
        );

        Ok(union)
    }

    async fn get_union(&self, id: &str) -> Result<Option<Union>, ApiError> {
        Ok(self.inner.read().unions.get(id).cloned())
    }

    async fn list_unions(&self) -> Result<Vec<Union>, ApiError> {
        let mut unions: Vec<Union> = self.inner.read().unions.values().cloned().collect();
        unions.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(unions)
    }

    async fn join_union(&self, union_id: &str, user_id: &str) -> Result<UnionMember, ApiError> {
        let now = Utc::now();
        let key = (union_id.to_string(), user_id.to_string());

        let mut inner = self.inner.write();
        if inner.members.contains_key(&key) {
            return Err(ApiError::conflict("You are already a member of this union"));
        }

        let member = UnionMember {
            union_id: union_id.to_string(),
            user_id: user_id.to_string(),
            joined_at: now,
        };
        inner.members.insert(key, member.clone());
        if let Some(u) = inner.unions.get_mut(union_id) {
            u.member_count += 1;
        }

        Ok(member)
    }

    async fn leave_union(&self, union_id: &str, user_id: &str) -> Result<bool, ApiError> {
        let key = (union_id.to_string(), user_id.to_string());

        let mut inner = self.inner.write();
        if inner.members.remove(&key).is_none() {
            return Ok(false);
        }
        if let Some(u) = inner.unions.get_mut(union_id) {
            u.member_count = (u.member_count - 1).max(0);
        }
        Ok(true)
    }

    async fn is_member(&self, union_id: &str, user_id: &str) -> Result<bool, ApiError> {
        let key = (union_id.to_string(), user_id.to_string());
        Ok(self.inner.read().members.contains_key(&key))
    }

    async fn list_members(&self, union_id: &str) -> Result<Vec<UnionMemberInfo>, ApiError> {
        let inner = self.inner.read();
        let mut members: Vec<UnionMemberInfo> = inner
            .members
            .values()
            .filter(|m| m.union_id == union_id)
            .map(|m| {
                let user = inner.users.get(&m.user_id);
                UnionMemberInfo {
                    union_id: m.union_id.clone(),
                    user_id: m.user_id.clone(),
                    username: user.map(|u| u.username.clone()).unwrap_or_default(),
                    display_name: user.map(|u| u.display_name.clone()).unwrap_or_default(),
                    avatar_url: user.and_then(|u| u.avatar_url.clone()),
                    joined_at: m.joined_at,
                }
            })
            .collect();
        members.sort_by(|a, b| a.joined_at.cmp(&b.joined_at));
        Ok(members)
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
        let channel = Channel {
            id: prefixed_ulid(prefix::CHANNEL),
            union_id: union_id.to_string(),
            creator_id: creator_id.to_string(),
            name: name.to_string(),
            description: description.map(str::to_string),
            kind,
            created_at: Utc::now(),
        };
        self.inner
            .write()
            .channels
            .insert(channel.id.clone(), channel.clone());
        Ok(channel)
    }

    async fn get_channel(&self, id: &str) -> Result<Option<Channel>, ApiError> {
        Ok(self.inner.read().channels.get(id).cloned())
    }

    async fn list_channels(&self, union_id: &str) -> Result<Vec<Channel>, ApiError> {
        let mut channels: Vec<Channel> = self
            .inner
            .read()
            .channels
            .values()
            .filter(|c| c.union_id == union_id)
            .cloned()
            .collect();
        channels.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(channels)
    }

    async fn delete_channel(&self, id: &str) -> Result<bool, ApiError> {
        let mut inner = self.inner.write();
        if inner.channels.remove(id).is_none() {
            return Ok(false);
        }

        // Home posts die with the channel; tags into it just disappear.
        let home_posts: Vec<i64> = inner
            .posts
            .values()
            .filter(|p| p.channel_id == id)
            .map(|p| p.id)
            .collect();
        for post_id in home_posts {
            inner.remove_post(post_id);
        }
        inner.post_tags.retain(|(_, cid), _| cid != id);

        let session_ids: Vec<String> = inner
            .sessions
            .values()
            .filter(|s| s.channel_id == id)
            .map(|s| s.id.clone())
            .collect();
        inner.sessions.retain(|_, s| s.channel_id != id);
        inner
            .participants
            .retain(|(sid, _), _| !session_ids.contains(sid));

        Ok(true)
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
        let post = Post {
            id: self.snowflake.generate(),
            union_id: union_id.to_string(),
            channel_id: channel_id.to_string(),
            author_id: author_id.to_string(),
            title: title.to_string(),
            content: content.to_string(),
            upvotes: 0,
            downvotes: 0,
            comment_count: 0,
            created_at: Utc::now(),
            edited_at: None,
        };
        self.inner.write().posts.insert(post.id, post.clone());
        Ok(post)
    }

    async fn get_post(&self, id: i64) -> Result<Option<Post>, ApiError> {
        Ok(self.inner.read().posts.get(&id).cloned())
    }

    async fn update_post(
        &self,
        id: i64,
        title: Option<String>,
        content: Option<String>,
    ) -> Result<Option<Post>, ApiError> {
        let mut inner = self.inner.write();
        let Some(post) = inner.posts.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(title) = title {
            post.title = title;
        }
        if let Some(content) = content {
            post.content = content;
        }
        post.edited_at = Some(Utc::now());
        Ok(Some(post.clone()))
    }

    async fn delete_post(&self, id: i64) -> Result<bool, ApiError> {
        let mut inner = self.inner.write();
        if !inner.posts.contains_key(&id) {
            return Ok(false);
        }
        inner.remove_post(id);
        Ok(true)
    }

    async fn list_channel_posts(
        &self,
        channel_id: &str,
        cutoff: Option<DateTime<Utc>>,
    ) -> Result<Vec<Post>, ApiError> {
        let inner = self.inner.read();
        let posts = inner
            .posts
            .values()
            .filter(|p| {
                p.channel_id == channel_id
                    || inner
                        .post_tags
                        .contains_key(&(p.id, channel_id.to_string()))
            })
            .filter(|p| cutoff.is_none_or(|c| p.created_at >= c))
            .cloned()
            .collect();
        Ok(posts)
    }

    async fn list_union_posts(
        &self,
        union_id: &str,
        cutoff: Option<DateTime<Utc>>,
    ) -> Result<Vec<Post>, ApiError> {
        let posts = self
            .inner
            .read()
            .posts
            .values()
            .filter(|p| p.union_id == union_id)
            .filter(|p| cutoff.is_none_or(|c| p.created_at >= c))
            .cloned()
            .collect();
        Ok(posts)
    }

    async fn tag_post(&self, post_id: i64, channel_id: &str) -> Result<(), ApiError> {
        self.inner
            .write()
            .post_tags
            .entry((post_id, channel_id.to_string()))
            .or_insert_with(Utc::now);
        Ok(())
    }

    async fn untag_post(&self, post_id: i64, channel_id: &str) -> Result<bool, ApiError> {
        Ok(self
            .inner
            .write()
            .post_tags
            .remove(&(post_id, channel_id.to_string()))
            .is_some())
    }

    // -- comments -----------------------------------------------------------

    async fn create_comment(
        &self,
        post_id: i64,
        author_id: &str,
        content: &str,
        parent_comment_id: Option<i64>,
    ) -> Result<Comment, ApiError> {
        let mut inner = self.inner.write();
        if !inner.posts.contains_key(&post_id) {
            return Err(ApiError::not_found("Post not found"));
        }

        let depth = match parent_comment_id {
            Some(parent_id) => {
                let parent = inner
                    .comments
                    .get(&parent_id)
                    .filter(|c| c.post_id == post_id)
                    .ok_or_else(|| ApiError::not_found("Parent comment not found"))?;
                parent.depth + 1
            }
            None => 0,
        };

        let comment = Comment {
            id: self.snowflake.generate(),
            post_id,
            author_id: author_id.to_string(),
            content: content.to_string(),
            parent_comment_id,
            depth,
            upvotes: 0,
            downvotes: 0,
            created_at: Utc::now(),
        };
        inner.comments.insert(comment.id, comment.clone());
        if let Some(post) = inner.posts.get_mut(&post_id) {
            post.comment_count += 1;
        }

        Ok(comment)
    }

    async fn get_comment(&self, id: i64) -> Result<Option<Comment>, ApiError> {
        Ok(self.inner.read().comments.get(&id).cloned())
    }

    async fn list_comments(&self, post_id: i64) -> Result<Vec<Comment>, ApiError> {
        // BTreeMap iteration is id-ascending already.
        Ok(self
            .inner
            .read()
            .comments
            .values()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect())
    }

    async fn delete_comment(&self, id: i64) -> Result<usize, ApiError> {
        let mut inner = self.inner.write();
        let Some(comment) = inner.comments.get(&id) else {
            return Ok(0);
        };
        let post_id = comment.post_id;

        let subtree = inner.comment_subtree(post_id, id);
        for cid in &subtree {
            inner.comments.remove(cid);
        }
        inner
            .votes
            .retain(|_, v| !v.comment_id.is_some_and(|cid| subtree.contains(&cid)));

        let removed = subtree.len();
        if let Some(post) = inner.posts.get_mut(&post_id) {
            post.comment_count = (post.comment_count - removed as i32).max(0);
        }

        Ok(removed)
    }

    // -- votes --------------------------------------------------------------

    async fn cast_post_vote(
        &self,
        post_id: i64,
        user_id: &str,
        vote_type: VoteType,
    ) -> Result<Vote, ApiError> {
        let mut inner = self.inner.write();
        if !inner.posts.contains_key(&post_id) {
            return Err(ApiError::not_found("Post not found"));
        }

        let existing = inner
            .votes
            .values()
            .find(|v| v.post_id == Some(post_id) && v.user_id == user_id)
            .cloned();

        if let Some(mut vote) = existing {
            let old_type = VoteType::from_i16(vote.vote_type)
                .ok_or_else(|| ApiError::internal("corrupt vote record"))?;
            if old_type == vote_type {
                return Ok(vote);
            }
            // Switch: move one count across.
            vote.vote_type = vote_type.as_i16();
            vote.created_at = Utc::now();
            inner.votes.insert(vote.id.clone(), vote.clone());
            if let Some(post) = inner.posts.get_mut(&post_id) {
                adjust_counts(&mut post.upvotes, &mut post.downvotes, old_type, -1);
                adjust_counts(&mut post.upvotes, &mut post.downvotes, vote_type, 1);
            }
            return Ok(vote);
        }

        let vote = Vote {
            id: prefixed_ulid(prefix::VOTE),
            user_id: user_id.to_string(),
            post_id: Some(post_id),
            comment_id: None,
            vote_type: vote_type.as_i16(),
            created_at: Utc::now(),
        };
        inner.votes.insert(vote.id.clone(), vote.clone());
        if let Some(post) = inner.posts.get_mut(&post_id) {
            adjust_counts(&mut post.upvotes, &mut post.downvotes, vote_type, 1);
        }

        Ok(vote)
    }

    async fn cast_comment_vote(
        &self,
        comment_id: i64,
        user_id: &str,
        vote_type: VoteType,
    ) -> Result<Vote, ApiError> {
        let mut inner = self.inner.write();
        if !inner.comments.contains_key(&comment_id) {
            return Err(ApiError::not_found("Comment not found"));
        }

        let existing = inner
            .votes
            .values()
            .find(|v| v.comment_id == Some(comment_id) && v.user_id == user_id)
            .cloned();

        if let Some(mut vote) = existing {
            let old_type = VoteType::from_i16(vote.vote_type)
                .ok_or_else(|| ApiError::internal("corrupt vote record"))?;
            if old_type == vote_type {
                return Ok(vote);
            }
            vote.vote_type = vote_type.as_i16();
            vote.created_at = Utc::now();
            inner.votes.insert(vote.id.clone(), vote.clone());
            if let Some(comment) = inner.comments.get_mut(&comment_id) {
                adjust_counts(&mut comment.upvotes, &mut comment.downvotes, old_type, -1);
                adjust_counts(&mut comment.upvotes, &mut comment.downvotes, vote_type, 1);
            }
            return Ok(vote);
        }

        let vote = Vote {
            id: prefixed_ulid(prefix::VOTE),
            user_id: user_id.to_string(),
            post_id: None,
            comment_id: Some(comment_id),
            vote_type: vote_type.as_i16(),
            created_at: Utc::now(),
        };
        inner.votes.insert(vote.id.clone(), vote.clone());
        if let Some(comment) = inner.comments.get_mut(&comment_id) {
            adjust_counts(&mut comment.upvotes, &mut comment.downvotes, vote_type, 1);
        }

        Ok(vote)
    }

    async fn get_vote(&self, id: &str) -> Result<Option<Vote>, ApiError> {
        Ok(self.inner.read().votes.get(id).cloned())
    }

    async fn delete_vote(&self, id: &str) -> Result<bool, ApiError> {
        let mut inner = self.inner.write();
        let Some(vote) = inner.votes.remove(id) else {
            return Ok(false);
        };
        let Some(vote_type) = VoteType::from_i16(vote.vote_type) else {
            return Ok(true);
        };

        if let Some(post_id) = vote.post_id {
            if let Some(post) = inner.posts.get_mut(&post_id) {
                adjust_counts(&mut post.upvotes, &mut post.downvotes, vote_type, -1);
            }
        }
        if let Some(comment_id) = vote.comment_id {
            if let Some(comment) = inner.comments.get_mut(&comment_id) {
                adjust_counts(&mut comment.upvotes, &mut comment.downvotes, vote_type, -1);
            }
        }

        Ok(true)
    }

    // -- sessions -----------------------------------------------------------

    async fn get_active_session(
        &self,
        channel_id: &str,
    ) -> Result<Option<ChannelSession>, ApiError> {
        Ok(self
            .inner
            .read()
            .sessions
            .values()
            .find(|s| s.channel_id == channel_id && s.is_active)
            .cloned())
    }

    async fn get_session(&self, id: &str) -> Result<Option<ChannelSession>, ApiError> {
        Ok(self.inner.read().sessions.get(id).cloned())
    }

    async fn create_session(
        &self,
        channel_id: &str,
        created_by: &str,
        room_name: &str,
        room_url: &str,
    ) -> Result<ChannelSession, ApiError> {
        let mut inner = self.inner.write();

        // One active session per channel: a racing creator loses to the row
        // that is already there.
        if let Some(existing) = inner
            .sessions
            .values()
            .find(|s| s.channel_id == channel_id && s.is_active)
        {
            return Ok(existing.clone());
        }

        let session = ChannelSession {
            id: prefixed_ulid(prefix::SESSION),
            channel_id: channel_id.to_string(),
            room_name: room_name.to_string(),
            room_url: room_url.to_string(),
            created_by: created_by.to_string(),
            started_at: Utc::now(),
            ended_at: None,
            is_active: true,
        };
        inner.sessions.insert(session.id.clone(), session.clone());
        Ok(session)
    }

    async fn end_session(&self, id: &str) -> Result<Option<ChannelSession>, ApiError> {
        let now = Utc::now();
        let mut inner = self.inner.write();
        let Some(session) = inner.sessions.get_mut(id) else {
            return Ok(None);
        };
        if session.is_active {
            session.is_active = false;
            session.ended_at = Some(now);
        }
        let session = session.clone();

        for participant in inner
            .participants
            .values_mut()
            .filter(|p| p.session_id == id && p.is_active)
        {
            participant.is_active = false;
            participant.left_at = Some(now);
        }

        Ok(Some(session))
    }

    async fn join_session(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> Result<SessionParticipant, ApiError> {
        let now = Utc::now();
        let key = (session_id.to_string(), user_id.to_string());

        let mut inner = self.inner.write();
        let participant = inner
            .participants
            .entry(key)
            .and_modify(|p| {
                if !p.is_active {
                    p.is_active = true;
                    p.joined_at = now;
                    p.left_at = None;
                }
            })
            .or_insert_with(|| SessionParticipant {
                session_id: session_id.to_string(),
                user_id: user_id.to_string(),
                joined_at: now,
                left_at: None,
                is_active: true,
                muted: false,
                video_off: true,
            });
        Ok(participant.clone())
    }

    async fn leave_session(&self, session_id: &str, user_id: &str) -> Result<(), ApiError> {
        let key = (session_id.to_string(), user_id.to_string());
        let mut inner = self.inner.write();
        if let Some(p) = inner.participants.get_mut(&key) {
            if p.is_active {
                p.is_active = false;
                p.left_at = Some(Utc::now());
            }
        }
        Ok(())
    }

    async fn list_active_participants(
        &self,
        session_id: &str,
    ) -> Result<Vec<SessionParticipant>, ApiError> {
        let mut participants: Vec<SessionParticipant> = self
            .inner
            .read()
            .participants
            .values()
            .filter(|p| p.session_id == session_id && p.is_active)
            .cloned()
            .collect();
        participants.sort_by(|a, b| a.joined_at.cmp(&b.joined_at));
        Ok(participants)
    }

    async fn update_participant_flags(
        &self,
        session_id: &str,
        user_id: &str,
        muted: Option<bool>,
        video_off: Option<bool>,
    ) -> Result<Option<SessionParticipant>, ApiError> {
        let key = (session_id.to_string(), user_id.to_string());
        let mut inner = self.inner.write();
        let Some(p) = inner.participants.get_mut(&key).filter(|p| p.is_active) else {
            return Ok(None);
        };
        if let Some(muted) = muted {
            p.muted = muted;
        }
        if let Some(video_off) = video_off {
            p.video_off = video_off;
        }
        Ok(Some(p.clone()))
    }
}
