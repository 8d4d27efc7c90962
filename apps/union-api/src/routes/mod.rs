pub mod auth;
pub mod channels;
pub mod comments;
pub mod health;
pub mod posts;
pub mod sessions;
pub mod unions;
pub mod votes;

use axum::Router;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().merge(health::router()).nest(
        "/api",
        auth::router()
            .merge(unions::router())
            .merge(channels::router())
            .merge(posts::router())
            .merge(comments::router())
            .merge(votes::router())
            .merge(sessions::router()),
    )
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        // Health
        health::health,
        // Auth
        auth::login,
        auth::refresh,
        // Unions
        unions::create_union,
        unions::list_unions,
        unions::get_union,
        unions::join_union,
        unions::leave_union,
        unions::list_members,
        // Channels
        channels::create_channel,
        channels::list_channels,
        channels::get_channel,
        channels::delete_channel,
        // Posts
        posts::create_post,
        posts::list_channel_posts,
        posts::list_union_posts,
        posts::get_post,
        posts::update_post,
        posts::delete_post,
        posts::tag_post,
        posts::untag_post,
        // Comments
        comments::create_comment,
        comments::list_comments,
        comments::delete_comment,
        // Votes
        votes::vote_on_post,
        votes::vote_on_comment,
        votes::delete_vote,
        // Sessions
        sessions::open_session,
        sessions::get_channel_session,
        sessions::end_channel_session,
        sessions::join_session,
        sessions::leave_session,
        sessions::list_participants,
        sessions::update_participant,
    ),
    components(
        schemas(
            // Error types
            crate::error::ApiErrorBody,
            crate::error::ApiErrorDetail,
            crate::error::FieldError,
            // Models
            crate::models::user::User,
            crate::models::union::Union,
            crate::models::membership::UnionMember,
            crate::models::membership::UnionMemberInfo,
            crate::models::channel::Channel,
            crate::models::channel::ChannelKind,
            crate::models::post::Post,
            crate::models::comment::Comment,
            crate::models::vote::Vote,
            crate::models::vote::VoteType,
            crate::models::session::ChannelSession,
            crate::models::session::SessionParticipant,
            // Route request/response types
            health::HealthResponse,
            auth::LoginRequest,
            auth::LoginResponse,
            auth::UserInfo,
            auth::RefreshRequest,
            auth::RefreshResponse,
            unions::CreateUnionRequest,
            channels::CreateChannelRequest,
            posts::CreatePostRequest,
            posts::UpdatePostRequest,
            comments::CreateCommentRequest,
            votes::CastVoteRequest,
            sessions::SessionResponse,
            sessions::SessionWithParticipants,
            sessions::UpdateParticipantRequest,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check"),
        (name = "Auth", description = "Authentication"),
        (name = "Unions", description = "Union management and membership"),
        (name = "Channels", description = "Channel management"),
        (name = "Posts", description = "Posts and cross-channel tags"),
        (name = "Comments", description = "Threaded discussion"),
        (name = "Votes", description = "Post and comment voting"),
        (name = "Sessions", description = "Live call sessions"),
    )
)]
pub struct ApiDoc;
