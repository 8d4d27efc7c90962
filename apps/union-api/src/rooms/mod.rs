//! External call-provider integration.
//!
//! The provider is only consulted once per session, to allocate a room on
//! first join; all subsequent presence tracking is local bookkeeping.

mod http;
mod local;

pub use http::HttpRoomProvider;
pub use local::LocalRoomProvider;

use async_trait::async_trait;

use crate::error::ApiError;

/// A room allocated by the call provider.
#[derive(Debug, Clone)]
pub struct RoomInfo {
    pub name: String,
    pub url: String,
}

/// Abstraction over the hosted call provider's room API.
#[async_trait]
pub trait RoomProvider: Send + Sync {
    /// Allocate a room with the given name. Called once per session;
    /// failures are propagated to the caller, not retried.
    async fn create_room(&self, name: &str) -> Result<RoomInfo, ApiError>;
}

/// Derive a provider-safe room name from a channel.
///
/// The timestamp suffix keeps names unique across sessions of the same
/// channel.
pub fn room_name_for_channel(channel_name: &str, channel_id: &str, now_secs: i64) -> String {
    let slug: String = channel_name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    let slug = slug.trim_matches('-');
    // Channel IDs are `ch_<ulid>`; the tail is enough to disambiguate.
    let id_tail = &channel_id[channel_id.len().saturating_sub(8)..];
    if slug.is_empty() {
        format!("{}-{}", id_tail, now_secs)
    } else {
        format!("{}-{}-{}", slug, id_tail, now_secs)
    }
}
