use async_trait::async_trait;

use crate::error::ApiError;

use super::{RoomInfo, RoomProvider};

/// Room provider that derives room URLs locally instead of calling out.
///
/// Used when no provider API key is configured (development, tests).
pub struct LocalRoomProvider {
    domain: String,
}

impl LocalRoomProvider {
    pub fn new(domain: &str) -> Self {
        Self {
            domain: domain.to_string(),
        }
    }
}

#[async_trait]
impl RoomProvider for LocalRoomProvider {
    async fn create_room(&self, name: &str) -> Result<RoomInfo, ApiError> {
        Ok(RoomInfo {
            name: name.to_string(),
            url: format!("https://{}/{}", self.domain, name),
        })
    }
}
