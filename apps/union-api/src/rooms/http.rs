use async_trait::async_trait;
use serde::Deserialize;

use crate::error::ApiError;

use super::{RoomInfo, RoomProvider};

/// Outbound call timeout. The provider call is the only blocking external
/// dependency in the request path, so it is bounded rather than open-ended.
const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// Room client for the hosted call provider's REST API.
pub struct HttpRoomProvider {
    api_url: String,
    api_key: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct CreateRoomResponse {
    name: String,
    url: String,
}

impl HttpRoomProvider {
    pub fn new(api_url: &str, api_key: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("failed to build HTTP client");
        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            http,
        }
    }
}

#[async_trait]
impl RoomProvider for HttpRoomProvider {
    async fn create_room(&self, name: &str) -> Result<RoomInfo, ApiError> {
        let url = format!("{}/rooms", self.api_url);
        tracing::info!(room = %name, "allocating room at call provider");

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "name": name,
                "privacy": "private",
            }))
            .send()
            .await
            .map_err(|e| {
                tracing::error!(?e, "room creation request failed");
                ApiError::upstream(format!("Call provider unreachable: {e}"))
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            tracing::error!(%status, %body, "room creation rejected");
            return Err(ApiError::upstream(format!(
                "Call provider returned {status}: {body}"
            )));
        }

        let room: CreateRoomResponse = resp.json().await.map_err(|e| {
            tracing::error!(?e, "room creation response parse failed");
            ApiError::upstream(format!("Invalid call provider response: {e}"))
        })?;

        Ok(RoomInfo {
            name: room.name,
            url: room.url,
        })
    }
}
