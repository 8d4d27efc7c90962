//! Opaque API access and refresh token management.

use serde::{Deserialize, Serialize};

use crate::db::kv::KeyValueStore;
use crate::error::ApiError;

// ---------------------------------------------------------------------------
// Opaque token generation
// ---------------------------------------------------------------------------

/// Generate an opaque random token with the given prefix.
pub fn generate_opaque_token(prefix: &str, bytes: usize) -> String {
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    use rand::Rng;
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill(&mut buf[..]);
    format!("{}_{}", prefix, URL_SAFE_NO_PAD.encode(&buf))
}

// ---------------------------------------------------------------------------
// Access token — 1-hour TTL
// ---------------------------------------------------------------------------

/// Access token TTL in seconds (1 hour).
pub const ACCESS_TTL_SECS: u64 = 3600;

/// Data stored alongside an access token.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccessData {
    pub user_id: String,
}

pub fn generate_access_token() -> String {
    generate_opaque_token("uvat", 32)
}

pub async fn store_access_token(
    kv: &dyn KeyValueStore,
    token: &str,
    data: &AccessData,
) -> Result<(), ApiError> {
    let key = format!("uv:at:{}", token);
    let value = serde_json::to_string(data).map_err(|_| ApiError::internal("serialization"))?;
    kv.set_ex(&key, &value, ACCESS_TTL_SECS).await
}

pub async fn lookup_access_token(
    kv: &dyn KeyValueStore,
    token: &str,
) -> Result<Option<AccessData>, ApiError> {
    let key = format!("uv:at:{}", token);
    match kv.get(&key).await? {
        Some(v) => {
            let data: AccessData =
                serde_json::from_str(&v).map_err(|_| ApiError::internal("corrupt token data"))?;
            Ok(Some(data))
        }
        None => Ok(None),
    }
}

// ---------------------------------------------------------------------------
// Refresh token — 30-day TTL
// ---------------------------------------------------------------------------

/// Refresh token TTL in seconds (30 days).
pub const REFRESH_TTL_SECS: u64 = 30 * 24 * 3600;

/// Data stored alongside a refresh token.
#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshData {
    pub user_id: String,
}

pub fn generate_refresh_token() -> String {
    generate_opaque_token("uvrt", 32)
}

pub async fn store_refresh_token(
    kv: &dyn KeyValueStore,
    token: &str,
    data: &RefreshData,
) -> Result<(), ApiError> {
    let key = format!("uv:rt:{}", token);
    let value = serde_json::to_string(data).map_err(|_| ApiError::internal("serialization"))?;
    kv.set_ex(&key, &value, REFRESH_TTL_SECS).await
}

pub async fn consume_refresh_token(
    kv: &dyn KeyValueStore,
    token: &str,
) -> Result<Option<RefreshData>, ApiError> {
    let key = format!("uv:rt:{}", token);
    let val = kv.get(&key).await?;
    if val.is_some() {
        let _ = kv.del(&key).await;
    }
    match val {
        Some(v) => {
            let data: RefreshData =
                serde_json::from_str(&v).map_err(|_| ApiError::internal("corrupt token data"))?;
            Ok(Some(data))
        }
        None => Ok(None),
    }
}
