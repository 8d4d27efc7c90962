//! Identity Gateway token validation.

use jsonwebtoken::{Algorithm, Validation};
use serde::{Deserialize, Serialize};

use crate::auth::jwks::JwksClient;
use crate::db::kv::KeyValueStore;
use crate::error::ApiError;

/// Claims carried in a gateway-issued identity token.
#[derive(Debug, Serialize, Deserialize)]
pub struct IdentityClaims {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
    pub username: String,
    pub display_name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// JTI replay-prevention TTL in seconds (5 minutes, matching the identity
/// token lifetime).
const JTI_TTL_SECS: u64 = 300;

/// Validate an identity token and return its claims.
///
/// Checks:
///   1. Signature via the gateway JWKS
///   2. `exp` (jsonwebtoken handles this)
///   3. `aud` matches this service's registered ID
///   4. `iss` matches the configured gateway URL
///   5. `jti` not already seen (replay prevention)
pub async fn validate_identity_token(
    token: &str,
    jwks: &JwksClient,
    kv: &dyn KeyValueStore,
    expected_service_id: &str,
    expected_issuer: &str,
) -> Result<IdentityClaims, ApiError> {
    // Decode the header to find `kid`.
    let header = jsonwebtoken::decode_header(token).map_err(|e| {
        tracing::debug!(?e, "identity token header decode failed");
        ApiError::unauthorized("Invalid identity token")
    })?;

    let kid = header
        .kid
        .ok_or_else(|| ApiError::unauthorized("Identity token missing kid"))?;

    // Fetch the decoding key.
    let key = jwks.get_key(&kid).await?;

    // Build validation: require EdDSA, validate exp, set expected aud.
    let mut validation = Validation::new(Algorithm::EdDSA);
    validation.set_audience(&[expected_service_id]);
    validation.set_issuer(&[expected_issuer]);

    let token_data =
        jsonwebtoken::decode::<IdentityClaims>(token, &key, &validation).map_err(|e| {
            tracing::debug!(?e, "identity token validation failed");
            ApiError::unauthorized("Invalid or expired identity token")
        })?;

    let claims = token_data.claims;

    // Replay prevention: reject if jti was already used.
    let jti_key = format!("uv:jti:{}", claims.jti);
    if kv.get(&jti_key).await?.is_some() {
        return Err(ApiError::unauthorized("Identity token already used"));
    }
    // Mark jti as seen.
    kv.set_ex(&jti_key, "1", JTI_TTL_SECS).await?;

    Ok(claims)
}
