use std::sync::Arc;

use axum::http::header::AUTHORIZATION;
use axum::Router;
use axum_test::TestServer;
use ed25519_dalek::{SigningKey, VerifyingKey};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use union_api::auth::jwks::JwksClient;
use union_api::config::Config;
use union_api::db::kv::{KeyValueStore, MemoryStore};
use union_api::rooms::{LocalRoomProvider, RoomProvider};
use union_api::storage::{MemoryStorage, Storage};
use union_api::AppState;
use unionvote_common::SnowflakeGenerator;

/// Test signing keys (mirrors the Identity Gateway's key derivation from a
/// seed).
pub struct TestSigningKeys {
    pub kid: String,
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
}

impl TestSigningKeys {
    pub fn from_seed(seed: &str) -> Self {
        let hash = Sha256::digest(seed.as_bytes());
        let mut secret_bytes = [0u8; 32];
        secret_bytes.copy_from_slice(&hash);

        let signing_key = SigningKey::from_bytes(&secret_bytes);
        let verifying_key: VerifyingKey = (&signing_key).into();

        let secret = signing_key.to_bytes();
        let public_bytes = verifying_key.to_bytes();

        let pkcs8_der = wrap_ed25519_private_pkcs8(&secret);
        let encoding = EncodingKey::from_ed_der(&pkcs8_der);
        let decoding = DecodingKey::from_ed_der(&public_bytes);

        let kid_hash = Sha256::digest(public_bytes);
        let kid = format!(
            "idp-{}",
            kid_hash
                .iter()
                .map(|b| format!("{:02x}", b))
                .collect::<String>()[..8]
                .to_string()
        );

        Self {
            kid,
            encoding,
            decoding,
        }
    }
}

fn wrap_ed25519_private_pkcs8(secret: &[u8; 32]) -> Vec<u8> {
    let mut der = Vec::with_capacity(48);
    der.extend_from_slice(&[0x30, 0x2e]);
    der.extend_from_slice(&[0x02, 0x01, 0x00]);
    der.extend_from_slice(&[0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70]);
    der.extend_from_slice(&[0x04, 0x22, 0x04, 0x20]);
    der.extend_from_slice(secret);
    der
}

/// Identity claims for minting test tokens (mirrors the gateway's shape).
#[derive(Debug, Serialize, Deserialize)]
pub struct TestIdentityClaims {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
    pub username: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// Mint a test identity JWT.
pub fn mint_identity_token(
    keys: &TestSigningKeys,
    issuer: &str,
    user_id: &str,
    service_id: &str,
    username: &str,
) -> String {
    let now = chrono::Utc::now();
    let claims = TestIdentityClaims {
        iss: issuer.to_string(),
        sub: user_id.to_string(),
        aud: service_id.to_string(),
        iat: now.timestamp(),
        exp: (now + chrono::Duration::seconds(300)).timestamp(),
        jti: unionvote_common::id::prefixed_ulid(unionvote_common::id::prefix::IDENTITY_TOKEN),
        username: username.to_string(),
        display_name: username.to_string(),
        avatar_url: None,
    };

    let mut header = Header::new(Algorithm::EdDSA);
    header.kid = Some(keys.kid.clone());

    jsonwebtoken::encode(&header, &claims, &keys.encoding).expect("mint test identity token")
}

/// Mint an expired identity token for testing.
pub fn mint_expired_identity_token(
    keys: &TestSigningKeys,
    issuer: &str,
    user_id: &str,
    service_id: &str,
) -> String {
    let now = chrono::Utc::now();
    let claims = TestIdentityClaims {
        iss: issuer.to_string(),
        sub: user_id.to_string(),
        aud: service_id.to_string(),
        iat: (now - chrono::Duration::seconds(600)).timestamp(),
        exp: (now - chrono::Duration::seconds(300)).timestamp(),
        jti: unionvote_common::id::prefixed_ulid(unionvote_common::id::prefix::IDENTITY_TOKEN),
        username: "expired_user".to_string(),
        display_name: "Expired User".to_string(),
        avatar_url: None,
    };

    let mut header = Header::new(Algorithm::EdDSA);
    header.kid = Some(keys.kid.clone());

    jsonwebtoken::encode(&header, &claims, &keys.encoding).expect("mint expired identity token")
}

/// Build a test AppState on the in-memory backends with a static JWKS key.
pub fn test_state() -> (AppState, TestSigningKeys) {
    let config = Config {
        database_url: None,
        identity_url: "http://identity.test".to_string(),
        service_id: "svc_union_test".to_string(),
        port: 0,
        room_api_url: None,
        room_api_key: None,
        room_domain: "rooms.test".to_string(),
    };

    let snowflake = Arc::new(SnowflakeGenerator::new(0));
    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new(snowflake));
    let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let rooms: Arc<dyn RoomProvider> = Arc::new(LocalRoomProvider::new(&config.room_domain));

    let signing_keys = TestSigningKeys::from_seed("dev-seed-do-not-use-in-production");

    // Pre-load the JWKS client with the test key so it doesn't hit the network.
    let jwks = JwksClient::with_static_key(&signing_keys.kid, signing_keys.decoding.clone());

    let state = AppState {
        storage,
        kv,
        jwks,
        rooms,
        config: Arc::new(config),
    };

    (state, signing_keys)
}

/// Build the full application router wired to the test state.
pub fn test_app() -> (Router, AppState, TestSigningKeys) {
    let (state, keys) = test_state();
    let app = union_api::routes::router().with_state(state.clone());
    (app, state, keys)
}

/// Login a test user and return their access token.
pub async fn login_test_user(
    server: &TestServer,
    keys: &TestSigningKeys,
    config: &Config,
    user_id: &str,
    username: &str,
) -> String {
    let token = mint_identity_token(
        keys,
        &config.identity_url,
        user_id,
        &config.service_id,
        username,
    );
    let resp = server
        .post("/api/auth/login")
        .json(&serde_json::json!({ "identity_token": token }))
        .await;
    resp.assert_status_ok();
    resp.json::<serde_json::Value>()["access_token"]
        .as_str()
        .unwrap()
        .to_string()
}

/// Create a union and return its id.
pub async fn create_test_union(server: &TestServer, token: &str, name: &str) -> String {
    let resp = server
        .post("/api/unions")
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .json(&serde_json::json!({ "name": name }))
        .await;
    resp.assert_status(axum::http::StatusCode::CREATED);
    resp.json::<serde_json::Value>()["id"]
        .as_str()
        .unwrap()
        .to_string()
}

/// Create a channel of the given kind and return its id.
pub async fn create_test_channel(
    server: &TestServer,
    token: &str,
    union_id: &str,
    name: &str,
    kind: &str,
) -> String {
    let resp = server
        .post(&format!("/api/unions/{union_id}/channels"))
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .json(&serde_json::json!({ "name": name, "kind": kind }))
        .await;
    resp.assert_status(axum::http::StatusCode::CREATED);
    resp.json::<serde_json::Value>()["id"]
        .as_str()
        .unwrap()
        .to_string()
}

/// Create a post and return its id.
pub async fn create_test_post(server: &TestServer, token: &str, channel_id: &str) -> i64 {
    let resp = server
        .post(&format!("/api/channels/{channel_id}/posts"))
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .json(&serde_json::json!({
            "title": "A post",
            "content": "Some content",
        }))
        .await;
    resp.assert_status(axum::http::StatusCode::CREATED);
    resp.json::<serde_json::Value>()["id"].as_i64().unwrap()
}

/// Login a second user and enrol them in the union.
pub async fn join_second_user(
    server: &TestServer,
    keys: &TestSigningKeys,
    config: &Config,
    union_id: &str,
    user_id: &str,
    username: &str,
) -> String {
    let token = login_test_user(server, keys, config, user_id, username).await;
    let resp = server
        .post(&format!("/api/unions/{union_id}/join"))
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .await;
    resp.assert_status(axum::http::StatusCode::CREATED);
    token
}
