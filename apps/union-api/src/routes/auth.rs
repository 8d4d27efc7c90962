//! Auth routes: Identity Gateway login and token refresh.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::{identity, tokens};
use crate::error::{ApiError, ApiErrorBody};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
}

// ---------------------------------------------------------------------------
// POST /api/auth/login
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub identity_token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub refresh_token: String,
    pub user: UserInfo,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserInfo {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Invalid identity token", body = ApiErrorBody),
    ),
)]
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    // Validate the gateway-issued JWT.
    let claims = identity::validate_identity_token(
        &body.identity_token,
        &state.jwks,
        state.kv.as_ref(),
        &state.config.service_id,
        &state.config.identity_url,
    )
    .await?;

    // Upsert the local user record.
    let user = state
        .storage
        .upsert_user(
            &claims.sub,
            &claims.username,
            &claims.display_name,
            claims.avatar_url.as_deref(),
        )
        .await?;

    // Generate tokens.
    let access = tokens::generate_access_token();
    let refresh = tokens::generate_refresh_token();

    let kv = state.kv.as_ref();

    tokens::store_access_token(
        kv,
        &access,
        &tokens::AccessData {
            user_id: user.id.clone(),
        },
    )
    .await?;
    tokens::store_refresh_token(
        kv,
        &refresh,
        &tokens::RefreshData {
            user_id: user.id.clone(),
        },
    )
    .await?;

    Ok(Json(LoginResponse {
        access_token: access,
        token_type: "Bearer".to_string(),
        expires_in: tokens::ACCESS_TTL_SECS,
        refresh_token: refresh,
        user: UserInfo {
            id: user.id,
            username: user.username,
            display_name: user.display_name,
            avatar_url: user.avatar_url,
        },
    }))
}

// ---------------------------------------------------------------------------
// POST /api/auth/refresh
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RefreshResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub refresh_token: String,
}

#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    tag = "Auth",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Tokens refreshed", body = RefreshResponse),
        (status = 401, description = "Invalid refresh token", body = ApiErrorBody),
    ),
)]
pub async fn refresh(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> Result<Json<RefreshResponse>, ApiError> {
    let kv = state.kv.as_ref();

    // Consume the old refresh token (single-use rotation).
    let data = tokens::consume_refresh_token(kv, &body.refresh_token)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired refresh token"))?;

    // Issue a new pair.
    let new_access = tokens::generate_access_token();
    let new_refresh = tokens::generate_refresh_token();

    tokens::store_access_token(
        kv,
        &new_access,
        &tokens::AccessData {
            user_id: data.user_id.clone(),
        },
    )
    .await?;
    tokens::store_refresh_token(
        kv,
        &new_refresh,
        &tokens::RefreshData {
            user_id: data.user_id,
        },
    )
    .await?;

    Ok(Json(RefreshResponse {
        access_token: new_access,
        token_type: "Bearer".to_string(),
        expires_in: tokens::ACCESS_TTL_SECS,
        refresh_token: new_refresh,
    }))
}
