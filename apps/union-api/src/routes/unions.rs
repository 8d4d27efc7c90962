//! Union CRUD and membership endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::auth::middleware::AuthUser;
use crate::error::{ApiError, ApiErrorBody, FieldError};
use crate::models::membership::{UnionMember, UnionMemberInfo};
use crate::models::union::Union;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/unions", post(create_union).get(list_unions))
        .route("/unions/{id}", get(get_union))
        .route("/unions/{id}/join", post(join_union))
        .route("/unions/{id}/leave", axum::routing::delete(leave_union))
        .route("/unions/{id}/members", get(list_members))
}

// ---------------------------------------------------------------------------
// POST /api/unions
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateUnionRequest {
    pub name: String,
    pub description: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/unions",
    tag = "Unions",
    security(("bearer" = [])),
    request_body = CreateUnionRequest,
    responses(
        (status = 201, description = "Union created", body = Union),
        (status = 400, description = "Validation failed", body = ApiErrorBody),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
    ),
)]
pub async fn create_union(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<CreateUnionRequest>,
) -> Result<(StatusCode, Json<Union>), ApiError> {
    let name = body.name.trim().to_string();
    let mut errors = Vec::new();
    if name.is_empty() {
        errors.push(FieldError {
            field: "name".to_string(),
            message: "Union name is required".to_string(),
        });
    } else if name.len() > 100 {
        errors.push(FieldError {
            field: "name".to_string(),
            message: "Union name must be 100 characters or fewer".to_string(),
        });
    }
    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }

    let union = state
        .storage
        .create_union(&user_id, &name, body.description.as_deref())
        .await?;

    Ok((StatusCode::CREATED, Json(union)))
}

// ---------------------------------------------------------------------------
// GET /api/unions
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/unions",
    tag = "Unions",
    responses(
        (status = 200, description = "All unions", body = [Union]),
    ),
)]
pub async fn list_unions(State(state): State<AppState>) -> Result<Json<Vec<Union>>, ApiError> {
    Ok(Json(state.storage.list_unions().await?))
}

// ---------------------------------------------------------------------------
// GET /api/unions/:id
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/unions/{id}",
    tag = "Unions",
    params(("id" = String, Path, description = "Union ID")),
    responses(
        (status = 200, description = "The union", body = Union),
        (status = 404, description = "Union not found", body = ApiErrorBody),
    ),
)]
pub async fn get_union(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Union>, ApiError> {
    let union = state
        .storage
        .get_union(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Union not found"))?;
    Ok(Json(union))
}

// ---------------------------------------------------------------------------
// POST /api/unions/:id/join
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/api/unions/{id}/join",
    tag = "Unions",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "Union ID")),
    responses(
        (status = 201, description = "Joined", body = UnionMember),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 404, description = "Union not found", body = ApiErrorBody),
        (status = 409, description = "Already a member", body = ApiErrorBody),
    ),
)]
pub async fn join_union(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<UnionMember>), ApiError> {
    state
        .storage
        .get_union(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Union not found"))?;

    let member = state.storage.join_union(&id, &user_id).await?;

    Ok((StatusCode::CREATED, Json(member)))
}

// ---------------------------------------------------------------------------
// DELETE /api/unions/:id/leave
// ---------------------------------------------------------------------------

#[utoipa::path(
    delete,
    path = "/api/unions/{id}/leave",
    tag = "Unions",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "Union ID")),
    responses(
        (status = 204, description = "Left the union"),
        (status = 400, description = "Owner cannot leave", body = ApiErrorBody),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 404, description = "Union or membership not found", body = ApiErrorBody),
    ),
)]
pub async fn leave_union(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let union = state
        .storage
        .get_union(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Union not found"))?;

    if union.owner_id == user_id {
        return Err(ApiError::bad_request("The union owner cannot leave"));
    }

    let removed = state.storage.leave_union(&id, &user_id).await?;
    if !removed {
        return Err(ApiError::not_found("You are not a member of this union"));
    }

    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// GET /api/unions/:id/members
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/unions/{id}/members",
    tag = "Unions",
    params(("id" = String, Path, description = "Union ID")),
    responses(
        (status = 200, description = "Union members", body = [UnionMemberInfo]),
        (status = 404, description = "Union not found", body = ApiErrorBody),
    ),
)]
pub async fn list_members(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<UnionMemberInfo>>, ApiError> {
    state
        .storage
        .get_union(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Union not found"))?;

    Ok(Json(state.storage.list_members(&id).await?))
}
