use crate::error::ApiError;
use crate::storage::Storage;

/// Require that a user is a member of a union.
pub async fn require_member(
    storage: &dyn Storage,
    union_id: &str,
    user_id: &str,
) -> Result<(), ApiError> {
    if storage.is_member(union_id, user_id).await? {
        Ok(())
    } else {
        Err(ApiError::forbidden("You are not a member of this union"))
    }
}

/// Check whether a user owns a union.
pub async fn is_union_owner(
    storage: &dyn Storage,
    union_id: &str,
    user_id: &str,
) -> Result<bool, ApiError> {
    let union = storage
        .get_union(union_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Union not found"))?;
    Ok(union.owner_id == user_id)
}
