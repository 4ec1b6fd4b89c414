use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::{middleware::AuthUser, models::UserResponse, services::ServiceError, AppState};

/// List all local users (admin only)
#[utoipa::path(
    get,
    path = "/users",
    responses(
        (status = 200, description = "All users", body = Vec<UserResponse>),
        (status = 401, description = "Missing, invalid or expired token", body = ErrorResponse),
        (status = 403, description = "Admin role required", body = ErrorResponse)
    ),
    tag = "User",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_users(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let users: Vec<UserResponse> = state
        .store
        .list_users()
        .await?
        .into_iter()
        .map(UserResponse::from)
        .collect();
    Ok(Json(users))
}

/// Fetch a single user (admin or the user themself)
#[utoipa::path(
    get,
    path = "/users/{id}",
    params(
        ("id" = Uuid, Path, description = "User id")
    ),
    responses(
        (status = 200, description = "User", body = UserResponse),
        (status = 401, description = "Missing, invalid or expired token", body = ErrorResponse),
        (status = 403, description = "Not permitted to read this user", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    tag = "User",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    match state.store.find_user_by_id(id).await? {
        Some(user) if principal.can_access_user(&user) => Ok(Json(user.sanitized())),
        Some(_) => Err(ServiceError::Forbidden("Not permitted to read this user".to_string()).into()),
        // Only callers who could have read the user learn that it is missing
        None if principal.is_admin() || principal.subject == id.to_string() => {
            Err(ServiceError::NotFound("User not found".to_string()).into())
        }
        None => Err(ServiceError::Forbidden("Not permitted to read this user".to_string()).into()),
    }
}
