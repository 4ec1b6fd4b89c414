use service_core::{
    axum::{extract::State, http::StatusCode, response::IntoResponse, Json},
    error::AppError,
};

use crate::{dtos::auth::RegisterRequest, utils::ValidatedJson, AppState};

/// Register a local user and provision it in the identity provider
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "User registered and provisioned", body = UserResponse),
        (status = 400, description = "Email already in use or invalid body", body = ErrorResponse),
        (status = 502, description = "Stored locally but identity provider provisioning failed", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state.registration.register(req).await?;
    tracing::info!(user_id = %user.user_id, "User registered");
    Ok((StatusCode::OK, Json(user.sanitized())))
}
