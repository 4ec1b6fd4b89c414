use service_core::{
    axum::{extract::State, http::StatusCode, response::IntoResponse, Json},
    error::AppError,
};

use crate::{
    dtos::{
        auth::{ForgotPasswordRequest, ResetPasswordRequest},
        MessageResponse,
    },
    services::ResetOutcome,
    utils::{Password, ValidatedJson},
    AppState,
};

const FORGOT_ACK: &str = "If the email exists, a reset link was sent";
const RESET_ACK: &str = "Password reset processed";

/// Request a password reset link
#[utoipa::path(
    post,
    path = "/auth/forgot",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Acknowledged whether or not the email is registered", body = MessageResponse),
        (status = 400, description = "Invalid body", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn forgot_password(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ForgotPasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.password_reset.issue(&req.email).await?;
    Ok((StatusCode::OK, Json(MessageResponse::new(FORGOT_ACK))))
}

/// Set a new password using a reset token
#[utoipa::path(
    post,
    path = "/auth/reset",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Acknowledged whether or not the token was valid", body = MessageResponse),
        (status = 400, description = "Invalid body", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn reset_password(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ResetPasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    let new_password = Password::new(req.new_password);
    if new_password.is_blank() {
        return Err(AppError::BadRequest(anyhow::anyhow!("newPassword is required")));
    }

    let outcome = state
        .password_reset
        .consume(req.token.trim(), &new_password)
        .await?;
    if outcome == ResetOutcome::NoOp {
        tracing::info!("Password reset ignored: token unknown, used or expired");
    }

    Ok((StatusCode::OK, Json(MessageResponse::new(RESET_ACK))))
}
