use service_core::{
    axum::{extract::State, response::IntoResponse, Json},
    error::AppError,
};

use crate::{
    dtos::{
        auth::{LoginRequest, MeResponse},
        MessageResponse,
    },
    middleware::AuthUser,
    utils::{Password, ValidatedJson},
    AppState,
};

/// Exchange email and password for identity provider tokens.
///
/// The provider's status code and body are returned unchanged, failures included.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token response from the identity provider"),
        (status = 400, description = "Email or password missing", body = ErrorResponse),
        (status = 401, description = "Credentials rejected by the identity provider"),
        (status = 502, description = "Identity provider unreachable", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let password = Password::new(req.password);
    let relay = state
        .gateway
        .password_grant(req.email.trim(), &password)
        .await?;
    Ok(relay)
}

/// Describe the authenticated principal
#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "Authenticated principal", body = MeResponse),
        (status = 401, description = "Missing, invalid or expired token", body = ErrorResponse),
        (status = 502, description = "Signing keys unavailable", body = ErrorResponse)
    ),
    tag = "Authentication",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn me(user: AuthUser) -> Json<MeResponse> {
    Json(MeResponse::from(&user.0))
}

#[utoipa::path(
    get,
    path = "/auth/hello",
    responses(
        (status = 200, description = "Greeting", body = MessageResponse)
    ),
    tag = "Authentication"
)]
pub async fn hello() -> Json<MessageResponse> {
    Json(MessageResponse::new("Hello, World!"))
}
