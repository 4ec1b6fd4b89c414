use service_core::error::AppError;
use thiserror::Error;
use uuid::Uuid;

use super::token_validator::TokenRejection;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Email already in use")]
    EmailTaken,

    #[error("Authentication failed: {0}")]
    Authentication(TokenRejection),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Identity provider unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Identity provider rejected admin credentials: {0}")]
    ProvisioningAuthFailure(String),

    #[error("Provisioning failed (status {status:?}): {message}")]
    ProvisioningFailed { status: Option<u16>, message: String },

    #[error("User {user_id} created locally but not in the identity provider: {reason}")]
    PartiallyProvisioned { user_id: Uuid, reason: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            ServiceError::EmailTaken => AppError::BadRequest(anyhow::anyhow!("Email already in use")),
            ServiceError::Authentication(rejection) => {
                // Callers only ever see the generic message
                tracing::info!(reason = %rejection, "Bearer token rejected");
                AppError::Unauthorized(anyhow::anyhow!("Invalid or expired token"))
            }
            ServiceError::Forbidden(msg) => AppError::Forbidden(anyhow::anyhow!(msg)),
            ServiceError::NotFound(msg) => AppError::NotFound(anyhow::anyhow!(msg)),
            ServiceError::UpstreamUnavailable(msg) => AppError::BadGateway(msg),
            ServiceError::ProvisioningAuthFailure(msg) => {
                tracing::error!(error = %msg, "Admin token request failed");
                AppError::BadGateway("Identity provider rejected admin credentials".to_string())
            }
            ServiceError::ProvisioningFailed { status, message } => {
                tracing::error!(status = ?status, error = %message, "User provisioning failed");
                AppError::BadGateway("Failed to create user in identity provider".to_string())
            }
            ServiceError::PartiallyProvisioned { user_id, reason } => {
                tracing::error!(user_id = %user_id, reason = %reason, "User partially provisioned");
                AppError::BadGateway(
                    "User created locally but failed to create in identity provider; \
                     login will not work until the account is provisioned"
                        .to_string(),
                )
            }
            ServiceError::Database(e) => AppError::DatabaseError(anyhow::Error::new(e)),
            ServiceError::Internal(e) => AppError::InternalError(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use service_core::axum::http::StatusCode;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ServiceError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (ServiceError::EmailTaken, StatusCode::BAD_REQUEST),
            (
                ServiceError::Authentication(TokenRejection::Expired),
                StatusCode::UNAUTHORIZED,
            ),
            (ServiceError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (ServiceError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (
                ServiceError::UpstreamUnavailable("x".into()),
                StatusCode::BAD_GATEWAY,
            ),
            (
                ServiceError::ProvisioningFailed {
                    status: Some(409),
                    message: "exists".into(),
                },
                StatusCode::BAD_GATEWAY,
            ),
            (
                ServiceError::PartiallyProvisioned {
                    user_id: Uuid::new_v4(),
                    reason: "x".into(),
                },
                StatusCode::BAD_GATEWAY,
            ),
            (
                ServiceError::Internal(anyhow::anyhow!("boom")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(AppError::from(err).status_code(), expected);
        }
    }
}
