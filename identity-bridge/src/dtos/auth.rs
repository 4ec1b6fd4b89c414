use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::services::Principal;

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "ada@example.com")]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    #[schema(example = "correct-horse-battery", min_length = 8)]
    pub password: String,

    #[serde(default)]
    #[validate(length(max = 100, message = "First name must be at most 100 characters"))]
    #[schema(example = "Ada")]
    pub first_name: String,

    #[serde(default)]
    #[validate(length(max = 100, message = "Last name must be at most 100 characters"))]
    #[schema(example = "Lovelace")]
    pub last_name: String,
}

/// Missing fields deserialize as empty so the blank check owns the 400.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[serde(default)]
    #[schema(example = "ada@example.com")]
    pub email: String,

    #[serde(default)]
    #[schema(example = "correct-horse-battery")]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "ada@example.com")]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    #[schema(min_length = 8)]
    pub new_password: String,
}

/// Summary of the authenticated principal.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub authenticated: bool,
    #[schema(example = "f3c1b7a2-4d1e-4a4b-9d0e-0f6f1c2b3a4d")]
    pub subject: String,
    #[schema(example = "ada")]
    pub username: Option<String>,
    #[schema(example = "ada@example.com")]
    pub email: Option<String>,
    #[schema(example = json!(["ROLE_USER"]))]
    pub authorities: Vec<String>,
    pub issuer: String,
    /// Epoch seconds.
    pub issued_at: Option<i64>,
    /// Epoch seconds.
    pub expires_at: i64,
    pub scopes: Vec<String>,
}

impl From<&Principal> for MeResponse {
    fn from(p: &Principal) -> Self {
        Self {
            authenticated: true,
            subject: p.subject.clone(),
            username: p.username.clone(),
            email: p.email.clone(),
            authorities: p.authorities.clone(),
            issuer: p.issuer.clone(),
            issued_at: p.issued_at,
            expires_at: p.expires_at,
            scopes: p.scopes.clone(),
        }
    }
}
