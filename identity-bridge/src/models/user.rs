//! Local user record mirrored into the identity provider.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Default role for self-registered users.
pub const DEFAULT_ROLE: &str = "ROLE_USER";

/// Provider tag for accounts whose password hash is held locally.
pub const LOCAL_PROVIDER: &str = "local";

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    /// Absent for provider-managed accounts.
    pub password_hash: Option<String>,
    pub provider: String,
    pub role: String,
    pub active: bool,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl User {
    /// Create a locally-registered user. `email` is expected already normalized.
    pub fn new_local(
        first_name: String,
        last_name: String,
        email: String,
        password_hash: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            user_id: Uuid::new_v4(),
            first_name,
            last_name,
            email,
            password_hash: Some(password_hash),
            provider: LOCAL_PROVIDER.to_string(),
            role: DEFAULT_ROLE.to_string(),
            active: true,
            created_utc: now,
            updated_utc: now,
        }
    }

    pub fn sanitized(&self) -> UserResponse {
        UserResponse::from(self.clone())
    }
}

/// User as returned over HTTP. Never carries the password hash.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    #[serde(rename = "id")]
    pub user_id: Uuid,
    #[schema(example = "Ada")]
    pub first_name: String,
    #[schema(example = "Lovelace")]
    pub last_name: String,
    #[schema(example = "ada@example.com")]
    pub email: String,
    #[schema(example = "local")]
    pub provider: String,
    #[schema(example = "ROLE_USER")]
    pub role: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            user_id: u.user_id,
            first_name: u.first_name,
            last_name: u.last_name,
            email: u.email,
            provider: u.provider,
            role: u.role,
            active: u.active,
            created_at: u.created_utc,
            updated_at: u.updated_utc,
        }
    }
}
