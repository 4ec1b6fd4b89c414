use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::ServiceError;
use crate::models::{PasswordResetToken, User};

/// Persistence for local users and their password reset tokens.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn health_check(&self) -> Result<(), ServiceError>;

    /// Case-insensitive lookup.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ServiceError>;

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, ServiceError>;

    async fn list_users(&self) -> Result<Vec<User>, ServiceError>;

    /// Fails with `EmailTaken` when the email is already stored.
    async fn insert_user(&self, user: &User) -> Result<(), ServiceError>;

    async fn find_reset_token(&self, token: &str)
        -> Result<Option<PasswordResetToken>, ServiceError>;

    /// Store a new token and drop the owner's already-expired ones.
    async fn insert_reset_token(&self, token: &PasswordResetToken) -> Result<(), ServiceError>;

    /// Atomically delete an unexpired token and set its owner's password hash.
    /// Returns the owner's id, or `None` when the token was absent or expired.
    async fn consume_reset_token(
        &self,
        token: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Uuid>, ServiceError>;

    /// Delete every token expired at `now`; returns how many were removed.
    async fn purge_expired_reset_tokens(&self, now: DateTime<Utc>) -> Result<u64, ServiceError>;
}
