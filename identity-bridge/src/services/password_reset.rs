use chrono::{Duration, Utc};
use rand::Rng;
use std::sync::Arc;

use super::{normalize_email, EmailProvider, IdentityStore, ServiceError};
use crate::models::PasswordResetToken;
use crate::utils::{hash_password, Password};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetOutcome {
    Applied,
    /// Unknown, consumed or expired token. Callers must not reveal which.
    NoOp,
}

/// Forgot/reset password flow over single-use, time-bounded tokens.
#[derive(Clone)]
pub struct PasswordResetService {
    store: Arc<dyn IdentityStore>,
    email: Arc<dyn EmailProvider>,
    ttl: Duration,
    client_base_url: String,
}

impl PasswordResetService {
    pub fn new(
        store: Arc<dyn IdentityStore>,
        email: Arc<dyn EmailProvider>,
        ttl: Duration,
        client_base_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            email,
            ttl,
            client_base_url: client_base_url.into(),
        }
    }

    /// Issue a token and mail the reset link in the background. Unknown emails
    /// succeed silently.
    pub async fn issue(&self, email: &str) -> Result<(), ServiceError> {
        let email = normalize_email(email);
        let Some(user) = self.store.find_user_by_email(&email).await? else {
            tracing::debug!("Password reset requested for unknown email");
            return Ok(());
        };

        let token = PasswordResetToken::new(user.user_id, generate_random_token(), self.ttl);
        self.store.insert_reset_token(&token).await?;

        let reset_link = format!(
            "{}/reset?token={}",
            self.client_base_url.trim_end_matches('/'),
            token.token
        );

        // Sent off the request path so response time and outcome never
        // depend on whether the address exists
        let email = self.email.clone();
        let user_id = user.user_id;
        tokio::spawn(async move {
            if let Err(e) = email
                .send_password_reset_email(&user.email, &reset_link)
                .await
            {
                tracing::error!(error = %e, user_id = %user_id, "Failed to send password reset email");
            }
        });

        Ok(())
    }

    pub async fn consume(
        &self,
        token: &str,
        new_password: &Password,
    ) -> Result<ResetOutcome, ServiceError> {
        let now = Utc::now();
        match self.store.find_reset_token(token).await? {
            Some(t) if !t.is_expired_at(now) => {}
            _ => return Ok(ResetOutcome::NoOp),
        }

        let password_hash = hash_password(new_password)?;
        match self
            .store
            .consume_reset_token(token, password_hash.as_str(), now)
            .await?
        {
            Some(user_id) => {
                tracing::info!(user_id = %user_id, "Password reset applied");
                Ok(ResetOutcome::Applied)
            }
            // Lost a race with another consumer
            None => Ok(ResetOutcome::NoOp),
        }
    }

    pub async fn purge_expired(&self) -> Result<u64, ServiceError> {
        let removed = self.store.purge_expired_reset_tokens(Utc::now()).await?;
        if removed > 0 {
            tracing::info!(removed, "Purged expired password reset tokens");
        }
        Ok(removed)
    }
}

fn generate_random_token() -> String {
    let mut rng = rand::thread_rng();
    let token_bytes: [u8; 32] = rng.gen();
    hex::encode(token_bytes)
}
