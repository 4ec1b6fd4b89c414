use chrono::{DateTime, Duration, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Single-use reset token. Deleted when consumed; expired rows linger until purged.
#[derive(Debug, Clone, FromRow)]
pub struct PasswordResetToken {
    pub token_id: Uuid,
    pub token: String,
    pub user_id: Uuid,
    pub expires_utc: DateTime<Utc>,
    pub created_utc: DateTime<Utc>,
}

impl PasswordResetToken {
    pub fn new(user_id: Uuid, token: String, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            token_id: Uuid::new_v4(),
            token,
            user_id,
            expires_utc: now + ttl,
            created_utc: now,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_utc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_boundary() {
        let token = PasswordResetToken::new(Uuid::new_v4(), "abc".to_string(), Duration::hours(2));

        assert!(!token.is_expired_at(token.created_utc));
        assert!(!token.is_expired_at(token.expires_utc - Duration::seconds(1)));
        assert!(token.is_expired_at(token.expires_utc));
    }
}
