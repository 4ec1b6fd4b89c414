//! In-process identity store for tests and `STORAGE=memory` development runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::{IdentityStore, ServiceError};
use crate::models::{PasswordResetToken, User};

#[derive(Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    reset_tokens: HashMap<String, PasswordResetToken>,
}

/// Users and reset tokens behind one mutex, so token consumption and the
/// password update happen as a single step.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, ServiceError> {
        self.state
            .lock()
            .map_err(|_| ServiceError::Internal(anyhow::anyhow!("memory store lock poisoned")))
    }

    /// Number of stored reset tokens, expired ones included.
    pub fn reset_token_count(&self) -> usize {
        self.state
            .lock()
            .map(|state| state.reset_tokens.len())
            .unwrap_or_default()
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn health_check(&self) -> Result<(), ServiceError> {
        self.lock().map(|_| ())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ServiceError> {
        let state = self.lock()?;
        Ok(state
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email.trim()))
            .cloned())
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, ServiceError> {
        Ok(self.lock()?.users.get(&user_id).cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, ServiceError> {
        let mut users: Vec<User> = self.lock()?.users.values().cloned().collect();
        users.sort_by_key(|u| u.created_utc);
        Ok(users)
    }

    async fn insert_user(&self, user: &User) -> Result<(), ServiceError> {
        let mut state = self.lock()?;
        if state
            .users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(ServiceError::EmailTaken);
        }
        state.users.insert(user.user_id, user.clone());
        Ok(())
    }

    async fn find_reset_token(
        &self,
        token: &str,
    ) -> Result<Option<PasswordResetToken>, ServiceError> {
        Ok(self.lock()?.reset_tokens.get(token).cloned())
    }

    async fn insert_reset_token(&self, token: &PasswordResetToken) -> Result<(), ServiceError> {
        let mut state = self.lock()?;
        let now = token.created_utc;
        state
            .reset_tokens
            .retain(|_, t| t.user_id != token.user_id || !t.is_expired_at(now));
        state.reset_tokens.insert(token.token.clone(), token.clone());
        Ok(())
    }

    async fn consume_reset_token(
        &self,
        token: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Uuid>, ServiceError> {
        let mut state = self.lock()?;

        let user_id = match state.reset_tokens.get(token) {
            Some(t) if !t.is_expired_at(now) => t.user_id,
            _ => return Ok(None),
        };
        state.reset_tokens.remove(token);

        if let Some(user) = state.users.get_mut(&user_id) {
            user.password_hash = Some(password_hash.to_string());
            user.updated_utc = now;
        }
        Ok(Some(user_id))
    }

    async fn purge_expired_reset_tokens(&self, now: DateTime<Utc>) -> Result<u64, ServiceError> {
        let mut state = self.lock()?;
        let before = state.reset_tokens.len();
        state.reset_tokens.retain(|_, t| !t.is_expired_at(now));
        Ok((before - state.reset_tokens.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn user(email: &str) -> User {
        User::new_local(
            "Test".to_string(),
            "User".to_string(),
            email.to_string(),
            "old-hash".to_string(),
        )
    }

    #[tokio::test]
    async fn test_email_uniqueness_is_case_insensitive() {
        let store = MemoryStore::new();
        store.insert_user(&user("ada@example.com")).await.unwrap();

        let err = store.insert_user(&user("ADA@Example.com")).await.unwrap_err();
        assert!(matches!(err, ServiceError::EmailTaken));

        let found = store.find_user_by_email("Ada@Example.COM").await.unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn test_consume_is_single_use() {
        let store = MemoryStore::new();
        let owner = user("ada@example.com");
        store.insert_user(&owner).await.unwrap();
        let token = PasswordResetToken::new(owner.user_id, "tok".to_string(), Duration::hours(2));
        store.insert_reset_token(&token).await.unwrap();

        let now = Utc::now();
        let first = store.consume_reset_token("tok", "new-hash", now).await.unwrap();
        assert_eq!(first, Some(owner.user_id));
        let second = store.consume_reset_token("tok", "other-hash", now).await.unwrap();
        assert_eq!(second, None);

        let stored = store.find_user_by_id(owner.user_id).await.unwrap().unwrap();
        assert_eq!(stored.password_hash.as_deref(), Some("new-hash"));
    }

    #[tokio::test]
    async fn test_expired_token_is_left_in_place() {
        let store = MemoryStore::new();
        let owner = user("ada@example.com");
        store.insert_user(&owner).await.unwrap();
        let token = PasswordResetToken::new(owner.user_id, "tok".to_string(), Duration::hours(2));
        store.insert_reset_token(&token).await.unwrap();

        let later = token.expires_utc + Duration::seconds(1);
        assert_eq!(
            store.consume_reset_token("tok", "new-hash", later).await.unwrap(),
            None
        );
        assert_eq!(store.reset_token_count(), 1);

        let stored = store.find_user_by_id(owner.user_id).await.unwrap().unwrap();
        assert_eq!(stored.password_hash.as_deref(), Some("old-hash"));

        assert_eq!(store.purge_expired_reset_tokens(later).await.unwrap(), 1);
        assert_eq!(store.reset_token_count(), 0);
    }

    #[tokio::test]
    async fn test_issuing_drops_owners_expired_tokens() {
        let store = MemoryStore::new();
        let owner = user("ada@example.com");
        store.insert_user(&owner).await.unwrap();

        let mut stale = PasswordResetToken::new(owner.user_id, "stale".to_string(), Duration::hours(2));
        stale.expires_utc = Utc::now() - Duration::minutes(1);
        store.insert_reset_token(&stale).await.unwrap();

        let fresh = PasswordResetToken::new(owner.user_id, "fresh".to_string(), Duration::hours(2));
        store.insert_reset_token(&fresh).await.unwrap();

        assert!(store.find_reset_token("stale").await.unwrap().is_none());
        assert!(store.find_reset_token("fresh").await.unwrap().is_some());
    }
}
