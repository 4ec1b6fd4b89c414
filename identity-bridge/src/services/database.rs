//! PostgreSQL implementation of the identity store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use uuid::Uuid;

use super::{IdentityStore, ServiceError};
use crate::models::{PasswordResetToken, User};

const USER_COLUMNS: &str = "user_id, first_name, last_name, email, password_hash, provider, \
                            role, active, created_utc, updated_utc";

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityStore for Database {
    async fn health_check(&self) -> Result<(), ServiceError> {
        crate::db::health_check(&self.pool).await?;
        Ok(())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ServiceError> {
        let query = format!(
            "SELECT {} FROM users WHERE lower(email) = lower($1)",
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, ServiceError> {
        let query = format!("SELECT {} FROM users WHERE user_id = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn list_users(&self) -> Result<Vec<User>, ServiceError> {
        let query = format!("SELECT {} FROM users ORDER BY created_utc", USER_COLUMNS);
        let users = sqlx::query_as::<_, User>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    async fn insert_user(&self, user: &User) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO users (user_id, first_name, last_name, email, password_hash,
                               provider, role, active, created_utc, updated_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(user.user_id)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.provider)
        .bind(&user.role)
        .bind(user.active)
        .bind(user.created_utc)
        .bind(user.updated_utc)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    return ServiceError::EmailTaken;
                }
            }
            ServiceError::Database(e)
        })?;
        Ok(())
    }

    async fn find_reset_token(
        &self,
        token: &str,
    ) -> Result<Option<PasswordResetToken>, ServiceError> {
        let token = sqlx::query_as::<_, PasswordResetToken>(
            "SELECT token_id, token, user_id, expires_utc, created_utc \
             FROM password_reset_tokens WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(token)
    }

    async fn insert_reset_token(&self, token: &PasswordResetToken) -> Result<(), ServiceError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM password_reset_tokens WHERE user_id = $1 AND expires_utc <= $2")
            .bind(token.user_id)
            .bind(token.created_utc)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO password_reset_tokens (token_id, token, user_id, expires_utc, created_utc) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(token.token_id)
        .bind(&token.token)
        .bind(token.user_id)
        .bind(token.expires_utc)
        .bind(token.created_utc)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn consume_reset_token(
        &self,
        token: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Uuid>, ServiceError> {
        let mut tx = self.pool.begin().await?;

        // The row lock taken by DELETE serializes concurrent consumers
        let user_id: Option<Uuid> = sqlx::query_scalar(
            "DELETE FROM password_reset_tokens \
             WHERE token = $1 AND expires_utc > $2 \
             RETURNING user_id",
        )
        .bind(token)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(user_id) = user_id else {
            tx.rollback().await?;
            return Ok(None);
        };

        sqlx::query("UPDATE users SET password_hash = $1, updated_utc = $2 WHERE user_id = $3")
            .bind(password_hash)
            .bind(now)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(user_id))
    }

    async fn purge_expired_reset_tokens(&self, now: DateTime<Utc>) -> Result<u64, ServiceError> {
        let result = sqlx::query("DELETE FROM password_reset_tokens WHERE expires_utc <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
