use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use service_core::observability::TracedClientExt;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};

use super::ServiceError;

/// Lifetime assumed when the token response omits `expires_in`.
const DEFAULT_EXPIRES_IN_SECONDS: u64 = 60;

#[derive(Debug, Deserialize)]
struct AdminTokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
}

#[derive(Clone)]
struct AdminSession {
    token: String,
    refresh_by: Instant,
}

/// Cached administrative access token for the admin API.
pub struct AdminTokenProvider {
    http: reqwest::Client,
    token_uri: String,
    client_id: String,
    username: String,
    password: Secret<String>,
    safety_margin: Duration,
    session: RwLock<Option<AdminSession>>,
    refresh_lock: Mutex<()>,
}

impl AdminTokenProvider {
    pub fn new(
        http: reqwest::Client,
        token_uri: impl Into<String>,
        client_id: impl Into<String>,
        username: impl Into<String>,
        password: Secret<String>,
        safety_margin: Duration,
    ) -> Self {
        Self {
            http,
            token_uri: token_uri.into(),
            client_id: client_id.into(),
            username: username.into(),
            password,
            safety_margin,
            session: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    /// A token valid for at least the safety margin. Concurrent callers that
    /// find the cache stale share a single upstream request.
    pub async fn access_token(&self) -> Result<String, ServiceError> {
        if let Some(token) = self.cached_token().await {
            return Ok(token);
        }

        let _guard = self.refresh_lock.lock().await;
        if let Some(token) = self.cached_token().await {
            return Ok(token);
        }

        let session = self.fetch().await?;
        let token = session.token.clone();
        *self.session.write().await = Some(session);
        Ok(token)
    }

    /// Drop the cached token so the next call fetches a fresh one.
    pub async fn invalidate(&self) {
        *self.session.write().await = None;
    }

    async fn cached_token(&self) -> Option<String> {
        let session = self.session.read().await;
        session
            .as_ref()
            .filter(|s| {
                s.refresh_by
                    .checked_sub(self.safety_margin)
                    .is_some_and(|deadline| Instant::now() < deadline)
            })
            .map(|s| s.token.clone())
    }

    async fn fetch(&self) -> Result<AdminSession, ServiceError> {
        let requested_at = Instant::now();
        let form = [
            ("grant_type", "password"),
            ("client_id", self.client_id.as_str()),
            ("username", self.username.as_str()),
            ("password", self.password.expose_secret().as_str()),
        ];

        let response = self
            .http
            .traced_post(&self.token_uri)
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, uri = %self.token_uri, "Admin token endpoint unreachable");
                ServiceError::UpstreamUnavailable(
                    "Unable to reach identity provider admin token endpoint".to_string(),
                )
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::ProvisioningAuthFailure(format!(
                "admin token endpoint returned {}",
                status
            )));
        }

        let body: AdminTokenResponse = response.json().await.map_err(|e| {
            ServiceError::ProvisioningAuthFailure(format!("invalid admin token response: {}", e))
        })?;

        let token = body
            .access_token
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                ServiceError::ProvisioningAuthFailure(
                    "admin token response has no access_token".to_string(),
                )
            })?;

        let expires_in = body.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECONDS);
        tracing::debug!(expires_in, "Fetched admin token");

        let refresh_by = requested_at
            .checked_add(Duration::from_secs(expires_in))
            .unwrap_or_else(|| {
                tracing::warn!(expires_in, "Admin token lifetime out of range, using default");
                requested_at + Duration::from_secs(DEFAULT_EXPIRES_IN_SECONDS)
            });

        Ok(AdminSession { token, refresh_by })
    }
}
