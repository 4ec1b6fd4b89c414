use async_trait::async_trait;
use serde::Serialize;
use service_core::observability::TracedClientExt;
use std::sync::Arc;

use super::{AdminTokenProvider, ServiceError};
use crate::utils::Password;

/// Upstream error bodies are truncated to this many characters in messages.
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Account to mirror into the identity provider.
#[derive(Debug, Clone)]
pub struct ProvisioningRequest {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: Password,
}

#[async_trait]
pub trait UserProvisioner: Send + Sync {
    /// Create the account once. Never retries.
    async fn create_user(&self, request: &ProvisioningRequest) -> Result<(), ServiceError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UserRepresentation<'a> {
    username: &'a str,
    email: &'a str,
    first_name: &'a str,
    last_name: &'a str,
    enabled: bool,
    email_verified: bool,
    credentials: [CredentialRepresentation<'a>; 1],
}

#[derive(Serialize)]
struct CredentialRepresentation<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    value: &'a str,
    temporary: bool,
}

/// Creates users through the realm admin API.
pub struct IdpProvisioningClient {
    http: reqwest::Client,
    admin_base: String,
    admin_tokens: Arc<AdminTokenProvider>,
}

impl IdpProvisioningClient {
    pub fn new(
        http: reqwest::Client,
        admin_base: impl Into<String>,
        admin_tokens: Arc<AdminTokenProvider>,
    ) -> Self {
        Self {
            http,
            admin_base: admin_base.into(),
            admin_tokens,
        }
    }
}

#[async_trait]
impl UserProvisioner for IdpProvisioningClient {
    async fn create_user(&self, request: &ProvisioningRequest) -> Result<(), ServiceError> {
        let admin_token = self.admin_tokens.access_token().await?;

        let body = UserRepresentation {
            username: &request.email,
            email: &request.email,
            first_name: &request.first_name,
            last_name: &request.last_name,
            enabled: true,
            email_verified: false,
            credentials: [CredentialRepresentation {
                kind: "password",
                value: request.password.expose(),
                temporary: false,
            }],
        };

        let url = format!("{}/users", self.admin_base.trim_end_matches('/'));
        let response = self
            .http
            .traced_post(&url)
            .bearer_auth(&admin_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::ProvisioningFailed {
                status: None,
                message: format!("admin API unreachable: {}", e),
            })?;

        let status = response.status();
        if status.is_success() {
            tracing::info!(email = %request.email, "User provisioned in identity provider");
            return Ok(());
        }

        if status == reqwest::StatusCode::UNAUTHORIZED {
            self.admin_tokens.invalidate().await;
        }

        let detail: String = response
            .text()
            .await
            .unwrap_or_default()
            .chars()
            .take(MAX_ERROR_BODY_CHARS)
            .collect();

        Err(ServiceError::ProvisioningFailed {
            status: Some(status.as_u16()),
            message: if detail.is_empty() {
                format!("admin API returned {}", status)
            } else {
                detail
            },
        })
    }
}
