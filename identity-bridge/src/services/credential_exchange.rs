use axum::{
    body::{Body, Bytes},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use metrics::counter;
use secrecy::{ExposeSecret, Secret};
use service_core::observability::TracedClientExt;

use super::ServiceError;
use crate::utils::Password;

/// Identity provider token endpoint response, passed back to the caller as-is.
#[derive(Debug)]
pub struct TokenRelay {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub body: Bytes,
}

impl IntoResponse for TokenRelay {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        if let Some(content_type) = self.content_type {
            response
                .headers_mut()
                .insert(header::CONTENT_TYPE, content_type);
        }
        response
    }
}

/// Relays resource-owner password grants to the realm token endpoint.
#[derive(Clone)]
pub struct CredentialExchangeGateway {
    http: reqwest::Client,
    token_uri: String,
    client_id: String,
    client_secret: Option<Secret<String>>,
}

impl CredentialExchangeGateway {
    pub fn new(
        http: reqwest::Client,
        token_uri: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: Option<Secret<String>>,
    ) -> Self {
        Self {
            http,
            token_uri: token_uri.into(),
            client_id: client_id.into(),
            client_secret,
        }
    }

    pub async fn password_grant(
        &self,
        username: &str,
        password: &Password,
    ) -> Result<TokenRelay, ServiceError> {
        if username.trim().is_empty() || password.is_blank() {
            return Err(ServiceError::Validation(
                "email and password are required".to_string(),
            ));
        }

        let mut form: Vec<(&str, &str)> = vec![
            ("grant_type", "password"),
            ("client_id", self.client_id.as_str()),
        ];
        if let Some(secret) = self
            .client_secret
            .as_ref()
            .map(|s| s.expose_secret().as_str())
            .filter(|s| !s.trim().is_empty())
        {
            form.push(("client_secret", secret));
        }
        form.push(("username", username));
        form.push(("password", password.expose()));

        let response = self
            .http
            .traced_post(&self.token_uri)
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                counter!("idp_password_grant_total", "outcome" => "unreachable").increment(1);
                if e.is_builder() {
                    ServiceError::Internal(anyhow::anyhow!("Invalid token request: {}", e))
                } else {
                    tracing::error!(error = %e, uri = %self.token_uri, "Token endpoint unreachable");
                    ServiceError::UpstreamUnavailable(
                        "Unable to reach identity provider token endpoint".to_string(),
                    )
                }
            })?;

        let status = response.status();
        let content_type = response.headers().get(header::CONTENT_TYPE).cloned();
        let body = response.bytes().await.map_err(|e| {
            ServiceError::Internal(anyhow::anyhow!("Failed to read token response: {}", e))
        })?;

        let outcome = if status.is_success() { "success" } else { "rejected" };
        counter!("idp_password_grant_total", "outcome" => outcome).increment(1);
        tracing::info!(status = %status, "Password grant relayed");

        Ok(TokenRelay {
            status,
            content_type,
            body,
        })
    }
}
