//! Bearer token verification against the identity provider's published JWKS.

use jsonwebtoken::{
    decode, decode_header,
    errors::ErrorKind,
    jwk::{Jwk, JwkSet, KeyAlgorithm},
    Algorithm, DecodingKey, Validation,
};
use serde_json::{Map, Value};
use service_core::observability::TracedClientExt;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

use super::claims::ClaimSet;

const ALLOWED_ALGORITHMS: [Algorithm; 6] = [
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
];

/// Signature algorithm a JWK's `alg` pins the key to. Encryption-only
/// algorithms have none.
fn signing_algorithm(key_alg: &KeyAlgorithm) -> Option<Algorithm> {
    match key_alg {
        KeyAlgorithm::HS256 => Some(Algorithm::HS256),
        KeyAlgorithm::HS384 => Some(Algorithm::HS384),
        KeyAlgorithm::HS512 => Some(Algorithm::HS512),
        KeyAlgorithm::ES256 => Some(Algorithm::ES256),
        KeyAlgorithm::ES384 => Some(Algorithm::ES384),
        KeyAlgorithm::RS256 => Some(Algorithm::RS256),
        KeyAlgorithm::RS384 => Some(Algorithm::RS384),
        KeyAlgorithm::RS512 => Some(Algorithm::RS512),
        KeyAlgorithm::PS256 => Some(Algorithm::PS256),
        KeyAlgorithm::PS384 => Some(Algorithm::PS384),
        KeyAlgorithm::PS512 => Some(Algorithm::PS512),
        KeyAlgorithm::EdDSA => Some(Algorithm::EdDSA),
        _ => None,
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TokenRejection {
    #[error("token is malformed")]
    Malformed,
    #[error("token signature is invalid")]
    SignatureInvalid,
    #[error("token issuer does not match")]
    IssuerMismatch,
    #[error("token has expired")]
    Expired,
    #[error("signing keys are unavailable")]
    KeySourceUnavailable,
}

#[derive(Default)]
struct KeyCache {
    keys: Option<JwkSet>,
    fetched_at: Option<Instant>,
}

impl KeyCache {
    /// Key for `kid`, or the only key when the token names none.
    fn select(&self, kid: Option<&str>) -> Option<Jwk> {
        let keys = &self.keys.as_ref()?.keys;
        match kid {
            Some(kid) => keys
                .iter()
                .find(|k| k.common.key_id.as_deref() == Some(kid))
                .cloned(),
            None if keys.len() == 1 => keys.first().cloned(),
            None => None,
        }
    }
}

pub struct TokenValidator {
    http: reqwest::Client,
    jwks_uri: String,
    issuer: String,
    leeway_seconds: u64,
    min_refresh: Duration,
    cache: RwLock<KeyCache>,
    refresh_lock: Mutex<()>,
}

impl TokenValidator {
    pub fn new(
        http: reqwest::Client,
        jwks_uri: impl Into<String>,
        issuer: impl Into<String>,
        leeway_seconds: u64,
        min_refresh: Duration,
    ) -> Self {
        Self {
            http,
            jwks_uri: jwks_uri.into(),
            issuer: issuer.into(),
            leeway_seconds,
            min_refresh,
            cache: RwLock::new(KeyCache::default()),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Verify signature, issuer and expiry and return the token's claims.
    pub async fn validate(&self, token: &str) -> Result<ClaimSet, TokenRejection> {
        let token = token.trim();
        if token.is_empty() {
            return Err(TokenRejection::Malformed);
        }

        let header = decode_header(token).map_err(|_| TokenRejection::Malformed)?;
        if !ALLOWED_ALGORITHMS.contains(&header.alg) {
            tracing::debug!(alg = ?header.alg, "Token signed with disallowed algorithm");
            return Err(TokenRejection::SignatureInvalid);
        }

        let jwk = self.signing_key(header.kid.as_deref()).await?;
        if let Some(key_alg) = &jwk.common.key_algorithm {
            if signing_algorithm(key_alg) != Some(header.alg) {
                tracing::debug!(key_alg = ?key_alg, alg = ?header.alg, "Token algorithm does not match key");
                return Err(TokenRejection::SignatureInvalid);
            }
        }

        let key = DecodingKey::from_jwk(&jwk).map_err(|e| {
            tracing::warn!(error = %e, kid = ?header.kid, "Unusable key in JWKS");
            TokenRejection::SignatureInvalid
        })?;

        let mut validation = Validation::new(header.alg);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.leeway = self.leeway_seconds;
        validation.validate_aud = false;

        let data = decode::<Map<String, Value>>(token, &key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenRejection::Expired,
                ErrorKind::InvalidIssuer => TokenRejection::IssuerMismatch,
                ErrorKind::InvalidSignature
                | ErrorKind::InvalidAlgorithm
                | ErrorKind::InvalidRsaKey(_)
                | ErrorKind::InvalidKeyFormat => TokenRejection::SignatureInvalid,
                _ => TokenRejection::Malformed,
            }
        })?;

        Ok(ClaimSet::new(data.claims))
    }

    async fn signing_key(&self, kid: Option<&str>) -> Result<Jwk, TokenRejection> {
        if let Some(jwk) = self.cache.read().await.select(kid) {
            return Ok(jwk);
        }

        self.refresh(kid).await?;

        self.cache.read().await.select(kid).ok_or_else(|| {
            tracing::info!(kid = ?kid, "No matching signing key after JWKS refresh");
            TokenRejection::SignatureInvalid
        })
    }

    /// Refetch the key set for an unknown `kid`. Concurrent callers wait on one
    /// fetch, and a populated cache is refetched at most once per `min_refresh`.
    async fn refresh(&self, kid: Option<&str>) -> Result<(), TokenRejection> {
        let _guard = self.refresh_lock.lock().await;

        {
            let cache = self.cache.read().await;
            if cache.select(kid).is_some() {
                return Ok(());
            }
            let recently_fetched = cache
                .fetched_at
                .map(|at| at.elapsed() < self.min_refresh)
                .unwrap_or(false);
            if cache.keys.is_some() && recently_fetched {
                return Ok(());
            }
        }

        let keys = self.fetch_keys().await?;
        tracing::info!(keys = keys.keys.len(), "Refreshed JWKS");

        let mut cache = self.cache.write().await;
        cache.keys = Some(keys);
        cache.fetched_at = Some(Instant::now());
        Ok(())
    }

    async fn fetch_keys(&self) -> Result<JwkSet, TokenRejection> {
        let response = self.http.traced_get(&self.jwks_uri).send().await.map_err(|e| {
            tracing::error!(error = %e, uri = %self.jwks_uri, "JWKS endpoint unreachable");
            TokenRejection::KeySourceUnavailable
        })?;

        if !response.status().is_success() {
            tracing::error!(status = %response.status(), uri = %self.jwks_uri, "JWKS endpoint returned error");
            return Err(TokenRejection::KeySourceUnavailable);
        }

        response.json::<JwkSet>().await.map_err(|e| {
            tracing::error!(error = %e, "JWKS payload invalid");
            TokenRejection::KeySourceUnavailable
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signing_algorithm_mapping() {
        assert_eq!(signing_algorithm(&KeyAlgorithm::RS256), Some(Algorithm::RS256));
        assert_eq!(signing_algorithm(&KeyAlgorithm::PS512), Some(Algorithm::PS512));
        assert_eq!(signing_algorithm(&KeyAlgorithm::RSA_OAEP), None);
        assert_ne!(signing_algorithm(&KeyAlgorithm::RS384), Some(Algorithm::RS256));
    }
}
