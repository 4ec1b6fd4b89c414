//! Removes credentials from requests to the public auth endpoints, so a stale
//! or foreign bearer token can never cause a 401 on login, registration or
//! password reset.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Paths under the public prefix, minus the ones that still need a token.
#[derive(Debug, Clone)]
pub struct PublicAuthPaths {
    prefix: String,
    protected: Vec<String>,
}

impl PublicAuthPaths {
    pub fn new(prefix: &str) -> Self {
        let prefix = prefix.trim_end_matches('/').to_string();
        let protected = vec![format!("{}/me", prefix)];
        Self { prefix, protected }
    }

    pub fn is_public(&self, path: &str) -> bool {
        let under_prefix = path == self.prefix
            || path
                .strip_prefix(self.prefix.as_str())
                .is_some_and(|rest| rest.starts_with('/'));

        under_prefix
            && !self
                .protected
                .iter()
                .any(|p| path.trim_end_matches('/') == p)
    }
}

pub async fn strip_authorization_middleware(
    State(paths): State<Arc<PublicAuthPaths>>,
    mut req: Request,
    next: Next,
) -> Response {
    if paths.is_public(req.uri().path()) {
        // HeaderMap::remove drops every value stored under the name
        if req.headers_mut().remove(header::AUTHORIZATION).is_some() {
            tracing::debug!(path = %req.uri().path(), "Stripped Authorization header");
        }
    }
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{HeaderMap, Request as HttpRequest, StatusCode},
        middleware::from_fn_with_state,
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    #[test]
    fn test_public_path_matching() {
        let paths = PublicAuthPaths::new("/auth");

        assert!(paths.is_public("/auth"));
        assert!(paths.is_public("/auth/login"));
        assert!(paths.is_public("/auth/reset"));
        assert!(!paths.is_public("/auth/me"));
        assert!(!paths.is_public("/auth/me/"));
        assert!(!paths.is_public("/authority"));
        assert!(!paths.is_public("/users"));
    }

    async fn echo_authorization(headers: HeaderMap) -> String {
        let values: Vec<String> = headers
            .get_all(header::AUTHORIZATION)
            .iter()
            .filter_map(|v| v.to_str().ok().map(str::to_string))
            .collect();
        values.join(",")
    }

    fn app() -> Router {
        Router::new()
            .route("/auth/login", get(echo_authorization))
            .route("/auth/me", get(echo_authorization))
            .route("/users", get(echo_authorization))
            .layer(from_fn_with_state(
                Arc::new(PublicAuthPaths::new("/auth/")),
                strip_authorization_middleware,
            ))
    }

    async fn body_of(uri: &str) -> String {
        let req = HttpRequest::builder()
            .uri(uri)
            .header("Authorization", "Bearer one")
            .header("authorization", "Bearer two")
            .body(Body::empty())
            .unwrap();
        let res = app().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_strips_every_value_on_public_paths() {
        assert_eq!(body_of("/auth/login").await, "");
    }

    #[tokio::test]
    async fn test_keeps_header_elsewhere() {
        assert_eq!(body_of("/auth/me").await, "Bearer one,Bearer two");
        assert_eq!(body_of("/users").await, "Bearer one,Bearer two");
    }
}
