//! Password grant relay through POST /auth/login.

mod common;

use axum::{
    body::Body,
    http::{header, Request},
};
use common::{test_config, TestApp, CLIENT_ID, TOKEN_PATH};
use serde_json::json;
use tower::ServiceExt;
use wiremock::{
    matchers::{body_string_contains, method, path},
    Mock, MockServer, ResponseTemplate,
};

#[tokio::test]
async fn test_successful_grant_is_relayed_verbatim() {
    let app = TestApp::spawn().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=password"))
        .and(body_string_contains(&format!("client_id={}", CLIENT_ID)))
        .and(body_string_contains("username=ada%40example.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "idp-access",
            "refresh_token": "idp-refresh",
            "expires_in": 300,
            "token_type": "Bearer",
        })))
        .expect(1)
        .mount(&app.idp)
        .await;

    let (status, body) = app
        .post_json(
            "/auth/login",
            json!({ "email": "ada@example.com", "password": "correct-horse" }),
        )
        .await;

    assert_eq!(status, 200);
    assert_eq!(body["access_token"], "idp-access");
    assert_eq!(body["refresh_token"], "idp-refresh");
}

#[tokio::test]
async fn test_rejected_credentials_are_relayed_verbatim() {
    let app = TestApp::spawn().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Invalid user credentials",
        })))
        .expect(1)
        .mount(&app.idp)
        .await;

    let (status, body) = app
        .post_json(
            "/auth/login",
            json!({ "email": "ada@example.com", "password": "wrong-password" }),
        )
        .await;

    assert_eq!(status, 401);
    assert_eq!(body["error"], "invalid_grant");
    assert_eq!(body["error_description"], "Invalid user credentials");
}

#[tokio::test]
async fn test_blank_password_is_400_without_calling_idp() {
    let app = TestApp::spawn().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&app.idp)
        .await;

    let (status, body) = app
        .post_json("/auth/login", json!({ "email": "ada@example.com", "password": "   " }))
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "email and password are required");

    let (status, _) = app
        .post_json("/auth/login", json!({ "email": "ada@example.com" }))
        .await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn test_client_secret_is_sent_when_configured() {
    let idp = MockServer::start().await;
    let mut config = test_config(&idp.uri());
    config.idp.client_secret = Some(secrecy::Secret::new("s3cret".to_string()));
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("client_secret=s3cret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": "x" })))
        .expect(1)
        .mount(&idp)
        .await;
    let app = TestApp::with_config(idp, config);

    let (status, _) = app
        .post_json(
            "/auth/login",
            json!({ "email": "ada@example.com", "password": "correct-horse" }),
        )
        .await;

    assert_eq!(status, 200);
}

#[tokio::test]
async fn test_unreachable_idp_returns_502() {
    let idp = MockServer::start().await;
    let mut config = test_config(&idp.uri());
    // Nothing listens on port 1
    config.idp.token_uri = "http://127.0.0.1:1/token".to_string();
    let app = TestApp::with_config(idp, config);

    let (status, body) = app
        .post_json(
            "/auth/login",
            json!({ "email": "ada@example.com", "password": "correct-horse" }),
        )
        .await;

    assert_eq!(status, 502);
    assert!(body["error"].as_str().unwrap().starts_with("Bad Gateway"));
}

#[tokio::test]
async fn test_stale_bearer_token_does_not_block_login() {
    let app = TestApp::spawn().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": "fresh" })))
        .expect(1)
        .mount(&app.idp)
        .await;

    let request = Request::builder()
        .method("POST")
        .uri("/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, "Bearer expired.or.foreign")
        .body(Body::from(
            json!({ "email": "ada@example.com", "password": "correct-horse" }).to_string(),
        ))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_malformed_body_is_400() {
    let app = TestApp::spawn().await;

    let request = Request::builder()
        .method("POST")
        .uri("/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), 400);
}
