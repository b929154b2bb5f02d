//! HTTP API integration tests
//!
//! Runs the full server stack on a real listener and drives it with reqwest.

mod common;

use std::time::Duration;

use common::*;
use reqwest::StatusCode;
use serde_json::{json, Value};
use session_authority::auth::{AuthorityConfig, ThrottleConfig};

async fn login(client: &reqwest::Client, base: &str, username: &str, password: &str) -> reqwest::Response {
    client
        .post(format!("{}/api/v1/auth/login", base))
        .json(&json!({ "username": username, "password": password }))
        .send()
        .await
        .unwrap()
}

async fn login_token(client: &reqwest::Client, base: &str, username: &str, password: &str) -> String {
    let response = login(client, base, username, password).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    body["token"].as_str().unwrap().to_string()
}

/// Test 1: Health endpoint is reachable
#[tokio::test]
async fn test_health() {
    let (addr, _shutdown) = run_test_server(create_test_state(AuthorityConfig::default())).await;

    let response = reqwest::get(format!("http://{}/health", addr)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
}

/// Test 2: Full session lifecycle over HTTP
#[tokio::test]
async fn test_session_lifecycle() {
    let (addr, _shutdown) = run_test_server(create_test_state(AuthorityConfig::default())).await;
    let base = format!("http://{}", addr);
    let client = reqwest::Client::new();

    let response = login(&client, &base, "traffic_manager", "traffic2024").await;
    assert_eq!(response.status(), StatusCode::OK);
    let issued: Value = response.json().await.unwrap();
    assert_eq!(issued["token_type"], "Bearer");
    assert_eq!(issued["username"], "traffic_manager");
    assert_eq!(issued["roles"], json!(["TRAFFIC_MANAGER", "USER"]));
    let token = issued["token"].as_str().unwrap().to_string();

    // The bearer filter recognises the token
    let me: Value = client
        .get(format!("{}/api/v1/auth/me", base))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(me["subject"], "traffic_manager");
    assert_eq!(
        me["authorities"],
        json!(["ROLE_TRAFFIC_MANAGER", "ROLE_USER"])
    );

    // Refresh
    let response = client
        .post(format!("{}/api/v1/auth/refresh", base))
        .query(&[("token", &token)])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let refreshed: Value = response.json().await.unwrap();
    let new_token = refreshed["token"].as_str().unwrap().to_string();

    // The original no longer authenticates
    let response = client
        .get(format!("{}/api/v1/auth/me", base))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Logout of the new token
    let response = client
        .post(format!("{}/api/v1/auth/logout", base))
        .query(&[("token", &new_token)])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let result: Value = client
        .post(format!("{}/api/v1/auth/validate", base))
        .query(&[("token", &new_token)])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(result["valid"], false);
    assert_eq!(result["message"], "Token has been invalidated");
}

/// Test 3: Refresh failures carry a reason
#[tokio::test]
async fn test_refresh_failure_reasons() {
    let (addr, _shutdown) = run_test_server(create_test_state(AuthorityConfig {
        token_ttl: Duration::from_millis(200),
        ..Default::default()
    }))
    .await;
    let base = format!("http://{}", addr);
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/v1/auth/refresh", base))
        .query(&[("token", "invalid.token.here")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["reason"], "malformed");

    let token = login_token(&client, &base, "user", "password123").await;
    tokio::time::sleep(Duration::from_millis(400)).await;

    let response = client
        .post(format!("{}/api/v1/auth/refresh", base))
        .query(&[("token", &token)])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["reason"], "expired");
    assert_eq!(body["error"], "Token refresh failed: Token has expired");
}

/// Test 4: Repeated failed logins from one address are throttled
#[tokio::test]
async fn test_login_throttled() {
    let (addr, _shutdown) = run_test_server(create_test_state(AuthorityConfig {
        throttle: ThrottleConfig {
            max_failures: 3,
            block_duration: Duration::from_secs(60),
            window: Duration::from_secs(60),
        },
        ..Default::default()
    }))
    .await;
    let base = format!("http://{}", addr);
    let client = reqwest::Client::new();

    for _ in 0..3 {
        let response = login(&client, &base, "admin", "guess").await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let response = login(&client, &base, "admin", "secure123").await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

/// Test 5: Logout without a valid token still succeeds
#[tokio::test]
async fn test_logout_garbage_over_http() {
    let (addr, _shutdown) = run_test_server(create_test_state(AuthorityConfig::default())).await;

    let response = reqwest::Client::new()
        .post(format!("http://{}/api/v1/auth/logout", addr))
        .query(&[("token", "not-a-token")])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Logout successful");
}

/// Test 6: Server stops when the shutdown sender fires
#[tokio::test]
async fn test_graceful_shutdown() {
    let (addr, shutdown) = run_test_server(create_test_state(AuthorityConfig::default())).await;

    shutdown.send(()).unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(reqwest::get(format!("http://{}/health", addr)).await.is_err());
}
