//! Token lifecycle integration tests
//!
//! Tests the token authority end to end:
//! - Login, validation and role assignment
//! - Logout and revocation
//! - Refresh rotation
//! - Expiry

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use session_authority::auth::{AuthorityConfig, Role, ThrottleConfig};
use session_authority::error::{AuthError, RejectReason};

/// Test 1: Valid login produces a token that validates with the right roles
#[tokio::test]
async fn test_login_validate_round_trip() {
    let authority = create_test_authority_with_ttl(Duration::from_secs(3600));

    let issued = authority
        .authenticate("admin", "secure123", None)
        .await
        .unwrap();
    let result = authority.validate(&issued.token).await;

    assert!(result.valid);
    assert_eq!(result.subject.as_deref(), Some("admin"));
    let roles = result.roles.unwrap();
    assert!(roles.contains(Role::Admin));
    assert!(roles.contains(Role::TrafficManager));
    assert!(roles.contains(Role::User));
}

/// Test 2: Wrong password and unknown user are indistinguishable
#[tokio::test]
async fn test_login_failures_indistinguishable() {
    let authority = create_test_authority(AuthorityConfig::default());

    let wrong_password = authority
        .authenticate("admin", "wrongpassword", None)
        .await
        .unwrap_err();
    let unknown_user = authority
        .authenticate("nonexistent", "password", None)
        .await
        .unwrap_err();

    assert_eq!(wrong_password, AuthError::InvalidCredentials);
    assert_eq!(wrong_password, unknown_user);
    assert_eq!(wrong_password.to_string(), unknown_user.to_string());
}

/// Test 3: Logout revokes a valid token
#[tokio::test]
async fn test_logout_then_validate() {
    let authority = create_test_authority(AuthorityConfig::default());
    let issued = authority
        .authenticate("user", "password123", None)
        .await
        .unwrap();

    authority.logout(&issued.token).await;

    let result = authority.validate(&issued.token).await;
    assert!(!result.valid);
    assert_eq!(result.reason, Some(RejectReason::Revoked));
}

/// Test 4: Refresh rotates: the old token is revoked, the new one is valid
#[tokio::test]
async fn test_refresh_rotation() {
    let authority = create_test_authority(AuthorityConfig::default());
    let original = authority
        .authenticate("user", "password123", None)
        .await
        .unwrap();

    let refreshed = authority.refresh(&original.token).await.unwrap();

    assert_eq!(
        authority.validate(&original.token).await.reason,
        Some(RejectReason::Revoked)
    );
    let result = authority.validate(&refreshed.token).await;
    assert!(result.valid);
    assert_eq!(result.subject.as_deref(), Some("user"));
}

/// Test 5: Refreshing the same token twice fails the second time
#[tokio::test]
async fn test_double_refresh() {
    let authority = create_test_authority(AuthorityConfig::default());
    let original = authority
        .authenticate("traffic_manager", "traffic2024", None)
        .await
        .unwrap();

    authority.refresh(&original.token).await.unwrap();
    let second = authority.refresh(&original.token).await;

    assert_eq!(
        second,
        Err(AuthError::TokenRefreshFailed(RejectReason::Revoked))
    );
}

/// Test 6: A chain of refreshes keeps only the newest token valid
#[tokio::test]
async fn test_refresh_chain() {
    let authority = create_test_authority(AuthorityConfig::default());
    let mut tokens = vec![authority
        .authenticate("user", "password123", None)
        .await
        .unwrap()
        .token];

    for _ in 0..3 {
        let next = authority.refresh(tokens.last().unwrap()).await.unwrap();
        tokens.push(next.token);
    }

    let (newest, older) = tokens.split_last().unwrap();
    assert!(authority.validate(newest).await.valid);
    for token in older {
        assert_eq!(
            authority.validate(token).await.reason,
            Some(RejectReason::Revoked)
        );
    }
    assert_eq!(authority.revoked_count().await, 3);
}

/// Test 7: A 1000 ms token is expired after 1500 ms
#[tokio::test]
async fn test_token_expiry() {
    let authority = create_test_authority_with_ttl(Duration::from_millis(1000));
    let issued = authority
        .authenticate("admin", "secure123", None)
        .await
        .unwrap();

    assert!(authority.validate(&issued.token).await.valid);

    tokio::time::sleep(Duration::from_millis(1500)).await;

    let result = authority.validate(&issued.token).await;
    assert!(!result.valid);
    assert_eq!(result.reason, Some(RejectReason::Expired));
}

/// Test 8: The subject can be read back from a token
#[tokio::test]
async fn test_username_from_token() {
    let authority = create_test_authority(AuthorityConfig::default());

    for (username, password) in DEMO_USERS {
        let issued = authority
            .authenticate(username, password, None)
            .await
            .unwrap();
        assert_eq!(
            authority.username_from_token(&issued.token).as_deref(),
            Some(username)
        );
    }
}

/// Test 9: Logout of garbage returns normally
#[tokio::test]
async fn test_logout_garbage() {
    let authority = create_test_authority(AuthorityConfig::default());

    authority.logout("not-a-token").await;

    assert_eq!(authority.revoked_count().await, 0);
}

/// Test 10: Tokens from another signing key are rejected as malformed
#[tokio::test]
async fn test_tampered_token() {
    let authority = create_test_authority(AuthorityConfig::default());
    let issued = authority
        .authenticate("user", "password123", None)
        .await
        .unwrap();

    // Flip the last signature character
    let mut tampered = issued.token.clone();
    let last = tampered.pop().unwrap();
    tampered.push(if last == 'A' { 'B' } else { 'A' });

    assert_eq!(
        authority.validate(&tampered).await.reason,
        Some(RejectReason::Malformed)
    );
    assert_eq!(authority.username_from_token(&tampered), None);
}

/// Test 11: Many concurrent refreshes of one token yield exactly one successor
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_refresh() {
    let authority = create_test_authority(AuthorityConfig::default());
    let original = authority
        .authenticate("admin", "secure123", None)
        .await
        .unwrap();

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let authority = Arc::clone(&authority);
            let token = original.token.clone();
            tokio::spawn(async move { authority.refresh(&token).await })
        })
        .collect();

    let mut winners = Vec::new();
    for task in tasks {
        if let Ok(issued) = task.await.unwrap() {
            winners.push(issued);
        }
    }

    assert_eq!(winners.len(), 1);
    assert!(authority.validate(&winners[0].token).await.valid);
}

/// Test 12: Concurrent logins and logouts do not interfere
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_sessions() {
    let authority = create_test_authority(AuthorityConfig::default());

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let authority = Arc::clone(&authority);
            tokio::spawn(async move {
                let issued = authority
                    .authenticate("user", "password123", None)
                    .await
                    .unwrap();
                if i % 2 == 0 {
                    authority.logout(&issued.token).await;
                }
                (i, issued.token)
            })
        })
        .collect();

    for task in tasks {
        let (i, token) = task.await.unwrap();
        assert_eq!(authority.validate(&token).await.valid, i % 2 != 0);
    }
    assert_eq!(authority.revoked_count().await, 4);
}

/// Test 13: Throttled addresses are refused even with the right password
#[tokio::test]
async fn test_throttling() {
    let authority = create_test_authority(AuthorityConfig {
        throttle: ThrottleConfig {
            max_failures: 2,
            block_duration: Duration::from_secs(60),
            window: Duration::from_secs(60),
        },
        ..Default::default()
    });
    let ip = "203.0.113.7".parse().unwrap();

    for _ in 0..2 {
        let _ = authority.authenticate("admin", "guess", Some(ip)).await;
    }

    assert_eq!(
        authority.authenticate("admin", "secure123", Some(ip)).await,
        Err(AuthError::RateLimited)
    );
}
