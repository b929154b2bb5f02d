//! Common test utilities and helpers for integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use session_authority::auth::{
    AuthorityConfig, CredentialVerifier, InMemoryCredentialStore, InMemoryRevocationStore,
    RoleTable, TokenAuthority, TokenCodec,
};
use session_authority::config::{ServerConfig, SigningAlgorithm};
use session_authority::otel::AuthMetrics;
use session_authority::server::{AppState, Server};

pub const TEST_SECRET: &[u8] = b"integration-test-signing-secret-0123456789";

/// Demo users seeded into every test authority
pub const DEMO_USERS: [(&str, &str); 3] = [
    ("admin", "secure123"),
    ("user", "password123"),
    ("traffic_manager", "traffic2024"),
];

/// Create a token authority over the demo users
pub fn create_test_authority(config: AuthorityConfig) -> Arc<TokenAuthority> {
    let store =
        InMemoryCredentialStore::from_plaintext(DEMO_USERS).expect("Failed to hash demo users");
    let verifier =
        CredentialVerifier::new(Arc::new(store)).expect("Failed to create credential verifier");

    Arc::new(TokenAuthority::new(
        TokenCodec::new(TEST_SECRET, SigningAlgorithm::HS512),
        verifier,
        RoleTable::default(),
        Arc::new(InMemoryRevocationStore::new()),
        config,
    ))
}

/// Create a token authority with the given TTL and defaults otherwise
pub fn create_test_authority_with_ttl(ttl: Duration) -> Arc<TokenAuthority> {
    create_test_authority(AuthorityConfig {
        token_ttl: ttl,
        ..Default::default()
    })
}

/// Create a test application state
pub fn create_test_state(config: AuthorityConfig) -> AppState {
    AppState {
        authority: create_test_authority(config),
        metrics: Arc::new(AuthMetrics::noop()),
    }
}

/// Create a test server configuration with a random port
pub fn create_test_server_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
    }
}

/// Run a test server in the background and return the address
/// The server will be shut down when the returned shutdown sender is dropped or sent
pub async fn run_test_server(
    state: AppState,
) -> (std::net::SocketAddr, tokio::sync::oneshot::Sender<()>) {
    use tokio::net::TcpListener;

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test server");
    let addr = listener.local_addr().expect("Failed to get local address");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    let server = Server::new(create_test_server_config(), state);

    tokio::spawn(async move {
        server
            .run_with_listener(listener, async move {
                let _ = shutdown_rx.await;
            })
            .await
            .expect("Server error");
    });

    // Give the server a moment to start
    tokio::time::sleep(Duration::from_millis(100)).await;

    (addr, shutdown_tx)
}
