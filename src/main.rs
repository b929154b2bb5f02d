//! session-authority - A stateless token authentication service
//!
//! This is the main entry point for the session-authority application.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{error, info, warn};

use session_authority::auth::{
    hash_password, spawn_revocation_pruner, AuthorityConfig, CredentialVerifier,
    InMemoryCredentialStore, InMemoryRevocationStore, RoleTable, TokenAuthority, TokenCodec,
};
use session_authority::config::Config;
use session_authority::otel::{init_tracing, AuthMetrics, OtelProvider};
use session_authority::server::{AppState, Server};

/// session-authority - A stateless token authentication service
#[derive(Parser, Debug)]
#[command(name = "session-authority")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env = "SESSION_AUTHORITY_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the Argon2id hash of a password for use in `auth.users`
    HashPassword {
        /// Password to hash
        password: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if let Some(Command::HashPassword { password }) = &args.command {
        println!("{}", hash_password(password)?);
        return Ok(());
    }

    let config = load_config(&args)?;

    let otel_provider = OtelProvider::new(&config.otel)?;
    init_tracing(&otel_provider, &config.logging.level, &config.logging.format)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting session-authority"
    );

    let signing_secret = config
        .auth
        .signing_secret
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("auth.signing_secret is required"))?;
    let codec = TokenCodec::new(signing_secret.as_bytes(), config.auth.algorithm);

    let store = InMemoryCredentialStore::from_config(&config.auth.users);
    if store.is_empty() {
        warn!("No users configured; every login will fail");
    }
    info!(users = store.len(), "Credential store initialized");
    let verifier = CredentialVerifier::new(Arc::new(store))?;

    let roles = match &config.auth.roles {
        Some(table) => RoleTable::from_map(table.clone()),
        None => RoleTable::default(),
    };

    let authority_config = AuthorityConfig::from(&config.auth);
    info!(
        algorithm = ?config.auth.algorithm,
        token_ttl_ms = config.auth.token_ttl_ms,
        refresh_grace_ms = config.auth.refresh_grace_ms,
        "Token authority initialized"
    );
    let authority = Arc::new(TokenAuthority::new(
        codec,
        verifier,
        roles,
        Arc::new(InMemoryRevocationStore::new()),
        authority_config,
    ));

    let pruner = spawn_revocation_pruner(
        Arc::clone(&authority),
        config.auth.revocation_prune_interval(),
    );

    let metrics = Arc::new(AuthMetrics::new(&otel_provider.meter()));
    let state = AppState { authority, metrics };

    let server = Server::new(config.server.clone(), state);

    info!(
        host = %config.server.host,
        port = %config.server.port,
        "Starting HTTP server"
    );

    let result = server.run(shutdown_signal()).await;

    pruner.abort();

    if let Err(e) = otel_provider.shutdown() {
        error!(error = %e, "Failed to shutdown OpenTelemetry");
    }

    info!("session-authority shutdown complete");

    result.map_err(Into::into)
}

/// Load configuration from file or environment, then validate it
fn load_config(args: &Args) -> anyhow::Result<Config> {
    let config = match &args.config {
        Some(path) => {
            // Tracing is not initialized yet
            eprintln!("Loading configuration from file: {}", path);
            Config::from_file(path)
        }
        None => {
            eprintln!("Loading configuration from environment variables");
            Config::from_env()
        }
    }
    .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid config: {}", e))?;

    Ok(config)
}

/// Resolves when a shutdown signal is received
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
