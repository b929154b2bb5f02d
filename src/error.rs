//! Application error types for session-authority
//!
//! This module defines common error types used throughout the application.
//! All error types use `thiserror` for ergonomic error handling.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a presented token was not accepted
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RejectReason {
    /// Token failed to parse or its signature did not verify
    #[error("Invalid token")]
    Malformed,

    /// Token's expiry has passed
    #[error("Token has expired")]
    Expired,

    /// Token is in the revocation set
    #[error("Token has been invalidated")]
    Revoked,
}

impl RejectReason {
    /// Short label used for logs and metric attributes
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::Malformed => "malformed",
            RejectReason::Expired => "expired",
            RejectReason::Revoked => "revoked",
        }
    }
}

/// Authentication-related errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AuthError {
    /// Unknown identity or wrong secret; the two are never distinguished
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Refresh attempted on a revoked, expired or malformed token
    #[error("Token refresh failed: {0}")]
    TokenRefreshFailed(RejectReason),

    /// Rate limited due to too many failed attempts
    #[error("Rate limited: too many failed attempts")]
    RateLimited,

    /// Missing authorization header
    #[error("Missing authorization header")]
    MissingAuth,

    /// Token could not be signed
    #[error("Token signing failed: {0}")]
    Signing(String),
}

/// Application-level error type
///
/// This is the main error type used throughout the application.
/// It aggregates all domain-specific error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// Authentication error
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Server error
    #[error("Server error: {0}")]
    Server(#[from] crate::server::ServerError),

    /// Observability setup error
    #[error("Telemetry error: {0}")]
    Otel(#[from] crate::otel::OtelError),

    /// Password hashing error
    #[error("Hashing error: {0}")]
    Hash(#[from] crate::auth::HashError),
}
