//! HTTP router for session-authority
//!
//! This module defines the axum router that handles all HTTP requests.
//! It provides routes for:
//! - Health checks
//! - Login, validation, refresh and logout
//! - The current principal

use axum::{
    extract::{ConnectInfo, Query, State},
    middleware,
    response::{IntoResponse, Json},
    routing::{get, post},
    Extension, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;

use super::middleware::{bearer_filter, validation_outcome, ApiError, AuthenticatedPrincipal};
use crate::auth::{RoleSet, TokenAuthority};
use crate::error::AuthError;
use crate::models::{IssuedToken, ValidationResult};
use crate::otel::AuthMetrics;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Token authority
    pub authority: Arc<TokenAuthority>,

    /// Lifecycle counters
    pub metrics: Arc<AuthMetrics>,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Login request body
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Query carrying a token
#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub token: String,
}

/// Generic message response
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Current principal response
#[derive(Debug, Serialize, Deserialize)]
pub struct PrincipalResponse {
    pub subject: String,
    pub roles: RoleSet,
    pub authorities: Vec<String>,
}

/// Build the main application router
///
/// The bearer filter runs for every route.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/v1/auth/login", post(login_handler))
        .route("/api/v1/auth/validate", post(validate_handler))
        .route("/api/v1/auth/refresh", post(refresh_handler))
        .route("/api/v1/auth/logout", post(logout_handler))
        .route("/api/v1/auth/me", get(me_handler))
        .layer(middleware::from_fn_with_state(state.clone(), bearer_filter))
        .with_state(state)
}

async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Exchange credentials for a token
///
/// The client address is used for throttling when the server runs with
/// connect info.
async fn login_handler(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<IssuedToken>, ApiError> {
    let client_ip = connect_info.map(|ConnectInfo(addr)| addr.ip());

    match state
        .authority
        .authenticate(&request.username, &request.password, client_ip)
        .await
    {
        Ok(issued) => {
            state.metrics.record_login("success");
            Ok(Json(issued))
        }
        Err(e) => {
            state.metrics.record_login(match e {
                AuthError::InvalidCredentials => "invalid_credentials",
                AuthError::RateLimited => "rate_limited",
                _ => "error",
            });
            Err(e.into())
        }
    }
}

async fn validate_handler(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
) -> Json<ValidationResult> {
    let result = state.authority.validate(&query.token).await;
    state
        .metrics
        .record_validation(validation_outcome(result.reason));
    Json(result)
}

async fn refresh_handler(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<IssuedToken>, ApiError> {
    match state.authority.refresh(&query.token).await {
        Ok(issued) => {
            state.metrics.record_refresh("success");
            Ok(Json(issued))
        }
        Err(e) => {
            state.metrics.record_refresh(match e {
                AuthError::TokenRefreshFailed(reason) => reason.as_str(),
                _ => "error",
            });
            Err(e.into())
        }
    }
}

/// Always succeeds, whatever the token
async fn logout_handler(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
) -> Json<MessageResponse> {
    state.authority.logout(&query.token).await;
    state.metrics.record_logout();
    Json(MessageResponse {
        message: "Logout successful".to_string(),
    })
}

async fn me_handler(
    principal: Option<Extension<AuthenticatedPrincipal>>,
) -> Result<Json<PrincipalResponse>, ApiError> {
    let Extension(AuthenticatedPrincipal(principal)) =
        principal.ok_or_else(|| ApiError::from(AuthError::MissingAuth))?;

    Ok(Json(PrincipalResponse {
        authorities: principal.authorities(),
        subject: principal.subject,
        roles: principal.roles,
    }))
}
