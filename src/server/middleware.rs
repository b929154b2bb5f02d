//! HTTP middleware for session-authority
//!
//! This module provides middleware layers for:
//! - Bearer token authentication
//! - Request/response logging
//! - OpenTelemetry tracing

use axum::{
    extract::{MatchedPath, Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::time::Instant;

use super::router::AppState;
use crate::error::{AuthError, RejectReason};
use crate::models::{Principal, BEARER};

/// Authenticated principal extension for requests
///
/// Present only when the request carried a valid bearer token.
#[derive(Clone, Debug)]
pub struct AuthenticatedPrincipal(pub Principal);

/// Extract the token from an `Authorization: Bearer <token>` header value
pub fn bearer_token(header_value: &str) -> Option<&str> {
    let (scheme, token) = header_value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case(BEARER) {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Bearer authentication filter
///
/// This middleware:
/// 1. Reads the `Authorization` header, ignoring schemes other than Bearer
/// 2. Validates the token with the authority
/// 3. Adds the principal to the request extensions when the token is valid
///
/// It never rejects a request; handlers that need a principal enforce that
/// themselves.
pub async fn bearer_filter(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
        .map(str::to_owned);

    if let Some(token) = token {
        let result = state.authority.validate(&token).await;
        state.metrics.record_validation(validation_outcome(result.reason));

        match result.principal() {
            Some(principal) => {
                tracing::debug!(username = %principal.subject, "Bearer token accepted");
                request
                    .extensions_mut()
                    .insert(AuthenticatedPrincipal(principal));
            }
            None => {
                tracing::debug!(reason = ?result.reason, "Bearer token rejected");
            }
        }
    }

    next.run(request).await
}

/// Metric label for a validation outcome
pub(crate) fn validation_outcome(reason: Option<RejectReason>) -> &'static str {
    reason.map_or("valid", |r| r.as_str())
}

/// Error response for the auth API
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    reason: Option<RejectReason>,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn reason(&self) -> Option<RejectReason> {
        self.reason
    }
}

impl From<AuthError> for ApiError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::InvalidCredentials => Self {
                status: StatusCode::UNAUTHORIZED,
                message: "Invalid credentials".to_string(),
                reason: None,
            },
            AuthError::TokenRefreshFailed(reason) => Self {
                status: StatusCode::UNAUTHORIZED,
                message: error.to_string(),
                reason: Some(reason),
            },
            AuthError::RateLimited => Self {
                status: StatusCode::TOO_MANY_REQUESTS,
                message: "Too many failed attempts. Please try again later.".to_string(),
                reason: None,
            },
            AuthError::MissingAuth => Self {
                status: StatusCode::UNAUTHORIZED,
                message: "Missing authorization header".to_string(),
                reason: None,
            },
            AuthError::Signing(ref detail) => {
                tracing::error!(error = %detail, "Failed to sign token");
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: "Failed to issue token".to_string(),
                    reason: None,
                }
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self.reason {
            Some(reason) => serde_json::json!({
                "error": self.message,
                "reason": reason.as_str(),
            }),
            None => serde_json::json!({ "error": self.message }),
        };
        (self.status, axum::Json(body)).into_response()
    }
}

/// Label for per-route metrics
///
/// The route template (`/users/:id`), never the raw path, so the label set
/// stays bounded; requests that matched no route share one label.
pub(crate) fn route_label(request: &Request) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| UNMATCHED_ROUTE.to_string(), |p| p.as_str().to_string())
}

const UNMATCHED_ROUTE: &str = "unmatched";

/// Logging middleware function
///
/// Logs method, path, status code and response time, and records the
/// duration metric under the matched route.
pub async fn logging_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let route = route_label(&request);

    let response = next.run(request).await;

    let elapsed = start.elapsed();
    let status = response.status();

    state
        .metrics
        .record_request_duration(&route, elapsed.as_secs_f64());

    tracing::info!(
        method = %method,
        path = %path,
        status = %status.as_u16(),
        duration_ms = %elapsed.as_millis(),
        "Request completed"
    );

    response
}

/// Tracing middleware function
///
/// Wraps the whole request in an `http_request` span. The query string is
/// left out of the span since it may carry a token.
pub async fn tracing_middleware(request: Request, next: Next) -> Response {
    use tracing::Instrument;

    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let span = tracing::info_span!(
        "http_request",
        http.method = %method,
        http.route = %path,
        http.status_code = tracing::field::Empty,
    );

    async move {
        let response = next.run(request).await;
        tracing::Span::current().record("http.status_code", response.status().as_u16());
        response
    }
    .instrument(span)
    .await
}
