//! Session-related domain models
//!
//! This module defines the values handed back to callers of the token
//! authority: issued tokens, validation outcomes and authenticated principals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::roles::{Role, RoleSet};
use crate::auth::token::Claims;
use crate::error::RejectReason;

/// Token type reported to clients
pub const BEARER: &str = "Bearer";

/// A freshly issued token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedToken {
    /// Signed token string
    pub token: String,

    /// Always `Bearer`
    pub token_type: String,

    /// Configured time-to-live in milliseconds
    pub expires_in_ms: u64,

    /// Identity the token was issued to
    pub username: String,

    /// Roles carried by the token
    pub roles: RoleSet,

    /// When the token was issued
    pub issued_at: DateTime<Utc>,

    /// When the token expires
    pub expires_at: DateTime<Utc>,

    /// Human-readable outcome
    pub message: String,
}

impl IssuedToken {
    /// Build the response for a signed token and its claims
    pub fn new(token: String, claims: &Claims, expires_in_ms: u64) -> Self {
        Self {
            token,
            token_type: BEARER.to_string(),
            expires_in_ms,
            username: claims.sub.clone(),
            roles: claims.roles.clone(),
            issued_at: claims.issued_at,
            expires_at: claims.expires_at,
            message: "Authentication successful".to_string(),
        }
    }
}

/// Outcome of validating a token
///
/// Validation never fails; an unacceptable token is a normal negative result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<RoleSet>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectReason>,

    pub message: String,
}

impl ValidationResult {
    pub fn valid(subject: impl Into<String>, roles: RoleSet) -> Self {
        let subject = subject.into();
        Self {
            valid: true,
            message: format!("Token is valid for user: {}", subject),
            subject: Some(subject),
            roles: Some(roles),
            reason: None,
        }
    }

    pub fn invalid(reason: RejectReason) -> Self {
        Self {
            valid: false,
            subject: None,
            roles: None,
            reason: Some(reason),
            message: reason.to_string(),
        }
    }

    /// The principal, if the token was accepted
    pub fn principal(&self) -> Option<Principal> {
        match (self.valid, &self.subject, &self.roles) {
            (true, Some(subject), Some(roles)) => Some(Principal {
                subject: subject.clone(),
                roles: roles.clone(),
            }),
            _ => None,
        }
    }
}

/// An authenticated identity and its roles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub subject: String,
    pub roles: RoleSet,
}

impl Principal {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(role)
    }

    pub fn authorities(&self) -> Vec<String> {
        self.roles.authorities()
    }
}
