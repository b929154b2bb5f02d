//! Token authority
//!
//! The single owner of the token lifecycle: issues tokens on authentication,
//! validates them for the request filter, rotates them on refresh and revokes
//! them on logout.
//!
//! A token is valid while `now < exp_ms` and it is not in the revocation
//! store. Expired and revoked are terminal; nothing moves a token out of
//! either state.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::credentials::CredentialVerifier;
use super::revocation::RevocationStore;
use super::roles::{RoleSet, RoleTable};
use super::throttle::{LoginThrottle, ThrottleConfig};
use super::token::{generate_token_id, Claims, TokenCodec};
use crate::error::{AuthError, RejectReason};
use crate::models::{IssuedToken, ValidationResult};

/// Configuration for the token authority
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorityConfig {
    /// Lifetime of every issued token
    pub token_ttl: Duration,

    /// How long past expiry a token may still be refreshed
    pub refresh_grace: Duration,

    /// Failed-login throttling
    pub throttle: ThrottleConfig,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            token_ttl: Duration::from_secs(24 * 60 * 60),
            refresh_grace: Duration::ZERO,
            throttle: ThrottleConfig::default(),
        }
    }
}

impl From<&crate::config::AuthConfig> for AuthorityConfig {
    fn from(config: &crate::config::AuthConfig) -> Self {
        Self {
            token_ttl: config.token_ttl(),
            refresh_grace: config.refresh_grace(),
            throttle: ThrottleConfig::from(&config.rate_limit),
        }
    }
}

/// Issues, validates, rotates and revokes session tokens
pub struct TokenAuthority {
    codec: TokenCodec,
    verifier: CredentialVerifier,
    roles: RoleTable,
    revocations: Arc<dyn RevocationStore>,
    throttle: LoginThrottle,
    config: AuthorityConfig,
}

impl TokenAuthority {
    pub fn new(
        codec: TokenCodec,
        verifier: CredentialVerifier,
        roles: RoleTable,
        revocations: Arc<dyn RevocationStore>,
        config: AuthorityConfig,
    ) -> Self {
        let throttle = LoginThrottle::new(config.throttle.clone());
        Self {
            codec,
            verifier,
            roles,
            revocations,
            throttle,
            config,
        }
    }

    /// Authenticate `identity` with `secret` and issue a token
    ///
    /// Unknown identities and wrong secrets both fail with
    /// [`AuthError::InvalidCredentials`]. When `client_ip` is given, repeated
    /// failures from that address are throttled.
    pub async fn authenticate(
        &self,
        identity: &str,
        secret: &str,
        client_ip: Option<IpAddr>,
    ) -> Result<IssuedToken, AuthError> {
        if let Some(ip) = client_ip {
            if self.throttle.is_blocked(ip) {
                warn!(client_ip = %ip, "Authentication rejected: rate limited");
                return Err(AuthError::RateLimited);
            }
        }

        if !self.verifier.verify(identity, secret).await {
            if let Some(ip) = client_ip {
                self.throttle.record_failure(ip);
            }
            warn!(username = %identity, "Authentication failed");
            return Err(AuthError::InvalidCredentials);
        }

        if let Some(ip) = client_ip {
            self.throttle.reset(ip);
        }

        let issued = self.issue(identity)?;
        info!(username = %identity, "Authentication successful");
        Ok(issued)
    }

    /// Check a token without side effects
    pub async fn validate(&self, token: &str) -> ValidationResult {
        if self.revocations.is_revoked(token).await {
            return ValidationResult::invalid(RejectReason::Revoked);
        }

        let claims = match self.codec.decode(token) {
            Ok(claims) => claims,
            Err(reason) => return ValidationResult::invalid(reason),
        };

        if claims.is_expired_at(Utc::now()) {
            return ValidationResult::invalid(RejectReason::Expired);
        }

        ValidationResult::valid(claims.sub, claims.roles)
    }

    /// Replace a valid token with a new one and revoke the original
    ///
    /// Each original yields at most one successor: if another refresh or a
    /// logout revokes it first, this call fails with `Revoked` and the token
    /// it minted is discarded.
    pub async fn refresh(&self, token: &str) -> Result<IssuedToken, AuthError> {
        if self.revocations.is_revoked(token).await {
            warn!("Token refresh rejected: token has been revoked");
            return Err(AuthError::TokenRefreshFailed(RejectReason::Revoked));
        }

        let claims = self.codec.decode(token).map_err(|reason| {
            warn!("Token refresh rejected: token did not verify");
            AuthError::TokenRefreshFailed(reason)
        })?;

        let horizon = self.revocation_horizon(&claims);
        if Utc::now() >= horizon {
            warn!(username = %claims.sub, "Token refresh rejected: token has expired");
            return Err(AuthError::TokenRefreshFailed(RejectReason::Expired));
        }

        let issued = self.issue(&claims.sub)?;

        if !self.revocations.revoke(token, horizon).await {
            warn!(username = %claims.sub, "Token refresh lost a race with another revocation");
            return Err(AuthError::TokenRefreshFailed(RejectReason::Revoked));
        }

        info!(username = %claims.sub, "Token refreshed");
        Ok(issued)
    }

    /// Revoke a token; never fails
    ///
    /// Input that does not verify is ignored.
    pub async fn logout(&self, token: &str) {
        match self.codec.decode(token) {
            Ok(claims) => {
                let horizon = self.revocation_horizon(&claims);
                self.revocations.revoke(token, horizon).await;
                info!(username = %claims.sub, "User logged out");
            }
            Err(_) => {
                debug!("Logout ignored: token did not verify");
            }
        }
    }

    /// Subject of a signature-valid token
    ///
    /// Expiry and revocation are not checked; use only for diagnostics.
    pub fn username_from_token(&self, token: &str) -> Option<String> {
        self.codec.decode(token).ok().map(|claims| claims.sub)
    }

    /// Roles that would be granted to `identity`
    pub fn roles_for(&self, identity: &str) -> RoleSet {
        self.roles.roles_for(identity)
    }

    /// Drop revocation entries for tokens that can no longer be used anyway
    pub async fn prune_revocations(&self) -> usize {
        let removed = self.revocations.prune_expired(Utc::now()).await;
        let cleared = self.throttle.cleanup();
        debug!(
            revocations_pruned = removed,
            throttle_entries_cleared = cleared,
            "Pruned expired state"
        );
        removed
    }

    /// Number of tokens currently held in the revocation store
    pub async fn revoked_count(&self) -> usize {
        self.revocations.len().await
    }

    /// Configured token lifetime
    pub fn ttl(&self) -> Duration {
        self.config.token_ttl
    }

    /// Whether logins from `ip` are currently throttled
    pub fn is_rate_limited(&self, ip: IpAddr) -> bool {
        self.throttle.is_blocked(ip)
    }

    fn issue(&self, subject: &str) -> Result<IssuedToken, AuthError> {
        let now = Utc::now();
        let ttl_ms = i64::try_from(self.config.token_ttl.as_millis())
            .map_err(|_| AuthError::Signing("token TTL out of range".to_string()))?;
        let expires_at = chrono::Duration::try_milliseconds(ttl_ms)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| AuthError::Signing("token expiry out of range".to_string()))?;

        let claims = Claims {
            sub: subject.to_string(),
            roles: self.roles.roles_for(subject),
            jti: generate_token_id(),
            issued_at: now,
            expires_at,
        };

        let token = self.codec.encode(&claims)?;
        Ok(IssuedToken::new(token, &claims, ttl_ms.unsigned_abs()))
    }

    /// Last instant at which the token could still be refreshed; its
    /// revocation entry must outlive this.
    ///
    /// Saturates at the latest representable instant.
    fn revocation_horizon(&self, claims: &Claims) -> DateTime<Utc> {
        i64::try_from(self.config.refresh_grace.as_millis())
            .ok()
            .and_then(chrono::Duration::try_milliseconds)
            .and_then(|grace| claims.expires_at.checked_add_signed(grace))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

impl std::fmt::Debug for TokenAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenAuthority")
            .field("codec", &self.codec)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Periodically prune the authority's revocation store
///
/// The task runs until aborted.
pub fn spawn_revocation_pruner(
    authority: Arc<TokenAuthority>,
    interval: Duration,
) -> JoinHandle<()> {
    // tokio::time::interval panics on a zero period
    let interval = interval.max(Duration::from_millis(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            authority.prune_revocations().await;
        }
    })
}
