//! Revocation store
//!
//! Holds tokens that must no longer be accepted even though they have not
//! expired. Each entry remembers the token's own expiry so it can be pruned
//! once expiry alone rejects the token; this keeps the set bounded by the
//! number of revocations within one TTL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

/// Storage for revoked tokens
///
/// The in-memory implementation covers a single process. A deployment that
/// runs several instances needs a shared implementation behind this trait.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Revoke `token` until `expires_at`
    ///
    /// Returns `true` if the token was not already revoked.
    async fn revoke(&self, token: &str, expires_at: DateTime<Utc>) -> bool;

    /// Whether `token` has been revoked
    async fn is_revoked(&self, token: &str) -> bool;

    /// Drop entries whose expiry is at or before `now`
    ///
    /// Returns the number of entries removed.
    async fn prune_expired(&self, now: DateTime<Utc>) -> usize;

    /// Number of entries currently held
    async fn len(&self) -> usize;
}

/// Process-local revocation store backed by a sharded concurrent map
#[derive(Debug, Default)]
pub struct InMemoryRevocationStore {
    entries: DashMap<String, DateTime<Utc>>,
}

impl InMemoryRevocationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RevocationStore for InMemoryRevocationStore {
    async fn revoke(&self, token: &str, expires_at: DateTime<Utc>) -> bool {
        self.entries.insert(token.to_string(), expires_at).is_none()
    }

    async fn is_revoked(&self, token: &str) -> bool {
        self.entries.contains_key(token)
    }

    async fn prune_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, expires_at| *expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    async fn len(&self) -> usize {
        self.entries.len()
    }
}
