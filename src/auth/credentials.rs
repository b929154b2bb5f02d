//! Credential verification
//!
//! Answers "does this secret authenticate this identity". The backing table
//! is read-only; provisioning users happens outside this crate.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::password::{hash_password, verify_password, HashError};
use super::token::generate_token_id;
use crate::config::UserConfig;

/// Read-only lookup of stored password hashes
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Stored PHC hash for `identity`, if the identity exists
    async fn lookup_hash(&self, identity: &str) -> Option<String>;
}

/// Fixed, pre-seeded credential table
#[derive(Debug, Clone, Default)]
pub struct InMemoryCredentialStore {
    users: HashMap<String, String>,
}

impl InMemoryCredentialStore {
    /// Build from already-hashed entries
    pub fn from_hashes<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            users: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Build from the `auth.users` configuration section
    pub fn from_config(users: &HashMap<String, UserConfig>) -> Self {
        Self::from_hashes(
            users
                .iter()
                .map(|(name, user)| (name.clone(), user.password_hash.clone())),
        )
    }

    /// Hash plaintext secrets at construction
    ///
    /// Intended for tests and demos; production tables carry hashes only.
    pub fn from_plaintext<I, K, V>(entries: I) -> Result<Self, HashError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let mut users = HashMap::new();
        for (name, secret) in entries {
            users.insert(name.into(), hash_password(secret.as_ref())?);
        }
        Ok(Self { users })
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn lookup_hash(&self, identity: &str) -> Option<String> {
        self.users.get(identity).cloned()
    }
}

/// Checks secrets against a [`CredentialStore`]
#[derive(Clone)]
pub struct CredentialVerifier {
    store: Arc<dyn CredentialStore>,
    /// Compared against when the identity is unknown so both failure paths
    /// cost one Argon2 verification.
    dummy_hash: Arc<str>,
}

impl CredentialVerifier {
    pub fn new(store: Arc<dyn CredentialStore>) -> Result<Self, HashError> {
        let dummy_hash = hash_password(&generate_token_id())?;
        Ok(Self {
            store,
            dummy_hash: Arc::from(dummy_hash),
        })
    }

    /// Whether `secret` matches the stored hash for `identity`
    ///
    /// Unknown identities and wrong secrets both return `false`.
    pub async fn verify(&self, identity: &str, secret: &str) -> bool {
        let stored = self.store.lookup_hash(identity).await;
        let known = stored.is_some();
        let hash = stored.unwrap_or_else(|| self.dummy_hash.to_string());
        let secret = secret.to_string();

        // Argon2 is deliberately slow; keep it off the async workers.
        let matched = tokio::task::spawn_blocking(move || verify_password(&secret, &hash))
            .await
            .unwrap_or(false);

        known && matched
    }
}

impl std::fmt::Debug for CredentialVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialVerifier").finish_non_exhaustive()
    }
}
