//! Role derivation
//!
//! Roles are a pure function of identity, looked up in a table that is loaded
//! once at startup. Capabilities are additive, so each identity maps to a set
//! of roles rather than a single one.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

/// A capability label checked by downstream authorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    TrafficManager,
    User,
}

impl Role {
    /// Name as it appears in tokens and configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::TrafficManager => "TRAFFIC_MANAGER",
            Role::User => "USER",
        }
    }

    /// Granted-authority form (`ROLE_ADMIN`, ...)
    pub fn authority(&self) -> String {
        format!("ROLE_{}", self.as_str())
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ordered set of roles
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleSet(BTreeSet<Role>);

impl RoleSet {
    pub fn new(roles: impl IntoIterator<Item = Role>) -> Self {
        Self(roles.into_iter().collect())
    }

    pub fn contains(&self, role: Role) -> bool {
        self.0.contains(&role)
    }

    pub fn iter(&self) -> impl Iterator<Item = Role> + '_ {
        self.0.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// All roles in granted-authority form
    pub fn authorities(&self) -> Vec<String> {
        self.iter().map(|r| r.authority()).collect()
    }
}

impl FromIterator<Role> for RoleSet {
    fn from_iter<I: IntoIterator<Item = Role>>(iter: I) -> Self {
        Self::new(iter)
    }
}

/// Identity to role-set table
#[derive(Debug, Clone, PartialEq)]
pub struct RoleTable {
    entries: HashMap<String, RoleSet>,
    fallback: RoleSet,
}

impl RoleTable {
    /// Build a table from explicit entries; unknown identities get `{USER}`
    pub fn from_map<I, R>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, R)>,
        R: IntoIterator<Item = Role>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(identity, roles)| (identity, RoleSet::new(roles)))
                .collect(),
            fallback: RoleSet::new([Role::User]),
        }
    }

    /// Roles granted to `identity`
    pub fn roles_for(&self, identity: &str) -> RoleSet {
        self.entries
            .get(identity)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }

    /// Number of explicit entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for RoleTable {
    fn default() -> Self {
        Self::from_map([
            (
                "admin".to_string(),
                vec![Role::Admin, Role::TrafficManager, Role::User],
            ),
            (
                "traffic_manager".to_string(),
                vec![Role::TrafficManager, Role::User],
            ),
        ])
    }
}
