//! Authentication for session-authority
//!
//! This module provides the token lifecycle and its collaborators:
//! - Password hashing and credential verification
//! - Role assignment
//! - Token signing and decoding
//! - Revocation tracking
//! - Failed-login throttling

pub mod authority;
pub mod credentials;
pub mod password;
pub mod revocation;
pub mod roles;
pub mod throttle;
pub mod token;

pub use authority::{spawn_revocation_pruner, AuthorityConfig, TokenAuthority};
pub use credentials::{CredentialStore, CredentialVerifier, InMemoryCredentialStore};
pub use password::{hash_password, verify_password, HashError};
pub use revocation::{InMemoryRevocationStore, RevocationStore};
pub use roles::{Role, RoleSet, RoleTable};
pub use throttle::{LoginThrottle, ThrottleConfig};
pub use token::{generate_token_id, Claims, TokenCodec};
