//! Token claims, signing and parsing
//!
//! Tokens are compact JWS strings signed with a process-wide HMAC secret.
//! The timestamps inside are Unix epoch milliseconds (`iat_ms`, `exp_ms`),
//! so expiry is decided here with millisecond precision rather than by the
//! JWT library's whole-second `exp` check.

use std::collections::HashSet;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::auth::roles::RoleSet;
use crate::config::SigningAlgorithm;
use crate::error::{AuthError, RejectReason};

/// Length of the random token ID in bytes
const TOKEN_ID_BYTES: usize = 16;

/// Claims carried by every issued token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Identity the token was issued to
    pub sub: String,

    /// Roles derived from `sub` at issuance
    pub roles: RoleSet,

    /// Per-issuance random ID, for diagnostics only
    pub jti: String,

    #[serde(rename = "iat_ms", with = "chrono::serde::ts_milliseconds")]
    pub issued_at: DateTime<Utc>,

    #[serde(rename = "exp_ms", with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
}

impl Claims {
    /// Whether the token is past expiry at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Generate a random token ID
///
/// 16 bytes from the OS RNG, URL-safe Base64 without padding (22 chars).
pub fn generate_token_id() -> String {
    use rand::RngCore;

    let mut id_bytes = [0u8; TOKEN_ID_BYTES];
    OsRng.fill_bytes(&mut id_bytes);
    URL_SAFE_NO_PAD.encode(id_bytes)
}

/// Signs and verifies tokens with a shared secret
#[derive(Clone)]
pub struct TokenCodec {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    /// Create a codec for the given secret and HMAC algorithm
    pub fn new(secret: &[u8], algorithm: SigningAlgorithm) -> Self {
        let algorithm = match algorithm {
            SigningAlgorithm::HS256 => Algorithm::HS256,
            SigningAlgorithm::HS384 => Algorithm::HS384,
            SigningAlgorithm::HS512 => Algorithm::HS512,
        };

        // Only the configured algorithm is accepted; expiry is checked by the caller.
        let mut validation = Validation::new(algorithm);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims = HashSet::new();

        Self {
            algorithm,
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Sign claims into a compact token string
    pub fn encode(&self, claims: &Claims) -> Result<String, AuthError> {
        jsonwebtoken::encode(&Header::new(self.algorithm), claims, &self.encoding_key)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }

    /// Verify the signature and return the claims
    ///
    /// Every failure (bad structure, bad Base64, wrong algorithm, bad
    /// signature, missing claims) is reported as [`RejectReason::Malformed`].
    pub fn decode(&self, token: &str) -> Result<Claims, RejectReason> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "Token rejected by codec");
                RejectReason::Malformed
            })
    }
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}
