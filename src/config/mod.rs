//! Configuration management for session-authority
//!
//! This module handles loading, parsing, and validating application configuration
//! from YAML files and environment variables.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::auth::roles::Role;

/// Prefix for all environment variables read by [`Config::from_env`]
pub const ENV_PREFIX: &str = "SESSION_AUTHORITY_";

/// Upper bound for millisecond durations (100 years); keeps expiry
/// arithmetic inside what `chrono` can represent
pub const MAX_DURATION_MS: u64 = 100 * 365 * 24 * 60 * 60 * 1000;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Token authority configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// OpenTelemetry configuration
    #[serde(default)]
    pub otel: OtelConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileRead(format!("Failed to read config file: {}", e)))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(yaml)?;
        serde_yaml::from_str(&expanded)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse YAML: {}", e)))
    }

    /// Load configuration from environment variables with prefix `SESSION_AUTHORITY_`
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(host) = env_var("SERVER_HOST") {
            config.server.host = host;
        }
        if let Some(port) = env_var("SERVER_PORT") {
            config.server.port = port
                .parse()
                .map_err(|_| ConfigError::Parse("Invalid port number".to_string()))?;
        }

        if let Some(secret) = env_var("AUTH_SIGNING_SECRET") {
            config.auth.signing_secret = Some(secret);
        }
        if let Some(algorithm) = env_var("AUTH_ALGORITHM") {
            config.auth.algorithm = match algorithm.to_uppercase().as_str() {
                "HS256" => SigningAlgorithm::HS256,
                "HS384" => SigningAlgorithm::HS384,
                "HS512" => SigningAlgorithm::HS512,
                other => {
                    return Err(ConfigError::InvalidValue(format!(
                        "Unsupported signing algorithm: {}",
                        other
                    )))
                }
            };
        }
        if let Some(ttl) = env_var("AUTH_TOKEN_TTL_MS") {
            config.auth.token_ttl_ms = ttl
                .parse()
                .map_err(|_| ConfigError::Parse("Invalid token TTL".to_string()))?;
        }
        if let Some(grace) = env_var("AUTH_REFRESH_GRACE_MS") {
            config.auth.refresh_grace_ms = grace
                .parse()
                .map_err(|_| ConfigError::Parse("Invalid refresh grace".to_string()))?;
        }
        if let Some(interval) = env_var("AUTH_REVOCATION_PRUNE_INTERVAL_SECS") {
            config.auth.revocation_prune_interval_secs = interval
                .parse()
                .map_err(|_| ConfigError::Parse("Invalid revocation prune interval".to_string()))?;
        }
        if let Some(max_failures) = env_var("AUTH_RATE_LIMIT_MAX_FAILURES") {
            config.auth.rate_limit.max_failures = max_failures
                .parse()
                .map_err(|_| ConfigError::Parse("Invalid rate limit max failures".to_string()))?;
        }
        if let Some(block) = env_var("AUTH_RATE_LIMIT_BLOCK_DURATION_SECS") {
            config.auth.rate_limit.block_duration_secs = block
                .parse()
                .map_err(|_| ConfigError::Parse("Invalid rate limit block duration".to_string()))?;
        }
        if let Some(window) = env_var("AUTH_RATE_LIMIT_WINDOW_DURATION_SECS") {
            config.auth.rate_limit.window_duration_secs = window
                .parse()
                .map_err(|_| ConfigError::Parse("Invalid rate limit window".to_string()))?;
        }
        if let Some(users) = env_var("AUTH_USERS") {
            config.auth.users = parse_user_list(&users)?;
        }

        if let Some(enabled) = env_var("OTEL_ENABLED") {
            config.otel.enabled = enabled.parse().unwrap_or(false);
        }
        if let Some(endpoint) = env_var("OTEL_ENDPOINT") {
            config.otel.endpoint = Some(endpoint);
        }

        if let Some(level) = env_var("LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Some(format) = env_var("LOG_FORMAT") {
            config.logging.format = format;
        }

        Ok(config)
    }

    /// Check values that serde cannot reject on its own
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.auth.signing_secret.as_deref() {
            None => {
                return Err(ConfigError::MissingRequired(
                    "auth.signing_secret".to_string(),
                ))
            }
            Some(secret) if secret.trim().is_empty() => {
                return Err(ConfigError::InvalidValue(
                    "auth.signing_secret must not be empty".to_string(),
                ))
            }
            Some(_) => {}
        }

        if self.auth.token_ttl_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "auth.token_ttl_ms must be greater than zero".to_string(),
            ));
        }

        if self.auth.token_ttl_ms > MAX_DURATION_MS {
            return Err(ConfigError::InvalidValue(format!(
                "auth.token_ttl_ms must not exceed {}",
                MAX_DURATION_MS
            )));
        }

        if self.auth.refresh_grace_ms > MAX_DURATION_MS {
            return Err(ConfigError::InvalidValue(format!(
                "auth.refresh_grace_ms must not exceed {}",
                MAX_DURATION_MS
            )));
        }

        // tokio intervals panic on a zero period
        if self.auth.revocation_prune_interval_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "auth.revocation_prune_interval_secs must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

fn env_var(suffix: &str) -> Option<String> {
    std::env::var(format!("{}{}", ENV_PREFIX, suffix)).ok()
}

/// Parse `name=hash;name=hash` pairs
///
/// PHC strings contain `=` and `,`, so entries are split on `;` and each entry
/// on its first `=`.
fn parse_user_list(raw: &str) -> Result<HashMap<String, UserConfig>, ConfigError> {
    let mut users = HashMap::new();
    for entry in raw.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        let (name, hash) = entry.split_once('=').ok_or_else(|| {
            ConfigError::Parse(format!("Invalid user entry (expected name=hash): {}", entry))
        })?;
        users.insert(
            name.trim().to_string(),
            UserConfig {
                password_hash: hash.trim().to_string(),
            },
        );
    }
    Ok(users)
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// HMAC algorithm used to sign tokens
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum SigningAlgorithm {
    HS256,
    HS384,
    #[default]
    HS512,
}

/// Token authority configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthConfig {
    /// Process-wide signing secret (required)
    pub signing_secret: Option<String>,

    /// Signing algorithm
    #[serde(default)]
    pub algorithm: SigningAlgorithm,

    /// Token time-to-live in milliseconds
    #[serde(default = "default_token_ttl_ms")]
    pub token_ttl_ms: u64,

    /// How long past expiry a token may still be refreshed, in milliseconds
    #[serde(default)]
    pub refresh_grace_ms: u64,

    /// Interval between revocation set prunes, in seconds
    #[serde(default = "default_prune_interval")]
    pub revocation_prune_interval_secs: u64,

    /// Provisioned users
    #[serde(default)]
    pub users: HashMap<String, UserConfig>,

    /// Identity to role-set table; the built-in table is used when absent
    #[serde(default)]
    pub roles: Option<HashMap<String, Vec<Role>>>,

    /// Rate limiting configuration for failed logins
    #[serde(default)]
    pub rate_limit: AuthRateLimitConfig,
}

impl AuthConfig {
    pub fn token_ttl(&self) -> Duration {
        Duration::from_millis(self.token_ttl_ms)
    }

    pub fn refresh_grace(&self) -> Duration {
        Duration::from_millis(self.refresh_grace_ms)
    }

    pub fn revocation_prune_interval(&self) -> Duration {
        Duration::from_secs(self.revocation_prune_interval_secs)
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            signing_secret: None,
            algorithm: SigningAlgorithm::default(),
            token_ttl_ms: default_token_ttl_ms(),
            refresh_grace_ms: 0,
            revocation_prune_interval_secs: default_prune_interval(),
            users: HashMap::new(),
            roles: None,
            rate_limit: AuthRateLimitConfig::default(),
        }
    }
}

fn default_token_ttl_ms() -> u64 {
    86_400_000 // 24 hours
}

fn default_prune_interval() -> u64 {
    300
}

/// A provisioned user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserConfig {
    /// Argon2id PHC string
    pub password_hash: String,
}

/// Rate limiting configuration for authentication failures
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthRateLimitConfig {
    /// Maximum number of failed attempts before blocking
    #[serde(default = "default_max_failures")]
    pub max_failures: u32,

    /// Duration to block after max failures (in seconds)
    #[serde(default = "default_block_duration")]
    pub block_duration_secs: u64,

    /// Window over which failures are counted (in seconds)
    #[serde(default = "default_window_duration")]
    pub window_duration_secs: u64,
}

impl Default for AuthRateLimitConfig {
    fn default() -> Self {
        Self {
            max_failures: default_max_failures(),
            block_duration_secs: default_block_duration(),
            window_duration_secs: default_window_duration(),
        }
    }
}

fn default_max_failures() -> u32 {
    10
}

fn default_block_duration() -> u64 {
    300
}

fn default_window_duration() -> u64 {
    600
}

/// OpenTelemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OtelConfig {
    /// Whether OpenTelemetry is enabled
    #[serde(default)]
    pub enabled: bool,

    /// OTLP endpoint URL
    pub endpoint: Option<String>,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for OtelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            service_name: default_service_name(),
        }
    }
}

fn default_service_name() -> String {
    "session-authority".to_string()
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (`json` or `pretty`)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

/// Configuration error types
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum ConfigError {
    /// Error reading configuration file
    #[error("Failed to read configuration file: {0}")]
    FileRead(String),

    /// Error parsing configuration
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// Invalid configuration value
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// Missing required configuration
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

/// Expand environment variables in a string
///
/// Supports `${VAR_NAME}` syntax
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let re = regex_lite::Regex::new(r"\$\{([^}]+)\}")
        .map_err(|e| ConfigError::Parse(format!("Invalid expansion pattern: {}", e)))?;

    Ok(re
        .replace_all(input, |caps: &regex_lite::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned())
}
