//! Failed-login throttling
//!
//! Counts failed authentications per client address. Once an address reaches
//! `max_failures` within `window`, further attempts from it are rejected for
//! `block_duration` without touching the credential store.

use std::net::IpAddr;
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Configuration for the login throttle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThrottleConfig {
    /// Maximum number of failed attempts before blocking
    pub max_failures: u32,

    /// Duration to block an address after max failures
    pub block_duration: Duration,

    /// Window in which failures are counted
    pub window: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            max_failures: 10,
            block_duration: Duration::from_secs(300),
            window: Duration::from_secs(600),
        }
    }
}

impl From<&crate::config::AuthRateLimitConfig> for ThrottleConfig {
    fn from(config: &crate::config::AuthRateLimitConfig) -> Self {
        Self {
            max_failures: config.max_failures,
            block_duration: Duration::from_secs(config.block_duration_secs),
            window: Duration::from_secs(config.window_duration_secs),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Attempts {
    failures: u32,
    window_start: Instant,
    blocked_until: Option<Instant>,
}

impl Attempts {
    fn fresh(now: Instant) -> Self {
        Self {
            failures: 0,
            window_start: now,
            blocked_until: None,
        }
    }

    fn is_blocked(&self, now: Instant) -> bool {
        self.blocked_until.is_some_and(|until| now < until)
    }
}

/// Per-address failure tracker
#[derive(Debug)]
pub struct LoginThrottle {
    config: ThrottleConfig,
    attempts: DashMap<IpAddr, Attempts>,
}

impl LoginThrottle {
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            config,
            attempts: DashMap::new(),
        }
    }

    /// Whether `ip` is currently blocked
    pub fn is_blocked(&self, ip: IpAddr) -> bool {
        let now = Instant::now();
        self.attempts
            .get(&ip)
            .is_some_and(|entry| entry.is_blocked(now))
    }

    /// Record a failed attempt; returns `true` if `ip` is now blocked
    pub fn record_failure(&self, ip: IpAddr) -> bool {
        let now = Instant::now();
        let mut entry = self
            .attempts
            .entry(ip)
            .or_insert_with(|| Attempts::fresh(now));

        if entry.is_blocked(now) {
            return true;
        }

        let block_lapsed = entry.blocked_until.is_some();
        let window_lapsed = now.duration_since(entry.window_start) >= self.config.window;
        if block_lapsed || window_lapsed {
            *entry = Attempts::fresh(now);
        }

        entry.failures += 1;
        if entry.failures >= self.config.max_failures {
            entry.blocked_until = Some(now + self.config.block_duration);
            true
        } else {
            false
        }
    }

    /// Forget `ip` (after a successful login)
    pub fn reset(&self, ip: IpAddr) {
        self.attempts.remove(&ip);
    }

    /// Failures counted for `ip` in the current window
    pub fn failure_count(&self, ip: IpAddr) -> u32 {
        let now = Instant::now();
        match self.attempts.get(&ip) {
            Some(entry) if now.duration_since(entry.window_start) < self.config.window => {
                entry.failures
            }
            _ => 0,
        }
    }

    /// Time left until `ip` is unblocked
    pub fn remaining_block_time(&self, ip: IpAddr) -> Option<Duration> {
        let now = Instant::now();
        self.attempts
            .get(&ip)
            .and_then(|entry| entry.blocked_until)
            .filter(|until| now < *until)
            .map(|until| until - now)
    }

    /// Drop entries that are neither blocked nor inside their window
    pub fn cleanup(&self) -> usize {
        let now = Instant::now();
        let before = self.attempts.len();
        self.attempts.retain(|_, entry| {
            entry.is_blocked(now) || now.duration_since(entry.window_start) < self.config.window
        });
        before.saturating_sub(self.attempts.len())
    }

    /// Number of addresses currently tracked
    pub fn tracked_count(&self) -> usize {
        self.attempts.len()
    }
}
