//! Domain models for session-authority
//!
//! This module contains the core domain models used throughout the application.

pub mod session;

// Re-export commonly used types
pub use session::{IssuedToken, Principal, ValidationResult, BEARER};
