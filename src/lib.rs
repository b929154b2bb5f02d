//! session-authority - A stateless token authentication service
//!
//! This crate issues signed, expiring bearer tokens for configured users,
//! validates them for downstream filters, rotates them on refresh and revokes
//! them on logout.

pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod otel;
pub mod server;
