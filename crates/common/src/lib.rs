//! Common utilities and types shared across the rpc-middleware crates.

#![warn(clippy::pedantic)]

/// Module for common error types
pub mod error;

/// Module for the structured RPC error carried across service boundaries
pub mod rpc_error;

/// Module for common data types
pub mod types;

/// Module for common configuration
pub mod config;
