//! # Helki Domain
//!
//! Domain types for the Helki heating cloud client.
//!
//! This crate contains:
//! - Device, node, status and setup records
//! - The client error type and Result alias
//! - Client configuration
//! - Wire constants
//!
//! ## Architecture
//! - No dependencies on other Helki crates
//! - No I/O; HTTP lives in `helki-infra`

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
