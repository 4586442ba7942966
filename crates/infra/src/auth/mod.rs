//! Password-grant authentication
//!
//! The [`TokenManager`] owns the single bearer credential of a client and
//! renews it on demand before it drops below the safety margin.

pub mod token_manager;
pub mod types;

pub use token_manager::TokenManager;
pub use types::{AuthOutcome, Credential, PasswordGrant, TokenResponse};
