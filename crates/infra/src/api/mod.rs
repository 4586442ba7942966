//! Helki API client
//!
//! This module provides the HTTP-based client for the Helki v2 API.
//! It handles authentication, request execution and the typed device
//! operations.
//!
//! # Architecture
//!
//! - Uses the retrying `HttpClient` (no direct reqwest)
//! - Bearer token obtained from an [`AccessTokenProvider`] before every call
//! - Failures normalized into `HelkiError::ApiRequest`

pub mod auth;
pub mod client;
pub mod commands;

pub use auth::AccessTokenProvider;
pub use client::ApiClient;
pub use commands::HelkiClient;
