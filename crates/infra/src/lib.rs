//! # Helki Infrastructure
//!
//! HTTP implementation of the Helki heating cloud client.
//!
//! This crate contains:
//! - The retrying HTTP transport
//! - Password-grant token management
//! - The authenticated request executor and typed device operations
//! - Configuration loading
//!
//! ## Architecture
//! - Depends on `helki-domain` for types and errors
//! - Contains all I/O
//!
//! ```no_run
//! use helki_domain::ClientConfig;
//! use helki_infra::HelkiClient;
//!
//! # async fn example() -> helki_domain::Result<()> {
//! let config = ClientConfig::new("api-tt", "client-id", "client-secret", "me@example.com", "pw");
//! let client = HelkiClient::from_config(&config)?;
//! for home in client.get_grouped_devices().await? {
//!     for device in &home.devs {
//!         let nodes = client.get_nodes(&device.dev_id).await?;
//!         println!("{} ({}): {} nodes", device.name, home.name, nodes.len());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod errors;
pub mod http;

// Re-export commonly used items
pub use api::{AccessTokenProvider, ApiClient, HelkiClient};
pub use auth::{AuthOutcome, TokenManager};
pub use errors::InfraError;
pub use http::{HttpClient, HttpClientBuilder};
