//! Configuration loading
//!
//! Optional helpers that build a [`helki_domain::ClientConfig`] from
//! environment variables or files. The client itself only takes a config
//! value.

pub mod loader;

// Re-export commonly used items
pub use loader::{load, load_from_env, load_from_file, load_with, probe_config_paths};
