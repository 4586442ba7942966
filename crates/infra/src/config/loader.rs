//! Configuration loader
//!
//! Loads client configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If incomplete, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `HELKI_API_NAME`: API host name fragment (`api-tt` for `api-tt.helki.com`)
//! - `HELKI_API_ROOT`: Full API root overriding the name (optional)
//! - `HELKI_CLIENT_ID`: OAuth client id
//! - `HELKI_CLIENT_SECRET`: OAuth client secret
//! - `HELKI_USERNAME`: Account user name
//! - `HELKI_PASSWORD`: Account password
//! - `HELKI_RETRY_ATTEMPTS`: Retries for transient failures (optional)
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./helki.json` or `./helki.toml` (current working directory)
//! 2. `./config.json` or `./config.toml` (current working directory)
//! 3. The same names next to the executable

use std::path::{Path, PathBuf};

use helki_domain::constants::DEFAULT_RETRY_ATTEMPTS;
use helki_domain::{ClientConfig, HelkiError, Result};

const CONFIG_FILE_NAMES: [&str; 4] = ["helki.json", "helki.toml", "config.json", "config.toml"];

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If any required
/// variables are missing, falls back to loading from a config file.
///
/// # Errors
/// Returns `HelkiError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - Required fields are missing
pub fn load() -> Result<ClientConfig> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// # Errors
/// Returns `HelkiError::Config` if required variables are missing
/// or have invalid values.
pub fn load_from_env() -> Result<ClientConfig> {
    load_with(|key| std::env::var(key).ok())
}

/// Load configuration through an arbitrary variable lookup.
///
/// Used by [`load_from_env`]; tests pass a map instead of touching the
/// process environment.
///
/// # Errors
/// Same as [`load_from_env`].
pub fn load_with<F>(lookup: F) -> Result<ClientConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let required = |key: &str| {
        lookup(key).filter(|v| !v.trim().is_empty()).ok_or_else(|| {
            HelkiError::Config(format!("Missing required environment variable: {key}"))
        })
    };

    let api_root = lookup("HELKI_API_ROOT").filter(|v| !v.trim().is_empty());
    let api_name = match api_root {
        Some(_) => lookup("HELKI_API_NAME").unwrap_or_default(),
        None => required("HELKI_API_NAME")?,
    };

    let retry_attempts = match lookup("HELKI_RETRY_ATTEMPTS") {
        Some(raw) => raw.trim().parse::<usize>().map_err(|e| {
            HelkiError::Config(format!("Invalid HELKI_RETRY_ATTEMPTS '{raw}': {e}"))
        })?,
        None => DEFAULT_RETRY_ATTEMPTS,
    };

    let config = ClientConfig {
        api_name,
        api_root,
        client_id: required("HELKI_CLIENT_ID")?,
        client_secret: required("HELKI_CLIENT_SECRET")?,
        username: required("HELKI_USERNAME")?,
        password: required("HELKI_PASSWORD")?,
        retry_attempts,
    };
    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `HelkiError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - Required fields are missing
pub fn load_from_file(path: Option<PathBuf>) -> Result<ClientConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(HelkiError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            HelkiError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| HelkiError::Config(format!("Failed to read config file: {e}")))?;

    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    Ok(config)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<ClientConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| HelkiError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| HelkiError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(HelkiError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut dirs = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd);
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            dirs.push(exe_dir.to_path_buf());
        }
    }

    dirs.iter()
        .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.exists())
}
