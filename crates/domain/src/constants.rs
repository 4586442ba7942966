//! Client constants
//!
//! Wire-level paths and timing defaults shared by the domain and infra crates.

// Endpoints
pub const API_HOST_SUFFIX: &str = "helki.com";
pub const TOKEN_PATH: &str = "client/token";
pub const API_PREFIX: &str = "api/v2";

// Token lifecycle
pub const MIN_TOKEN_LIFETIME_SECS: i64 = 60;

// Transport
pub const REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_RETRY_ATTEMPTS: usize = 5;
pub const DEFAULT_BASE_BACKOFF_MS: u64 = 100;
pub const MAX_BACKOFF_SHIFT: u32 = 8;
/// Retries beyond this would hit the backoff cap and stop growing the delay
pub const MAX_RETRY_ATTEMPTS: usize = MAX_BACKOFF_SHIFT as usize + 1;
