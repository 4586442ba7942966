//! Access token seam for the request executor

use async_trait::async_trait;
use helki_domain::Result;

/// Trait for providing access tokens
///
/// This trait allows dependency injection and testing with mock providers.
/// [`crate::auth::TokenManager`] is the production implementation.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    /// Get a valid access token
    ///
    /// Implementations re-authenticate when the held token is stale.
    async fn access_token(&self) -> Result<String>;
}
