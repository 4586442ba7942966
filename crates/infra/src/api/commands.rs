//! Typed Helki operations
//!
//! Thin wrappers over [`ApiClient`]: each method builds the resource path,
//! shapes the payload and interprets the reply. Nothing is cached; every call
//! is a fresh round trip.

use std::sync::Arc;

use helki_domain::{
    away_status_update, ClientConfig, Device, GroupedDevices, HelkiError, Node, NodesEnvelope,
    PowerLimitPayload, Result, SetStatus, Setup, SetupArgs, Status,
};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use urlencoding::encode;

use super::client::ApiClient;
use crate::auth::TokenManager;
use crate::http::HttpClient;

/// Client for the Helki heating cloud
pub struct HelkiClient {
    client: Arc<ApiClient>,
    tokens: Option<Arc<TokenManager>>,
}

impl HelkiClient {
    /// Wrap an existing API client.
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client, tokens: None }
    }

    /// Build the full stack (transport, token manager, executor) from
    /// configuration.
    ///
    /// # Errors
    ///
    /// Returns `HelkiError::Config` if the configuration is incomplete or
    /// the HTTP client cannot be created.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        let api_root = config.api_root()?;

        let http = Arc::new(
            HttpClient::builder()
                .retry_attempts(config.retry_attempts)
                .user_agent(concat!("helki-client/", env!("CARGO_PKG_VERSION")))
                .build()?,
        );
        let tokens = Arc::new(TokenManager::from_config(http.clone(), config)?);
        let client = Arc::new(ApiClient::new(&api_root, http, tokens.clone()));

        info!(api_root = %api_root, retry_attempts = config.retry_attempts, "Helki client ready");
        Ok(Self { client, tokens: Some(tokens) })
    }

    /// Token manager backing this client, when built from configuration.
    pub fn token_manager(&self) -> Option<&Arc<TokenManager>> {
        self.tokens.as_ref()
    }

    /// Underlying request executor.
    pub fn api(&self) -> &ApiClient {
        &self.client
    }

    // === Inventory ===

    /// List every device registered to the account.
    #[instrument(skip(self))]
    pub async fn get_devices(&self) -> Result<Vec<Device>> {
        let devices: Vec<Device> = self.client.get("devs").await?;
        debug!(count = devices.len(), "Devices listed");
        Ok(devices)
    }

    /// List homes with the devices they own.
    #[instrument(skip(self))]
    pub async fn get_grouped_devices(&self) -> Result<Vec<GroupedDevices>> {
        let homes: Vec<GroupedDevices> = self.client.get("grouped_devs").await?;
        debug!(count = homes.len(), "Grouped devices listed");
        Ok(homes)
    }

    /// List the nodes of a device, in server order.
    #[instrument(skip(self))]
    pub async fn get_nodes(&self, device_id: &str) -> Result<Vec<Node>> {
        let path = format!("devs/{}/mgr/nodes", encode(device_id));
        let envelope: NodesEnvelope = self.client.get(&path).await?;
        debug!(count = envelope.nodes.len(), "Nodes listed");
        Ok(envelope.nodes)
    }

    // === Status ===

    #[instrument(skip(self, node), fields(node = %node))]
    pub async fn get_status(&self, device_id: &str, node: &Node) -> Result<Status> {
        self.client.get(&node_path(device_id, node, "status")).await
    }

    /// Send a partial status update. Only the fields set on `status` are
    /// transmitted; the current status is not read first.
    #[instrument(skip(self, node, status), fields(node = %node))]
    pub async fn set_status(&self, device_id: &str, node: &Node, status: &SetStatus) -> Result<()> {
        if status.is_empty() {
            warn!("Sending empty status update");
        }
        let _: Value = self.client.post(&node_path(device_id, node, "status"), status).await?;
        info!("Status updated");
        Ok(())
    }

    // === Setup ===

    #[instrument(skip(self, node), fields(node = %node))]
    pub async fn get_setup(&self, device_id: &str, node: &Node) -> Result<Setup> {
        self.client.get(&node_path(device_id, node, "setup")).await
    }

    /// Merge `patch` into the node's current setup and submit the result.
    ///
    /// This is a read-modify-write without any conditional write: a change
    /// made by someone else between the fetch and the submit is overwritten.
    ///
    /// Returns the server's reply to the submit.
    #[instrument(skip(self, node, patch), fields(node = %node))]
    pub async fn set_setup(&self, device_id: &str, node: &Node, patch: &SetupArgs) -> Result<Value> {
        let path = node_path(device_id, node, "setup");
        let current: Setup = self.client.get(&path).await?;
        let merged = current.merged_with(patch);

        let reply = self.client.post(&path, &merged).await?;
        info!("Setup updated");
        Ok(reply)
    }

    // === Away status ===

    #[instrument(skip(self))]
    pub async fn get_device_away_status(&self, device_id: &str) -> Result<Value> {
        self.client.get(&away_path(device_id)).await
    }

    /// Submit an away-status update. `args` must serialize to a JSON object;
    /// top-level `null` entries are dropped so callers can mark a field as
    /// unchanged explicitly.
    #[instrument(skip(self, args))]
    pub async fn set_device_away_status<T>(&self, device_id: &str, args: &T) -> Result<Value>
    where
        T: Serialize + ?Sized,
    {
        let update = away_status_update(args)?;
        let reply = self.client.post(&away_path(device_id), &update).await?;
        info!(fields = update.len(), "Away status updated");
        Ok(reply)
    }

    // === Power limit ===

    /// Device-wide power limit in watts.
    #[instrument(skip(self))]
    pub async fn get_device_power_limit(&self, device_id: &str) -> Result<u32> {
        let path = power_limit_path(device_id);
        let payload: PowerLimitPayload = self.client.get(&path).await?;
        payload.watts().map_err(|e| match e {
            HelkiError::InvalidInput(message) => HelkiError::api_request(path, message, None),
            other => other,
        })
    }

    #[instrument(skip(self))]
    pub async fn set_device_power_limit(&self, device_id: &str, watts: u32) -> Result<()> {
        let payload = PowerLimitPayload::from_watts(watts);
        let _: Value = self.client.post(&power_limit_path(device_id), &payload).await?;
        info!(watts, "Power limit updated");
        Ok(())
    }
}

fn node_path(device_id: &str, node: &Node, resource: &str) -> String {
    format!(
        "devs/{}/{}/{}/{}",
        encode(device_id),
        encode(&node.node_type),
        encode(&node.addr),
        resource
    )
}

fn away_path(device_id: &str) -> String {
    format!("devs/{}/mgr/away_status", encode(device_id))
}

fn power_limit_path(device_id: &str) -> String {
    format!("devs/{}/htr_system/power_limit", encode(device_id))
}
