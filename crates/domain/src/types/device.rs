//! Device inventory types
//!
//! Devices are gateways registered to an account; nodes are the heaters,
//! accumulators and thermostats behind them.

use std::fmt;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

/// A gateway registered to the account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub dev_id: String,
    pub name: String,
    pub product_id: String,
    pub fw_version: String,
    pub serial_id: String,
}

/// A home or site owning a set of devices
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupedDevices {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub devs: Vec<Device>,
    #[serde(default)]
    pub owner: bool,
}

/// Addressable heating unit within a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Node kind as used in API paths (`htr`, `acm`, `thm`, ...)
    #[serde(rename = "type")]
    pub node_type: String,
    /// Address within the device; the API emits it as a number or a string
    #[serde(deserialize_with = "string_or_number")]
    pub addr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lost: Option<bool>,
}

impl Node {
    pub fn new(node_type: impl Into<String>, addr: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
            addr: addr.into(),
            name: None,
            installed: None,
            lost: None,
        }
    }

    /// Display label: the node name when set, otherwise `type/addr`.
    pub fn label(&self) -> String {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("{}/{}", self.node_type, self.addr),
        }
    }

    /// Lost nodes no longer answer the gateway.
    pub fn is_reachable(&self) -> bool {
        !self.lost.unwrap_or(false)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.node_type, self.addr)
    }
}

/// `GET devs/{id}/mgr/nodes` response body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodesEnvelope {
    pub nodes: Vec<Node>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
    }

    match Raw::deserialize(deserializer) {
        Ok(Raw::Text(text)) => Ok(text),
        Ok(Raw::Int(value)) => Ok(value.to_string()),
        Err(_) => Err(de::Error::custom("expected a string or integer node address")),
    }
}
