//! Away status and power limit payloads

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{HelkiError, Result};

/// Serialize `args` into an away-status update, dropping `null` entries.
///
/// A caller passes `null` for a field it does not want to change; the
/// server would otherwise treat it as an explicit value.
///
/// # Errors
/// Returns `HelkiError::InvalidInput` unless `args` serializes to a JSON
/// object.
pub fn away_status_update<T: Serialize + ?Sized>(args: &T) -> Result<Map<String, Value>> {
    let value = serde_json::to_value(args)
        .map_err(|e| HelkiError::InvalidInput(format!("Failed to serialize away status: {e}")))?;

    match value {
        Value::Object(map) => Ok(map.into_iter().filter(|(_, v)| !v.is_null()).collect()),
        other => Err(HelkiError::InvalidInput(format!(
            "away status must be a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

/// Wire form of a device power limit: watts as a decimal string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerLimitPayload {
    pub power_limit: String,
}

impl PowerLimitPayload {
    pub fn from_watts(watts: u32) -> Self {
        Self { power_limit: watts.to_string() }
    }

    /// # Errors
    /// Returns `HelkiError::InvalidInput` if the server value is not a
    /// non-negative integer.
    pub fn watts(&self) -> Result<u32> {
        self.power_limit.trim().parse::<u32>().map_err(|e| {
            HelkiError::InvalidInput(format!("invalid power limit '{}': {e}", self.power_limit))
        })
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
