//! Node configuration
//!
//! Setup updates are read-modify-write: the current `Setup` is fetched, a
//! `SetupArgs` patch is merged over it with [`Setup::merged_with`], and the
//! merged record is submitted in full.
//!
//! `Setup` keeps the record exactly as the server sent it, so keys this
//! client does not model, `null` values and the server's choice of string
//! or number all survive the round trip. Typed accessors read the common
//! fields leniently.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::status::Units;

/// Full configuration record of a node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Setup {
    fields: Map<String, Value>,
}

/// Patch over a [`Setup`]; unset fields keep their current value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupArgs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_mode: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<Units>,
    /// Rated heater power in watts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power: Option<String>,
    /// Calibration offset added to the measured temperature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub away_mode: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub away_offset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_auto_span: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_mode_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub true_radiant_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_duty_factor: Option<i64>,
}

impl SetupArgs {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Wire entries for the fields that are set.
    fn entries(&self) -> impl Iterator<Item = (&'static str, Value)> {
        [
            ("control_mode", self.control_mode.map(Value::from)),
            ("units", self.units.map(|units| Value::from(units.as_str()))),
            ("power", self.power.clone().map(Value::from)),
            ("offset", self.offset.clone().map(Value::from)),
            ("away_mode", self.away_mode.map(Value::from)),
            ("away_offset", self.away_offset.clone().map(Value::from)),
            ("modified_auto_span", self.modified_auto_span.map(Value::from)),
            ("window_mode_enabled", self.window_mode_enabled.map(Value::from)),
            ("true_radiant_enabled", self.true_radiant_enabled.map(Value::from)),
            ("user_duty_factor", self.user_duty_factor.map(Value::from)),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|value| (key, value)))
    }
}

impl Setup {
    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.fields
    }

    /// Raw value of `key`, `null` included.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn control_mode(&self) -> Option<i64> {
        self.get("control_mode").and_then(integer)
    }

    pub fn units(&self) -> Option<Units> {
        self.get("units").cloned().and_then(|value| serde_json::from_value(value).ok())
    }

    /// Rated heater power in watts.
    pub fn power(&self) -> Option<f64> {
        self.get("power").and_then(decimal)
    }

    pub fn offset(&self) -> Option<f64> {
        self.get("offset").and_then(decimal)
    }

    pub fn away_mode(&self) -> Option<i64> {
        self.get("away_mode").and_then(integer)
    }

    pub fn away_offset(&self) -> Option<f64> {
        self.get("away_offset").and_then(decimal)
    }

    pub fn window_mode_enabled(&self) -> Option<bool> {
        self.get("window_mode_enabled").and_then(flag)
    }

    pub fn true_radiant_enabled(&self) -> Option<bool> {
        self.get("true_radiant_enabled").and_then(flag)
    }

    /// Firmware revision; read-only.
    pub fn flash_version(&self) -> Option<&str> {
        self.get("flash_version").and_then(Value::as_str)
    }

    /// Overlay `patch` on this record. Patch values win; every other key
    /// is kept exactly as received.
    #[must_use]
    pub fn merged_with(&self, patch: &SetupArgs) -> Self {
        let mut fields = self.fields.clone();
        for (key, value) in patch.entries() {
            fields.insert(key.to_string(), value);
        }
        Self { fields }
    }
}

fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn decimal(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

fn flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|v| v != 0),
        _ => None,
    }
}
