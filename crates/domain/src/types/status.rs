//! Node operating state
//!
//! `Status` is what the API reports for a node; `SetStatus` is the partial
//! document accepted by the status endpoint. Temperatures travel as decimal
//! strings on the wire.

use serde::de::Deserializer;
use serde::{Deserialize, Serialize};

use crate::errors::{HelkiError, Result};

/// Operating mode of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Auto,
    Manual,
    Off,
    SelfLearn,
    Presence,
    /// A mode this client does not model
    #[serde(other)]
    Unknown,
}

/// Temperature units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Units {
    #[serde(rename = "C")]
    Celsius,
    #[serde(rename = "F")]
    Fahrenheit,
}

impl Units {
    /// Wire spelling (`"C"` or `"F"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Celsius => "C",
            Self::Fahrenheit => "F",
        }
    }
}

/// Full status report for a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    pub mode: Mode,
    pub units: Units,
    /// Set-point temperature
    pub stemp: String,
    /// Measured temperature
    pub mtemp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ice_temp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eco_temp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comf_temp: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(default, deserialize_with = "flag", skip_serializing_if = "Option::is_none")]
    pub locked: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_open: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub true_radiant_active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boost: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boost_end_min: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boost_end_day: Option<i64>,

    // Telemetry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duty: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub act_duty: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pcb_temp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power_pcb_temp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_status: Option<String>,
}

impl Status {
    pub fn measured_temperature(&self) -> Option<f64> {
        parse_temperature(&self.mtemp)
    }

    pub fn target_temperature(&self) -> Option<f64> {
        parse_temperature(&self.stemp)
    }

    /// Whether the node is currently drawing power to heat.
    pub fn is_heating(&self) -> bool {
        self.active.unwrap_or(false)
    }

    pub fn is_locked(&self) -> bool {
        self.locked.unwrap_or(false)
    }
}

/// Partial status update; only fields that are set are sent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<Units>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stemp: Option<String>,
}

impl SetStatus {
    /// Change only the operating mode.
    pub fn mode(mode: Mode) -> Self {
        Self { mode: Some(mode), ..Self::default() }
    }

    /// Switch to manual mode holding `celsius`, rounded to one decimal.
    ///
    /// # Errors
    /// Returns `HelkiError::InvalidInput` for NaN or infinite temperatures.
    pub fn target_temperature(celsius: f64) -> Result<Self> {
        if !celsius.is_finite() {
            return Err(HelkiError::InvalidInput(format!(
                "target temperature must be finite, got {celsius}"
            )));
        }

        Ok(Self {
            mode: Some(Mode::Manual),
            units: Some(Units::Celsius),
            stemp: Some(format!("{celsius:.1}")),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.mode.is_none() && self.units.is_none() && self.stemp.is_none()
    }
}

/// Parse a wire temperature such as `"21.5"`.
pub fn parse_temperature(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|value| value.is_finite())
}

// `locked` is 0/1 on most firmware and a bool on some.
fn flag<'de, D>(deserializer: D) -> std::result::Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Int(i64),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Bool(value) => value,
        Raw::Int(value) => value != 0,
    }))
}
