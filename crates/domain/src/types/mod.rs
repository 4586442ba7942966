//! Domain types and models
//!
//! Wire-compatible records for the Helki v2 API.

pub mod away;
pub mod device;
pub mod setup;
pub mod status;

pub use away::{away_status_update, PowerLimitPayload};
pub use device::{Device, GroupedDevices, Node, NodesEnvelope};
pub use setup::{Setup, SetupArgs};
pub use status::{parse_temperature, Mode, SetStatus, Status, Units};
