//! Machine value object and its wire decoding.
//!
//! A [`Machine`] is the full state of one tracked unit as last reported by
//! the push source. Every inbound update replaces the previous value for the
//! same [`MachineId`] wholesale; fields are never merged.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::FleetError;

/// Stable identifier of a machine, assigned by the push source.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    ToSchema,
)]
#[serde(transparent)]
pub struct MachineId(u32);

impl MachineId {
    /// Wraps a raw identifier.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw identifier.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for MachineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for MachineId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

/// GPS position: degrees, degrees, meters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, ToSchema)]
pub struct Location {
    /// Latitude in degrees.
    #[serde(default)]
    pub lat: f64,
    /// Longitude in degrees.
    #[serde(default)]
    pub lon: f64,
    /// Altitude in meters.
    #[serde(default)]
    pub alt: f64,
}

/// Last known state of a single machine.
///
/// Wire format (snake_case):
///
/// ```json
/// { "id": 7, "location": {"lat": 47.1, "lon": -122.1, "alt": 10.0},
///   "fuel_level": 55.5, "is_paused": false }
/// ```
///
/// The push source serializes with zero-value omission, so a missing `id`,
/// `fuel_level` or `is_paused` decodes as `0` / `0.0` / `false`. `location`
/// is always required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Machine {
    /// Machine identifier.
    #[serde(default)]
    pub id: MachineId,
    /// Current position.
    pub location: Location,
    /// Fuel percentage. Expected in `0..=100` but not enforced.
    #[serde(default)]
    pub fuel_level: f64,
    /// Whether the machine is currently paused.
    #[serde(default)]
    pub is_paused: bool,
}

impl Machine {
    /// Decodes one inbound text frame into a `Machine`.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::MalformedMessage`] if the payload is not a
    /// well-formed machine record.
    pub fn decode(text: &str) -> Result<Self, FleetError> {
        Ok(serde_json::from_str(text)?)
    }
}
