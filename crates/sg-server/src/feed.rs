//! Line-delimited JSON signal feed
//!
//! One object per line, addressed to a controller by id:
//!
//! ```json
//! {"controller": "living_room", "temperature": "25.4",
//!  "sun": {"azimuth": 180.0, "elevation": 35.0},
//!  "next_sunset": "2025-07-01T19:45:00Z"}
//! ```
//!
//! Absent fields leave the controller's value untouched; an explicit `null`
//! marks the signal unavailable. Temperatures may be numbers or sensor state
//! strings such as `"unavailable"`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use sg_core::{parse_reading, SunPosition, Zone};

use crate::engine::ControllerHandle;
use crate::error::EngineResult;

/// One decoded feed line
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SignalUpdate {
    pub controller: String,
    #[serde(default, deserialize_with = "present")]
    pub temperature: Option<Option<serde_json::Value>>,
    #[serde(default, deserialize_with = "present")]
    pub sun: Option<Option<SunPosition>>,
    #[serde(default, deserialize_with = "present")]
    pub next_sunset: Option<Option<DateTime<Utc>>>,
    /// Operator force-set, e.g. `"t2"` or `"none"`
    #[serde(default)]
    pub force_zone: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
}

/// Distinguish an explicit `null` from an absent field
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl SignalUpdate {
    /// Decode a single feed line
    pub fn parse(line: &str) -> EngineResult<Self> {
        Ok(serde_json::from_str(line.trim())?)
    }

    /// Temperature carried by this line, if any
    ///
    /// The outer `None` means the line did not mention the temperature.
    pub fn reading(&self) -> Option<Option<f64>> {
        self.temperature.as_ref().map(|value| match value {
            Some(serde_json::Value::Number(n)) => n.as_f64().filter(|v| v.is_finite()),
            Some(serde_json::Value::String(s)) => parse_reading(s),
            _ => None,
        })
    }

    pub fn sun_position(&self) -> Option<Option<SunPosition>> {
        self.sun.map(|position| {
            position.and_then(|p| SunPosition::from_raw(p.azimuth, p.elevation))
        })
    }

    pub fn target_zone(&self) -> EngineResult<Option<Zone>> {
        Ok(self.force_zone.as_deref().map(str::parse::<Zone>).transpose()?)
    }

    /// Publish the signals carried by this line to a controller
    pub fn publish(&self, handle: &ControllerHandle) {
        if let Some(enabled) = self.enabled {
            handle.set_enabled(enabled);
        }
        if let Some(sunset) = self.next_sunset {
            handle.set_next_sunset(sunset);
        }
        if let Some(position) = self.sun_position() {
            handle.set_sun(position);
        }
        if let Some(reading) = self.reading() {
            handle.set_temperature(reading);
        }
    }
}
