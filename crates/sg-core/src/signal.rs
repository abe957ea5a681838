//! Signal value types consumed by the controller
//!
//! Temperature and sun position arrive from external feeds. A feed that has
//! nothing usable to report is represented as `None`, never as a sentinel.

use serde::{Deserialize, Serialize};

/// States a sensor reports when it has no usable value
const UNAVAILABLE_STATES: &[&str] = &["unavailable", "unknown", "none", ""];

/// Sun position in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SunPosition {
    pub azimuth: f64,
    pub elevation: f64,
}

impl SunPosition {
    pub fn new(azimuth: f64, elevation: f64) -> Self {
        Self { azimuth, elevation }
    }

    /// Build from raw feed values; non-finite numbers make the position unavailable
    pub fn from_raw(azimuth: f64, elevation: f64) -> Option<Self> {
        (azimuth.is_finite() && elevation.is_finite()).then(|| Self::new(azimuth, elevation))
    }
}

/// Parse a sensor state string into a temperature reading
///
/// Returns `None` for unavailable/unknown states and anything non-numeric.
pub fn parse_reading(state: &str) -> Option<f64> {
    let state = state.trim();
    if UNAVAILABLE_STATES
        .iter()
        .any(|s| state.eq_ignore_ascii_case(s))
    {
        return None;
    }
    state.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Opaque handle to a captured cover configuration
///
/// Produced by the actuation layer when it captures the covers' state and
/// handed back unchanged on restore.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SnapshotHandle(String);

impl SnapshotHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SnapshotHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
