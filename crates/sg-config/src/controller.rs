//! Per-controller configuration
//!
//! One controller protects one room: a temperature sensor, a set of covers,
//! and two protection scenes. Every field here may be changed at runtime;
//! the controller re-reads and re-validates it on each evaluation.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Temperature thresholds with asymmetric hysteresis
///
/// Entry into a tier requires `reading >= t + hysteresis`; leaving protection
/// requires `reading < t3` sustained for the cooldown dwell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Medium tier entry threshold
    pub t1: f64,
    /// Intense tier entry threshold
    pub t2: f64,
    /// Cooldown threshold
    pub t3: f64,
    #[serde(default)]
    pub hysteresis1: f64,
    #[serde(default)]
    pub hysteresis2: f64,
}

impl Thresholds {
    /// Check `t3 < t1 < t2` and that margins are finite and non-negative
    pub fn validate(&self) -> ConfigResult<()> {
        for (key, value) in [
            ("t1", self.t1),
            ("t2", self.t2),
            ("t3", self.t3),
            ("hysteresis1", self.hysteresis1),
            ("hysteresis2", self.hysteresis2),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::invalid(key, "must be a finite number"));
            }
        }

        if self.hysteresis1 < 0.0 || self.hysteresis2 < 0.0 {
            return Err(ConfigError::invalid("hysteresis", "must not be negative"));
        }

        if self.t3 >= self.t1 || self.t1 >= self.t2 {
            return Err(ConfigError::ValidationFailed {
                message: format!(
                    "thresholds must satisfy t3 < t1 < t2 (got t3={}, t1={}, t2={})",
                    self.t3, self.t1, self.t2
                ),
            });
        }

        Ok(())
    }

    /// Reading at or above which T1 is entered
    pub fn t1_entry(&self) -> f64 {
        self.t1 + self.hysteresis1
    }

    /// Reading at or above which T2 is entered
    pub fn t2_entry(&self) -> f64 {
        self.t2 + self.hysteresis2
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            t1: 25.0,
            t2: 28.0,
            t3: 22.0,
            hysteresis1: 0.3,
            hysteresis2: 0.3,
        }
    }
}

/// Solar-position window gating tier advances
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolarFilterConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub azimuth_min: f64,
    #[serde(default = "default_azimuth_max")]
    pub azimuth_max: f64,
    #[serde(default)]
    pub elevation_min: f64,
    #[serde(default = "default_elevation_max")]
    pub elevation_max: f64,
}

fn default_azimuth_max() -> f64 {
    360.0
}

fn default_elevation_max() -> f64 {
    90.0
}

impl SolarFilterConfig {
    /// A window is only checked when the filter is enabled
    pub fn validate(&self) -> ConfigResult<()> {
        if !self.enabled {
            return Ok(());
        }

        let bounds = [
            self.azimuth_min,
            self.azimuth_max,
            self.elevation_min,
            self.elevation_max,
        ];
        if bounds.iter().any(|v| !v.is_finite()) {
            return Err(ConfigError::invalid("solar_filter", "bounds must be finite"));
        }
        if self.azimuth_min > self.azimuth_max {
            return Err(ConfigError::invalid(
                "solar_filter.azimuth",
                format!("min {} exceeds max {}", self.azimuth_min, self.azimuth_max),
            ));
        }
        if self.elevation_min > self.elevation_max {
            return Err(ConfigError::invalid(
                "solar_filter.elevation",
                format!(
                    "min {} exceeds max {}",
                    self.elevation_min, self.elevation_max
                ),
            ));
        }
        Ok(())
    }
}

impl Default for SolarFilterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            azimuth_min: 0.0,
            azimuth_max: default_azimuth_max(),
            elevation_min: 0.0,
            elevation_max: default_elevation_max(),
        }
    }
}

/// Complete configuration of one controller instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Unique controller id (usually the room)
    pub id: String,

    /// Human-readable name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub thresholds: Thresholds,

    #[serde(default)]
    pub solar_filter: SolarFilterConfig,

    /// How long the reading must stay below t3 before cooldown
    #[serde(default = "default_cooldown_dwell_minutes")]
    pub cooldown_dwell_minutes: u32,

    /// How long before sunset the daily restoration runs
    #[serde(default = "default_presunset_offset_minutes")]
    pub presunset_offset_minutes: u32,

    /// Upper bound on any single actuation call
    #[serde(default = "default_actuation_timeout_seconds")]
    pub actuation_timeout_seconds: u32,

    /// Period of the cooldown check tick
    #[serde(default = "default_check_interval_seconds")]
    pub check_interval_seconds: u32,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_cooldown_dwell_minutes() -> u32 {
    10
}

fn default_presunset_offset_minutes() -> u32 {
    5
}

fn default_actuation_timeout_seconds() -> u32 {
    30
}

fn default_check_interval_seconds() -> u32 {
    60
}

fn default_enabled() -> bool {
    true
}

impl ControllerConfig {
    /// Configuration with default timings and the given thresholds
    pub fn new(id: impl Into<String>, thresholds: Thresholds) -> Self {
        Self {
            id: id.into(),
            name: None,
            thresholds,
            solar_filter: SolarFilterConfig::default(),
            cooldown_dwell_minutes: default_cooldown_dwell_minutes(),
            presunset_offset_minutes: default_presunset_offset_minutes(),
            actuation_timeout_seconds: default_actuation_timeout_seconds(),
            check_interval_seconds: default_check_interval_seconds(),
            enabled: default_enabled(),
        }
    }

    /// Get display name (name or id)
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.id.trim().is_empty() {
            return Err(ConfigError::invalid("id", "must not be empty"));
        }
        self.thresholds.validate()?;
        self.solar_filter.validate()?;
        if self.cooldown_dwell_minutes == 0 {
            return Err(ConfigError::invalid(
                "cooldown_dwell_minutes",
                "must be at least one minute",
            ));
        }
        if self.actuation_timeout_seconds == 0 {
            return Err(ConfigError::invalid(
                "actuation_timeout_seconds",
                "must be positive",
            ));
        }
        if self.check_interval_seconds == 0 {
            return Err(ConfigError::invalid(
                "check_interval_seconds",
                "must be positive",
            ));
        }
        Ok(())
    }

    pub fn cooldown_dwell(&self) -> Duration {
        Duration::minutes(i64::from(self.cooldown_dwell_minutes))
    }

    pub fn presunset_offset(&self) -> Duration {
        Duration::minutes(i64::from(self.presunset_offset_minutes))
    }

    pub fn actuation_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(u64::from(self.actuation_timeout_seconds))
    }

    pub fn check_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(u64::from(self.check_interval_seconds))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds_are_valid() {
        assert!(Thresholds::default().validate().is_ok());
    }

    #[test]
    fn test_threshold_ordering_enforced() {
        let t3_above_t1 = Thresholds {
            t3: 26.0,
            ..Thresholds::default()
        };
        assert!(matches!(
            t3_above_t1.validate(),
            Err(ConfigError::ValidationFailed { .. })
        ));

        let t1_equals_t2 = Thresholds {
            t1: 28.0,
            ..Thresholds::default()
        };
        assert!(t1_equals_t2.validate().is_err());
    }

    #[test]
    fn test_negative_hysteresis_rejected() {
        let thresholds = Thresholds {
            hysteresis2: -0.1,
            ..Thresholds::default()
        };
        assert!(matches!(
            thresholds.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_non_finite_threshold_rejected() {
        let thresholds = Thresholds {
            t2: f64::NAN,
            ..Thresholds::default()
        };
        assert!(thresholds.validate().is_err());
    }

    #[test]
    fn test_entry_points_include_hysteresis() {
        let thresholds = Thresholds::default();
        assert!((thresholds.t1_entry() - 25.3).abs() < 1e-9);
        assert!((thresholds.t2_entry() - 28.3).abs() < 1e-9);
    }

    #[test]
    fn test_inverted_window_only_checked_when_enabled() {
        let mut window = SolarFilterConfig {
            azimuth_min: 270.0,
            azimuth_max: 90.0,
            ..SolarFilterConfig::default()
        };
        assert!(window.validate().is_ok());

        window.enabled = true;
        assert!(window.validate().is_err());
    }

    #[test]
    fn test_controller_defaults_from_yaml() {
        let config: ControllerConfig = serde_yaml::from_str(
            r#"
id: living_room
thresholds:
  t1: 25
  t2: 28
  t3: 22
"#,
        )
        .unwrap();

        assert_eq!(config.cooldown_dwell(), Duration::minutes(10));
        assert_eq!(config.presunset_offset(), Duration::minutes(5));
        assert_eq!(config.actuation_timeout().as_secs(), 30);
        assert!(config.enabled);
        assert!(!config.solar_filter.enabled);
        assert_eq!(config.thresholds.hysteresis1, 0.0);
        assert_eq!(config.display_name(), "living_room");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_dwell_rejected() {
        let mut config = ControllerConfig::new("office", Thresholds::default());
        config.cooldown_dwell_minutes = 0;
        assert!(config.validate().is_err());
    }
}
