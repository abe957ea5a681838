//! Configuration for SunGuard
//!
//! A configuration file lists one entry per controller:
//!
//! ```yaml
//! controllers:
//!   - id: living_room
//!     thresholds:
//!       t1: 25
//!       t2: 28
//!       t3: 22
//!       hysteresis1: 0.3
//!       hysteresis2: 0.3
//!     solar_filter:
//!       enabled: true
//!       azimuth_min: 90
//!       azimuth_max: 270
//!       elevation_min: 10
//!     cooldown_dwell_minutes: 10
//!     presunset_offset_minutes: 5
//! ```
//!
//! `!include file.yaml` and `!env_var NAME [default]` are resolved while loading.

mod controller;
mod error;
mod loader;

pub use controller::{ControllerConfig, SolarFilterConfig, Thresholds};
pub use error::{ConfigError, ConfigResult};
pub use loader::{load_yaml, load_yaml_string, YamlLoader};

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

/// Top-level configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SunGuardConfig {
    #[serde(default)]
    pub controllers: Vec<ControllerConfig>,
}

impl SunGuardConfig {
    /// Load, resolve tags, parse and validate a configuration file
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let yaml = load_yaml(path.as_ref())?;
        let config = Self::from_yaml(yaml)?;
        info!(
            "Loaded {} controller(s) from {:?}",
            config.controllers.len(),
            path.as_ref()
        );
        Ok(config)
    }

    /// Parse and validate an already-loaded YAML value
    pub fn from_yaml(yaml: serde_yaml::Value) -> ConfigResult<Self> {
        let config: SunGuardConfig =
            serde_yaml::from_value(yaml).map_err(|e| ConfigError::InvalidValue {
                key: "controllers".to_string(),
                reason: format!("cannot be parsed: {}", e),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every controller and reject duplicate ids
    pub fn validate(&self) -> ConfigResult<()> {
        let mut seen = HashSet::new();
        for controller in &self.controllers {
            controller.validate().map_err(|e| ConfigError::ValidationFailed {
                message: format!("controller '{}': {}", controller.id, e),
            })?;
            if !seen.insert(controller.id.as_str()) {
                return Err(ConfigError::ValidationFailed {
                    message: format!("duplicate controller id '{}'", controller.id),
                });
            }
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&ControllerConfig> {
        self.controllers.iter().find(|c| c.id == id)
    }
}
