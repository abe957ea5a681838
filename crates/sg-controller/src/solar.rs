//! Solar-position gating

use sg_config::SolarFilterConfig;
use sg_core::SunPosition;
use tracing::trace;

/// Whether the sun position allows a tier advance
///
/// Only consulted for advances. Cooldown and restoration never look here.
pub fn permits(filter: &SolarFilterConfig, position: Option<SunPosition>) -> bool {
    if !filter.enabled {
        return true;
    }

    // No position while filtering is requested: do not act
    let Some(sun) = position else {
        trace!("Sun position unavailable, advance denied");
        return false;
    };

    let azimuth_ok = (filter.azimuth_min..=filter.azimuth_max).contains(&sun.azimuth);
    let elevation_ok = (filter.elevation_min..=filter.elevation_max).contains(&sun.elevation);

    trace!(
        azimuth = sun.azimuth,
        elevation = sun.elevation,
        azimuth_ok,
        elevation_ok,
        "Evaluated solar window"
    );
    azimuth_ok && elevation_ok
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window() -> SolarFilterConfig {
        SolarFilterConfig {
            enabled: true,
            azimuth_min: 90.0,
            azimuth_max: 270.0,
            elevation_min: 10.0,
            elevation_max: 60.0,
        }
    }

    #[test]
    fn test_disabled_permits_everything() {
        let filter = SolarFilterConfig::default();
        assert!(permits(&filter, None));
        assert!(permits(&filter, Some(SunPosition::new(0.0, -20.0))));
    }

    #[test]
    fn test_inside_window() {
        assert!(permits(&window(), Some(SunPosition::new(180.0, 35.0))));
    }

    #[test]
    fn test_bounds_are_inclusive() {
        assert!(permits(&window(), Some(SunPosition::new(90.0, 10.0))));
        assert!(permits(&window(), Some(SunPosition::new(270.0, 60.0))));
    }

    #[test]
    fn test_outside_either_axis_denies() {
        assert!(!permits(&window(), Some(SunPosition::new(80.0, 35.0))));
        assert!(!permits(&window(), Some(SunPosition::new(180.0, 61.0))));
    }

    #[test]
    fn test_missing_position_denies_when_enabled() {
        assert!(!permits(&window(), None));
    }
}
