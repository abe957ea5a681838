//! Threshold evaluation with asymmetric hysteresis

use sg_config::Thresholds;
use sg_core::Zone;
use tracing::trace;

use crate::error::ControllerResult;

/// Compute the tier the reading asks for
///
/// T2 is checked before T1 so the higher tier wins when both entry
/// conditions hold. A reading below both entry points, or no reading at all,
/// yields the current zone: this function never downgrades. Leaving a tier is
/// the cooldown rule's job.
pub fn desired_tier(
    reading: Option<f64>,
    current: Zone,
    thresholds: &Thresholds,
) -> ControllerResult<Zone> {
    thresholds.validate()?;

    let Some(value) = reading else {
        trace!(%current, "Reading unavailable, holding zone");
        return Ok(current);
    };

    let desired = if value >= thresholds.t2_entry() {
        Zone::T2
    } else if value >= thresholds.t1_entry() {
        Zone::T1
    } else {
        Zone::None
    };

    trace!(value, %desired, %current, "Evaluated thresholds");
    Ok(desired.max(current))
}
