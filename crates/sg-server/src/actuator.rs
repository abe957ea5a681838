//! Actuator that only logs what it would do
//!
//! Used by the `sunguard` binary when no cover integration is wired up.

use async_trait::async_trait;
use sg_controller::{ActuationResult, CoverActuator};
use sg_core::{SnapshotHandle, Tier};
use tracing::info;
use ulid::Ulid;

pub struct LoggingActuator {
    controller_id: String,
}

impl LoggingActuator {
    pub fn new(controller_id: impl Into<String>) -> Self {
        Self {
            controller_id: controller_id.into(),
        }
    }
}

#[async_trait]
impl CoverActuator for LoggingActuator {
    async fn apply_scene(&self, tier: Tier) -> ActuationResult<()> {
        info!(controller = %self.controller_id, %tier, "Applying protection scene");
        Ok(())
    }

    async fn open_covers(&self) -> ActuationResult<()> {
        info!(controller = %self.controller_id, "Opening covers");
        Ok(())
    }

    async fn capture_snapshot(&self) -> ActuationResult<SnapshotHandle> {
        let handle = SnapshotHandle::new(format!(
            "scene.sunguard_{}_{}",
            self.controller_id,
            Ulid::new().to_string().to_lowercase()
        ));
        info!(controller = %self.controller_id, %handle, "Captured cover snapshot");
        Ok(handle)
    }

    async fn restore_snapshot(&self, handle: &SnapshotHandle) -> ActuationResult<()> {
        info!(controller = %self.controller_id, %handle, "Restoring cover snapshot");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_snapshot_handles_are_unique() {
        let actuator = LoggingActuator::new("living_room");
        let a = actuator.capture_snapshot().await.unwrap();
        let b = actuator.capture_snapshot().await.unwrap();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("scene.sunguard_living_room_"));
        actuator.restore_snapshot(&a).await.unwrap();
    }
}
