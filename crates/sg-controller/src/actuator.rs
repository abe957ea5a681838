//! Capabilities the controller drives: covers and time

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sg_core::{SnapshotHandle, Tier};
use std::time::Duration;
use thiserror::Error;

/// Result type for actuation calls
pub type ActuationResult<T> = Result<T, ActuationError>;

/// Failures reported by the actuation layer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActuationError {
    #[error("call failed: {0}")]
    Failed(String),

    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    #[error("snapshot for episode {episode} was never captured")]
    MissingHandle { episode: u64 },
}

/// The actuation layer for one controller's covers
///
/// Retries and compensation belong to implementations; the controller calls
/// each method at most once per transition.
#[async_trait]
pub trait CoverActuator: Send + Sync {
    /// Apply the scene associated with a protection tier
    async fn apply_scene(&self, tier: Tier) -> ActuationResult<()>;

    /// Open all covers
    async fn open_covers(&self) -> ActuationResult<()>;

    /// Capture the covers' current configuration
    async fn capture_snapshot(&self) -> ActuationResult<SnapshotHandle>;

    /// Return the covers to a previously captured configuration
    async fn restore_snapshot(&self, handle: &SnapshotHandle) -> ActuationResult<()>;
}

/// Wall-clock source
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
