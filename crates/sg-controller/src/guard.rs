//! Guard and snapshot bookkeeping
//!
//! The guard records that a protective action was taken and still has to be
//! resolved. The snapshot is the pre-protection cover configuration that the
//! resolution consumes. Both move together: the guard is armed if and only if
//! a snapshot is held.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sg_core::{SnapshotHandle, Zone};
use thiserror::Error;
use tracing::{debug, error};

/// Guard and snapshot consistency faults
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardError {
    #[error("snapshot already captured for episode {episode}")]
    SnapshotExists { episode: u64 },

    #[error("no snapshot to restore")]
    NothingToRestore,

    #[error("cannot arm guard without a snapshot")]
    ArmWithoutSnapshot,

    #[error("guard is {guard:?} but snapshot present is {snapshot_present}")]
    Inconsistent { guard: Guard, snapshot_present: bool },

    #[error("zone {zone} does not match guard {guard:?}")]
    ZoneMismatch { zone: Zone, guard: Guard },
}

/// Whether a protective action is awaiting resolution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Guard {
    Armed,
    #[default]
    Disarmed,
}

/// A captured pre-protection cover configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Episode this snapshot belongs to (1-based, increments per capture)
    pub episode: u64,
    /// Handle from the actuation layer; `None` when the capture call failed
    pub handle: Option<SnapshotHandle>,
    pub captured_at: DateTime<Utc>,
}

/// Owns the guard flag and the snapshot for one controller
#[derive(Debug, Clone, Default)]
pub struct GuardSnapshotManager {
    guard: Guard,
    snapshot: Option<Snapshot>,
    episodes: u64,
}

impl GuardSnapshotManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn guard(&self) -> Guard {
        self.guard
    }

    pub fn is_armed(&self) -> bool {
        self.guard == Guard::Armed
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    /// Number of episodes started so far
    pub fn episodes(&self) -> u64 {
        self.episodes
    }

    /// Record the snapshot that opens a new episode
    ///
    /// Fails if the current episode already holds one; that means the state
    /// machine tried to start an episode twice.
    pub fn capture(
        &mut self,
        handle: Option<SnapshotHandle>,
        now: DateTime<Utc>,
    ) -> Result<&Snapshot, GuardError> {
        if let Some(existing) = &self.snapshot {
            error!(episode = existing.episode, "Snapshot captured twice in one episode");
            return Err(GuardError::SnapshotExists {
                episode: existing.episode,
            });
        }

        self.episodes += 1;
        debug!(episode = self.episodes, has_handle = handle.is_some(), "Snapshot recorded");
        Ok(self.snapshot.insert(Snapshot {
            episode: self.episodes,
            handle,
            captured_at: now,
        }))
    }

    /// Arm the guard; idempotent
    pub fn arm(&mut self) -> Result<(), GuardError> {
        if self.snapshot.is_none() {
            return Err(GuardError::ArmWithoutSnapshot);
        }
        if self.guard != Guard::Armed {
            debug!("Guard armed");
            self.guard = Guard::Armed;
        }
        Ok(())
    }

    /// Take the snapshot and disarm the guard
    ///
    /// This is the only way to disarm, so each consumption path (cooldown or
    /// restoration) disarms exactly once.
    pub fn consume(&mut self) -> Result<Snapshot, GuardError> {
        let snapshot = self.snapshot.take().ok_or(GuardError::NothingToRestore)?;
        self.guard = Guard::Disarmed;
        debug!(episode = snapshot.episode, "Guard disarmed, snapshot consumed");
        Ok(snapshot)
    }

    /// Verify the guard/snapshot invariant
    pub fn check(&self) -> Result<(), GuardError> {
        let snapshot_present = self.snapshot.is_some();
        if self.is_armed() == snapshot_present {
            Ok(())
        } else {
            Err(GuardError::Inconsistent {
                guard: self.guard,
                snapshot_present,
            })
        }
    }
}
