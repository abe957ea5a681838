//! Test doubles for the controller's capabilities
//!
//! Enabled in this crate's tests and, for downstream crates, through the
//! `test-util` feature.

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use sg_core::events::CoverAction;
use sg_core::{SnapshotHandle, Tier};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use crate::actuator::{ActuationError, ActuationResult, Clock, CoverActuator};

/// A controllable time source
#[derive(Clone)]
pub struct MockClock {
    current: Arc<RwLock<DateTime<Utc>>>,
}

impl MockClock {
    /// Start at a fixed summer noon so tests are deterministic
    pub fn new() -> Self {
        Self::at(Utc.with_ymd_and_hms(2025, 7, 1, 12, 0, 0).unwrap())
    }

    pub fn at(time: DateTime<Utc>) -> Self {
        Self {
            current: Arc::new(RwLock::new(time)),
        }
    }

    pub fn set(&self, time: DateTime<Utc>) {
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = time;
    }

    pub fn advance(&self, duration: Duration) {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        *current += duration;
    }

    pub fn advance_minutes(&self, minutes: i64) {
        self.advance(Duration::minutes(minutes));
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.read().unwrap_or_else(|e| e.into_inner())
    }
}

/// Actuator that records every call and can be told to fail or stall
#[derive(Default)]
pub struct RecordingActuator {
    calls: Mutex<Vec<CoverAction>>,
    failing: Mutex<HashSet<CoverAction>>,
    delay: Mutex<Option<std::time::Duration>>,
    next_handle: AtomicU64,
}

impl RecordingActuator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<CoverAction> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn count(&self, action: CoverAction) -> usize {
        self.calls().iter().filter(|a| **a == action).count()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// Make every later `action` call fail
    pub fn fail_on(&self, action: CoverAction) {
        self.failing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(action);
    }

    /// Delay every call; used to exercise timeouts
    pub fn set_delay(&self, delay: Option<std::time::Duration>) {
        *self.delay.lock().unwrap_or_else(|e| e.into_inner()) = delay;
    }

    async fn record(&self, action: CoverAction) -> ActuationResult<()> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(action);

        let delay = *self.delay.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failing = self
            .failing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&action);
        if failing {
            Err(ActuationError::Failed(format!("{} rejected", action)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CoverActuator for RecordingActuator {
    async fn apply_scene(&self, tier: Tier) -> ActuationResult<()> {
        self.record(CoverAction::ApplyScene { tier }).await
    }

    async fn open_covers(&self) -> ActuationResult<()> {
        self.record(CoverAction::OpenCovers).await
    }

    async fn capture_snapshot(&self) -> ActuationResult<SnapshotHandle> {
        self.record(CoverAction::CaptureSnapshot).await?;
        let n = self.next_handle.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(SnapshotHandle::new(format!("scene.snapshot_{}", n)))
    }

    async fn restore_snapshot(&self, _handle: &SnapshotHandle) -> ActuationResult<()> {
        self.record(CoverAction::RestoreSnapshot).await
    }
}
