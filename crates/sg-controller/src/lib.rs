//! Temperature-tier cover protection
//!
//! The decision core that turns temperature readings, sun position and
//! clock signals into protection-zone transitions and guarded cover actions.
//!
//! # Architecture
//!
//! ```text
//! signals → threshold → solar filter → zone state machine → guard/snapshot → actuator
//! ```
//!
//! - [`threshold::desired_tier`] - tier a reading asks for (hysteresis, never downgrades)
//! - [`solar::permits`] - solar window gate for advances
//! - [`ZoneStateMachine`] - zone, cooldown dwell and transition priority
//! - [`GuardSnapshotManager`] - guard flag and pre-protection snapshot
//! - [`ZoneController`] - executes decisions against a [`CoverActuator`]
//!
//! The state machine never leaves a protection tier on a falling reading.
//! Only a sustained sub-t3 cooldown or the pre-sunset restoration do.

pub mod actuator;
pub mod controller;
pub mod dwell;
pub mod error;
pub mod guard;
pub mod solar;
pub mod threshold;
pub mod zone;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use actuator::{ActuationError, ActuationResult, Clock, CoverActuator, SystemClock};
pub use controller::{ControllerStatus, Outcome, ZoneController};
pub use dwell::CooldownTracker;
pub use error::{ControllerError, ControllerResult};
pub use guard::{Guard, GuardError, GuardSnapshotManager, Snapshot};
pub use zone::{Decision, EvaluationInput, EvaluationTrigger, Signals, ZoneStateMachine};
