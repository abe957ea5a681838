//! Core types for SunGuard
//!
//! This crate provides the value types shared by every SunGuard crate:
//! protection zones and tiers, signal values, the opaque snapshot handle,
//! and the Event/Context types carried on the reporting channel.

mod context;
mod event;
mod signal;
mod zone;

pub use context::{Cause, Context};
pub use event::{Event, EventData, EventType};
pub use signal::{parse_reading, SnapshotHandle, SunPosition};
pub use zone::{ParseZoneError, Tier, Zone};

/// Standard event types fired by controllers
pub mod events {
    use super::*;
    use serde::{Deserialize, Serialize};

    /// Event type for zone transitions
    pub const ZONE_CHANGED: &str = "zone_changed";

    /// Event type for actuation calls
    pub const COVER_ACTION: &str = "cover_action";

    /// Event type for errors surfaced to the operator
    pub const CONTROLLER_ERROR: &str = "controller_error";

    /// Why the zone changed
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum TransitionReason {
        /// Temperature crossed a tier's entry threshold
        Advance,
        /// Temperature stayed below t3 for the dwell duration
        Cooldown,
        /// Daily pre-sunset restoration
        Restoration,
        /// Operator force-set
        Forced,
    }

    /// A call made against the actuation layer
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(tag = "action", rename_all = "snake_case")]
    pub enum CoverAction {
        CaptureSnapshot,
        ApplyScene { tier: Tier },
        OpenCovers,
        RestoreSnapshot,
    }

    impl std::fmt::Display for CoverAction {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                CoverAction::CaptureSnapshot => f.write_str("capture snapshot"),
                CoverAction::ApplyScene { tier } => write!(f, "apply {} scene", tier),
                CoverAction::OpenCovers => f.write_str("open covers"),
                CoverAction::RestoreSnapshot => f.write_str("restore snapshot"),
            }
        }
    }

    /// Category of a reported error
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum ErrorKind {
        Configuration,
        Actuation,
        InvariantViolation,
    }

    /// Data for ZONE_CHANGED events
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ZoneChangedData {
        pub from: Zone,
        pub to: Zone,
        pub reason: TransitionReason,
    }

    impl EventData for ZoneChangedData {
        const EVENT_TYPE: &'static str = ZONE_CHANGED;
    }

    /// Data for COVER_ACTION events
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct CoverActionData {
        #[serde(flatten)]
        pub action: CoverAction,
        pub success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub error: Option<String>,
    }

    impl EventData for CoverActionData {
        const EVENT_TYPE: &'static str = COVER_ACTION;
    }

    /// Data for CONTROLLER_ERROR events
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ControllerErrorData {
        pub kind: ErrorKind,
        pub message: String,
    }

    impl EventData for ControllerErrorData {
        const EVENT_TYPE: &'static str = CONTROLLER_ERROR;
    }
}
