//! Zone state machine
//!
//! Decides what a single evaluation should do, in priority order:
//!
//! 1. cooldown (reading below t3 for the dwell, guard armed)
//! 2. pre-sunset restoration (once per sunset, only with a snapshot)
//! 3. advance to a higher tier (threshold + solar filter)
//!
//! Deciding and committing are separate steps so the async controller can
//! run actuation calls between them. Both happen inside one serialized
//! evaluation.

use chrono::{DateTime, Utc};
use sg_config::ControllerConfig;
use sg_core::events::TransitionReason;
use sg_core::{Cause, SnapshotHandle, SunPosition, Tier, Zone};
use std::cmp::Ordering;
use tracing::debug;

use crate::dwell::CooldownTracker;
use crate::error::ControllerResult;
use crate::guard::{GuardError, GuardSnapshotManager, Snapshot};
use crate::{solar, threshold};

/// Latest known values of the external feeds
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Signals {
    pub temperature: Option<f64>,
    pub sun: Option<SunPosition>,
}

/// What caused an evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationTrigger {
    /// A temperature or sun position update
    Signal,
    /// Periodic cooldown check
    Tick,
    /// Daily pre-sunset restoration for the given sunset
    PreSunset { sunset: DateTime<Utc> },
}

impl EvaluationTrigger {
    pub fn cause(&self) -> Cause {
        match self {
            EvaluationTrigger::Signal => Cause::Signal,
            EvaluationTrigger::Tick => Cause::Check,
            EvaluationTrigger::PreSunset { .. } => Cause::PreSunset,
        }
    }
}

/// Inputs of one evaluation
#[derive(Debug, Clone, Copy)]
pub struct EvaluationInput {
    pub signals: Signals,
    pub now: DateTime<Utc>,
    pub trigger: EvaluationTrigger,
}

impl EvaluationInput {
    pub fn new(signals: Signals, now: DateTime<Utc>, trigger: EvaluationTrigger) -> Self {
        Self {
            signals,
            now,
            trigger,
        }
    }
}

/// Outcome of the decide step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Nothing to do
    Hold,
    /// Move up to a protection tier
    Advance {
        from: Zone,
        to: Tier,
        /// First advance out of `None`: capture the snapshot first
        begins_episode: bool,
        reason: TransitionReason,
    },
    /// Operator moved T2 down to T1 inside the same episode
    Downgrade { from: Zone, to: Tier },
    /// Sustained cool reading: open covers, resolve the episode
    Cooldown { from: Zone },
    /// Restore the snapshot, resolve the episode
    Restore {
        from: Zone,
        reason: TransitionReason,
    },
}

impl Decision {
    /// Zone after the decision is committed
    pub fn target(&self, current: Zone) -> Zone {
        match self {
            Decision::Hold => current,
            Decision::Advance { to, .. } | Decision::Downgrade { to, .. } => Zone::from(*to),
            Decision::Cooldown { .. } | Decision::Restore { .. } => Zone::None,
        }
    }

    pub fn is_transition(&self) -> bool {
        !matches!(self, Decision::Hold)
    }
}

/// Process-wide state of one controller: zone, guard, snapshot, dwell
#[derive(Debug, Clone, Default)]
pub struct ZoneStateMachine {
    zone: Zone,
    guard: GuardSnapshotManager,
    cooldown: CooldownTracker,
    last_presunset: Option<DateTime<Utc>>,
}

impl ZoneStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn zone(&self) -> Zone {
        self.zone
    }

    pub fn guard(&self) -> &GuardSnapshotManager {
        &self.guard
    }

    pub fn cooldown(&self) -> &CooldownTracker {
        &self.cooldown
    }

    /// Sunset whose pre-sunset tick was last handled
    pub fn last_presunset(&self) -> Option<DateTime<Utc>> {
        self.last_presunset
    }

    /// Guard/snapshot invariant plus zone agreement
    ///
    /// A protection zone is only ever held with an armed guard, and the
    /// guard is only armed while a protection zone is held.
    pub fn check_invariants(&self) -> Result<(), GuardError> {
        self.guard.check()?;
        if self.zone.is_protecting() != self.guard.is_armed() {
            return Err(GuardError::ZoneMismatch {
                zone: self.zone,
                guard: self.guard.guard(),
            });
        }
        Ok(())
    }

    /// Decide what this evaluation should do
    ///
    /// Fails without touching the zone when the configuration is invalid.
    pub fn decide(
        &mut self,
        input: &EvaluationInput,
        config: &ControllerConfig,
    ) -> ControllerResult<Decision> {
        config.validate()?;
        self.check_invariants()?;

        let now = input.now;
        self.cooldown
            .observe(input.signals.temperature, config.thresholds.t3, now);

        if self.guard.is_armed() && self.cooldown.is_satisfied(now, config.cooldown_dwell()) {
            debug!(zone = %self.zone, "Cooldown dwell satisfied");
            return Ok(Decision::Cooldown { from: self.zone });
        }

        if let EvaluationTrigger::PreSunset { sunset } = input.trigger {
            return Ok(self.decide_presunset(sunset));
        }

        let desired = threshold::desired_tier(
            input.signals.temperature,
            self.zone,
            &config.thresholds,
        )?;
        if desired <= self.zone {
            return Ok(Decision::Hold);
        }
        let Some(to) = desired.tier() else {
            return Ok(Decision::Hold);
        };

        if !solar::permits(&config.solar_filter, input.signals.sun) {
            debug!(%desired, "Advance suppressed by solar filter");
            return Ok(Decision::Hold);
        }

        Ok(Decision::Advance {
            from: self.zone,
            to,
            begins_episode: self.guard.snapshot().is_none(),
            reason: TransitionReason::Advance,
        })
    }

    fn decide_presunset(&mut self, sunset: DateTime<Utc>) -> Decision {
        if self.last_presunset == Some(sunset) {
            debug!(%sunset, "Pre-sunset restoration already handled");
            return Decision::Hold;
        }
        self.last_presunset = Some(sunset);

        if self.guard.snapshot().is_none() {
            debug!("Pre-sunset tick with nothing to restore");
            return Decision::Hold;
        }

        Decision::Restore {
            from: self.zone,
            reason: TransitionReason::Restoration,
        }
    }

    /// Decide how to reach an operator-requested zone
    ///
    /// Bypasses thresholds and the solar filter but not the guard.
    pub fn decide_forced(
        &self,
        target: Zone,
        config: &ControllerConfig,
    ) -> ControllerResult<Decision> {
        config.validate()?;
        self.check_invariants()?;

        let from = self.zone;
        let decision = match (from.cmp(&target), target.tier()) {
            (Ordering::Less, Some(to)) => Decision::Advance {
                from,
                to,
                begins_episode: self.guard.snapshot().is_none(),
                reason: TransitionReason::Forced,
            },
            (Ordering::Greater, Some(to)) => Decision::Downgrade { from, to },
            (Ordering::Greater, None) => Decision::Restore {
                from,
                reason: TransitionReason::Forced,
            },
            _ => Decision::Hold,
        };
        Ok(decision)
    }

    /// Record the snapshot that opens an episode
    ///
    /// The cooldown dwell restarts here: time spent below t3 before the
    /// episode opened never counts towards resolving it.
    pub fn begin_episode(
        &mut self,
        handle: Option<SnapshotHandle>,
        now: DateTime<Utc>,
    ) -> Result<&Snapshot, GuardError> {
        self.cooldown.reset();
        self.guard.capture(handle, now)
    }

    /// Arm the guard and move to `tier`
    pub fn enter(&mut self, tier: Tier) -> Result<(), GuardError> {
        self.guard.arm()?;
        self.zone = Zone::from(tier);
        Ok(())
    }

    /// Consume the snapshot, disarm and return to `None`
    pub fn resolve(&mut self) -> Result<Snapshot, GuardError> {
        let snapshot = self.guard.consume()?;
        self.zone = Zone::None;
        Ok(snapshot)
    }
}
