//! Async controller: runs decisions against the actuation layer
//!
//! The zone state machine decides; this type executes. Transitions are
//! committed before the actuation calls that carry them out, so a failed
//! or timed-out call is reported but never rolls the zone back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sg_config::ControllerConfig;
use sg_core::events::{
    ControllerErrorData, CoverAction, CoverActionData, ErrorKind, TransitionReason,
    ZoneChangedData,
};
use sg_core::{Context, Zone};
use sg_event_bus::EventBus;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use crate::actuator::{ActuationError, ActuationResult, CoverActuator};
use crate::error::{ControllerError, ControllerResult};
use crate::guard::{Guard, Snapshot};
use crate::zone::{Decision, EvaluationInput, ZoneStateMachine};

/// Result of one evaluation
#[derive(Debug)]
pub struct Outcome {
    pub decision: Decision,
    /// Zone after the evaluation
    pub zone: Zone,
    /// Actuation calls that failed; the transition itself stands
    pub failures: Vec<ControllerError>,
}

/// Observable state of a controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerStatus {
    pub controller_id: String,
    pub zone: Zone,
    pub guard: Guard,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<Snapshot>,
    pub episodes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub below_t3_since: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_presunset: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// One room's cover protection controller
pub struct ZoneController {
    id: String,
    machine: ZoneStateMachine,
    actuator: Arc<dyn CoverActuator>,
    bus: Arc<EventBus>,
    last_temperature: Option<f64>,
    last_error: Option<String>,
}

impl ZoneController {
    pub fn new(
        id: impl Into<String>,
        actuator: Arc<dyn CoverActuator>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            id: id.into(),
            machine: ZoneStateMachine::new(),
            actuator,
            bus,
            last_temperature: None,
            last_error: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn zone(&self) -> Zone {
        self.machine.zone()
    }

    pub fn machine(&self) -> &ZoneStateMachine {
        &self.machine
    }

    pub fn status(&self) -> ControllerStatus {
        let guard = self.machine.guard();
        ControllerStatus {
            controller_id: self.id.clone(),
            zone: self.machine.zone(),
            guard: guard.guard(),
            snapshot: guard.snapshot().cloned(),
            episodes: guard.episodes(),
            last_temperature: self.last_temperature,
            below_t3_since: self.machine.cooldown().below_since(),
            last_presunset: self.machine.last_presunset(),
            last_error: self.last_error.clone(),
        }
    }

    /// Run one evaluation against the latest signals and configuration
    #[instrument(skip_all, fields(controller = %self.id, trigger = ?input.trigger))]
    pub async fn evaluate(
        &mut self,
        input: EvaluationInput,
        config: &ControllerConfig,
        context: Context,
    ) -> ControllerResult<Outcome> {
        self.last_temperature = input.signals.temperature;

        let decision = match self.machine.decide(&input, config) {
            Ok(decision) => decision,
            Err(e) => return Err(self.report_error(e, &context)),
        };
        debug!(?decision, zone = %self.machine.zone(), "Decided");

        self.execute(decision, input.now, config, &context).await
    }

    /// Move to an operator-chosen zone through the same guard checks
    #[instrument(skip_all, fields(controller = %self.id, %target))]
    pub async fn force_zone(
        &mut self,
        target: Zone,
        now: DateTime<Utc>,
        config: &ControllerConfig,
        context: Context,
    ) -> ControllerResult<Outcome> {
        let decision = match self.machine.decide_forced(target, config) {
            Ok(decision) => decision,
            Err(e) => return Err(self.report_error(e, &context)),
        };
        info!(?decision, "Operator forced zone");

        self.execute(decision, now, config, &context).await
    }

    async fn execute(
        &mut self,
        decision: Decision,
        now: DateTime<Utc>,
        config: &ControllerConfig,
        context: &Context,
    ) -> ControllerResult<Outcome> {
        let timeout = config.actuation_timeout();
        let actuator = Arc::clone(&self.actuator);
        let mut failures = Vec::new();

        match decision {
            Decision::Hold => {}

            Decision::Advance {
                from,
                to,
                begins_episode,
                reason,
            } => {
                if begins_episode {
                    let handle = self
                        .actuate(
                            CoverAction::CaptureSnapshot,
                            timeout,
                            actuator.capture_snapshot(),
                            context,
                            &mut failures,
                        )
                        .await;
                    if let Err(e) = self.machine.begin_episode(handle, now).map(|_| ()) {
                        return Err(self.report_error(e.into(), context));
                    }
                }
                if let Err(e) = self.machine.enter(to) {
                    return Err(self.report_error(e.into(), context));
                }
                self.zone_changed(from, to.into(), reason, context);

                self.actuate(
                    CoverAction::ApplyScene { tier: to },
                    timeout,
                    actuator.apply_scene(to),
                    context,
                    &mut failures,
                )
                .await;
            }

            Decision::Downgrade { from, to } => {
                if let Err(e) = self.machine.enter(to) {
                    return Err(self.report_error(e.into(), context));
                }
                self.zone_changed(from, to.into(), TransitionReason::Forced, context);

                self.actuate(
                    CoverAction::ApplyScene { tier: to },
                    timeout,
                    actuator.apply_scene(to),
                    context,
                    &mut failures,
                )
                .await;
            }

            Decision::Cooldown { from } => {
                let snapshot = match self.machine.resolve() {
                    Ok(snapshot) => snapshot,
                    Err(e) => return Err(self.report_error(e.into(), context)),
                };
                debug!(episode = snapshot.episode, "Snapshot discarded on cooldown");
                self.zone_changed(from, Zone::None, TransitionReason::Cooldown, context);

                self.actuate(
                    CoverAction::OpenCovers,
                    timeout,
                    actuator.open_covers(),
                    context,
                    &mut failures,
                )
                .await;
            }

            Decision::Restore { from, reason } => {
                let snapshot = match self.machine.resolve() {
                    Ok(snapshot) => snapshot,
                    Err(e) => return Err(self.report_error(e.into(), context)),
                };
                self.zone_changed(from, Zone::None, reason, context);

                let episode = snapshot.episode;
                let handle = snapshot.handle;
                let restorer = Arc::clone(&actuator);
                let restore = async move {
                    match handle {
                        Some(handle) => restorer.restore_snapshot(&handle).await,
                        None => Err(ActuationError::MissingHandle { episode }),
                    }
                };
                self.actuate(
                    CoverAction::RestoreSnapshot,
                    timeout,
                    restore,
                    context,
                    &mut failures,
                )
                .await;
            }
        }

        Ok(Outcome {
            decision,
            zone: self.machine.zone(),
            failures,
        })
    }

    /// Run one actuation call with a timeout and report its result
    async fn actuate<T, F>(
        &mut self,
        action: CoverAction,
        timeout: Duration,
        call: F,
        context: &Context,
        failures: &mut Vec<ControllerError>,
    ) -> Option<T>
    where
        F: Future<Output = ActuationResult<T>>,
    {
        let result = match tokio::time::timeout(timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ActuationError::Timeout(timeout)),
        };

        self.bus.fire_typed(
            &self.id,
            CoverActionData {
                action,
                success: result.is_ok(),
                error: result.as_ref().err().map(ToString::to_string),
            },
            context.clone(),
        );

        match result {
            Ok(value) => {
                debug!(?action, "Actuation succeeded");
                Some(value)
            }
            Err(source) => {
                let err = self.report_error(ControllerError::Actuation { action, source }, context);
                failures.push(err);
                None
            }
        }
    }

    fn zone_changed(&self, from: Zone, to: Zone, reason: TransitionReason, context: &Context) {
        info!(controller = %self.id, %from, %to, ?reason, "Zone changed");
        self.bus.fire_typed(
            &self.id,
            ZoneChangedData {
                from,
                to,
                reason,
            },
            context.clone(),
        );
    }

    /// Log, remember and publish an error; hands it back for propagation
    fn report_error(&mut self, err: ControllerError, context: &Context) -> ControllerError {
        let kind = err.kind();
        match kind {
            ErrorKind::InvariantViolation => error!(controller = %self.id, "{}", err),
            ErrorKind::Configuration | ErrorKind::Actuation => {
                warn!(controller = %self.id, "{}", err)
            }
        }

        let message = err.to_string();
        self.last_error = Some(message.clone());
        self.bus.fire_typed(
            &self.id,
            ControllerErrorData {
                kind,
                message,
            },
            context.clone(),
        );
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::Clock;
    use crate::testing::{MockClock, RecordingActuator};
    use crate::zone::{EvaluationTrigger, Signals};
    use sg_config::{SolarFilterConfig, Thresholds};
    use sg_core::events::COVER_ACTION;
    use sg_core::{SunPosition, Tier};

    struct Harness {
        controller: ZoneController,
        actuator: Arc<RecordingActuator>,
        bus: Arc<EventBus>,
        clock: MockClock,
        config: ControllerConfig,
    }

    impl Harness {
        fn new() -> Self {
            let actuator = Arc::new(RecordingActuator::new());
            let bus = Arc::new(EventBus::new());
            let controller = ZoneController::new("living_room", actuator.clone(), bus.clone());
            Self {
                controller,
                actuator,
                bus,
                clock: MockClock::new(),
                config: ControllerConfig::new("living_room", Thresholds::default()),
            }
        }

        async fn feed(&mut self, temperature: Option<f64>, sun: Option<SunPosition>) -> Outcome {
            self.run(Signals { temperature, sun }, EvaluationTrigger::Signal)
                .await
                .unwrap()
        }

        async fn reading(&mut self, value: f64) -> Outcome {
            self.feed(Some(value), None).await
        }

        async fn run(
            &mut self,
            signals: Signals,
            trigger: EvaluationTrigger,
        ) -> ControllerResult<Outcome> {
            let input = EvaluationInput::new(signals, self.clock.now(), trigger);
            let outcome = self
                .controller
                .evaluate(input, &self.config, Context::new())
                .await;
            self.assert_invariant();
            outcome
        }

        fn assert_invariant(&self) {
            let guard = self.controller.machine().guard();
            assert_eq!(guard.is_armed(), guard.snapshot().is_some());
        }
    }

    #[tokio::test]
    async fn test_scenario_a_full_episode() {
        let mut h = Harness::new();

        let mut zones = vec![h.reading(24.0).await.zone];
        zones.push(h.reading(25.4).await.zone);
        zones.push(h.reading(28.4).await.zone);
        zones.push(h.reading(21.9).await.zone);
        h.clock.advance_minutes(10);
        let last = h
            .run(
                Signals {
                    temperature: Some(21.9),
                    sun: None,
                },
                EvaluationTrigger::Tick,
            )
            .await
            .unwrap();
        zones.push(last.zone);

        assert_eq!(
            zones,
            vec![Zone::None, Zone::T1, Zone::T2, Zone::T2, Zone::None]
        );
        assert_eq!(last.decision, Decision::Cooldown { from: Zone::T2 });
        assert_eq!(
            h.actuator.calls(),
            vec![
                CoverAction::CaptureSnapshot,
                CoverAction::ApplyScene { tier: Tier::T1 },
                CoverAction::ApplyScene { tier: Tier::T2 },
                CoverAction::OpenCovers,
            ]
        );
        assert_eq!(h.controller.status().guard, Guard::Disarmed);
        assert!(h.controller.status().snapshot.is_none());
    }

    #[tokio::test]
    async fn test_scenario_b_solar_window() {
        let mut h = Harness::new();
        h.config.solar_filter = SolarFilterConfig {
            enabled: true,
            azimuth_min: 100.0,
            azimuth_max: 200.0,
            elevation_min: 15.0,
            elevation_max: 70.0,
        };

        let outside = h.feed(Some(25.5), Some(SunPosition::new(230.0, 30.0))).await;
        assert_eq!(outside.zone, Zone::None);
        assert!(h.actuator.calls().is_empty());

        let inside = h.feed(Some(25.5), Some(SunPosition::new(180.0, 30.0))).await;
        assert_eq!(inside.zone, Zone::T1);
        assert_eq!(h.actuator.count(CoverAction::CaptureSnapshot), 1);
    }

    #[tokio::test]
    async fn test_scenario_c_presunset_without_snapshot() {
        let mut h = Harness::new();
        let mut errors = h.bus.subscribe_typed::<ControllerErrorData>();
        let sunset = h.clock.now() + chrono::Duration::minutes(5);

        let outcome = h
            .run(Signals::default(), EvaluationTrigger::PreSunset { sunset })
            .await
            .unwrap();

        assert_eq!(outcome.decision, Decision::Hold);
        assert_eq!(outcome.zone, Zone::None);
        assert!(outcome.failures.is_empty());
        assert!(h.actuator.calls().is_empty());
        assert!(errors.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_scenario_d_oscillation_holds() {
        let mut h = Harness::new();
        h.reading(25.4).await;
        h.actuator.clear();

        for _ in 0..20 {
            h.clock.advance_minutes(3);
            assert_eq!(h.reading(22.1).await.zone, Zone::T1);
            h.clock.advance_minutes(3);
            assert_eq!(h.reading(24.9).await.zone, Zone::T1);
        }
        assert!(h.actuator.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_reading_changes_nothing() {
        let mut h = Harness::new();
        h.reading(28.5).await;
        h.actuator.clear();

        let outcome = h.feed(None, None).await;
        assert_eq!(outcome.decision, Decision::Hold);
        assert_eq!(outcome.zone, Zone::T2);
        assert!(h.actuator.calls().is_empty());
    }

    #[tokio::test]
    async fn test_scene_fires_once_per_entry() {
        let mut h = Harness::new();
        for _ in 0..5 {
            h.reading(26.0).await;
        }
        assert_eq!(
            h.actuator.count(CoverAction::ApplyScene { tier: Tier::T1 }),
            1
        );
    }

    #[tokio::test]
    async fn test_one_capture_per_episode() {
        let mut h = Harness::new();
        for _ in 0..3 {
            h.reading(25.4).await;
            h.reading(29.0).await;
            h.reading(20.0).await;
            h.clock.advance_minutes(11);
            let outcome = h.reading(20.0).await;
            assert_eq!(outcome.zone, Zone::None);
        }
        assert_eq!(h.actuator.count(CoverAction::CaptureSnapshot), 3);
        assert_eq!(h.controller.status().episodes, 3);
    }

    #[tokio::test]
    async fn test_cooldown_wins_over_presunset() {
        let mut h = Harness::new();
        h.reading(25.4).await;
        h.reading(21.0).await;
        h.clock.advance_minutes(10);

        let outcome = h
            .run(
                Signals {
                    temperature: Some(21.0),
                    sun: None,
                },
                EvaluationTrigger::PreSunset {
                    sunset: h.clock.now(),
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome.decision, Decision::Cooldown { from: Zone::T1 });
        assert_eq!(h.actuator.count(CoverAction::RestoreSnapshot), 0);
        assert_eq!(h.actuator.count(CoverAction::OpenCovers), 1);
    }

    #[tokio::test]
    async fn test_presunset_restores_snapshot() {
        let mut h = Harness::new();
        h.reading(29.0).await;
        let sunset = h.clock.now() + chrono::Duration::hours(6);
        h.clock.set(sunset - chrono::Duration::minutes(5));

        let outcome = h
            .run(
                Signals {
                    temperature: Some(29.0),
                    sun: None,
                },
                EvaluationTrigger::PreSunset { sunset },
            )
            .await
            .unwrap();

        assert_eq!(outcome.zone, Zone::None);
        assert_eq!(h.actuator.count(CoverAction::RestoreSnapshot), 1);
        assert_eq!(h.actuator.count(CoverAction::OpenCovers), 0);
        assert_eq!(h.controller.status().last_presunset, Some(sunset));
    }

    #[tokio::test]
    async fn test_actuation_failure_keeps_transition() {
        let mut h = Harness::new();
        h.actuator
            .fail_on(CoverAction::ApplyScene { tier: Tier::T1 });
        let mut errors = h.bus.subscribe_typed::<ControllerErrorData>();

        let outcome = h.reading(25.4).await;
        assert_eq!(outcome.zone, Zone::T1);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].kind(), ErrorKind::Actuation);

        let event = errors.recv().await.unwrap();
        assert_eq!(event.data.kind, ErrorKind::Actuation);
        assert!(h.controller.status().last_error.is_some());
    }

    #[tokio::test]
    async fn test_failed_capture_still_opens_episode() {
        let mut h = Harness::new();
        h.actuator.fail_on(CoverAction::CaptureSnapshot);

        let outcome = h.reading(25.4).await;
        assert_eq!(outcome.zone, Zone::T1);
        assert!(h.controller.status().snapshot.unwrap().handle.is_none());

        // Restoring a snapshot that was never captured is reported, not fatal
        let sunset = h.clock.now();
        let restore = h
            .run(
                Signals::default(),
                EvaluationTrigger::PreSunset { sunset },
            )
            .await
            .unwrap();
        assert_eq!(restore.zone, Zone::None);
        assert!(matches!(
            restore.failures[0],
            ControllerError::Actuation {
                action: CoverAction::RestoreSnapshot,
                source: ActuationError::MissingHandle { episode: 1 },
            }
        ));
        assert_eq!(h.actuator.count(CoverAction::RestoreSnapshot), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_actuation_timeout_reported() {
        let mut h = Harness::new();
        h.config.actuation_timeout_seconds = 1;
        h.actuator
            .set_delay(Some(std::time::Duration::from_secs(5)));

        let outcome = h.reading(25.4).await;
        assert_eq!(outcome.zone, Zone::T1);
        assert_eq!(outcome.failures.len(), 2);
        assert!(outcome.failures.iter().all(|f| matches!(
            f,
            ControllerError::Actuation {
                source: ActuationError::Timeout(_),
                ..
            }
        )));
    }

    #[tokio::test]
    async fn test_configuration_error_reported_and_held() {
        let mut h = Harness::new();
        h.reading(25.4).await;
        h.config.thresholds.t1 = 30.0;
        let mut errors = h.bus.subscribe_typed::<ControllerErrorData>();

        let err = h
            .run(
                Signals {
                    temperature: Some(35.0),
                    sun: None,
                },
                EvaluationTrigger::Signal,
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(h.controller.zone(), Zone::T1);
        assert_eq!(errors.recv().await.unwrap().data.kind, ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn test_force_zone_goes_through_guard() {
        let mut h = Harness::new();
        let now = h.clock.now();

        let up = h
            .controller
            .force_zone(Zone::T2, now, &h.config, Context::operator("operator"))
            .await
            .unwrap();
        assert_eq!(up.zone, Zone::T2);
        assert!(h.controller.status().snapshot.is_some());

        let down = h
            .controller
            .force_zone(Zone::T1, now, &h.config, Context::operator("operator"))
            .await
            .unwrap();
        assert_eq!(down.zone, Zone::T1);
        assert_eq!(h.controller.status().guard, Guard::Armed);

        let off = h
            .controller
            .force_zone(Zone::None, now, &h.config, Context::operator("operator"))
            .await
            .unwrap();
        assert_eq!(off.zone, Zone::None);
        h.assert_invariant();

        assert_eq!(
            h.actuator.calls(),
            vec![
                CoverAction::CaptureSnapshot,
                CoverAction::ApplyScene { tier: Tier::T2 },
                CoverAction::ApplyScene { tier: Tier::T1 },
                CoverAction::RestoreSnapshot,
            ]
        );
    }

    #[tokio::test]
    async fn test_forced_protection_survives_earlier_cool_spell() {
        let mut h = Harness::new();
        h.reading(20.0).await;
        h.clock.advance_minutes(60);

        let now = h.clock.now();
        h.controller
            .force_zone(Zone::T2, now, &h.config, Context::operator("operator"))
            .await
            .unwrap();

        h.clock.advance_minutes(1);
        let tick = Signals {
            temperature: Some(20.0),
            sun: None,
        };
        let outcome = h.run(tick, EvaluationTrigger::Tick).await.unwrap();
        assert_eq!(outcome.decision, Decision::Hold);
        assert_eq!(outcome.zone, Zone::T2);
        assert_eq!(h.actuator.count(CoverAction::OpenCovers), 0);

        h.clock.advance_minutes(10);
        let outcome = h.run(tick, EvaluationTrigger::Tick).await.unwrap();
        assert_eq!(outcome.decision, Decision::Cooldown { from: Zone::T2 });
        assert_eq!(h.actuator.count(CoverAction::OpenCovers), 1);
    }

    #[tokio::test]
    async fn test_status_serializes() {
        let mut h = Harness::new();
        h.reading(25.4).await;

        let json = serde_json::to_value(h.controller.status()).unwrap();
        assert_eq!(json["controller_id"], "living_room");
        assert_eq!(json["zone"], "t1");
        assert_eq!(json["guard"], "armed");
        assert_eq!(json["snapshot"]["episode"], 1);
        assert_eq!(json["snapshot"]["handle"], "scene.snapshot_1");
        assert!(json.get("last_error").is_none());
    }

    #[tokio::test]
    async fn test_events_share_evaluation_context() {
        let mut h = Harness::new();
        let mut all = h.bus.subscribe_all();
        let ctx = Context::new();
        let input = EvaluationInput::new(
            Signals {
                temperature: Some(25.4),
                sun: None,
            },
            h.clock.now(),
            EvaluationTrigger::Signal,
        );
        h.controller
            .evaluate(input, &h.config, ctx.clone())
            .await
            .unwrap();

        let mut action_events = 0;
        while let Ok(event) = all.try_recv() {
            assert_eq!(event.context.id, ctx.id);
            if event.event_type.as_str() == COVER_ACTION {
                action_events += 1;
            }
        }
        assert_eq!(action_events, 2);
    }
}
