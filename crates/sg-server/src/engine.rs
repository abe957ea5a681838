//! Controller engine
//!
//! Each controller runs as its own task. Signals are delivered through
//! `watch` channels so bursts arriving during an evaluation collapse into
//! one follow-up evaluation against the latest values. Operator commands
//! go through an `mpsc` channel and are answered over `oneshot`.

use chrono::{DateTime, Utc};
use sg_config::ControllerConfig;
use sg_controller::{
    Clock, ControllerResult, ControllerStatus, CoverActuator, EvaluationInput, EvaluationTrigger,
    Signals, ZoneController,
};
use sg_core::{Context, SunPosition, Zone};
use sg_event_bus::EventBus;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::{EngineError, EngineResult};

/// Bound on queued operator commands per controller
const COMMAND_CAPACITY: usize = 32;

enum Command {
    ForceZone {
        target: Zone,
        context: Context,
        reply: oneshot::Sender<ControllerResult<Zone>>,
    },
    CheckNow {
        reply: oneshot::Sender<ControllerResult<Zone>>,
    },
    Status {
        reply: oneshot::Sender<ControllerStatus>,
    },
}

struct HandleInner {
    id: String,
    temperature: watch::Sender<Option<f64>>,
    sun: watch::Sender<Option<SunPosition>>,
    next_sunset: watch::Sender<Option<DateTime<Utc>>>,
    config: watch::Sender<ControllerConfig>,
    commands: mpsc::Sender<Command>,
    shutdown: broadcast::Sender<()>,
}

/// Cloneable handle to a running controller task
#[derive(Clone)]
pub struct ControllerHandle {
    inner: Arc<HandleInner>,
}

impl ControllerHandle {
    /// Start a controller task
    pub fn spawn(
        config: ControllerConfig,
        actuator: Arc<dyn CoverActuator>,
        bus: Arc<EventBus>,
        clock: Arc<dyn Clock>,
    ) -> (Self, JoinHandle<()>) {
        let id = config.id.clone();
        let (temperature_tx, temperature_rx) = watch::channel(None);
        let (sun_tx, sun_rx) = watch::channel(None);
        let (sunset_tx, sunset_rx) = watch::channel(None);
        let (config_tx, config_rx) = watch::channel(config);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let actor = ControllerActor {
            controller: ZoneController::new(id.clone(), actuator, bus),
            clock,
            temperature: temperature_rx,
            sun: sun_rx,
            next_sunset: sunset_rx,
            config: config_rx,
            commands: command_rx,
            shutdown: shutdown_rx,
            presunset_fired: None,
        };
        let task = tokio::spawn(actor.run());

        let handle = Self {
            inner: Arc::new(HandleInner {
                id,
                temperature: temperature_tx,
                sun: sun_tx,
                next_sunset: sunset_tx,
                config: config_tx,
                commands: command_tx,
                shutdown: shutdown_tx,
            }),
        };
        (handle, task)
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Publish the latest temperature reading; `None` means unavailable
    pub fn set_temperature(&self, reading: Option<f64>) {
        self.inner.temperature.send_replace(reading);
    }

    /// Publish the latest sun position; `None` means unavailable
    pub fn set_sun(&self, position: Option<SunPosition>) {
        self.inner.sun.send_replace(position);
    }

    /// Publish the next sunset, which schedules the pre-sunset restoration
    pub fn set_next_sunset(&self, sunset: Option<DateTime<Utc>>) {
        self.inner.next_sunset.send_replace(sunset);
    }

    /// Replace the configuration used from the next evaluation on
    pub fn update_config(&self, config: ControllerConfig) {
        self.inner.config.send_replace(config);
    }

    pub fn config(&self) -> ControllerConfig {
        self.inner.config.borrow().clone()
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.inner.config.send_modify(|config| config.enabled = enabled);
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.config.borrow().enabled
    }

    /// Force the zone through the controller's guard checks
    pub async fn force_zone(&self, target: Zone, context: Context) -> EngineResult<Zone> {
        let zone = self
            .request(|reply| Command::ForceZone {
                target,
                context,
                reply,
            })
            .await??;
        Ok(zone)
    }

    /// Run an evaluation now, as the periodic check would
    pub async fn check_now(&self) -> EngineResult<Zone> {
        let zone = self.request(|reply| Command::CheckNow { reply }).await??;
        Ok(zone)
    }

    pub async fn status(&self) -> EngineResult<ControllerStatus> {
        self.request(|reply| Command::Status { reply }).await
    }

    /// Ask the task to stop; pending timers are dropped with it
    pub fn stop(&self) {
        let _ = self.inner.shutdown.send(());
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> EngineResult<T> {
        let (reply, response) = oneshot::channel();
        self.inner
            .commands
            .send(build(reply))
            .await
            .map_err(|_| EngineError::Stopped(self.inner.id.clone()))?;
        response
            .await
            .map_err(|_| EngineError::Stopped(self.inner.id.clone()))
    }
}

struct ControllerActor {
    controller: ZoneController,
    clock: Arc<dyn Clock>,
    temperature: watch::Receiver<Option<f64>>,
    sun: watch::Receiver<Option<SunPosition>>,
    next_sunset: watch::Receiver<Option<DateTime<Utc>>>,
    config: watch::Receiver<ControllerConfig>,
    commands: mpsc::Receiver<Command>,
    shutdown: broadcast::Receiver<()>,
    /// Last sunset the timer fired for, whether or not it restored anything
    presunset_fired: Option<DateTime<Utc>>,
}

impl ControllerActor {
    async fn run(mut self) {
        let mut period = self.config.borrow().check_interval();
        let mut tick = check_interval(period);
        info!(controller = %self.controller.id(), "Controller started");

        loop {
            let presunset = self.presunset_due();
            let presunset_sleep =
                tokio::time::sleep(presunset.map(|(_, delay)| delay).unwrap_or(period));

            // Signals before commands so a status request sent after a signal sees its effect
            tokio::select! {
                biased;

                _ = self.shutdown.recv() => break,

                changed = self.temperature.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let _ = self.evaluate(EvaluationTrigger::Signal).await;
                }

                changed = self.sun.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let _ = self.evaluate(EvaluationTrigger::Signal).await;
                }

                changed = self.next_sunset.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    drop(self.next_sunset.borrow_and_update());
                }

                changed = self.config.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let interval = self.config.borrow_and_update().check_interval();
                    if interval != period {
                        debug!(controller = %self.controller.id(), ?interval, "Check interval changed");
                        period = interval;
                        tick = check_interval(period);
                    }
                }

                command = self.commands.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => break,
                },

                _ = presunset_sleep, if presunset.is_some() => {
                    if let Some((sunset, _)) = presunset {
                        self.presunset_fired = Some(sunset);
                        let _ = self.evaluate(EvaluationTrigger::PreSunset { sunset }).await;
                    }
                }

                _ = tick.tick() => {
                    let _ = self.evaluate(EvaluationTrigger::Tick).await;
                }
            }
        }

        info!(controller = %self.controller.id(), "Controller stopped");
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::ForceZone {
                target,
                context,
                reply,
            } => {
                let config = self.config.borrow().clone();
                let now = self.clock.now();
                let result = self
                    .controller
                    .force_zone(target, now, &config, context)
                    .await
                    .map(|outcome| outcome.zone);
                let _ = reply.send(result);
            }
            Command::CheckNow { reply } => {
                let result = self.evaluate(EvaluationTrigger::Tick).await;
                let _ = reply.send(result);
            }
            Command::Status { reply } => {
                let _ = reply.send(self.controller.status());
            }
        }
    }

    /// Evaluate against the latest value of every signal
    async fn evaluate(&mut self, trigger: EvaluationTrigger) -> ControllerResult<Zone> {
        let signals = Signals {
            temperature: *self.temperature.borrow_and_update(),
            sun: *self.sun.borrow_and_update(),
        };
        let config = self.config.borrow().clone();

        if !config.enabled {
            debug!(controller = %self.controller.id(), "Controller disabled, skipping evaluation");
            return Ok(self.controller.zone());
        }

        let input = EvaluationInput::new(signals, self.clock.now(), trigger);
        let outcome = self
            .controller
            .evaluate(input, &config, Context::caused_by(trigger.cause()))
            .await?;
        if !outcome.failures.is_empty() {
            warn!(
                controller = %self.controller.id(),
                failures = outcome.failures.len(),
                "Evaluation finished with actuation failures"
            );
        }
        Ok(outcome.zone)
    }

    /// Sunset still awaiting restoration, and how long until it is due
    fn presunset_due(&self) -> Option<(DateTime<Utc>, Duration)> {
        let sunset = (*self.next_sunset.borrow())?;
        if self.presunset_fired == Some(sunset) {
            return None;
        }
        let offset = self.config.borrow().presunset_offset();
        let delay = (sunset - offset - self.clock.now())
            .to_std()
            .unwrap_or(Duration::ZERO);
        Some((sunset, delay))
    }
}

fn check_interval(period: Duration) -> Interval {
    let mut tick = tokio::time::interval_at(Instant::now() + period, period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tick
}
