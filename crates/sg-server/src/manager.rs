//! Registry of running controllers

use dashmap::DashMap;
use sg_config::{ControllerConfig, SunGuardConfig};
use sg_controller::{Clock, CoverActuator};
use sg_core::Context;
use sg_event_bus::EventBus;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::ControllerHandle;
use crate::error::{EngineError, EngineResult};
use crate::feed::SignalUpdate;

/// Builds the actuator for a controller
pub type ActuatorFactory = Arc<dyn Fn(&ControllerConfig) -> Arc<dyn CoverActuator> + Send + Sync>;

/// Manages all controller tasks
pub struct ControllerManager {
    controllers: DashMap<String, ControllerHandle>,
    tasks: DashMap<String, JoinHandle<()>>,
    bus: Arc<EventBus>,
    clock: Arc<dyn Clock>,
    actuators: ActuatorFactory,
}

impl ControllerManager {
    pub fn new(bus: Arc<EventBus>, clock: Arc<dyn Clock>, actuators: ActuatorFactory) -> Self {
        Self {
            controllers: DashMap::new(),
            tasks: DashMap::new(),
            bus,
            clock,
            actuators,
        }
    }

    /// Spawn a controller for every entry in the configuration
    pub fn load(&self, config: &SunGuardConfig) -> EngineResult<()> {
        config.validate()?;
        for controller in &config.controllers {
            self.spawn(controller.clone())?;
        }
        Ok(())
    }

    /// Spawn a single controller
    pub fn spawn(&self, config: ControllerConfig) -> EngineResult<ControllerHandle> {
        config.validate()?;
        if self.controllers.contains_key(&config.id) {
            return Err(EngineError::AlreadyExists(config.id));
        }

        let id = config.id.clone();
        let name = config.display_name().to_string();
        let actuator = (self.actuators)(&config);
        let (handle, task) =
            ControllerHandle::spawn(config, actuator, self.bus.clone(), self.clock.clone());

        info!("Loaded controller: {} ({})", name, id);
        self.controllers.insert(id.clone(), handle.clone());
        self.tasks.insert(id, task);
        Ok(handle)
    }

    pub fn get(&self, id: &str) -> Option<ControllerHandle> {
        self.controllers.get(id).map(|h| h.value().clone())
    }

    /// Controller ids in sorted order
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.controllers.iter().map(|h| h.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn count(&self) -> usize {
        self.controllers.len()
    }

    fn handle(&self, id: &str) -> EngineResult<ControllerHandle> {
        self.get(id)
            .ok_or_else(|| EngineError::NotFound(id.to_string()))
    }

    /// Deliver one feed line to its controller
    pub async fn route(&self, update: &SignalUpdate) -> EngineResult<()> {
        let handle = self.handle(&update.controller)?;
        update.publish(&handle);

        if let Some(target) = update.target_zone()? {
            let zone = handle
                .force_zone(target, Context::operator("feed"))
                .await?;
            info!(controller = %handle.id(), %zone, "Zone forced by operator");
        }
        Ok(())
    }

    pub fn enable(&self, id: &str) -> EngineResult<()> {
        self.handle(id)?.set_enabled(true);
        info!("Enabled controller: {}", id);
        Ok(())
    }

    pub fn disable(&self, id: &str) -> EngineResult<()> {
        self.handle(id)?.set_enabled(false);
        info!("Disabled controller: {}", id);
        Ok(())
    }

    /// Apply a new configuration in place
    ///
    /// Controllers that stay keep their zone and episode and pick up the new
    /// settings on their next evaluation. Removed ones are stopped, new ones
    /// spawned.
    pub async fn reload(&self, config: &SunGuardConfig) -> EngineResult<()> {
        config.validate()?;

        let removed: Vec<String> = self
            .ids()
            .into_iter()
            .filter(|id| config.get(id).is_none())
            .collect();
        for id in removed {
            self.stop(&id).await;
        }

        for controller in &config.controllers {
            match self.get(&controller.id) {
                Some(handle) => {
                    debug!(controller = %controller.id, "Updating configuration");
                    handle.update_config(controller.clone());
                }
                None => {
                    self.spawn(controller.clone())?;
                }
            }
        }

        info!("Reloaded {} controllers", self.count());
        Ok(())
    }

    /// Stop and forget a single controller
    pub async fn stop(&self, id: &str) {
        if let Some((_, handle)) = self.controllers.remove(id) {
            handle.stop();
        }
        if let Some((_, task)) = self.tasks.remove(id) {
            if let Err(e) = task.await {
                warn!(controller = %id, error = %e, "Controller task ended abnormally");
            }
        }
        info!("Removed controller: {}", id);
    }

    /// Stop every controller and wait for their tasks to finish
    pub async fn shutdown_all(&self) {
        for id in self.ids() {
            self.stop(&id).await;
        }
    }
}
