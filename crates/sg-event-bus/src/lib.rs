//! Reporting channel for SunGuard
//!
//! Controllers publish zone transitions, cover actions and errors here so
//! the operator (logs, dashboards, notification glue) can observe them
//! without the decision core knowing who listens.

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sg_core::{Context, Event, EventData, EventType};
use std::marker::PhantomData;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;
use tracing::{trace, warn};

const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Broadcast bus for controller events
///
/// Listeners subscribe by event type, by controller, or to everything.
/// Slow listeners lag and lose the oldest events; publishers never block.
pub struct EventBus {
    by_type: DashMap<EventType, broadcast::Sender<Event>>,
    all: broadcast::Sender<Event>,
    capacity: usize,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (all, _) = broadcast::channel(capacity);
        Self {
            by_type: DashMap::new(),
            all,
            capacity,
        }
    }

    /// Subscribe to one event type
    pub fn subscribe(&self, event_type: impl Into<EventType>) -> broadcast::Receiver<Event> {
        let event_type = event_type.into();
        trace!(%event_type, "Subscribing to event type");
        self.by_type
            .entry(event_type)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Subscribe to one event type with decoded payloads
    pub fn subscribe_typed<T: EventData + DeserializeOwned>(&self) -> TypedEventReceiver<T> {
        TypedEventReceiver {
            rx: self.subscribe(EventType::of::<T>()),
            _data: PhantomData,
        }
    }

    /// Subscribe to every event from one controller
    pub fn subscribe_controller(&self, controller_id: impl Into<String>) -> ControllerEvents {
        ControllerEvents {
            controller_id: controller_id.into(),
            rx: self.all.subscribe(),
        }
    }

    /// Subscribe to every event
    pub fn subscribe_all(&self) -> broadcast::Receiver<Event> {
        self.all.subscribe()
    }

    pub fn fire(&self, event: Event) {
        trace!(event_type = %event.event_type, controller = %event.controller_id, "Firing event");

        // A send error only means nobody is listening
        if let Some(sender) = self.by_type.get(&event.event_type) {
            let _ = sender.send(event.clone());
        }
        let _ = self.all.send(event);
    }

    /// Serialize and fire a controller's event
    pub fn fire_typed<T: EventData + Serialize>(&self, controller_id: &str, data: T, context: Context) {
        match Event::typed(controller_id, data, context).to_json() {
            Ok(event) => self.fire(event),
            Err(e) => warn!(
                controller = %controller_id,
                event_type = T::EVENT_TYPE,
                error = %e,
                "Dropping event that failed to serialize"
            ),
        }
    }

    /// Number of event types with a dedicated channel
    pub fn listener_count(&self) -> usize {
        self.by_type.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiver that decodes one event type
pub struct TypedEventReceiver<T> {
    rx: broadcast::Receiver<Event>,
    _data: PhantomData<T>,
}

impl<T: EventData + DeserializeOwned> TypedEventReceiver<T> {
    /// Next event, skipping payloads that fail to decode
    pub async fn recv(&mut self) -> Result<Event<T>, broadcast::error::RecvError> {
        loop {
            if let Some(event) = self.rx.recv().await?.decode() {
                return Ok(event);
            }
        }
    }

    /// Non-blocking receive; `None` when nothing is queued
    ///
    /// A lagged receiver skips what it lost and keeps reading.
    pub fn try_recv(&mut self) -> Option<Event<T>> {
        while let Some(event) = next_queued(&mut self.rx) {
            if let Some(event) = event.decode() {
                return Some(event);
            }
        }
        None
    }
}

/// Receiver for one controller's events
pub struct ControllerEvents {
    controller_id: String,
    rx: broadcast::Receiver<Event>,
}

impl ControllerEvents {
    pub async fn recv(&mut self) -> Result<Event, broadcast::error::RecvError> {
        loop {
            let event = self.rx.recv().await?;
            if event.controller_id == self.controller_id {
                return Ok(event);
            }
        }
    }

    pub fn try_recv(&mut self) -> Option<Event> {
        while let Some(event) = next_queued(&mut self.rx) {
            if event.controller_id == self.controller_id {
                return Some(event);
            }
        }
        None
    }
}

fn next_queued(rx: &mut broadcast::Receiver<Event>) -> Option<Event> {
    loop {
        match rx.try_recv() {
            Ok(event) => return Some(event),
            Err(TryRecvError::Lagged(skipped)) => {
                warn!(skipped, "Event listener lagged, oldest events dropped");
            }
            Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
        }
    }
}
