//! Reporting events
//!
//! Every event belongs to one controller. The payload is typed at the
//! publisher and travels as JSON on the bus, so listeners that only log or
//! forward events never need the payload types.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Context;

/// A payload that can be published as an event
pub trait EventData: Clone + Send + Sync + 'static {
    const EVENT_TYPE: &'static str;
}

/// Name of an event kind, e.g. `zone_changed`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventType(String);

impl EventType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The event type carried by payload `T`
    pub fn of<T: EventData>() -> Self {
        Self::new(T::EVENT_TYPE)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EventType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An event fired by a controller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event<T = serde_json::Value> {
    pub event_type: EventType,
    pub controller_id: String,
    pub data: T,
    pub fired_at: DateTime<Utc>,
    /// Shared by every event produced while handling one evaluation
    pub context: Context,
}

impl<T> Event<T> {
    pub fn new(
        event_type: impl Into<EventType>,
        controller_id: impl Into<String>,
        data: T,
        context: Context,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            controller_id: controller_id.into(),
            data,
            fired_at: Utc::now(),
            context,
        }
    }

    /// Swap the payload, keeping the envelope
    pub fn with_data<U>(self, data: U) -> Event<U> {
        Event {
            event_type: self.event_type,
            controller_id: self.controller_id,
            data,
            fired_at: self.fired_at,
            context: self.context,
        }
    }
}

impl<T: EventData> Event<T> {
    pub fn typed(controller_id: impl Into<String>, data: T, context: Context) -> Self {
        Self::new(T::EVENT_TYPE, controller_id, data, context)
    }
}

impl<T: Serialize> Event<T> {
    /// Convert to the JSON form carried on the bus
    pub fn to_json(self) -> serde_json::Result<Event> {
        let data = serde_json::to_value(&self.data)?;
        Ok(self.with_data(data))
    }
}

impl Event {
    /// Decode the payload if this event is of type `T`
    pub fn decode<T: EventData + DeserializeOwned>(&self) -> Option<Event<T>> {
        if self.event_type.as_str() != T::EVENT_TYPE {
            return None;
        }
        let data = serde_json::from_value(self.data.clone()).ok()?;
        Some(self.clone().with_data(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Ping {
        count: u32,
    }

    impl EventData for Ping {
        const EVENT_TYPE: &'static str = "ping";
    }

    #[test]
    fn test_json_envelope() {
        let ctx = Context::new();
        let event = Event::typed("office", Ping { count: 3 }, ctx.clone())
            .to_json()
            .unwrap();

        assert_eq!(event.event_type, EventType::of::<Ping>());
        assert_eq!(event.data, json!({"count": 3}));

        let wire = serde_json::to_value(&event).unwrap();
        assert_eq!(wire["event_type"], "ping");
        assert_eq!(wire["controller_id"], "office");
        assert_eq!(wire["context"]["id"], ctx.id.as_str());
    }

    #[test]
    fn test_decode_checks_type() {
        let event = Event::new("ping", "office", json!({"count": 1}), Context::new());
        assert_eq!(event.decode::<Ping>().unwrap().data, Ping { count: 1 });

        let other = Event::new("pong", "office", json!({"count": 1}), Context::new());
        assert!(other.decode::<Ping>().is_none());

        let garbled = Event::new("ping", "office", json!("x"), Context::new());
        assert!(garbled.decode::<Ping>().is_none());
    }
}
