//! SunGuard controller engine
//!
//! Runs one task per configured controller and feeds it signals:
//!
//! ```text
//!   stdin feed ──► ControllerManager ──► ControllerHandle ──► actor task
//!                                         (watch / mpsc)       │
//!                                                              ▼
//!                                    EventBus ◄── ZoneController ──► CoverActuator
//! ```

pub mod actuator;
pub mod engine;
pub mod error;
pub mod feed;
pub mod manager;

pub use actuator::LoggingActuator;
pub use engine::ControllerHandle;
pub use error::{EngineError, EngineResult};
pub use feed::SignalUpdate;
pub use manager::{ActuatorFactory, ControllerManager};
