//! Engine error types

use sg_config::ConfigError;
use sg_controller::ControllerError;
use sg_core::ParseZoneError;
use thiserror::Error;

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors from the controller engine and signal feed
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Controller not found: {0}")]
    NotFound(String),

    #[error("Controller already exists: {0}")]
    AlreadyExists(String),

    #[error("Controller {0} has stopped")]
    Stopped(String),

    #[error("Invalid signal line: {0}")]
    InvalidSignal(#[from] serde_json::Error),

    #[error(transparent)]
    InvalidZone(#[from] ParseZoneError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Controller(#[from] ControllerError),
}
