//! Controller error taxonomy
//!
//! An unavailable sensor or sun feed is not an error: the threshold
//! evaluator holds the zone and the solar filter denies the advance.

use sg_config::ConfigError;
use sg_core::events::{CoverAction, ErrorKind};
use thiserror::Error;

use crate::actuator::ActuationError;
use crate::guard::GuardError;

/// Result type for controller operations
pub type ControllerResult<T> = Result<T, ControllerError>;

/// Errors surfaced by a controller evaluation
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Invalid or incomplete configuration; the evaluation made no transition
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// An actuation call failed after the transition was committed
    #[error("{action} failed: {source}")]
    Actuation {
        action: CoverAction,
        #[source]
        source: ActuationError,
    },

    /// The state machine found itself inconsistent
    #[error("invariant violation: {0}")]
    InvariantViolation(#[from] GuardError),
}

impl ControllerError {
    /// Category used on the reporting channel
    pub fn kind(&self) -> ErrorKind {
        match self {
            ControllerError::Configuration(_) => ErrorKind::Configuration,
            ControllerError::Actuation { .. } => ErrorKind::Actuation,
            ControllerError::InvariantViolation(_) => ErrorKind::InvariantViolation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sg_core::Tier;

    #[test]
    fn test_actuation_message_is_readable() {
        let err = ControllerError::Actuation {
            action: CoverAction::ApplyScene { tier: Tier::T1 },
            source: ActuationError::Failed("scene.t1 not found".into()),
        };
        assert_eq!(err.kind(), ErrorKind::Actuation);
        assert_eq!(
            err.to_string(),
            "apply t1 scene failed: call failed: scene.t1 not found"
        );
    }
}
