//! Correlation for everything one evaluation does

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// What started an evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cause {
    /// A temperature or sun position update
    Signal,
    /// The periodic cooldown check
    Check,
    /// The daily pre-sunset timer
    PreSunset,
    /// An operator command
    Operator,
    Internal,
}

/// Shared by every event fired while handling one evaluation, so a cover
/// action can be traced back to the signal or command that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    /// ULID, sortable by creation time
    pub id: String,
    pub cause: Cause,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
}

impl Context {
    pub fn new() -> Self {
        Self::caused_by(Cause::Internal)
    }

    pub fn caused_by(cause: Cause) -> Self {
        Self {
            id: Ulid::new().to_string(),
            cause,
            operator: None,
        }
    }

    /// Context for a command issued by a named operator
    pub fn operator(name: impl Into<String>) -> Self {
        Self {
            operator: Some(name.into()),
            ..Self::caused_by(Cause::Operator)
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
