//! Configuration errors

use std::path::PathBuf;
use thiserror::Error;

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Why a configuration could not be loaded or was rejected
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed YAML in {path}: {source}")]
    ParseYaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("!include target does not exist: {path}")]
    IncludeNotFound { path: PathBuf },

    /// A file includes itself, directly or through other files
    #[error("{path} is included recursively")]
    CircularInclude { path: PathBuf },

    #[error("!env_var {var} is not set and has no default")]
    EnvVarNotFound { var: String },

    /// A single field has an unusable value
    #[error("'{key}' {reason}")]
    InvalidValue { key: String, reason: String },

    /// Fields are individually valid but inconsistent with each other
    #[error("invalid configuration: {message}")]
    ValidationFailed { message: String },
}

impl ConfigError {
    pub(crate) fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            key: key.into(),
            reason: reason.into(),
        }
    }
}
