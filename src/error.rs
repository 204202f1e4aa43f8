//! Error types for the sound gate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the gate and its capture host.
#[derive(Error, Debug)]
pub enum GateError {
    /// The capture backend could not open or start the requested device.
    #[error("Audio device unavailable: {reason}")]
    DeviceUnavailable { reason: String },

    /// A session configuration value breaks a startup invariant.
    #[error("Invalid configuration: {reason}")]
    ConfigurationInvalid { reason: String },

    /// The backend reported a problem mid-stream. Never fatal.
    #[error("Audio stream interrupted: {reason}")]
    StreamInterrupted { reason: String },

    /// The configuration file exists but could not be loaded.
    #[error("Failed to load config {path}: {reason}")]
    Config { path: PathBuf, reason: String },
}

impl GateError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::ConfigurationInvalid {
            reason: reason.into(),
        }
    }

    pub(crate) fn device(reason: impl Into<String>) -> Self {
        Self::DeviceUnavailable {
            reason: reason.into(),
        }
    }
}

/// Result alias for gate operations.
pub type GateResult<T> = Result<T, GateError>;
