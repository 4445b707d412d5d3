//! Crate-level error taxonomy.
//!
//! Each subsystem has its own error enum; they all fold into [`CoreError`]
//! so the host process can make one decision per failure class. Only
//! [`CoreError::Setup`] is meant to stop the host; everything else is
//! logged and the controller keeps running.

use crate::audit::AuditError;
use crate::config::ConfigError;
use crate::notify::NotifyError;
use crate::perception::PerceptionError;
use crate::relay::RelayError;
use thiserror::Error;

/// Top-level error for the access controller.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Relay hardware could not be reached; the channel runs in virtual mode.
    #[error("relay hardware unavailable: {0}")]
    HardwareUnavailable(String),

    /// A write, flush or read on the relay link failed mid-session.
    #[error("transient I/O error: {0}")]
    TransientIo(String),

    /// No frame arrived from the perception pipeline.
    #[error("perception gap: {0}")]
    PerceptionGap(String),

    /// Audit log or snapshot could not be persisted.
    #[error("persistence failure: {0}")]
    Persistence(#[from] AuditError),

    /// The controller cannot start its loop.
    #[error("setup failure: {0}")]
    Setup(String),
}

impl From<RelayError> for CoreError {
    fn from(err: RelayError) -> Self {
        match err {
            RelayError::HardwareUnavailable(msg) => CoreError::HardwareUnavailable(msg),
            RelayError::Busy { .. } => CoreError::Setup(err.to_string()),
            other => CoreError::TransientIo(other.to_string()),
        }
    }
}

impl From<PerceptionError> for CoreError {
    fn from(err: PerceptionError) -> Self {
        CoreError::PerceptionGap(err.to_string())
    }
}

impl From<ConfigError> for CoreError {
    fn from(err: ConfigError) -> Self {
        CoreError::Setup(err.to_string())
    }
}

impl From<NotifyError> for CoreError {
    fn from(err: NotifyError) -> Self {
        match err {
            NotifyError::Spawn(_) => CoreError::Setup(err.to_string()),
            other => CoreError::TransientIo(other.to_string()),
        }
    }
}

/// Convenience alias used across the crate.
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
