//! Error types for plugin execution

use thiserror::Error;

use crate::pipeline::SinkError;
use crate::playback::PlaybackError;
use crate::signal::SignalError;

const EINVAL: i32 = 22;
const ENOSYS: i32 = 38;
const ENOENT: i32 = 2;
const ENOMEM: i32 = 12;
const ECANCELED: i32 = 125;
const EIO: i32 = 5;

/// Errors that can occur while setting up or running a plugin
#[derive(Debug, Error)]
pub enum PluginError {
    /// Malformed or out of range parameter list
    #[error("Invalid parameters for plugin '{plugin}': {reason}")]
    InvalidParams { plugin: String, reason: String },

    /// No plugin registered under this name
    #[error("Plugin '{0}' not found")]
    NotFound(String),

    /// The plugin does not offer the requested mode (e.g. pre-listen)
    #[error("Plugin '{plugin}' does not support {feature}")]
    NotSupported { plugin: String, feature: String },

    /// The worker ended without delivering a result
    #[error("Plugin run aborted: {0}")]
    Aborted(String),

    /// The run was canceled before it completed
    #[error("Plugin run canceled")]
    Canceled,

    /// Not enough undo memory and the user did not want to go on
    #[error("Not enough memory for undo")]
    UndoDeclined,

    /// Opening streams on the signal failed
    #[error("Signal error: {0}")]
    Signal(#[from] SignalError),

    /// Playback device error during pre-listen
    #[error("Playback error: {0}")]
    Playback(#[from] PlaybackError),

    /// The pipeline sink failed
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    /// The worker thread could not be started
    #[error("Failed to spawn worker: {0}")]
    Spawn(String),
}

impl PluginError {
    pub fn invalid_params(plugin: &str, reason: impl Into<String>) -> Self {
        Self::InvalidParams {
            plugin: plugin.to_string(),
            reason: reason.into(),
        }
    }

    /// Negative errno style code for callers that speak integers
    pub fn errno(&self) -> i32 {
        match self {
            Self::InvalidParams { .. } => -EINVAL,
            Self::NotFound(_) => -ENOENT,
            Self::NotSupported { .. } => -ENOSYS,
            Self::Canceled => -ECANCELED,
            Self::UndoDeclined => -ENOMEM,
            Self::Signal(SignalError::InvalidTrack(_)) => -EINVAL,
            Self::Signal(SignalError::UndoDeclined) => -ENOMEM,
            Self::Playback(_) | Self::Sink(_) | Self::Spawn(_) | Self::Aborted(_) => -EIO,
        }
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }
}

/// Result type for plugin operations
pub type PluginResult<T> = Result<T, PluginError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno_codes() {
        assert_eq!(PluginError::invalid_params("amplify", "not a number").errno(), -22);
        assert_eq!(PluginError::Signal(SignalError::InvalidTrack(9)).errno(), -22);
        assert_eq!(PluginError::Canceled.errno(), -125);
        assert!(PluginError::Canceled.is_canceled());
    }

    #[test]
    fn test_error_display() {
        let err = PluginError::invalid_params("noise", "level out of range");
        assert_eq!(err.to_string(), "Invalid parameters for plugin 'noise': level out of range");
    }
}
