//! Playback error types

use thiserror::Error;

use super::PlaybackMethod;

/// Errors that can occur while opening or feeding a playback device
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    /// No registered factory supports any playback method
    #[error("No playback method available")]
    NoMethod,

    /// The resolved method could not create a device
    #[error("Playback method {0:?} is not supported")]
    UnsupportedMethod(PlaybackMethod),

    /// Device not found
    #[error("Playback device not found: {0}")]
    DeviceNotFound(String),

    /// Device refused the requested parameters
    #[error("Failed to open playback device: {0}")]
    OpenFailed(String),

    /// Writing a frame failed
    #[error("Playback write failed: {0}")]
    WriteFailed(String),

    /// Device is not open
    #[error("Playback device is not open")]
    NotOpen,

    /// Frame length does not match the opened channel count
    #[error("Frame has {actual} channels, device expects {expected}")]
    ChannelMismatch { expected: usize, actual: usize },

    /// The playback worker could not be started
    #[error("Failed to start playback thread: {0}")]
    Spawn(String),
}

/// Result type for playback operations
pub type PlaybackResult<T> = Result<T, PlaybackError>;
