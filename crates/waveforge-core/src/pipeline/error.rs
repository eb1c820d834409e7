//! Pipeline error types

use thiserror::Error;

use crate::playback::PlaybackError;

/// Errors a sample sink can report while consuming blocks
#[derive(Error, Debug)]
pub enum SinkError {
    /// The playback device refused a frame
    #[error("Playback device error: {0}")]
    Device(#[from] PlaybackError),

    /// The sink has already been finished or its target is gone
    #[error("Sink is closed")]
    Closed,

    /// Block count does not match the number of sink tracks
    #[error("Track count mismatch: sink={expected}, blocks={actual}")]
    TrackMismatch { expected: usize, actual: usize },
}
