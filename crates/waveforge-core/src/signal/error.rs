//! Signal manager error types

use thiserror::Error;

/// Errors that can occur when opening streams on a signal
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignalError {
    /// Track index does not exist
    #[error("Invalid track index: {0}")]
    InvalidTrack(usize),

    /// Undo memory could not be made available and the user declined to
    /// continue without undo
    #[error("Operation aborted: not enough memory for undo")]
    UndoDeclined,
}

/// Result type for signal operations
pub type SignalResult<T> = Result<T, SignalError>;
