//! Signal container and its manager
//!
//! [`Signal`] is the ordered list of tracks. [`SignalState`] adds selection,
//! metadata and change notification. [`SignalManager`] owns the state and is
//! the single entry point for edits: it records undo data before anything is
//! changed and asks the [`UserInteraction`] collaborator when undo memory
//! runs out.

mod error;
mod interaction;
mod manager;
#[allow(clippy::module_inception)]
mod signal;
mod state;

pub use error::{SignalError, SignalResult};
pub use interaction::{NonInteractive, UserInteraction};
pub use manager::{lock_manager, SharedSignalManager, SignalManager};
pub use signal::Signal;
pub use state::SignalState;
