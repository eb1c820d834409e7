//! Waveforge Core - multi-track signal editing engine
//!
//! Sample storage in stripes, transactional undo/redo with a memory
//! budget, playback, and plugin execution on worker threads.

pub mod config;
pub mod events;
pub mod metadata;
pub mod multitrack;
pub mod pipeline;
pub mod playback;
pub mod plugin;
pub mod signal;
pub mod storage;
pub mod task;
pub mod types;
pub mod undo;

pub use types::*;
