//! Multi-track readers and writers
//!
//! Groups of per-track readers / writers that share one range and one
//! position, so all channels of a signal stay sample aligned while they
//! are streamed through a pipeline.

mod reader;
mod writer;

pub use reader::MultiTrackReader;
pub use writer::MultiTrackWriter;
