//! The undo action interface

use std::fmt;
use std::mem::size_of;

use crate::signal::SignalState;
use crate::types::{SampleIndex, SAMPLE_STORAGE_BYTES};

/// One reversible change
///
/// Lifecycle: an action is created before a mutation, [`store`]d while the
/// old data is still there, and later consumed by [`undo`], which carries
/// out the inverse change and may hand back the action that redoes it.
///
/// [`undo_size`] and [`redo_size`] let the undo manager make room for an
/// action (or its inverse) before any data is copied.
///
/// [`store`]: UndoAction::store
/// [`undo`]: UndoAction::undo
/// [`undo_size`]: UndoAction::undo_size
/// [`redo_size`]: UndoAction::redo_size
pub trait UndoAction: Send + fmt::Debug {
    /// Text shown in the undo / redo menu entries
    fn description(&self) -> &str;

    /// Bytes this action occupies once stored
    fn undo_size(&self) -> usize;

    /// Bytes the redo action produced by [`undo`](UndoAction::undo) will occupy
    fn redo_size(&self) -> usize;

    /// Save everything needed to revert the upcoming change
    fn store(&mut self, state: &SignalState) -> bool;

    /// Revert the change, returning the redo action if `with_redo` is set
    fn undo(self: Box<Self>, state: &mut SignalState, with_redo: bool) -> Option<Box<dyn UndoAction>>;
}

/// Bytes needed to keep `length` samples of `tracks` tracks
#[inline]
pub fn sample_bytes(tracks: usize, length: SampleIndex) -> usize {
    tracks
        .saturating_mul(length as usize)
        .saturating_mul(SAMPLE_STORAGE_BYTES)
}

/// Bookkeeping size of an action struct
#[inline]
pub fn struct_bytes<T>() -> usize {
    size_of::<T>()
}
