//! Undo actions for sample data: delete, insert and overwrite

use std::mem::size_of;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::action::{sample_bytes, struct_bytes, UndoAction};
use crate::metadata::{MetaData, MetaDataList};
use crate::signal::SignalState;
use crate::types::{Sample, SampleIndex, TrackId};

// ============================================================================
// Delete
// ============================================================================

/// Recorded before samples are deleted; undo puts them back
#[derive(Debug)]
pub struct DeleteAction {
    description: String,
    track_ids: Vec<TrackId>,
    offset: SampleIndex,
    length: SampleIndex,
    samples: Vec<Vec<Sample>>,
    meta: MetaDataList,
    with_meta: bool,
}

impl DeleteAction {
    pub fn new(
        description: &str,
        track_ids: Vec<TrackId>,
        offset: SampleIndex,
        length: SampleIndex,
        with_meta: bool,
    ) -> Self {
        Self {
            description: description.to_string(),
            track_ids,
            offset,
            length,
            samples: Vec::new(),
            meta: MetaDataList::new(),
            with_meta,
        }
    }
}

impl UndoAction for DeleteAction {
    fn description(&self) -> &str {
        &self.description
    }

    fn undo_size(&self) -> usize {
        struct_bytes::<Self>()
            + sample_bytes(self.track_ids.len(), self.length)
            + self.meta.len() * size_of::<MetaData>()
    }

    fn redo_size(&self) -> usize {
        struct_bytes::<InsertAction>()
    }

    fn store(&mut self, state: &SignalState) -> bool {
        self.samples = self
            .track_ids
            .iter()
            .map(|&id| state.read_samples(id, self.offset, self.length))
            .collect();
        if self.with_meta {
            self.meta = state.meta_affected_from(&self.track_ids, self.offset);
        }
        true
    }

    fn undo(self: Box<Self>, state: &mut SignalState, with_redo: bool) -> Option<Box<dyn UndoAction>> {
        for (&id, samples) in self.track_ids.iter().zip(&self.samples) {
            if samples.is_empty() {
                continue;
            }
            state.insert_space_samples(&[id], self.offset, samples.len() as SampleIndex);
            state.write_samples(id, self.offset, samples);
        }
        if self.with_meta {
            state.restore_meta_data(&self.meta, self.meta.clone());
        }

        with_redo.then(|| {
            let mut redo = InsertAction::new(
                &self.description,
                self.track_ids.clone(),
                self.offset,
                self.length,
                self.with_meta,
            );
            redo.meta_count = self.meta.len();
            Box::new(redo) as Box<dyn UndoAction>
        })
    }
}

// ============================================================================
// Insert
// ============================================================================

/// Length of an insertion, fixed or still growing behind a writer
#[derive(Debug, Clone)]
pub enum InsertLength {
    Fixed(SampleIndex),
    Tracked(Arc<AtomicU64>),
}

impl InsertLength {
    pub fn get(&self) -> SampleIndex {
        match self {
            InsertLength::Fixed(length) => *length,
            InsertLength::Tracked(cell) => cell.load(Ordering::Acquire),
        }
    }
}

/// Recorded before samples are inserted; undo deletes them again
#[derive(Debug)]
pub struct InsertAction {
    description: String,
    track_ids: Vec<TrackId>,
    offset: SampleIndex,
    length: InsertLength,
    with_meta: bool,
    /// Metadata objects a redo will have to save
    meta_count: usize,
}

impl InsertAction {
    pub fn new(
        description: &str,
        track_ids: Vec<TrackId>,
        offset: SampleIndex,
        length: SampleIndex,
        with_meta: bool,
    ) -> Self {
        Self::with_length(description, track_ids, offset, InsertLength::Fixed(length), with_meta)
    }

    /// An insertion whose final length is only known once the writer is done
    pub fn with_length(
        description: &str,
        track_ids: Vec<TrackId>,
        offset: SampleIndex,
        length: InsertLength,
        with_meta: bool,
    ) -> Self {
        Self {
            description: description.to_string(),
            track_ids,
            offset,
            length,
            with_meta,
            meta_count: 0,
        }
    }
}

impl UndoAction for InsertAction {
    fn description(&self) -> &str {
        &self.description
    }

    fn undo_size(&self) -> usize {
        struct_bytes::<Self>()
    }

    fn redo_size(&self) -> usize {
        struct_bytes::<DeleteAction>()
            + sample_bytes(self.track_ids.len(), self.length.get())
            + self.meta_count * size_of::<MetaData>()
    }

    fn store(&mut self, state: &SignalState) -> bool {
        if self.with_meta {
            self.meta_count = state.meta_affected_from(&self.track_ids, self.offset).len();
        }
        true
    }

    fn undo(self: Box<Self>, state: &mut SignalState, with_redo: bool) -> Option<Box<dyn UndoAction>> {
        let length = self.length.get();
        let redo = with_redo.then(|| {
            let mut redo = DeleteAction::new(
                &self.description,
                self.track_ids.clone(),
                self.offset,
                length,
                self.with_meta,
            );
            redo.store(state);
            Box::new(redo) as Box<dyn UndoAction>
        });
        state.delete_range(&self.track_ids, self.offset, length, self.with_meta);
        redo
    }
}

// ============================================================================
// Modify
// ============================================================================

/// Recorded before samples of one track are overwritten
#[derive(Debug)]
pub struct ModifyAction {
    description: String,
    track_id: TrackId,
    offset: SampleIndex,
    length: SampleIndex,
    samples: Vec<Sample>,
}

impl ModifyAction {
    pub fn new(description: &str, track_id: TrackId, offset: SampleIndex, length: SampleIndex) -> Self {
        Self {
            description: description.to_string(),
            track_id,
            offset,
            length,
            samples: Vec::new(),
        }
    }
}

impl UndoAction for ModifyAction {
    fn description(&self) -> &str {
        &self.description
    }

    fn undo_size(&self) -> usize {
        struct_bytes::<Self>() + sample_bytes(1, self.length)
    }

    fn redo_size(&self) -> usize {
        self.undo_size()
    }

    fn store(&mut self, state: &SignalState) -> bool {
        self.samples = state.read_samples(self.track_id, self.offset, self.length);
        true
    }

    fn undo(mut self: Box<Self>, state: &mut SignalState, with_redo: bool) -> Option<Box<dyn UndoAction>> {
        let current = if with_redo {
            state.read_samples(self.track_id, self.offset, self.samples.len() as SampleIndex)
        } else {
            Vec::new()
        };
        state.write_samples(self.track_id, self.offset, &self.samples);
        if !with_redo {
            return None;
        }
        self.samples = current;
        Some(self)
    }
}
