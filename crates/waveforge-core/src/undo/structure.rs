//! Undo actions for the selection and the track list

use super::action::{sample_bytes, struct_bytes, UndoAction};
use crate::metadata::MetaDataList;
use crate::signal::SignalState;
use crate::storage::Track;
use crate::types::{Sample, Selection, TrackId};

/// Restores a previous selection and track selection
#[derive(Debug)]
pub struct SelectionAction {
    selection: Selection,
    selected_tracks: Vec<TrackId>,
}

impl SelectionAction {
    pub fn new(selection: Selection, selected_tracks: Vec<TrackId>) -> Self {
        Self {
            selection,
            selected_tracks,
        }
    }
}

impl UndoAction for SelectionAction {
    fn description(&self) -> &str {
        "Selection"
    }

    fn undo_size(&self) -> usize {
        struct_bytes::<Self>() + self.selected_tracks.len() * std::mem::size_of::<TrackId>()
    }

    fn redo_size(&self) -> usize {
        self.undo_size()
    }

    fn store(&mut self, _state: &SignalState) -> bool {
        true
    }

    fn undo(mut self: Box<Self>, state: &mut SignalState, with_redo: bool) -> Option<Box<dyn UndoAction>> {
        let current = state.selection;
        let current_tracks = state.signal.selected_track_ids();
        state.set_selection(self.selection);
        state.set_selected_track_ids(&self.selected_tracks);
        if !with_redo {
            return None;
        }
        self.selection = current;
        self.selected_tracks = current_tracks;
        Some(self)
    }
}

/// Recorded when a track is added; undo removes it again
#[derive(Debug)]
pub struct AddTrackAction {
    track_id: TrackId,
    length: u64,
}

impl AddTrackAction {
    pub fn new(track_id: TrackId, length: u64) -> Self {
        Self { track_id, length }
    }
}

impl UndoAction for AddTrackAction {
    fn description(&self) -> &str {
        "Add Track"
    }

    fn undo_size(&self) -> usize {
        struct_bytes::<Self>()
    }

    fn redo_size(&self) -> usize {
        struct_bytes::<DeleteTrackAction>() + sample_bytes(1, self.length)
    }

    fn store(&mut self, _state: &SignalState) -> bool {
        true
    }

    fn undo(self: Box<Self>, state: &mut SignalState, with_redo: bool) -> Option<Box<dyn UndoAction>> {
        let index = state.signal.index_of(self.track_id)?;
        let redo = with_redo.then(|| {
            let mut redo = DeleteTrackAction::new(index, self.track_id);
            redo.store(state);
            Box::new(redo) as Box<dyn UndoAction>
        });
        state.delete_track(index);
        redo
    }
}

/// Recorded before a track is deleted; undo re-creates it
#[derive(Debug)]
pub struct DeleteTrackAction {
    index: usize,
    track_id: TrackId,
    samples: Vec<Sample>,
    selected: bool,
    meta: MetaDataList,
    length: u64,
}

impl DeleteTrackAction {
    pub fn new(index: usize, track_id: TrackId) -> Self {
        Self {
            index,
            track_id,
            samples: Vec::new(),
            selected: true,
            meta: MetaDataList::new(),
            length: 0,
        }
    }

    /// Size estimate before [`store`](UndoAction::store) has run
    pub fn with_length(mut self, length: u64) -> Self {
        self.length = length;
        self
    }
}

impl UndoAction for DeleteTrackAction {
    fn description(&self) -> &str {
        "Delete Track"
    }

    fn undo_size(&self) -> usize {
        let length = self.length.max(self.samples.len() as u64);
        struct_bytes::<Self>() + sample_bytes(1, length)
    }

    fn redo_size(&self) -> usize {
        struct_bytes::<AddTrackAction>()
    }

    fn store(&mut self, state: &SignalState) -> bool {
        let Some(track) = state.signal.track_by_id(self.track_id) else {
            return false;
        };
        self.samples = track.read_range(0, track.length());
        self.length = self.samples.len() as u64;
        self.selected = track.is_selected();
        self.meta = state.meta_data.affected_by_track(self.track_id);
        true
    }

    fn undo(self: Box<Self>, state: &mut SignalState, with_redo: bool) -> Option<Box<dyn UndoAction>> {
        let track = Track::from_samples(self.track_id, &self.samples);
        track.set_selected(self.selected);
        state.insert_track(self.index, track);
        if !self.meta.is_empty() {
            state.restore_meta_data(&self.meta, self.meta.clone());
        }
        with_redo.then(|| Box::new(AddTrackAction::new(self.track_id, self.length)) as Box<dyn UndoAction>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::metadata::{MetaData, Scope};
    use crate::signal::Signal;

    #[test]
    fn test_selection_swap() {
        let mut state = SignalState::new();
        state.signal = Signal::with_tracks(2, 100);
        let ids = state.signal.track_ids();

        let action = Box::new(SelectionAction::new(Selection::new(0, 0), ids.clone()));
        state.set_selection(Selection::new(10, 20));
        state.set_track_selected(1, false);

        let redo = action.undo(&mut state, true).unwrap();
        assert_eq!(state.selection, Selection::new(0, 0));
        assert_eq!(state.signal.selected_tracks(), vec![0, 1]);

        redo.undo(&mut state, false);
        assert_eq!(state.selection, Selection::new(10, 20));
        assert_eq!(state.signal.selected_tracks(), vec![0]);
    }

    #[test]
    fn test_delete_track_roundtrip() {
        let mut state = SignalState::new();
        state.signal = Signal::with_tracks(2, 0);
        let ids = state.signal.track_ids();
        state.signal.track(1).unwrap().insert_samples(0, &[1, 2, 3]);
        let mut bound = MetaData::new(Scope::TRACK);
        bound.set_tracks(&[ids[1]]);
        state.add_meta_data(bound.clone());

        let mut action = Box::new(DeleteTrackAction::new(1, ids[1]));
        assert!(action.store(&state));
        state.delete_track(1);
        assert!(!state.meta_data.contains(bound.id()));

        let redo = action.undo(&mut state, true).unwrap();
        assert_eq!(state.signal.track_ids(), ids);
        assert_eq!(state.read_samples(ids[1], 0, 3), vec![1, 2, 3]);
        assert!(state.meta_data.contains(bound.id()));

        redo.undo(&mut state, false);
        assert_eq!(state.signal.tracks(), 1);
    }
}
