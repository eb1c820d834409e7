//! Mutable signal state shared by the signal manager and undo actions

use std::sync::Arc;

use super::signal::Signal;
use crate::events::{EventBus, SignalEvent};
use crate::metadata::{EditTracks, FileInfo, MetaData, MetaDataList, FILE_INFO_ID};
use crate::storage::Track;
use crate::types::{Sample, SampleIndex, Selection, TrackId};

/// Everything an edit can change, without undo bookkeeping
///
/// Methods here apply changes directly and publish the matching events.
/// Undo recording is the job of [`SignalManager`](super::SignalManager);
/// undo actions use this type to carry out their inverse operations.
#[derive(Debug)]
pub struct SignalState {
    pub signal: Signal,
    pub selection: Selection,
    pub meta_data: MetaDataList,
    events: Arc<EventBus<SignalEvent>>,
}

impl Default for SignalState {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalState {
    pub fn new() -> Self {
        Self {
            signal: Signal::new(),
            selection: Selection::default(),
            meta_data: MetaDataList::new(),
            events: Arc::new(EventBus::default()),
        }
    }

    pub fn events(&self) -> &Arc<EventBus<SignalEvent>> {
        &self.events
    }

    pub fn publish(&self, event: SignalEvent) {
        self.events.publish(event);
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    pub fn set_selection(&mut self, selection: Selection) {
        if self.selection != selection {
            self.selection = selection;
            self.publish(SignalEvent::SelectionChanged(selection));
        }
    }

    pub fn set_track_selected(&mut self, index: usize, selected: bool) {
        if let Some(track) = self.signal.track(index) {
            if track.is_selected() != selected {
                track.set_selected(selected);
                self.publish(SignalEvent::TrackSelectionChanged { index, selected });
            }
        }
    }

    /// Select exactly the tracks in `ids`
    pub fn set_selected_track_ids(&mut self, ids: &[TrackId]) {
        for index in 0..self.signal.tracks() {
            let selected = self.signal.track(index).is_some_and(|t| ids.contains(&t.id()));
            self.set_track_selected(index, selected);
        }
    }

    // ------------------------------------------------------------------
    // Tracks
    // ------------------------------------------------------------------

    pub fn insert_track(&mut self, index: usize, track: Track) -> usize {
        let id = track.id();
        let index = self.signal.insert_track(index, track);
        self.publish(SignalEvent::TrackInserted { index, id });
        self.sync_file_info_tracks();
        index
    }

    /// Remove a track and unbind it from all metadata
    pub fn delete_track(&mut self, index: usize) -> Option<Track> {
        let track = self.signal.delete_track(index)?;
        let affected = self.meta_data.affected_by_track(track.id());
        self.meta_data.delete_track(track.id());
        self.publish(SignalEvent::TrackDeleted { index, id: track.id() });
        if !affected.is_empty() {
            self.publish(SignalEvent::MetaDataChanged);
        }
        self.sync_file_info_tracks();
        Some(track)
    }

    /// Keep the track count in the file info in line with the signal
    fn sync_file_info_tracks(&mut self) {
        let Some(mut info) = self.meta_data.get(FILE_INFO_ID).and_then(FileInfo::from_meta) else {
            return;
        };
        let tracks = self.signal.tracks();
        if info.tracks() != tracks {
            info.set_tracks(tracks);
            self.meta_data.add(info.into_meta());
            self.publish(SignalEvent::MetaDataChanged);
        }
    }

    fn edit_tracks<'a>(&self, ids: &'a [TrackId], signal: &'a [TrackId]) -> EditTracks<'a> {
        EditTracks { tracks: ids, signal }
    }

    // ------------------------------------------------------------------
    // Samples only
    // ------------------------------------------------------------------

    pub fn delete_samples(&self, ids: &[TrackId], offset: SampleIndex, length: SampleIndex) {
        for &id in ids {
            let Some(track) = self.signal.track_by_id(id) else {
                continue;
            };
            let removed = track.delete_range(offset, length);
            if removed > 0 {
                let index = self.signal.index_of(id).unwrap_or(0);
                self.publish(SignalEvent::SamplesDeleted { track: index, offset, length: removed });
            }
        }
    }

    pub fn insert_space_samples(&self, ids: &[TrackId], offset: SampleIndex, length: SampleIndex) {
        if length == 0 {
            return;
        }
        for &id in ids {
            let Some(track) = self.signal.track_by_id(id) else {
                continue;
            };
            let offset = offset.min(track.length());
            track.insert_space(offset, length);
            let index = self.signal.index_of(id).unwrap_or(0);
            self.publish(SignalEvent::SamplesInserted { track: index, offset, length });
        }
    }

    pub fn read_samples(&self, id: TrackId, offset: SampleIndex, length: SampleIndex) -> Vec<Sample> {
        self.signal
            .track_by_id(id)
            .map(|t| t.read_range(offset, length))
            .unwrap_or_default()
    }

    pub fn write_samples(&self, id: TrackId, offset: SampleIndex, data: &[Sample]) {
        let Some(track) = self.signal.track_by_id(id) else {
            return;
        };
        track.write_samples(offset, data);
        let index = self.signal.index_of(id).unwrap_or(0);
        self.publish(SignalEvent::SamplesModified {
            track: index,
            offset,
            length: data.len() as SampleIndex,
        });
    }

    // ------------------------------------------------------------------
    // Samples and metadata
    // ------------------------------------------------------------------

    /// Delete samples and let positional metadata follow
    pub fn delete_range(&mut self, ids: &[TrackId], offset: SampleIndex, length: SampleIndex, with_meta: bool) {
        self.delete_samples(ids, offset, length);
        if with_meta {
            let signal_ids = self.signal.track_ids();
            let edit = self.edit_tracks(ids, &signal_ids);
            let affected = self.meta_data.affected_from(edit, offset);
            if !affected.is_empty() {
                self.meta_data.delete_range(edit, offset, length);
                self.publish(SignalEvent::MetaDataChanged);
            }
        }
    }

    /// Insert silence and let positional metadata follow
    pub fn insert_space(&mut self, ids: &[TrackId], offset: SampleIndex, length: SampleIndex, with_meta: bool) {
        self.insert_space_samples(ids, offset, length);
        if with_meta {
            let signal_ids = self.signal.track_ids();
            let edit = self.edit_tracks(ids, &signal_ids);
            let affected = self.meta_data.affected_from(edit, offset);
            if !affected.is_empty() {
                self.meta_data.shift_right(edit, offset, length);
                self.publish(SignalEvent::MetaDataChanged);
            }
        }
    }

    /// Metadata objects the given edit would move, shrink or delete
    pub fn meta_affected_from(&self, ids: &[TrackId], offset: SampleIndex) -> MetaDataList {
        let signal_ids = self.signal.track_ids();
        self.meta_data.affected_from(self.edit_tracks(ids, &signal_ids), offset)
    }

    // ------------------------------------------------------------------
    // Metadata
    // ------------------------------------------------------------------

    pub fn add_meta_data(&mut self, meta: MetaData) {
        self.meta_data.add(meta);
        self.publish(SignalEvent::MetaDataChanged);
    }

    pub fn remove_meta_data(&mut self, id: &str) -> Option<MetaData> {
        let removed = self.meta_data.remove(id);
        if removed.is_some() {
            self.publish(SignalEvent::MetaDataChanged);
        }
        removed
    }

    /// Replace all objects in `list` by id
    pub fn restore_meta_data(&mut self, remove: &MetaDataList, restore: MetaDataList) {
        self.meta_data.remove_all(remove);
        self.meta_data.merge(restore);
        self.publish(SignalEvent::MetaDataChanged);
    }

    /// Drop all tracks, metadata and the selection
    pub fn clear(&mut self) {
        self.signal.close();
        self.meta_data.clear();
        self.selection = Selection::default();
    }
}
