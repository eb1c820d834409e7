//! Ordered list of tracks

use crate::storage::Track;
use crate::types::{SampleIndex, TrackId};

/// An ordered list of tracks that together form one signal
#[derive(Debug, Clone, Default)]
pub struct Signal {
    tracks: Vec<Track>,
}

impl Signal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create `count` silent tracks of `length` samples
    pub fn with_tracks(count: usize, length: SampleIndex) -> Self {
        Self {
            tracks: (0..count).map(|_| Track::new(length)).collect(),
        }
    }

    pub fn tracks(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Length of the longest track
    pub fn length(&self) -> SampleIndex {
        self.tracks.iter().map(Track::length).max().unwrap_or(0)
    }

    pub fn track(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter()
    }

    pub fn index_of(&self, id: TrackId) -> Option<usize> {
        self.tracks.iter().position(|t| t.id() == id)
    }

    pub fn track_by_id(&self, id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id() == id)
    }

    pub fn track_ids(&self) -> Vec<TrackId> {
        self.tracks.iter().map(Track::id).collect()
    }

    /// Indices of all selected tracks
    pub fn selected_tracks(&self) -> Vec<usize> {
        self.tracks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.is_selected())
            .map(|(i, _)| i)
            .collect()
    }

    /// Ids of all selected tracks
    pub fn selected_track_ids(&self) -> Vec<TrackId> {
        self.tracks.iter().filter(|t| t.is_selected()).map(Track::id).collect()
    }

    /// Insert a track at `index` (clamped to the end), returns its index
    pub fn insert_track(&mut self, index: usize, track: Track) -> usize {
        let index = index.min(self.tracks.len());
        self.tracks.insert(index, track);
        index
    }

    pub fn append_track(&mut self, track: Track) -> usize {
        self.tracks.push(track);
        self.tracks.len() - 1
    }

    pub fn delete_track(&mut self, index: usize) -> Option<Track> {
        (index < self.tracks.len()).then(|| self.tracks.remove(index))
    }

    /// Remove all tracks
    pub fn close(&mut self) {
        self.tracks.clear();
    }
}
