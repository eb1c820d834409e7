//! Collection of metadata objects keyed by id

use std::collections::BTreeMap;

use super::meta_data::{MetaData, PropertyValue, Scope, STDPROP_TYPE};
use crate::types::{SampleIndex, TrackId};

/// The tracks a sample edit is applied to
#[derive(Debug, Clone, Copy)]
pub struct EditTracks<'a> {
    /// Tracks the edit touches
    pub tracks: &'a [TrackId],
    /// All tracks of the signal
    pub signal: &'a [TrackId],
}

impl EditTracks<'_> {
    fn spans_signal(&self) -> bool {
        self.signal.iter().all(|t| self.tracks.contains(t))
    }

    /// Check if a metadata object moves with this edit
    ///
    /// Track-bound objects follow edits on any of their tracks, unbound
    /// objects only follow edits that cover the whole signal.
    pub fn moves(&self, meta: &MetaData) -> bool {
        if !meta.is_positional() {
            return false;
        }
        if meta.is_bound_to_tracks() {
            meta.tracks().iter().any(|t| self.tracks.contains(t))
        } else {
            self.spans_signal()
        }
    }
}

/// Map from object id to metadata object
///
/// Queries hand out copies; changing an object means putting a modified
/// copy back with [`add`](Self::add).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetaDataList {
    items: BTreeMap<String, MetaData>,
}

impl MetaDataList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Add an object, replacing one with the same id
    pub fn add(&mut self, meta: MetaData) -> Option<MetaData> {
        self.items.insert(meta.id().to_string(), meta)
    }

    /// Add all objects of another list
    pub fn merge(&mut self, other: MetaDataList) {
        self.items.extend(other.items);
    }

    pub fn remove(&mut self, id: &str) -> Option<MetaData> {
        self.items.remove(id)
    }

    /// Remove all objects whose id is in `other`
    pub fn remove_all(&mut self, other: &MetaDataList) {
        for id in other.items.keys() {
            self.items.remove(id);
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<MetaData> {
        self.items.get(id).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetaData> {
        self.items.values()
    }

    pub fn ids(&self) -> Vec<String> {
        self.items.keys().cloned().collect()
    }

    fn select(&self, predicate: impl Fn(&MetaData) -> bool) -> MetaDataList {
        MetaDataList {
            items: self
                .items
                .iter()
                .filter(|(_, meta)| predicate(meta))
                .map(|(id, meta)| (id.clone(), meta.clone()))
                .collect(),
        }
    }

    /// Objects having all bits of `scope`
    pub fn select_by_scope(&self, scope: Scope) -> MetaDataList {
        self.select(|m| m.scope().contains(scope))
    }

    /// Objects of a given [`STDPROP_TYPE`]
    pub fn select_by_type(&self, meta_type: &str) -> MetaDataList {
        self.select(|m| m.meta_type() == Some(meta_type))
    }

    /// Objects bound to at least one of the given tracks
    pub fn select_by_tracks(&self, tracks: &[TrackId]) -> MetaDataList {
        self.select(|m| m.tracks().iter().any(|t| tracks.contains(t)))
    }

    /// Positional objects overlapping `[first, last]`
    pub fn select_by_range(&self, first: SampleIndex, last: SampleIndex) -> MetaDataList {
        self.select(|m| m.is_positional() && m.first_sample() <= last && m.last_sample() >= first)
    }

    /// Position-scoped objects at exactly `pos`
    pub fn select_by_position(&self, pos: SampleIndex) -> MetaDataList {
        self.select(|m| m.scope().contains(Scope::POSITION) && m.first_sample() == pos)
    }

    /// Objects with a property equal to `value`
    pub fn select_by_value(&self, key: &str, value: &PropertyValue) -> MetaDataList {
        self.select(|m| m.get(key) == Some(value))
    }

    /// Objects that a delete or insert at `offset` on `edit` would change
    pub fn affected_from(&self, edit: EditTracks<'_>, offset: SampleIndex) -> MetaDataList {
        self.select(|m| edit.moves(m) && m.last_sample() >= offset)
    }

    /// Follow a deletion of `length` samples at `offset`
    ///
    /// Positions inside the range are removed, ranges lose the deleted part
    /// (and vanish if fully covered), everything behind moves left.
    pub fn delete_range(&mut self, edit: EditTracks<'_>, offset: SampleIndex, length: SampleIndex) {
        if length == 0 {
            return;
        }
        let first = offset;
        let last = offset + length - 1;
        let mut doomed = Vec::new();

        for (id, meta) in self.items.iter_mut() {
            if !edit.moves(meta) {
                continue;
            }
            let start = meta.first_sample();
            let end = meta.last_sample();
            if end < first {
                continue;
            }
            if start > last {
                meta.shift_left(length);
                continue;
            }
            if meta.scope().contains(Scope::POSITION) || (start >= first && end <= last) {
                doomed.push(id.clone());
                continue;
            }
            let new_start = start.min(first);
            let new_end = if end > last { end - length } else { first - 1 };
            meta.set(super::STDPROP_START, new_start);
            meta.set(super::STDPROP_END, new_end);
        }
        for id in doomed {
            self.items.remove(&id);
        }
    }

    /// Follow an insertion of `length` samples at `offset`
    pub fn shift_right(&mut self, edit: EditTracks<'_>, offset: SampleIndex, length: SampleIndex) {
        if length == 0 {
            return;
        }
        for meta in self.items.values_mut() {
            if !edit.moves(meta) {
                continue;
            }
            let start = meta.first_sample();
            let end = meta.last_sample();
            if start >= offset {
                meta.shift_right(length);
            } else if end >= offset && meta.scope().contains(Scope::RANGE) {
                meta.set(super::STDPROP_END, end + length);
            }
        }
    }

    /// Unbind a deleted track, dropping objects that end up without tracks
    pub fn delete_track(&mut self, track: TrackId) {
        let mut doomed = Vec::new();
        for (id, meta) in self.items.iter_mut() {
            let tracks = meta.tracks();
            if !tracks.contains(&track) {
                continue;
            }
            let remaining: Vec<TrackId> = tracks.into_iter().filter(|t| *t != track).collect();
            if remaining.is_empty() {
                doomed.push(id.clone());
            } else {
                meta.set_tracks(&remaining);
            }
        }
        for id in doomed {
            self.items.remove(&id);
        }
    }

    /// Objects bound to a track, as they would be affected by its deletion
    pub fn affected_by_track(&self, track: TrackId) -> MetaDataList {
        self.select_by_tracks(&[track])
    }

    /// Check if an object of the given type exists
    pub fn has_type(&self, meta_type: &str) -> bool {
        self.items.values().any(|m| m.text(STDPROP_TYPE) == Some(meta_type))
    }
}

impl FromIterator<MetaData> for MetaDataList {
    fn from_iter<I: IntoIterator<Item = MetaData>>(iter: I) -> Self {
        let mut list = MetaDataList::new();
        for meta in iter {
            list.add(meta);
        }
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{STDPROP_END, STDPROP_POS, STDPROP_START};

    fn position(pos: u64) -> MetaData {
        let mut meta = MetaData::new(Scope::POSITION);
        meta.set(STDPROP_POS, pos);
        meta
    }

    fn range(start: u64, end: u64) -> MetaData {
        let mut meta = MetaData::new(Scope::RANGE);
        meta.set(STDPROP_START, start);
        meta.set(STDPROP_END, end);
        meta
    }

    #[test]
    fn test_delete_range_rules() {
        let tracks = [TrackId::new()];
        let edit = EditTracks { tracks: &tracks, signal: &tracks };
        let before = position(50);
        let inside = position(150);
        let after = position(300);
        let overlap_left = range(80, 120);
        let overlap_right = range(180, 250);
        let covered = range(110, 190);
        let spanning = range(10, 400);

        let mut list: MetaDataList = [
            before.clone(),
            inside.clone(),
            after.clone(),
            overlap_left.clone(),
            overlap_right.clone(),
            covered.clone(),
            spanning.clone(),
        ]
        .into_iter()
        .collect();

        list.delete_range(edit, 100, 100);

        assert_eq!(list.get(before.id()).unwrap().first_sample(), 50);
        assert!(!list.contains(inside.id()));
        assert_eq!(list.get(after.id()).unwrap().first_sample(), 200);
        let l = list.get(overlap_left.id()).unwrap();
        assert_eq!((l.first_sample(), l.last_sample()), (80, 99));
        let r = list.get(overlap_right.id()).unwrap();
        assert_eq!((r.first_sample(), r.last_sample()), (100, 150));
        assert!(!list.contains(covered.id()));
        let s = list.get(spanning.id()).unwrap();
        assert_eq!((s.first_sample(), s.last_sample()), (10, 300));
    }

    #[test]
    fn test_shift_right_on_insert() {
        let tracks = [TrackId::new()];
        let edit = EditTracks { tracks: &tracks, signal: &tracks };
        let at = position(100);
        let straddle = range(50, 150);
        let before = position(99);
        let mut list: MetaDataList = [at.clone(), straddle.clone(), before.clone()].into_iter().collect();

        list.shift_right(edit, 100, 10);
        assert_eq!(list.get(at.id()).unwrap().first_sample(), 110);
        assert_eq!(list.get(straddle.id()).unwrap().last_sample(), 160);
        assert_eq!(list.get(before.id()).unwrap().first_sample(), 99);
    }

    #[test]
    fn test_unbound_objects_need_all_tracks() {
        let a = TrackId::new();
        let b = TrackId::new();
        let signal = [a, b];
        let label = position(100);
        let mut bound = position(100);
        bound.set_tracks(&[a]);
        let mut list: MetaDataList = [label.clone(), bound.clone()].into_iter().collect();

        list.shift_right(EditTracks { tracks: &[a], signal: &signal }, 0, 5);
        assert_eq!(list.get(label.id()).unwrap().first_sample(), 100);
        assert_eq!(list.get(bound.id()).unwrap().first_sample(), 105);

        list.shift_right(EditTracks { tracks: &signal, signal: &signal }, 0, 5);
        assert_eq!(list.get(label.id()).unwrap().first_sample(), 105);
    }

    #[test]
    fn test_delete_track_unbinds() {
        let a = TrackId::new();
        let b = TrackId::new();
        let mut both = MetaData::new(Scope::TRACK);
        both.set_tracks(&[a, b]);
        let mut only_a = MetaData::new(Scope::TRACK);
        only_a.set_tracks(&[a]);
        let mut list: MetaDataList = [both.clone(), only_a.clone()].into_iter().collect();

        assert_eq!(list.affected_by_track(a).len(), 2);
        list.delete_track(a);
        assert_eq!(list.get(both.id()).unwrap().tracks(), vec![b]);
        assert!(!list.contains(only_a.id()));
    }

    #[test]
    fn test_queries_return_copies() {
        let mut meta = position(5);
        meta.set(STDPROP_TYPE, "Marker");
        let mut list = MetaDataList::new();
        list.add(meta.clone());

        let mut copy = list.get(meta.id()).unwrap();
        copy.set(STDPROP_POS, 9u64);
        assert_eq!(list.get(meta.id()).unwrap().first_sample(), 5);

        assert_eq!(list.select_by_type("Marker").len(), 1);
        assert_eq!(list.select_by_position(5).len(), 1);
        assert_eq!(list.select_by_range(0, 4).len(), 0);
        assert_eq!(list.select_by_value(STDPROP_POS, &PropertyValue::UInt(5)).len(), 1);
        assert_eq!(list.select_by_scope(Scope::POSITION).len(), 1);
    }
}
