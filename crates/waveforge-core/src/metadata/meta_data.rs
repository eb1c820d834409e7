//! Single metadata object: scope, id and an ordered property bag

use std::collections::BTreeMap;
use std::fmt;
use std::ops::{BitAnd, BitOr};

use uuid::Uuid;

use crate::types::{SampleIndex, TrackId};

/// Type of the object, e.g. "Label" or "FileInfo"
pub const STDPROP_TYPE: &str = "STDPROP_TYPE";
/// Track ids the object is bound to
pub const STDPROP_TRACKS: &str = "STDPROP_TRACKS";
/// First sample of a range
pub const STDPROP_START: &str = "STDPROP_START";
/// Last sample of a range
pub const STDPROP_END: &str = "STDPROP_END";
/// Sample position
pub const STDPROP_POS: &str = "STDPROP_POS";
/// Human readable description
pub const STDPROP_DESCRIPTION: &str = "STDPROP_DESCRIPTION";

/// Value of a metadata property
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum PropertyValue {
    UInt(u64),
    Text(String),
    TextList(Vec<String>),
}

impl PropertyValue {
    pub fn as_uint(&self) -> Option<u64> {
        match self {
            PropertyValue::UInt(v) => Some(*v),
            PropertyValue::Text(s) => s.trim().parse().ok(),
            PropertyValue::TextList(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_text_list(&self) -> Option<&[String]> {
        match self {
            PropertyValue::TextList(list) => Some(list),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::UInt(v) => write!(f, "{v}"),
            PropertyValue::Text(s) => write!(f, "{s}"),
            PropertyValue::TextList(list) => write!(f, "{}", list.join(", ")),
        }
    }
}

impl From<u64> for PropertyValue {
    fn from(value: u64) -> Self {
        PropertyValue::UInt(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Text(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Text(value)
    }
}

impl From<Vec<String>> for PropertyValue {
    fn from(value: Vec<String>) -> Self {
        PropertyValue::TextList(value)
    }
}

/// What part of a signal a metadata object refers to (bitmask)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Scope(u32);

impl Scope {
    pub const NONE: Scope = Scope(0);
    pub const SIGNAL: Scope = Scope(1);
    pub const TRACK: Scope = Scope(2);
    pub const RANGE: Scope = Scope(4);
    pub const POSITION: Scope = Scope(8);
    pub const ALL: Scope = Scope(!0);

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn from_bits(bits: u32) -> Self {
        Scope(bits)
    }

    /// Check if all bits of `other` are set
    pub const fn contains(self, other: Scope) -> bool {
        self.0 & other.0 == other.0
    }

    /// Check if any bit of `other` is set
    pub const fn intersects(self, other: Scope) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for Scope {
    type Output = Scope;

    fn bitor(self, rhs: Scope) -> Scope {
        Scope(self.0 | rhs.0)
    }
}

impl BitAnd for Scope {
    type Output = Scope;

    fn bitand(self, rhs: Scope) -> Scope {
        Scope(self.0 & rhs.0)
    }
}

/// A keyed property bag with a scope and a unique id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaData {
    id: String,
    scope: Scope,
    properties: BTreeMap<String, PropertyValue>,
}

impl MetaData {
    /// Create an empty object with a fresh unique id
    pub fn new(scope: Scope) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), scope)
    }

    pub fn with_id(id: impl Into<String>, scope: Scope) -> Self {
        Self {
            id: id.into(),
            scope,
            properties: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn set_scope(&mut self, scope: Scope) {
        self.scope = scope;
    }

    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<PropertyValue>) {
        self.properties.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<PropertyValue> {
        self.properties.remove(key)
    }

    pub fn has(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    pub fn properties(&self) -> &BTreeMap<String, PropertyValue> {
        &self.properties
    }

    pub fn is_null(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn uint(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(PropertyValue::as_uint)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(PropertyValue::as_text)
    }

    /// Value of [`STDPROP_TYPE`]
    pub fn meta_type(&self) -> Option<&str> {
        self.text(STDPROP_TYPE)
    }

    /// Check if the properties required by the scope are present
    pub fn is_valid(&self) -> bool {
        if self.scope.contains(Scope::POSITION) && self.uint(STDPROP_POS).is_none() {
            return false;
        }
        if self.scope.contains(Scope::RANGE) {
            match (self.uint(STDPROP_START), self.uint(STDPROP_END)) {
                (Some(start), Some(end)) if start <= end => {}
                _ => return false,
            }
        }
        if self.scope.contains(Scope::TRACK) && self.tracks().is_empty() {
            return false;
        }
        true
    }

    /// First sample covered by the object
    pub fn first_sample(&self) -> SampleIndex {
        if self.scope.contains(Scope::POSITION) {
            self.uint(STDPROP_POS).unwrap_or(0)
        } else if self.scope.contains(Scope::RANGE) {
            self.uint(STDPROP_START).unwrap_or(0)
        } else {
            0
        }
    }

    /// Last sample covered by the object
    pub fn last_sample(&self) -> SampleIndex {
        if self.scope.contains(Scope::POSITION) {
            self.uint(STDPROP_POS).unwrap_or(0)
        } else if self.scope.contains(Scope::RANGE) {
            self.uint(STDPROP_END).unwrap_or(0)
        } else {
            SampleIndex::MAX
        }
    }

    /// Whether the object sits on the time axis (position or range)
    pub fn is_positional(&self) -> bool {
        self.scope.intersects(Scope::POSITION | Scope::RANGE)
    }

    /// Track ids listed in [`STDPROP_TRACKS`]
    pub fn tracks(&self) -> Vec<TrackId> {
        self.get(STDPROP_TRACKS)
            .and_then(PropertyValue::as_text_list)
            .map(|list| list.iter().filter_map(|s| TrackId::parse(s)).collect())
            .unwrap_or_default()
    }

    /// Bind the object to a set of tracks (an empty set unbinds it)
    pub fn set_tracks(&mut self, tracks: &[TrackId]) {
        if tracks.is_empty() {
            self.remove(STDPROP_TRACKS);
        } else {
            let list: Vec<String> = tracks.iter().map(ToString::to_string).collect();
            self.set(STDPROP_TRACKS, list);
        }
    }

    pub fn is_bound_to_tracks(&self) -> bool {
        self.has(STDPROP_TRACKS)
    }

    pub(crate) fn shift_left(&mut self, length: SampleIndex) {
        self.shift_by(|v| v.saturating_sub(length));
    }

    pub(crate) fn shift_right(&mut self, length: SampleIndex) {
        self.shift_by(|v| v.saturating_add(length));
    }

    fn shift_by(&mut self, f: impl Fn(u64) -> u64) {
        for key in [STDPROP_POS, STDPROP_START, STDPROP_END] {
            if let Some(v) = self.uint(key) {
                self.set(key, f(v));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_bits() {
        let scope = Scope::RANGE | Scope::TRACK;
        assert!(scope.contains(Scope::RANGE));
        assert!(!scope.contains(Scope::POSITION));
        assert!(Scope::ALL.contains(scope));
        assert_eq!(Scope::POSITION.bits(), 8);
    }

    #[test]
    fn test_validity_by_scope() {
        let mut meta = MetaData::new(Scope::POSITION);
        assert!(!meta.is_valid());
        meta.set(STDPROP_POS, 10u64);
        assert!(meta.is_valid());
        assert_eq!(meta.first_sample(), 10);
        assert_eq!(meta.last_sample(), 10);

        let mut range = MetaData::new(Scope::RANGE);
        range.set(STDPROP_START, 20u64);
        range.set(STDPROP_END, 10u64);
        assert!(!range.is_valid());
        range.set(STDPROP_END, 30u64);
        assert!(range.is_valid());
    }

    #[test]
    fn test_track_binding() {
        let id = TrackId::new();
        let mut meta = MetaData::new(Scope::TRACK);
        assert!(!meta.is_valid());
        meta.set_tracks(&[id]);
        assert_eq!(meta.tracks(), vec![id]);
        assert!(meta.is_valid());
        meta.set_tracks(&[]);
        assert!(!meta.is_bound_to_tracks());
    }

    #[test]
    fn test_unique_ids() {
        assert_ne!(MetaData::new(Scope::NONE).id(), MetaData::new(Scope::NONE).id());
    }
}
