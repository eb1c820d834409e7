//! File level information of a signal

use std::fmt;

use super::meta_data::{MetaData, PropertyValue, Scope, STDPROP_TYPE};
use crate::types::{SampleIndex, DEFAULT_BITS_PER_SAMPLE, DEFAULT_SAMPLE_RATE};

/// Metadata type of the file info object
pub const FILE_INFO_TYPE: &str = "FileInfo";

/// Fixed id, a signal has exactly one file info object
pub const FILE_INFO_ID: &str = "FILE_INFO";

/// Well known file properties
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileProperty {
    Name,
    Mimetype,
    Rate,
    Bits,
    Tracks,
    Length,
    Author,
    Copyright,
    Compression,
    Bitrate,
    Comments,
    Date,
    Genre,
    Software,
    Title,
}

impl FileProperty {
    /// Property key inside the metadata object
    pub fn key(self) -> &'static str {
        match self {
            Self::Name => "FILENAME",
            Self::Mimetype => "MIMETYPE",
            Self::Rate => "RATE",
            Self::Bits => "BITS",
            Self::Tracks => "TRACKS",
            Self::Length => "LENGTH",
            Self::Author => "AUTHOR",
            Self::Copyright => "COPYRIGHT",
            Self::Compression => "COMPRESSION",
            Self::Bitrate => "BITRATE",
            Self::Comments => "COMMENTS",
            Self::Date => "DATE",
            Self::Genre => "GENRE",
            Self::Software => "SOFTWARE",
            Self::Title => "TITLE",
        }
    }
}

impl fmt::Display for FileProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Signal-scoped metadata describing the file a signal came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    meta: MetaData,
}

impl Default for FileInfo {
    fn default() -> Self {
        let mut meta = MetaData::with_id(FILE_INFO_ID, Scope::SIGNAL);
        meta.set(STDPROP_TYPE, FILE_INFO_TYPE);
        let mut info = Self { meta };
        info.set_rate(DEFAULT_SAMPLE_RATE);
        info.set_bits(DEFAULT_BITS_PER_SAMPLE);
        info.set_tracks(0);
        info.set_length(0);
        info
    }
}

impl FileInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_meta(meta: MetaData) -> Option<Self> {
        (meta.meta_type() == Some(FILE_INFO_TYPE)).then_some(Self { meta })
    }

    pub fn get(&self, property: FileProperty) -> Option<&PropertyValue> {
        self.meta.get(property.key())
    }

    pub fn set(&mut self, property: FileProperty, value: impl Into<PropertyValue>) {
        self.meta.set(property.key(), value);
    }

    pub fn remove(&mut self, property: FileProperty) {
        self.meta.remove(property.key());
    }

    pub fn contains(&self, property: FileProperty) -> bool {
        self.meta.has(property.key())
    }

    /// Sample rate in Hz
    pub fn rate(&self) -> u64 {
        self.meta.uint(FileProperty::Rate.key()).unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    pub fn set_rate(&mut self, rate: u64) {
        self.set(FileProperty::Rate, rate);
    }

    pub fn bits(&self) -> u32 {
        self.meta
            .uint(FileProperty::Bits.key())
            .map_or(DEFAULT_BITS_PER_SAMPLE, |b| b as u32)
    }

    pub fn set_bits(&mut self, bits: u32) {
        self.set(FileProperty::Bits, bits as u64);
    }

    pub fn tracks(&self) -> usize {
        self.meta.uint(FileProperty::Tracks.key()).unwrap_or(0) as usize
    }

    pub fn set_tracks(&mut self, tracks: usize) {
        self.set(FileProperty::Tracks, tracks as u64);
    }

    pub fn length(&self) -> SampleIndex {
        self.meta.uint(FileProperty::Length.key()).unwrap_or(0)
    }

    pub fn set_length(&mut self, length: SampleIndex) {
        self.set(FileProperty::Length, length);
    }

    pub fn meta(&self) -> &MetaData {
        &self.meta
    }

    pub fn into_meta(self) -> MetaData {
        self.meta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let info = FileInfo::new();
        assert_eq!(info.rate(), 44100);
        assert_eq!(info.bits(), 16);
        assert_eq!(info.meta().id(), FILE_INFO_ID);
        assert_eq!(info.meta().scope(), Scope::SIGNAL);
    }

    #[test]
    fn test_free_form_properties() {
        let mut info = FileInfo::new();
        info.set(FileProperty::Author, "someone");
        info.set(FileProperty::Compression, "none");
        assert_eq!(
            info.get(FileProperty::Author),
            Some(&PropertyValue::Text("someone".into()))
        );
        info.remove(FileProperty::Compression);
        assert!(!info.contains(FileProperty::Compression));

        let restored = FileInfo::from_meta(info.clone().into_meta()).unwrap();
        assert_eq!(restored, info);
    }
}
