//! Common types for Waveforge
//!
//! This module contains the fundamental sample types used throughout the
//! editing engine: the integer sample representation, sample offsets, track
//! identities and the selection range.

use std::fmt;

use uuid::Uuid;

/// Number of significant bits in a [`Sample`]
pub const SAMPLE_BITS: u32 = 24;

/// Smallest valid sample value
pub const SAMPLE_MIN: Sample = -(1 << (SAMPLE_BITS - 1));

/// Largest valid sample value
pub const SAMPLE_MAX: Sample = (1 << (SAMPLE_BITS - 1)) - 1;

/// Size of one stored sample in bytes, used for undo memory accounting
pub const SAMPLE_STORAGE_BYTES: usize = std::mem::size_of::<Sample>();

/// Default sample rate for new signals (Hz)
pub const DEFAULT_SAMPLE_RATE: u64 = 44100;

/// Default resolution for new signals (bits per sample)
pub const DEFAULT_BITS_PER_SAMPLE: u32 = 16;

/// Audio sample type (24-bit range stored in a 32-bit word)
pub type Sample = i32;

/// Sample offset / sample count type
pub type SampleIndex = u64;

/// Clamp a wide intermediate value into the valid sample range
#[inline]
pub fn clamp_sample(value: i64) -> Sample {
    value.clamp(SAMPLE_MIN as i64, SAMPLE_MAX as i64) as Sample
}

/// Convert a sample to a float in the range [-1.0, +1.0)
#[inline]
pub fn sample_to_float(sample: Sample) -> f32 {
    sample as f32 / (1 << (SAMPLE_BITS - 1)) as f32
}

/// Convert a sample to a double in the range [-1.0, +1.0)
#[inline]
pub fn sample_to_double(sample: Sample) -> f64 {
    sample as f64 / (1 << (SAMPLE_BITS - 1)) as f64
}

/// Convert a float in the range [-1.0, +1.0] to a sample (clamped)
#[inline]
pub fn float_to_sample(value: f32) -> Sample {
    double_to_sample(value as f64)
}

/// Convert a double in the range [-1.0, +1.0] to a sample (clamped)
#[inline]
pub fn double_to_sample(value: f64) -> Sample {
    let scaled = (value * (1 << (SAMPLE_BITS - 1)) as f64).round();
    clamp_sample(scaled as i64)
}

/// Convert a sample count into milliseconds at the given rate
pub fn samples_to_ms(samples: SampleIndex, rate: f64) -> f64 {
    if rate <= 0.0 {
        return 0.0;
    }
    samples as f64 * 1000.0 / rate
}

/// Stable identity of a track
///
/// Survives reordering and deletion so undo actions and metadata can
/// address a track independently of its current index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackId(Uuid);

impl TrackId {
    /// Create a new random track identity
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a track identity from its string form
    pub fn parse(text: &str) -> Option<Self> {
        Uuid::parse_str(text).ok().map(Self)
    }
}

impl Default for TrackId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The active sample range of a signal
///
/// A length of zero means "nothing selected"; the offset then marks the
/// cursor position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Selection {
    offset: SampleIndex,
    length: SampleIndex,
}

impl Selection {
    /// Create a selection from offset and length
    pub fn new(offset: SampleIndex, length: SampleIndex) -> Self {
        Self { offset, length }
    }

    /// Start of the selection
    #[inline]
    pub fn offset(&self) -> SampleIndex {
        self.offset
    }

    /// Number of selected samples
    #[inline]
    pub fn length(&self) -> SampleIndex {
        self.length
    }

    /// First selected sample
    #[inline]
    pub fn first(&self) -> SampleIndex {
        self.offset
    }

    /// Last selected sample (equals the offset if nothing is selected)
    #[inline]
    pub fn last(&self) -> SampleIndex {
        self.offset + self.length.saturating_sub(1)
    }

    /// Check if nothing is selected
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Check if a sample position lies inside the selection
    pub fn contains(&self, pos: SampleIndex) -> bool {
        !self.is_empty() && pos >= self.first() && pos <= self.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_range() {
        assert_eq!(SAMPLE_MIN, -8_388_608);
        assert_eq!(SAMPLE_MAX, 8_388_607);
        assert_eq!(clamp_sample(i64::MAX), SAMPLE_MAX);
        assert_eq!(clamp_sample(i64::MIN), SAMPLE_MIN);
    }

    #[test]
    fn test_float_conversion() {
        assert_eq!(double_to_sample(0.0), 0);
        assert_eq!(double_to_sample(2.0), SAMPLE_MAX);
        assert_eq!(double_to_sample(-2.0), SAMPLE_MIN);
        assert!((sample_to_double(double_to_sample(0.5)) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_selection_bounds() {
        let sel = Selection::new(100, 100);
        assert_eq!(sel.first(), 100);
        assert_eq!(sel.last(), 199);
        assert!(sel.contains(150));
        assert!(!sel.contains(200));

        let cursor = Selection::new(42, 0);
        assert!(cursor.is_empty());
        assert_eq!(cursor.last(), 42);
        assert!(!cursor.contains(42));
    }

    #[test]
    fn test_track_id_roundtrip() {
        let id = TrackId::new();
        assert_eq!(TrackId::parse(&id.to_string()), Some(id));
        assert_ne!(TrackId::new(), id);
    }
}
