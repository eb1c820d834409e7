//! Track - ordered list of stripes covering `[0, length)`

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::reader::{ReaderMode, SampleReader, StripeRef};
use super::stripe::Stripe;
use crate::types::{Sample, SampleIndex, TrackId};

/// Stripes shorter than this are merged with a neighbour after an edit
pub const STRIPE_LENGTH_MINIMUM: usize = 16 * 1024;

/// Upper bound for a single stripe (4M samples = 16 MB)
pub const STRIPE_LENGTH_MAXIMUM: usize = 4 * 1024 * 1024;

/// Stripe size policy of a track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StripeLimits {
    /// Stripes below this length get merged with a neighbour if possible
    pub minimum: usize,
    /// No stripe grows beyond this length
    pub maximum: usize,
}

impl Default for StripeLimits {
    fn default() -> Self {
        Self {
            minimum: STRIPE_LENGTH_MINIMUM,
            maximum: STRIPE_LENGTH_MAXIMUM,
        }
    }
}

#[derive(Debug, Default)]
struct TrackData {
    stripes: Vec<Stripe>,
    limits: StripeLimits,
    selected: bool,
}

impl TrackData {
    fn length(&self) -> SampleIndex {
        self.stripes.iter().map(|s| s.len() as SampleIndex).sum()
    }

    /// Make sure a stripe boundary exists at `offset`
    ///
    /// Returns the index of the first stripe starting at or after `offset`.
    fn split_at(&mut self, offset: SampleIndex) -> usize {
        let mut start: SampleIndex = 0;
        for index in 0..self.stripes.len() {
            if offset == start {
                return index;
            }
            let len = self.stripes[index].len() as SampleIndex;
            if offset < start + len {
                let tail = self.stripes[index].split_off((offset - start) as usize);
                self.stripes.insert(index + 1, tail);
                return index + 1;
            }
            start += len;
        }
        self.stripes.len()
    }

    /// Chop sample data into stripes of at most `limits.maximum` samples
    fn chunk(&self, data: &[Sample]) -> Vec<Stripe> {
        data.chunks(self.limits.maximum.max(1))
            .map(|chunk| Stripe::from_samples(chunk.to_vec()))
            .collect()
    }

    fn zero_stripes(&self, mut length: SampleIndex) -> Vec<Stripe> {
        let maximum = self.limits.maximum.max(1) as SampleIndex;
        let mut stripes = Vec::new();
        while length > 0 {
            let n = length.min(maximum);
            stripes.push(Stripe::zeroed(n as usize));
            length -= n;
        }
        stripes
    }

    /// Drop empty stripes and merge short neighbours
    fn normalize(&mut self) {
        self.stripes.retain(|s| !s.is_empty());
        let mut index = 0;
        while index + 1 < self.stripes.len() {
            let a = self.stripes[index].len();
            let b = self.stripes[index + 1].len();
            let short = a < self.limits.minimum || b < self.limits.minimum;
            if short && a + b <= self.limits.maximum {
                let next = self.stripes.remove(index + 1);
                self.stripes[index].append(&next);
            } else {
                index += 1;
            }
        }
    }

    fn delete_range(&mut self, offset: SampleIndex, length: SampleIndex) -> SampleIndex {
        let total = self.length();
        if offset >= total || length == 0 {
            return 0;
        }
        let length = length.min(total - offset);
        let from = self.split_at(offset);
        let to = self.split_at(offset + length);
        self.stripes.drain(from..to);
        self.normalize();
        length
    }

    fn insert_stripes(&mut self, offset: SampleIndex, stripes: Vec<Stripe>) {
        let offset = offset.min(self.length());
        let index = self.split_at(offset);
        self.stripes.splice(index..index, stripes);
        self.normalize();
    }

    fn write_samples(&mut self, offset: SampleIndex, data: &[Sample]) {
        let total = self.length();
        if offset > total {
            let gap = self.zero_stripes(offset - total);
            self.stripes.extend(gap);
        }
        let total = self.length();
        let inside = (data.len() as SampleIndex).min(total - offset) as usize;

        let mut start: SampleIndex = 0;
        let mut done = 0usize;
        for stripe in self.stripes.iter_mut() {
            if done >= inside {
                break;
            }
            let len = stripe.len() as SampleIndex;
            let pos = offset + done as SampleIndex;
            if pos < start + len {
                let n = stripe.overwrite((pos - start) as usize, &data[done..inside]);
                done += n;
            }
            start += len;
        }

        if inside < data.len() {
            let tail = self.chunk(&data[inside..]);
            self.stripes.extend(tail);
        }
        self.normalize();
    }

    fn read_samples(&self, offset: SampleIndex, buf: &mut [Sample]) -> usize {
        let mut start: SampleIndex = 0;
        let mut done = 0usize;
        for stripe in &self.stripes {
            if done >= buf.len() {
                break;
            }
            let len = stripe.len() as SampleIndex;
            let pos = offset + done as SampleIndex;
            if pos < start + len {
                let inner = (pos - start) as usize;
                let n = (buf.len() - done).min(stripe.len() - inner);
                buf[done..done + n].copy_from_slice(&stripe.samples()[inner..inner + n]);
                done += n;
            }
            start += len;
        }
        done
    }

    fn snapshot(&self, first: SampleIndex, last: SampleIndex) -> Vec<StripeRef> {
        let mut refs = Vec::new();
        let mut start: SampleIndex = 0;
        for stripe in &self.stripes {
            let end = start + stripe.len() as SampleIndex;
            if end > first && start <= last {
                refs.push(StripeRef::new(start, stripe.clone()));
            }
            if start > last {
                break;
            }
            start = end;
        }
        refs
    }
}

/// A single track of sample data
///
/// `Track` is a handle: clones share the same stripes, so writers can keep
/// working on a track after the signal manager lock has been released.
#[derive(Debug, Clone)]
pub struct Track {
    id: TrackId,
    data: Arc<RwLock<TrackData>>,
}

impl Track {
    /// Create a silent track of the given length
    pub fn new(length: SampleIndex) -> Self {
        Self::with_id(TrackId::new(), length)
    }

    /// Create a silent track with a given identity
    pub fn with_id(id: TrackId, length: SampleIndex) -> Self {
        Self::with_limits(id, length, StripeLimits::default())
    }

    /// Create a silent track with a custom stripe size policy
    pub fn with_limits(id: TrackId, length: SampleIndex, limits: StripeLimits) -> Self {
        let mut data = TrackData {
            stripes: Vec::new(),
            limits,
            selected: true,
        };
        data.stripes = data.zero_stripes(length);
        Self {
            id,
            data: Arc::new(RwLock::new(data)),
        }
    }

    /// Create a track from existing sample data
    pub fn from_samples(id: TrackId, samples: &[Sample]) -> Self {
        let track = Self::with_id(id, 0);
        track.insert_samples(0, samples);
        track
    }

    fn read(&self) -> RwLockReadGuard<'_, TrackData> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, TrackData> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stable identity of this track
    pub fn id(&self) -> TrackId {
        self.id
    }

    /// Track length in samples
    pub fn length(&self) -> SampleIndex {
        self.read().length()
    }

    /// Whether the track is part of the track selection
    pub fn is_selected(&self) -> bool {
        self.read().selected
    }

    /// Select or deselect the track
    pub fn set_selected(&self, selected: bool) {
        self.write().selected = selected;
    }

    /// Number of stripes the track currently consists of
    pub fn stripe_count(&self) -> usize {
        self.read().stripes.len()
    }

    /// `(start, length)` of every stripe, in order
    pub fn stripe_spans(&self) -> Vec<(SampleIndex, SampleIndex)> {
        let data = self.read();
        let mut start: SampleIndex = 0;
        data.stripes
            .iter()
            .map(|s| {
                let span = (start, s.len() as SampleIndex);
                start += s.len() as SampleIndex;
                span
            })
            .collect()
    }

    /// Delete a range, clamped to the track bounds
    ///
    /// Returns the number of samples actually removed.
    pub fn delete_range(&self, offset: SampleIndex, length: SampleIndex) -> SampleIndex {
        self.write().delete_range(offset, length)
    }

    /// Insert silence at `offset` (clamped to the track end)
    pub fn insert_space(&self, offset: SampleIndex, length: SampleIndex) {
        if length == 0 {
            return;
        }
        let mut data = self.write();
        let stripes = data.zero_stripes(length);
        data.insert_stripes(offset, stripes);
    }

    /// Insert sample data at `offset` (clamped to the track end)
    pub fn insert_samples(&self, offset: SampleIndex, samples: &[Sample]) {
        if samples.is_empty() {
            return;
        }
        let mut data = self.write();
        let stripes = data.chunk(samples);
        data.insert_stripes(offset, stripes);
    }

    /// Overwrite samples at `offset`, growing the track if the data runs
    /// past its end
    pub fn write_samples(&self, offset: SampleIndex, samples: &[Sample]) {
        if samples.is_empty() {
            return;
        }
        self.write().write_samples(offset, samples);
    }

    /// Copy samples starting at `offset` into `buf`, returns the count read
    pub fn read_samples(&self, offset: SampleIndex, buf: &mut [Sample]) -> usize {
        self.read().read_samples(offset, buf)
    }

    /// Copy a range of samples into a new vector (clamped to the track)
    pub fn read_range(&self, offset: SampleIndex, length: SampleIndex) -> Vec<Sample> {
        let data = self.read();
        let total = data.length();
        if offset >= total {
            return Vec::new();
        }
        let mut buf = vec![0; length.min(total - offset) as usize];
        let n = data.read_samples(offset, &mut buf);
        buf.truncate(n);
        buf
    }

    /// Open a reader over the inclusive range `[first, last]`
    ///
    /// The reader works on a copy-on-write snapshot of the stripes, so
    /// edits made after this call are not visible to it.
    pub fn open_reader(&self, mode: ReaderMode, first: SampleIndex, last: SampleIndex) -> SampleReader {
        let data = self.read();
        let total = data.length();
        if total == 0 || first > last || first >= total {
            return SampleReader::empty(mode, first);
        }
        let last = last.min(total - 1);
        SampleReader::new(mode, first, last, data.snapshot(first, last))
    }
}
