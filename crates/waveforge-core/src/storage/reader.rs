//! Sample reader over a snapshot of a track range

use std::collections::VecDeque;

use super::stripe::Stripe;
use crate::types::{Sample, SampleIndex};

/// How a reader walks its range and what it keeps in memory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderMode {
    /// Front to back, stripes are released once consumed
    SinglePassForward,
    /// Back to front, stripes are released once consumed
    SinglePassReverse,
    /// Keeps every stripe and supports arbitrary seeking
    FullSnapshot,
}

impl ReaderMode {
    pub fn is_single_pass(self) -> bool {
        !matches!(self, ReaderMode::FullSnapshot)
    }
}

/// A stripe captured by a reader together with its absolute start
#[derive(Debug, Clone)]
pub struct StripeRef {
    start: SampleIndex,
    stripe: Stripe,
}

impl StripeRef {
    pub fn new(start: SampleIndex, stripe: Stripe) -> Self {
        Self { start, stripe }
    }

    #[inline]
    fn end(&self) -> SampleIndex {
        self.start + self.stripe.len() as SampleIndex
    }
}

/// Streaming reader over the inclusive range `[first, last]` of one track
///
/// The reader holds clones of the overlapping stripes, so it never sees
/// edits made after it was opened and never blocks the track.
#[derive(Debug)]
pub struct SampleReader {
    mode: ReaderMode,
    first: SampleIndex,
    last: SampleIndex,
    length: SampleIndex,
    /// Samples delivered so far (in reading direction)
    done: SampleIndex,
    stripes: VecDeque<StripeRef>,
}

impl SampleReader {
    pub(crate) fn new(
        mode: ReaderMode,
        first: SampleIndex,
        last: SampleIndex,
        stripes: Vec<StripeRef>,
    ) -> Self {
        Self {
            mode,
            first,
            last,
            length: last - first + 1,
            done: 0,
            stripes: stripes.into(),
        }
    }

    /// A reader that is at its end from the start
    pub(crate) fn empty(mode: ReaderMode, first: SampleIndex) -> Self {
        Self {
            mode,
            first,
            last: first,
            length: 0,
            done: 0,
            stripes: VecDeque::new(),
        }
    }

    pub fn mode(&self) -> ReaderMode {
        self.mode
    }

    pub fn first(&self) -> SampleIndex {
        self.first
    }

    pub fn last(&self) -> SampleIndex {
        self.last
    }

    /// Number of samples in the reader's range
    pub fn len(&self) -> SampleIndex {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Check if all samples have been delivered
    #[inline]
    pub fn eof(&self) -> bool {
        self.done >= self.length
    }

    /// Absolute offset of the next sample to be delivered
    ///
    /// For a reverse reader this counts down from `last`; at its end it
    /// reports `first`.
    pub fn position(&self) -> SampleIndex {
        match self.mode {
            ReaderMode::SinglePassReverse => {
                if self.eof() {
                    self.first
                } else {
                    self.last - self.done
                }
            }
            _ => self.first + self.done,
        }
    }

    /// Reading progress in percent
    pub fn progress(&self) -> f64 {
        if self.length == 0 {
            return 100.0;
        }
        self.done as f64 * 100.0 / self.length as f64
    }

    /// Value at an absolute position, silence if no stripe covers it
    fn sample_at(&self, pos: SampleIndex) -> Sample {
        let index = self.stripes.partition_point(|r| r.end() <= pos);
        match self.stripes.get(index) {
            Some(r) if r.start <= pos => r.stripe.samples()[(pos - r.start) as usize],
            _ => 0,
        }
    }

    /// Drop stripes a single-pass reader can never visit again
    fn release_consumed(&mut self) {
        match self.mode {
            ReaderMode::FullSnapshot => {}
            ReaderMode::SinglePassForward => {
                let next = self.first + self.done;
                while self.stripes.front().is_some_and(|r| r.end() <= next) {
                    self.stripes.pop_front();
                }
            }
            ReaderMode::SinglePassReverse => {
                if self.eof() {
                    self.stripes.clear();
                    return;
                }
                let next = self.last - self.done;
                while self.stripes.back().is_some_and(|r| r.start > next) {
                    self.stripes.pop_back();
                }
            }
        }
    }

    /// Fill `buf` with the next samples, returns the number delivered
    pub fn read(&mut self, buf: &mut [Sample]) -> usize {
        let wanted = (buf.len() as SampleIndex).min(self.length - self.done.min(self.length)) as usize;
        let mut filled = 0usize;
        while filled < wanted {
            let n = match self.mode {
                ReaderMode::SinglePassReverse => self.read_backwards(&mut buf[filled..wanted]),
                _ => self.read_forwards(&mut buf[filled..wanted]),
            };
            filled += n;
            self.done += n as SampleIndex;
            self.release_consumed();
        }
        filled
    }

    fn read_forwards(&self, buf: &mut [Sample]) -> usize {
        let pos = self.first + self.done;
        let index = self.stripes.partition_point(|r| r.end() <= pos);
        match self.stripes.get(index) {
            Some(r) if r.start <= pos => {
                let inner = (pos - r.start) as usize;
                let n = buf.len().min(r.stripe.len() - inner);
                buf[..n].copy_from_slice(&r.stripe.samples()[inner..inner + n]);
                n
            }
            next => {
                // Uncovered gap reads as silence up to the next stripe
                let gap_end = next.map_or(SampleIndex::MAX, |r| r.start);
                let n = (buf.len() as SampleIndex).min(gap_end - pos) as usize;
                buf[..n].fill(0);
                n
            }
        }
    }

    fn read_backwards(&self, buf: &mut [Sample]) -> usize {
        let pos = self.last - self.done;
        let index = self.stripes.partition_point(|r| r.end() <= pos);
        match self.stripes.get(index) {
            Some(r) if r.start <= pos => {
                let inner = (pos - r.start) as usize;
                let n = buf.len().min(inner + 1);
                let src = &r.stripe.samples()[inner + 1 - n..=inner];
                for (dst, &sample) in buf[..n].iter_mut().zip(src.iter().rev()) {
                    *dst = sample;
                }
                n
            }
            _ => {
                buf[0] = 0;
                1
            }
        }
    }

    /// Deliver a single sample
    pub fn read_sample(&mut self) -> Option<Sample> {
        if self.eof() {
            return None;
        }
        let pos = self.position();
        let sample = self.sample_at(pos);
        self.done += 1;
        self.release_consumed();
        Some(sample)
    }

    /// Skip `count` samples in reading direction
    pub fn skip(&mut self, count: SampleIndex) {
        self.done = self.done.saturating_add(count).min(self.length);
        self.release_consumed();
    }

    fn rewind_to(&mut self, done: SampleIndex) -> bool {
        let done = done.min(self.length);
        if self.mode.is_single_pass() && done < self.done {
            return false;
        }
        self.done = done;
        self.release_consumed();
        true
    }

    /// Move to an absolute position
    ///
    /// Single-pass readers cannot go back to data they already released and
    /// return `false` in that case without moving.
    pub fn seek(&mut self, pos: SampleIndex) -> bool {
        let done = match self.mode {
            ReaderMode::SinglePassReverse => {
                if pos > self.last {
                    0
                } else if pos < self.first {
                    self.length
                } else {
                    self.last - pos
                }
            }
            _ => pos.clamp(self.first, self.first + self.length) - self.first,
        };
        self.rewind_to(done)
    }

    /// Go back to the start of the range (snapshot readers only)
    pub fn reset(&mut self) -> bool {
        self.rewind_to(0)
    }

    /// Number of stripes still held by this reader
    pub fn held_stripes(&self) -> usize {
        self.stripes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::storage::track::{StripeLimits, Track};
    use crate::types::TrackId;

    fn striped_track(len: usize) -> Track {
        let limits = StripeLimits {
            minimum: 2,
            maximum: 8,
        };
        let track = Track::with_limits(TrackId::new(), 0, limits);
        let samples: Vec<Sample> = (0..len as Sample).collect();
        track.insert_samples(0, &samples);
        track
    }

    #[test]
    fn test_forward_read_in_blocks() {
        let track = striped_track(30);
        let mut reader = track.open_reader(ReaderMode::SinglePassForward, 5, 24);
        assert_eq!(reader.len(), 20);

        let mut buf = [0; 7];
        let mut out = Vec::new();
        loop {
            let n = reader.read(&mut buf);
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        assert_eq!(out, (5..25).collect::<Vec<Sample>>());
        assert!(reader.eof());
        assert_eq!(reader.held_stripes(), 0);
    }

    #[test]
    fn test_reverse_read() {
        let track = striped_track(20);
        let mut reader = track.open_reader(ReaderMode::SinglePassReverse, 3, 12);
        let mut buf = [0; 4];
        let mut out = Vec::new();
        while !reader.eof() {
            let n = reader.read(&mut buf);
            out.extend_from_slice(&buf[..n]);
        }
        assert_eq!(out, (3..13).rev().collect::<Vec<Sample>>());
        assert_eq!(reader.position(), 3);
    }

    #[test]
    fn test_snapshot_isolated_from_edits() {
        let track = striped_track(16);
        let mut reader = track.open_reader(ReaderMode::FullSnapshot, 0, 15);
        track.delete_range(0, 8);
        track.write_samples(0, &[100; 8]);

        let mut buf = [0; 16];
        assert_eq!(reader.read(&mut buf), 16);
        assert_eq!(buf.to_vec(), (0..16).collect::<Vec<Sample>>());
    }

    #[test]
    fn test_seek_rules() {
        let track = striped_track(20);

        let mut snapshot = track.open_reader(ReaderMode::FullSnapshot, 0, 19);
        snapshot.skip(15);
        assert!(snapshot.seek(4));
        assert_eq!(snapshot.read_sample(), Some(4));
        assert!(snapshot.reset());
        assert_eq!(snapshot.position(), 0);

        let mut single = track.open_reader(ReaderMode::SinglePassForward, 0, 19);
        single.skip(10);
        assert!(!single.seek(2));
        assert_eq!(single.position(), 10);
        assert!(single.seek(12));
        assert_eq!(single.read_sample(), Some(12));
    }

    #[test]
    fn test_range_clamped_to_track() {
        let track = striped_track(10);
        let reader = track.open_reader(ReaderMode::SinglePassForward, 5, 100);
        assert_eq!(reader.last(), 9);
        assert_eq!(reader.len(), 5);

        let empty = track.open_reader(ReaderMode::SinglePassForward, 50, 60);
        assert!(empty.eof());
        assert_eq!(empty.progress(), 100.0);
    }

    #[test]
    fn test_progress() {
        let track = striped_track(10);
        let mut reader = track.open_reader(ReaderMode::FullSnapshot, 0, 9);
        reader.skip(5);
        assert!((reader.progress() - 50.0).abs() < f64::EPSILON);
    }
}
