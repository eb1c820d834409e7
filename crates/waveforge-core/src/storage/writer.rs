//! Buffered sample writer for one track

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::track::Track;
use crate::types::{Sample, SampleIndex};

/// Block size of the writer's internal buffer
pub const WRITER_BUFFER_SIZE: usize = 16 * 1024;

/// Where written samples end up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertMode {
    /// Replace existing samples within `[left, right]`
    Overwrite,
    /// Grow the track at the write position
    Insert,
    /// Grow the track at its end
    Append,
}

/// Called after each flush with the mode, the offset and the sample count
pub type FlushCallback = Box<dyn FnMut(InsertMode, SampleIndex, SampleIndex) + Send>;

/// Buffered writer over `[left, right]` of a track
///
/// Buffered data reaches the track on [`flush`](Self::flush), when the
/// buffer is full, and when the writer is dropped.
pub struct SampleWriter {
    track: Track,
    mode: InsertMode,
    left: SampleIndex,
    right: SampleIndex,
    /// Absolute offset the buffer start will be written to
    position: SampleIndex,
    buffer: Vec<Sample>,
    written: SampleIndex,
    length_cell: Option<Arc<AtomicU64>>,
    on_flush: Option<FlushCallback>,
}

impl fmt::Debug for SampleWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleWriter")
            .field("track", &self.track.id())
            .field("mode", &self.mode)
            .field("left", &self.left)
            .field("right", &self.right)
            .field("position", &self.position)
            .field("written", &self.written)
            .finish()
    }
}

impl SampleWriter {
    pub fn new(track: Track, mode: InsertMode, left: SampleIndex, right: SampleIndex) -> Self {
        let position = match mode {
            InsertMode::Append => track.length(),
            _ => left,
        };
        Self {
            track,
            mode,
            left,
            right,
            position,
            buffer: Vec::with_capacity(WRITER_BUFFER_SIZE),
            written: 0,
            length_cell: None,
            on_flush: None,
        }
    }

    /// Attach a cell that tracks the number of inserted samples
    pub fn with_length_cell(mut self, cell: Arc<AtomicU64>) -> Self {
        self.length_cell = Some(cell);
        self
    }

    /// Attach a callback that is invoked after every flush
    pub fn with_flush_callback(mut self, callback: FlushCallback) -> Self {
        self.on_flush = Some(callback);
        self
    }

    pub fn mode(&self) -> InsertMode {
        self.mode
    }

    pub fn left(&self) -> SampleIndex {
        self.left
    }

    pub fn right(&self) -> SampleIndex {
        self.right
    }

    pub fn track(&self) -> &Track {
        &self.track
    }

    /// Samples accepted so far (including still buffered ones)
    pub fn written(&self) -> SampleIndex {
        self.written
    }

    /// Space left before the writer reaches `right` (overwrite mode only)
    ///
    /// Overwriting never grows the track, so the end of the track caps it too.
    fn capacity_left(&self) -> SampleIndex {
        match self.mode {
            InsertMode::Overwrite => {
                let end = self.right.saturating_add(1).min(self.track.length());
                let next = self.position + self.buffer.len() as SampleIndex;
                end.saturating_sub(next)
            }
            _ => SampleIndex::MAX,
        }
    }

    /// Check if an overwrite writer has reached `right`
    pub fn is_full(&self) -> bool {
        self.capacity_left() == 0
    }

    /// Accept samples, returns how many were taken
    pub fn write(&mut self, data: &[Sample]) -> usize {
        let take = (data.len() as SampleIndex).min(self.capacity_left()) as usize;
        let mut rest = &data[..take];
        while !rest.is_empty() {
            let room = WRITER_BUFFER_SIZE - self.buffer.len();
            let (now, later) = rest.split_at(room.min(rest.len()));
            self.buffer.extend_from_slice(now);
            rest = later;
            if self.buffer.len() >= WRITER_BUFFER_SIZE {
                self.flush();
            }
        }
        self.written += take as SampleIndex;
        take
    }

    /// Accept a single sample
    pub fn write_sample(&mut self, sample: Sample) -> bool {
        self.write(&[sample]) == 1
    }

    /// Hand buffered samples to the track
    pub fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let count = self.buffer.len() as SampleIndex;
        let offset = match self.mode {
            InsertMode::Overwrite => {
                self.track.write_samples(self.position, &self.buffer);
                self.position
            }
            InsertMode::Insert => {
                self.track.insert_samples(self.position, &self.buffer);
                self.position
            }
            InsertMode::Append => {
                let end = self.track.length();
                self.track.insert_samples(end, &self.buffer);
                end
            }
        };
        self.position = offset + count;
        self.buffer.clear();

        if self.mode != InsertMode::Overwrite {
            if let Some(cell) = &self.length_cell {
                cell.fetch_add(count, Ordering::AcqRel);
            }
        }
        if let Some(callback) = self.on_flush.as_mut() {
            callback(self.mode, offset, count);
        }
    }
}

impl Drop for SampleWriter {
    fn drop(&mut self) {
        self.flush();
    }
}
