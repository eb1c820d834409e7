//! Lockstep reader over several tracks

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam::channel::Sender;

use crate::events::ProgressUpdate;
use crate::pipeline::SampleSource;
use crate::storage::SampleReader;
use crate::types::{Sample, SampleIndex};

/// One [`SampleReader`] per track, all over the same range
///
/// Every read advances all tracks by the same amount. The stream ends as
/// soon as any track reaches its end.
#[derive(Debug)]
pub struct MultiTrackReader {
    readers: Vec<SampleReader>,
    track_indices: Vec<usize>,
    first: SampleIndex,
    last: SampleIndex,
    canceled: Arc<AtomicBool>,
    progress_tx: Option<Sender<ProgressUpdate>>,
    last_percent: Option<u32>,
}

impl MultiTrackReader {
    pub fn new(first: SampleIndex, last: SampleIndex) -> Self {
        Self {
            readers: Vec::new(),
            track_indices: Vec::new(),
            first,
            last,
            canceled: Arc::new(AtomicBool::new(false)),
            progress_tx: None,
            last_percent: None,
        }
    }

    /// Add the reader of the track at `track_index`
    pub fn push(&mut self, track_index: usize, reader: SampleReader) {
        self.track_indices.push(track_index);
        self.readers.push(reader);
    }

    /// Send progress changes to a channel
    pub fn set_progress_sender(&mut self, tx: Sender<ProgressUpdate>) {
        self.progress_tx = Some(tx);
    }

    /// Number of tracks, zero means there is nothing to read
    pub fn tracks(&self) -> usize {
        self.readers.len()
    }

    /// Signal track index of every reader, in reader order
    pub fn track_indices(&self) -> &[usize] {
        &self.track_indices
    }

    pub fn first(&self) -> SampleIndex {
        self.first
    }

    pub fn last(&self) -> SampleIndex {
        self.last
    }

    pub fn reader_mut(&mut self, index: usize) -> Option<&mut SampleReader> {
        self.readers.get_mut(index)
    }

    pub fn readers_mut(&mut self) -> &mut [SampleReader] {
        &mut self.readers
    }

    /// True as soon as any track has reached its end
    pub fn eof(&self) -> bool {
        self.readers.is_empty() || self.readers.iter().any(SampleReader::eof)
    }

    /// Position of the first track (all tracks move together)
    pub fn position(&self) -> SampleIndex {
        self.readers.first().map_or(self.first, SampleReader::position)
    }

    pub fn skip(&mut self, count: SampleIndex) {
        for reader in &mut self.readers {
            reader.skip(count);
        }
        self.report_progress();
    }

    /// Seek all tracks, false if any of them could not follow
    pub fn seek(&mut self, pos: SampleIndex) -> bool {
        let mut ok = true;
        for reader in &mut self.readers {
            ok &= reader.seek(pos);
        }
        self.report_progress();
        ok
    }

    /// Rewind all tracks to the start of the range
    pub fn reset(&mut self) -> bool {
        let mut ok = true;
        for reader in &mut self.readers {
            ok &= reader.reset();
        }
        self.last_percent = None;
        ok
    }

    /// Progress in percent, averaged over all tracks
    pub fn progress(&self) -> f64 {
        if self.readers.is_empty() {
            return 100.0;
        }
        let sum: f64 = self.readers.iter().map(SampleReader::progress).sum();
        sum / self.readers.len() as f64
    }

    fn report_progress(&mut self) {
        let Some(tx) = &self.progress_tx else {
            return;
        };
        let progress = self.progress();
        let percent = progress as u32;
        if self.last_percent != Some(percent) {
            self.last_percent = Some(percent);
            let _ = tx.try_send(ProgressUpdate::Percent(progress));
        }
    }

    /// Read one sample of every track into `frame`
    ///
    /// Returns false at the end of the stream; `frame` is then left as is.
    pub fn read_frame(&mut self, frame: &mut [Sample]) -> bool {
        if self.eof() {
            return false;
        }
        for (slot, reader) in frame.iter_mut().zip(self.readers.iter_mut()) {
            *slot = reader.read_sample().unwrap_or(0);
        }
        true
    }

    /// Stop the stream at the next opportunity
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::Release);
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Acquire)
    }

    /// Shared flag that cancels this reader when set
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.canceled.clone()
    }
}

impl SampleSource for MultiTrackReader {
    fn tracks(&self) -> usize {
        self.readers.len()
    }

    fn fill(&mut self, blocks: &mut [Vec<Sample>], block_size: usize) -> usize {
        let mut count = usize::MAX;
        for (block, reader) in blocks.iter_mut().zip(self.readers.iter_mut()) {
            block.resize(block_size, 0);
            let n = reader.read(block);
            count = count.min(n);
        }
        if count == usize::MAX {
            return 0;
        }
        for block in blocks.iter_mut() {
            block.truncate(count);
        }
        self.report_progress();
        count
    }

    fn done(&self) -> bool {
        self.eof() || self.is_canceled()
    }

    fn rewind(&mut self) -> bool {
        self.reset()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crossbeam::channel;

    use crate::storage::{ReaderMode, Track};
    use crate::types::TrackId;

    fn reader_over(lengths: &[usize], mode: ReaderMode) -> MultiTrackReader {
        let mut multi = MultiTrackReader::new(0, 99);
        for (index, &len) in lengths.iter().enumerate() {
            let samples: Vec<Sample> = (0..len as Sample).map(|v| v + index as Sample * 1000).collect();
            let track = Track::from_samples(TrackId::new(), &samples);
            multi.push(index, track.open_reader(mode, 0, 99));
        }
        multi
    }

    #[test]
    fn test_lockstep_eof() {
        let mut multi = reader_over(&[100, 100, 100], ReaderMode::SinglePassForward);
        let mut blocks = vec![Vec::new(); 3];
        let mut steps = 0;
        while !multi.eof() {
            let n = multi.fill(&mut blocks, 30);
            assert!(blocks.iter().all(|b| b.len() == n));
            steps += 1;
            // All readers end in the same iteration
            let ended: Vec<bool> = multi.readers_mut().iter().map(SampleReader::eof).collect();
            assert!(ended.iter().all(|&e| e == ended[0]));
        }
        assert_eq!(steps, 4);
        assert_eq!(blocks[2][9], 2099);
    }

    #[test]
    fn test_any_track_ends_stream() {
        let mut multi = reader_over(&[100, 40], ReaderMode::SinglePassForward);
        let mut blocks = vec![Vec::new(); 2];
        assert_eq!(multi.fill(&mut blocks, 64), 40);
        assert!(multi.eof());
    }

    #[test]
    fn test_progress_reporting() {
        let (tx, rx) = channel::unbounded();
        let mut multi = reader_over(&[100, 100], ReaderMode::FullSnapshot);
        multi.set_progress_sender(tx);
        multi.skip(50);
        multi.skip(0);
        assert!((multi.progress() - 50.0).abs() < f64::EPSILON);
        assert_eq!(rx.try_recv().unwrap(), ProgressUpdate::Percent(50.0));
        assert!(rx.try_recv().is_err());

        assert!(multi.seek(10));
        assert_eq!(multi.position(), 10);
        assert!(multi.reset());
        assert_eq!(multi.position(), 0);
    }

    #[test]
    fn test_empty_reader_is_done() {
        let mut multi = MultiTrackReader::new(0, 10);
        assert_eq!(multi.tracks(), 0);
        assert!(multi.done());
        assert_eq!(multi.fill(&mut [], 16), 0);
    }

    #[test]
    fn test_read_frame_and_cancel() {
        let mut multi = reader_over(&[100, 100], ReaderMode::FullSnapshot);
        let mut frame = [0; 2];
        assert!(multi.read_frame(&mut frame));
        assert_eq!(frame, [0, 1000]);
        multi.cancel();
        assert!(multi.done());
    }
}
