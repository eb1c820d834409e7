//! Lockstep writer over several tracks

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam::channel::Sender;

use crate::events::ProgressUpdate;
use crate::pipeline::{SampleSink, SinkError};
use crate::storage::{InsertMode, SampleWriter};
use crate::types::{Sample, SampleIndex};

/// One [`SampleWriter`] per track, all in the same mode
#[derive(Debug)]
pub struct MultiTrackWriter {
    writers: Vec<SampleWriter>,
    track_indices: Vec<usize>,
    mode: InsertMode,
    canceled: Arc<AtomicBool>,
    progress_tx: Option<Sender<ProgressUpdate>>,
    last_reported: Option<u64>,
}

impl MultiTrackWriter {
    pub fn new(mode: InsertMode) -> Self {
        Self {
            writers: Vec::new(),
            track_indices: Vec::new(),
            mode,
            canceled: Arc::new(AtomicBool::new(false)),
            progress_tx: None,
            last_reported: None,
        }
    }

    pub fn push(&mut self, track_index: usize, writer: SampleWriter) {
        self.track_indices.push(track_index);
        self.writers.push(writer);
    }

    pub fn set_progress_sender(&mut self, tx: Sender<ProgressUpdate>) {
        self.progress_tx = Some(tx);
    }

    pub fn tracks(&self) -> usize {
        self.writers.len()
    }

    pub fn track_indices(&self) -> &[usize] {
        &self.track_indices
    }

    pub fn mode(&self) -> InsertMode {
        self.mode
    }

    pub fn writer_mut(&mut self, index: usize) -> Option<&mut SampleWriter> {
        self.writers.get_mut(index)
    }

    pub fn writers_mut(&mut self) -> &mut [SampleWriter] {
        &mut self.writers
    }

    /// Smallest number of samples written to any track
    pub fn written(&self) -> SampleIndex {
        self.writers.iter().map(SampleWriter::written).min().unwrap_or(0)
    }

    /// Written samples (insert / append) or percentage (overwrite)
    pub fn progress(&self) -> ProgressUpdate {
        match self.mode {
            InsertMode::Overwrite => {
                if self.writers.is_empty() {
                    return ProgressUpdate::Percent(100.0);
                }
                let sum: f64 = self
                    .writers
                    .iter()
                    .map(|w| {
                        let span = (w.right().saturating_sub(w.left()) + 1) as f64;
                        w.written() as f64 * 100.0 / span
                    })
                    .sum();
                ProgressUpdate::Percent(sum / self.writers.len() as f64)
            }
            InsertMode::Insert | InsertMode::Append => ProgressUpdate::Samples(self.written()),
        }
    }

    fn report_progress(&mut self) {
        let Some(tx) = &self.progress_tx else {
            return;
        };
        let update = self.progress();
        let key = match update {
            ProgressUpdate::Percent(p) => p as u64,
            ProgressUpdate::Samples(n) => n,
        };
        if self.last_reported != Some(key) {
            self.last_reported = Some(key);
            let _ = tx.try_send(update);
        }
    }

    pub fn flush(&mut self) {
        for writer in &mut self.writers {
            writer.flush();
        }
    }

    /// Ask the producer (e.g. a decoder) to stop
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::Release);
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Acquire)
    }

    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.canceled.clone()
    }
}

impl SampleSink for MultiTrackWriter {
    fn consume(&mut self, blocks: &[Vec<Sample>]) -> Result<(), SinkError> {
        if blocks.len() != self.writers.len() {
            return Err(SinkError::TrackMismatch {
                expected: self.writers.len(),
                actual: blocks.len(),
            });
        }
        for (writer, block) in self.writers.iter_mut().zip(blocks) {
            writer.write(block);
        }
        self.report_progress();
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        self.flush();
        self.report_progress();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crossbeam::channel;

    use crate::storage::Track;

    #[test]
    fn test_overwrite_progress_in_percent() {
        let tracks = [Track::new(100), Track::new(100)];
        let mut multi = MultiTrackWriter::new(InsertMode::Overwrite);
        for (i, track) in tracks.iter().enumerate() {
            multi.push(i, SampleWriter::new(track.clone(), InsertMode::Overwrite, 0, 99));
        }
        multi.consume(&[vec![1; 25], vec![1; 25]]).unwrap();
        assert_eq!(multi.progress(), ProgressUpdate::Percent(25.0));
        multi.finish().unwrap();
        assert_eq!(tracks[1].read_range(24, 2), vec![1, 0]);
    }

    #[test]
    fn test_append_progress_in_samples() {
        let (tx, rx) = channel::unbounded();
        let track = Track::new(0);
        let mut multi = MultiTrackWriter::new(InsertMode::Append);
        multi.set_progress_sender(tx);
        multi.push(0, SampleWriter::new(track.clone(), InsertMode::Append, 0, 0));

        multi.consume(&[vec![3; 7]]).unwrap();
        assert_eq!(rx.try_recv().unwrap(), ProgressUpdate::Samples(7));
        multi.finish().unwrap();
        assert_eq!(track.length(), 7);
    }

    #[test]
    fn test_track_mismatch() {
        let mut multi = MultiTrackWriter::new(InsertMode::Insert);
        multi.push(0, SampleWriter::new(Track::new(0), InsertMode::Insert, 0, 0));
        assert!(matches!(
            multi.consume(&[vec![], vec![]]),
            Err(SinkError::TrackMismatch { expected: 1, actual: 2 })
        ));
    }
}
