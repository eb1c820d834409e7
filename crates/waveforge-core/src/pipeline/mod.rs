//! Source → filter → sink processing pipeline
//!
//! Every sample transform of the editor is run as a chain of three stages:
//!
//! ```text
//! SampleSource ──► SampleFilter (0..n) ──► SampleSink
//! (multi-track     (gain, noise,           (multi-track writer
//!  reader)          reverse, ...)            or playback)
//! ```
//!
//! Blocks are passed as one `Vec<Sample>` per track. All tracks advance by
//! the same number of samples per step.

mod error;

pub use error::SinkError;

use crate::types::Sample;

/// Samples per track moved through the pipeline in one step
pub const PIPELINE_BLOCK_SIZE: usize = 4096;

/// First stage: produces samples
pub trait SampleSource {
    /// Number of tracks this source delivers
    fn tracks(&self) -> usize;

    /// Clear each block and fill it with up to `block_size` samples
    ///
    /// Returns the number of samples delivered per track.
    fn fill(&mut self, blocks: &mut [Vec<Sample>], block_size: usize) -> usize;

    /// Check if the source has nothing more to deliver
    fn done(&self) -> bool;

    /// Start over from the beginning, returns false if unsupported
    fn rewind(&mut self) -> bool {
        false
    }
}

/// Middle stage: transforms blocks in place
pub trait SampleFilter {
    fn process(&mut self, blocks: &mut [Vec<Sample>]);

    /// Forget internal state, e.g. after the source was rewound
    fn reset(&mut self) {}
}

/// Last stage: consumes blocks
pub trait SampleSink {
    fn consume(&mut self, blocks: &[Vec<Sample>]) -> Result<(), SinkError>;

    /// Called once after the source is done
    fn finish(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// No filter stage
impl SampleFilter for () {
    fn process(&mut self, _blocks: &mut [Vec<Sample>]) {}
}

/// A chain of filters applied in order
impl SampleFilter for Vec<Box<dyn SampleFilter + Send>> {
    fn process(&mut self, blocks: &mut [Vec<Sample>]) {
        for filter in self.iter_mut() {
            filter.process(blocks);
        }
    }

    fn reset(&mut self) {
        for filter in self.iter_mut() {
            filter.reset();
        }
    }
}

/// How a pipeline run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// The source delivered all of its samples
    Completed,
    /// The stop predicate interrupted the run
    Canceled,
}

/// A connected source, filter and sink
pub struct Pipeline<S, F, K> {
    source: S,
    filter: F,
    sink: K,
    blocks: Vec<Vec<Sample>>,
    block_size: usize,
}

impl<S: SampleSource, F: SampleFilter, K: SampleSink> Pipeline<S, F, K> {
    pub fn new(source: S, filter: F, sink: K) -> Self {
        let tracks = source.tracks();
        Self {
            source,
            filter,
            sink,
            blocks: vec![Vec::with_capacity(PIPELINE_BLOCK_SIZE); tracks],
            block_size: PIPELINE_BLOCK_SIZE,
        }
    }

    /// Use a different block size (mostly for tests)
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size.max(1);
        self
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn filter_mut(&mut self) -> &mut F {
        &mut self.filter
    }

    pub fn sink_mut(&mut self) -> &mut K {
        &mut self.sink
    }

    pub fn into_parts(self) -> (S, F, K) {
        (self.source, self.filter, self.sink)
    }

    /// Move one block through all stages
    ///
    /// Returns `Ok(false)` once the source is exhausted.
    pub fn go_on(&mut self) -> Result<bool, SinkError> {
        if self.source.done() {
            return Ok(false);
        }
        let count = self.source.fill(&mut self.blocks, self.block_size);
        if count == 0 {
            return Ok(!self.source.done());
        }
        self.filter.process(&mut self.blocks);
        self.sink.consume(&self.blocks)?;
        Ok(!self.source.done())
    }

    /// Run until the source is done or `should_stop` returns true
    pub fn run(&mut self, mut should_stop: impl FnMut() -> bool) -> Result<PipelineOutcome, SinkError> {
        loop {
            if should_stop() {
                return Ok(PipelineOutcome::Canceled);
            }
            if !self.go_on()? {
                break;
            }
        }
        self.sink.finish()?;
        Ok(PipelineOutcome::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter {
        next: Sample,
        end: Sample,
    }

    impl SampleSource for Counter {
        fn tracks(&self) -> usize {
            2
        }

        fn fill(&mut self, blocks: &mut [Vec<Sample>], block_size: usize) -> usize {
            let n = ((self.end - self.next) as usize).min(block_size);
            for block in blocks.iter_mut() {
                block.clear();
                block.extend(self.next..self.next + n as Sample);
            }
            self.next += n as Sample;
            n
        }

        fn done(&self) -> bool {
            self.next >= self.end
        }
    }

    struct Double;

    impl SampleFilter for Double {
        fn process(&mut self, blocks: &mut [Vec<Sample>]) {
            for sample in blocks.iter_mut().flatten() {
                *sample *= 2;
            }
        }
    }

    #[derive(Default)]
    struct Collect {
        data: Vec<Vec<Sample>>,
        finished: bool,
    }

    impl SampleSink for Collect {
        fn consume(&mut self, blocks: &[Vec<Sample>]) -> Result<(), SinkError> {
            self.data.resize(blocks.len(), Vec::new());
            for (out, block) in self.data.iter_mut().zip(blocks) {
                out.extend_from_slice(block);
            }
            Ok(())
        }

        fn finish(&mut self) -> Result<(), SinkError> {
            self.finished = true;
            Ok(())
        }
    }

    #[test]
    fn test_pipeline_runs_to_completion() {
        let mut pipeline = Pipeline::new(Counter { next: 0, end: 10 }, Double, Collect::default())
            .with_block_size(3);
        assert_eq!(pipeline.run(|| false).unwrap(), PipelineOutcome::Completed);

        let (_, _, sink) = pipeline.into_parts();
        assert!(sink.finished);
        assert_eq!(sink.data.len(), 2);
        assert_eq!(sink.data[1], (0..10).map(|v| v * 2).collect::<Vec<Sample>>());
    }

    #[test]
    fn test_pipeline_cancel() {
        let mut pipeline = Pipeline::new(Counter { next: 0, end: 100 }, (), Collect::default())
            .with_block_size(10);
        let mut steps = 0;
        let outcome = pipeline
            .run(|| {
                steps += 1;
                steps > 3
            })
            .unwrap();
        assert_eq!(outcome, PipelineOutcome::Canceled);

        let (_, _, sink) = pipeline.into_parts();
        assert!(!sink.finished);
        assert_eq!(sink.data[0].len(), 30);
    }

    #[test]
    fn test_filter_chain() {
        let chain: Vec<Box<dyn SampleFilter + Send>> = vec![Box::new(Double), Box::new(Double)];
        let mut pipeline = Pipeline::new(Counter { next: 1, end: 2 }, chain, Collect::default());
        pipeline.run(|| false).unwrap();
        let (_, _, sink) = pipeline.into_parts();
        assert_eq!(sink.data[0], vec![4]);
    }
}
