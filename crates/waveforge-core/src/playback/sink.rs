//! Pipeline sink that plays blocks through a device

use super::device::{PlaybackDevice, PlaybackMethod, PlaybackParams};
use super::error::PlaybackResult;
use super::mixer::MixerMatrix;
use super::registry::PlaybackDeviceRegistry;
use crate::pipeline::{SampleSink, SinkError};
use crate::types::Sample;

/// Mixes per-track blocks down to device frames
///
/// Used for pre-listen, where a filter pipeline plays instead of writing
/// back into the signal.
pub struct PlaybackSink {
    device: Box<dyn PlaybackDevice>,
    mixer: MixerMatrix,
    input: Vec<Sample>,
    output: Vec<Sample>,
    frames: u64,
    closed: bool,
}

impl std::fmt::Debug for PlaybackSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackSink")
            .field("inputs", &self.mixer.inputs())
            .field("outputs", &self.mixer.outputs())
            .field("frames", &self.frames)
            .field("closed", &self.closed)
            .finish()
    }
}

impl PlaybackSink {
    /// Wrap an already opened device
    pub fn new(device: Box<dyn PlaybackDevice>, inputs: usize, channels: usize) -> Self {
        Self {
            device,
            mixer: MixerMatrix::new(inputs, channels),
            input: vec![0; inputs],
            output: vec![0; channels],
            frames: 0,
            closed: false,
        }
    }

    /// Open a device from the registry and wrap it
    pub fn open(
        registry: &PlaybackDeviceRegistry,
        method: PlaybackMethod,
        params: &PlaybackParams,
        inputs: usize,
    ) -> PlaybackResult<Self> {
        let (_, device) = registry.open_device(method, params)?;
        Ok(Self::new(device, inputs, params.channels))
    }

    /// Frames written so far
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn close(&mut self) -> PlaybackResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.device.close()
    }
}

impl SampleSink for PlaybackSink {
    fn consume(&mut self, blocks: &[Vec<Sample>]) -> Result<(), SinkError> {
        if self.closed {
            return Err(SinkError::Closed);
        }
        if blocks.len() != self.input.len() {
            return Err(SinkError::TrackMismatch {
                expected: self.input.len(),
                actual: blocks.len(),
            });
        }
        let count = blocks.iter().map(Vec::len).min().unwrap_or(0);
        for i in 0..count {
            for (slot, block) in self.input.iter_mut().zip(blocks) {
                *slot = block[i];
            }
            self.mixer.mix(&self.input, &mut self.output);
            self.device.write(&self.output)?;
            self.frames += 1;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        Ok(self.close()?)
    }
}

impl Drop for PlaybackSink {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("Closing playback sink failed: {e}");
        }
    }
}
