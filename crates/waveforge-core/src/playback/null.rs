//! Playback device that discards its input

use std::time::{Duration, Instant};

use super::device::{PlaybackDevice, PlaybackParams};
use super::error::{PlaybackError, PlaybackResult};
use crate::types::Sample;

pub const NULL_DEVICE_NAME: &str = "null";

/// Discards frames at the speed a sound card would consume them
///
/// Pacing is done once per buffer, so the writer blocks in steps of
/// `2^bufbase` frames like it would on real hardware.
#[derive(Debug, Default)]
pub struct NullDevice {
    rate: u64,
    channels: usize,
    buffer_size: u64,
    frames: u64,
    started: Option<Instant>,
}

impl NullDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames written since open
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl PlaybackDevice for NullDevice {
    fn open(&mut self, params: &PlaybackParams) -> PlaybackResult<()> {
        if params.rate == 0 || params.channels == 0 {
            return Err(PlaybackError::OpenFailed(format!(
                "invalid format: {} Hz, {} channels",
                params.rate, params.channels
            )));
        }
        self.rate = params.rate;
        self.channels = params.channels;
        self.buffer_size = params.buffer_size() as u64;
        self.frames = 0;
        self.started = Some(Instant::now());
        Ok(())
    }

    fn write(&mut self, frame: &[Sample]) -> PlaybackResult<()> {
        let started = self.started.ok_or(PlaybackError::NotOpen)?;
        if frame.len() != self.channels {
            return Err(PlaybackError::ChannelMismatch {
                expected: self.channels,
                actual: frame.len(),
            });
        }
        self.frames += 1;
        if self.frames % self.buffer_size == 0 {
            let due = Duration::from_secs_f64(self.frames as f64 / self.rate as f64);
            let elapsed = started.elapsed();
            if due > elapsed {
                std::thread::sleep(due - elapsed);
            }
        }
        Ok(())
    }

    fn close(&mut self) -> PlaybackResult<()> {
        self.started = None;
        Ok(())
    }

    fn supported_devices(&self) -> Vec<String> {
        vec![NULL_DEVICE_NAME.to_string()]
    }

    fn supported_bits(&self, _device: &str) -> Vec<u32> {
        vec![8, 16, 24, 32]
    }

    fn detect_channels(&self, _device: &str) -> (usize, usize) {
        (1, 64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paced_to_rate() {
        let mut device = NullDevice::new();
        let params = PlaybackParams {
            rate: 1000,
            channels: 1,
            bufbase: 4,
            ..Default::default()
        };
        device.open(&params).unwrap();
        let start = Instant::now();
        for _ in 0..32 {
            device.write(&[0]).unwrap();
        }
        // 32 frames at 1 kHz
        assert!(start.elapsed() >= Duration::from_millis(30));
        assert_eq!(device.frames(), 32);
        device.close().unwrap();
        assert_eq!(device.write(&[0]), Err(PlaybackError::NotOpen));
    }
}
