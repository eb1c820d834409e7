//! Playback device interface and parameters

use serde::{Deserialize, Serialize};

use super::error::PlaybackResult;
use crate::types::{Sample, DEFAULT_BITS_PER_SAMPLE, DEFAULT_SAMPLE_RATE};

/// Default buffer size exponent (2^10 = 1024 frames)
pub const DEFAULT_BUFFER_BASE: u32 = 10;

/// Largest accepted buffer size exponent
pub const MAX_BUFFER_BASE: u32 = 18;

/// Numbered playback methods, lower numbers are preferred on fallback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackMethod {
    /// Sound card output through CPAL
    #[default]
    Cpal = 1,
    /// Frames are captured in memory
    Memory = 2,
    /// Frames are discarded in real time
    Null = 3,
}

impl PlaybackMethod {
    pub const ALL: [PlaybackMethod; 3] = [PlaybackMethod::Cpal, PlaybackMethod::Memory, PlaybackMethod::Null];

    pub fn number(self) -> u32 {
        self as u32
    }

    pub fn name(self) -> &'static str {
        match self {
            PlaybackMethod::Cpal => "cpal",
            PlaybackMethod::Memory => "memory",
            PlaybackMethod::Null => "null",
        }
    }
}

/// Parameters a device is opened with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackParams {
    /// Sample rate in Hz
    pub rate: u64,
    /// Number of output channels
    pub channels: usize,
    /// Resolution of the device samples
    pub bits_per_sample: u32,
    /// Device name or id, empty for the default device
    #[serde(default)]
    pub device: String,
    /// Buffer size exponent, the buffer holds `2^bufbase` samples
    pub bufbase: u32,
}

impl Default for PlaybackParams {
    fn default() -> Self {
        Self {
            rate: DEFAULT_SAMPLE_RATE,
            channels: 2,
            bits_per_sample: DEFAULT_BITS_PER_SAMPLE,
            device: String::new(),
            bufbase: DEFAULT_BUFFER_BASE,
        }
    }
}

impl PlaybackParams {
    /// Buffer size in samples
    pub fn buffer_size(&self) -> usize {
        1usize << self.bufbase.min(MAX_BUFFER_BASE)
    }

    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = device.into();
        self
    }

    pub fn with_channels(mut self, channels: usize) -> Self {
        self.channels = channels;
        self
    }

    pub fn with_rate(mut self, rate: u64) -> Self {
        self.rate = rate;
        self
    }
}

/// An output device that accepts one frame at a time
///
/// A frame holds one sample per output channel. Devices are created by a
/// [`PlaybackDeviceFactory`](super::PlaybackDeviceFactory) and used from the
/// playback worker thread.
pub trait PlaybackDevice: Send {
    fn open(&mut self, params: &PlaybackParams) -> PlaybackResult<()>;

    fn write(&mut self, frame: &[Sample]) -> PlaybackResult<()>;

    /// Drain pending output and release the device
    fn close(&mut self) -> PlaybackResult<()>;

    /// Names of the devices this method can open
    fn supported_devices(&self) -> Vec<String>;

    /// Resolutions supported by `device`
    fn supported_bits(&self, device: &str) -> Vec<u32>;

    /// Minimum and maximum channel count of `device`
    fn detect_channels(&self, device: &str) -> (usize, usize);
}
