//! In-memory playback device
//!
//! Captures every written frame into a shared buffer. Used for offline
//! rendering and by tests in place of real hardware.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::device::{PlaybackDevice, PlaybackMethod, PlaybackParams};
use super::error::{PlaybackError, PlaybackResult};
use super::registry::PlaybackDeviceFactory;
use crate::types::Sample;

/// Name under which the memory device is listed
pub const MEMORY_DEVICE_NAME: &str = "memory";

/// Shared view on the frames written to memory devices
#[derive(Debug, Clone, Default)]
pub struct MemoryCapture {
    frames: Arc<Mutex<Vec<Vec<Sample>>>>,
    written: Arc<AtomicU64>,
    /// Fail writes once this many frames were written (0 = never)
    fail_after: Arc<AtomicU64>,
    opened: Arc<AtomicBool>,
    /// Keep at most this many frames (0 = unlimited)
    keep: Arc<AtomicU64>,
}

impl MemoryCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// All captured frames
    pub fn frames(&self) -> Vec<Vec<Sample>> {
        self.frames.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Samples of one output channel
    pub fn channel(&self, channel: usize) -> Vec<Sample> {
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|f| f.get(channel).copied().unwrap_or(0))
            .collect()
    }

    /// Number of frames written since creation
    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Acquire)
    }

    pub fn is_open(&self) -> bool {
        self.opened.load(Ordering::Acquire)
    }

    /// Let writes fail after `frames` frames
    pub fn fail_after(&self, frames: u64) {
        self.fail_after.store(frames, Ordering::Release);
    }

    /// Only keep the first `frames` frames in the buffer
    pub fn limit(&self, frames: u64) {
        self.keep.store(frames, Ordering::Release);
    }

    pub fn clear(&self) {
        self.frames.lock().unwrap_or_else(PoisonError::into_inner).clear();
        self.written.store(0, Ordering::Release);
    }
}

/// Device that appends frames to a [`MemoryCapture`]
#[derive(Debug)]
pub struct MemoryDevice {
    capture: MemoryCapture,
    channels: Option<usize>,
}

impl MemoryDevice {
    pub fn new(capture: MemoryCapture) -> Self {
        Self {
            capture,
            channels: None,
        }
    }

    pub fn capture(&self) -> &MemoryCapture {
        &self.capture
    }
}

impl PlaybackDevice for MemoryDevice {
    fn open(&mut self, params: &PlaybackParams) -> PlaybackResult<()> {
        if params.channels == 0 {
            return Err(PlaybackError::OpenFailed("zero channels requested".to_string()));
        }
        if !params.device.is_empty() && params.device != MEMORY_DEVICE_NAME {
            return Err(PlaybackError::DeviceNotFound(params.device.clone()));
        }
        self.channels = Some(params.channels);
        self.capture.opened.store(true, Ordering::Release);
        Ok(())
    }

    fn write(&mut self, frame: &[Sample]) -> PlaybackResult<()> {
        let channels = self.channels.ok_or(PlaybackError::NotOpen)?;
        if frame.len() != channels {
            return Err(PlaybackError::ChannelMismatch {
                expected: channels,
                actual: frame.len(),
            });
        }
        let fail_after = self.capture.fail_after.load(Ordering::Acquire);
        let written = self.capture.written.load(Ordering::Acquire);
        if fail_after > 0 && written >= fail_after {
            return Err(PlaybackError::WriteFailed(format!("injected failure after {written} frames")));
        }
        let keep = self.capture.keep.load(Ordering::Acquire);
        if keep == 0 || written < keep {
            self.capture
                .frames
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(frame.to_vec());
        }
        self.capture.written.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn close(&mut self) -> PlaybackResult<()> {
        self.channels = None;
        self.capture.opened.store(false, Ordering::Release);
        Ok(())
    }

    fn supported_devices(&self) -> Vec<String> {
        vec![MEMORY_DEVICE_NAME.to_string()]
    }

    fn supported_bits(&self, _device: &str) -> Vec<u32> {
        vec![8, 16, 24, 32]
    }

    fn detect_channels(&self, _device: &str) -> (usize, usize) {
        (1, usize::from(u16::MAX))
    }
}

/// Factory handing out memory devices that share one capture
#[derive(Debug, Clone)]
pub struct MemoryDeviceFactory {
    capture: MemoryCapture,
}

impl MemoryDeviceFactory {
    pub fn new(capture: MemoryCapture) -> Self {
        Self { capture }
    }
}

impl PlaybackDeviceFactory for MemoryDeviceFactory {
    fn supported_methods(&self) -> Vec<PlaybackMethod> {
        vec![PlaybackMethod::Memory]
    }

    fn create_device(&self, method: PlaybackMethod) -> Option<Box<dyn PlaybackDevice>> {
        (method == PlaybackMethod::Memory)
            .then(|| Box::new(MemoryDevice::new(self.capture.clone())) as Box<dyn PlaybackDevice>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_requires_open() {
        let mut device = MemoryDevice::new(MemoryCapture::new());
        assert_eq!(device.write(&[1, 2]), Err(PlaybackError::NotOpen));
        device.open(&PlaybackParams::default()).unwrap();
        assert!(matches!(device.write(&[1]), Err(PlaybackError::ChannelMismatch { .. })));
        device.write(&[1, 2]).unwrap();
        assert_eq!(device.capture().channel(1), vec![2]);
    }

    #[test]
    fn test_fail_after() {
        let capture = MemoryCapture::new();
        capture.fail_after(2);
        let mut device = MemoryDevice::new(capture.clone());
        device.open(&PlaybackParams::default().with_channels(1)).unwrap();
        assert!(device.write(&[1]).is_ok());
        assert!(device.write(&[2]).is_ok());
        assert!(matches!(device.write(&[3]), Err(PlaybackError::WriteFailed(_))));
        assert_eq!(capture.written(), 2);
    }

    #[test]
    fn test_unknown_device_name() {
        let mut device = MemoryDevice::new(MemoryCapture::new());
        let params = PlaybackParams::default().with_device("hw:7");
        assert_eq!(device.open(&params), Err(PlaybackError::DeviceNotFound("hw:7".to_string())));
    }
}
