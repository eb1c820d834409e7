//! CPAL playback device
//!
//! ```text
//! ┌──────────────────┐   push()   ┌─────────────────────┐   pop()   ┌───────────────────┐
//! │ playback worker  │──────────►│   f32 ring buffer   │─────────►│ CPAL stream thread│
//! │ (one frame each) │           │   (lock-free SPSC)  │          │ (owns the Stream) │
//! └──────────────────┘           └─────────────────────┘          └───────────────────┘
//! ```
//!
//! The stream is created and kept on its own thread because `cpal::Stream`
//! is not `Send` on every platform. The result of opening it is handed back
//! over a channel.
//!
//! Samples that do not fit the ring buffer are dropped and counted, stream
//! callbacks that run out of data play silence and are counted as underruns.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize as CpalBufferSize, SampleRate, StreamConfig};
use crossbeam::channel;

use super::device::{PlaybackDevice, PlaybackParams};
use super::error::{PlaybackError, PlaybackResult};
use crate::types::{sample_to_float, Sample};

/// Ring buffer capacity in device buffers
const RING_BUFFERS: usize = 4;

/// Poll interval while the ring buffer is full
const WRITE_POLL: Duration = Duration::from_millis(1);

/// Give up on a write if the stream has not consumed anything for this long
const WRITE_TIMEOUT: Duration = Duration::from_secs(2);

/// Sound card output through the default CPAL host
pub struct CpalDevice {
    producer: Option<rtrb::Producer<f32>>,
    channels: usize,
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    drain_time: Duration,
    /// Stream callbacks that ran out of samples
    underruns: Arc<AtomicU64>,
    /// Samples that did not fit the ring buffer
    dropped: u64,
}

impl std::fmt::Debug for CpalDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpalDevice")
            .field("open", &self.producer.is_some())
            .field("channels", &self.channels)
            .field("underruns", &self.underruns())
            .field("dropped", &self.dropped)
            .finish()
    }
}

impl Default for CpalDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl CpalDevice {
    pub fn new() -> Self {
        Self {
            producer: None,
            channels: 0,
            shutdown: Arc::new(AtomicBool::new(false)),
            thread: None,
            drain_time: Duration::ZERO,
            underruns: Arc::new(AtomicU64::new(0)),
            dropped: 0,
        }
    }

    /// Stream callbacks since opening that had to fill in silence
    pub fn underruns(&self) -> u64 {
        self.underruns.load(Ordering::Relaxed)
    }

    /// Samples since opening that were lost because the ring buffer was full
    pub fn dropped_samples(&self) -> u64 {
        self.dropped
    }
}

/// Queue one frame, returns how many samples did not fit
fn push_frame(producer: &mut rtrb::Producer<f32>, frame: &[Sample]) -> usize {
    for (pushed, &sample) in frame.iter().enumerate() {
        if producer.push(sample_to_float(sample)).is_err() {
            // Buffer full
            return frame.len() - pushed;
        }
    }
    0
}

fn find_device(name: &str) -> PlaybackResult<cpal::Device> {
    let host = cpal::default_host();
    if name.is_empty() {
        return host
            .default_output_device()
            .ok_or_else(|| PlaybackError::DeviceNotFound("default output".to_string()));
    }
    let devices = host
        .output_devices()
        .map_err(|e| PlaybackError::OpenFailed(e.to_string()))?;
    for device in devices {
        if device.name().is_ok_and(|n| n == name) {
            return Ok(device);
        }
    }
    Err(PlaybackError::DeviceNotFound(name.to_string()))
}

fn build_stream(
    params: &PlaybackParams,
    mut consumer: rtrb::Consumer<f32>,
    underruns: Arc<AtomicU64>,
) -> PlaybackResult<cpal::Stream> {
    let device = find_device(&params.device)?;
    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

    let config = StreamConfig {
        channels: params.channels as u16,
        sample_rate: SampleRate(params.rate as u32),
        buffer_size: CpalBufferSize::Fixed(params.buffer_size() as u32),
    };
    log::info!(
        "CPAL playback on '{}': {} channels, {} Hz, {} frames",
        device_name,
        config.channels,
        params.rate,
        params.buffer_size()
    );

    let mut started = false;
    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                let mut missing = false;
                for out in data.iter_mut() {
                    *out = match consumer.pop() {
                        Ok(sample) => {
                            started = true;
                            sample
                        }
                        Err(_) => {
                            missing = true;
                            0.0
                        }
                    };
                }
                // Nothing queued yet is not an underrun
                if missing && started {
                    underruns.fetch_add(1, Ordering::Relaxed);
                }
            },
            move |err| {
                log::error!("Playback stream error: {}", err);
            },
            None,
        )
        .map_err(|e| PlaybackError::OpenFailed(e.to_string()))?;
    stream.play().map_err(|e| PlaybackError::OpenFailed(e.to_string()))?;
    Ok(stream)
}

impl PlaybackDevice for CpalDevice {
    fn open(&mut self, params: &PlaybackParams) -> PlaybackResult<()> {
        if self.producer.is_some() {
            self.close()?;
        }
        if params.channels == 0 || params.channels > usize::from(u16::MAX) {
            return Err(PlaybackError::OpenFailed(format!("invalid channel count {}", params.channels)));
        }

        let capacity = params.buffer_size() * params.channels * RING_BUFFERS;
        let (producer, consumer) = rtrb::RingBuffer::<f32>::new(capacity);
        let (result_tx, result_rx) = channel::bounded::<PlaybackResult<()>>(1);
        let shutdown = Arc::new(AtomicBool::new(false));
        let stream_shutdown = shutdown.clone();
        let stream_params = params.clone();
        let underruns = Arc::new(AtomicU64::new(0));
        let stream_underruns = underruns.clone();

        let thread = thread::Builder::new()
            .name("cpal-playback".into())
            .spawn(move || match build_stream(&stream_params, consumer, stream_underruns) {
                Ok(stream) => {
                    let _ = result_tx.send(Ok(()));
                    while !stream_shutdown.load(Ordering::Acquire) {
                        thread::park_timeout(Duration::from_millis(20));
                    }
                    drop(stream);
                    log::debug!("CPAL playback stream closed");
                }
                Err(e) => {
                    let _ = result_tx.send(Err(e));
                }
            })
            .map_err(|e| PlaybackError::Spawn(e.to_string()))?;

        let result = result_rx
            .recv()
            .unwrap_or_else(|_| Err(PlaybackError::OpenFailed("stream thread exited".to_string())));
        if let Err(e) = result {
            let _ = thread.join();
            return Err(e);
        }

        self.producer = Some(producer);
        self.channels = params.channels;
        self.shutdown = shutdown;
        self.thread = Some(thread);
        self.underruns = underruns;
        self.dropped = 0;
        self.drain_time = Duration::from_secs_f64(capacity as f64 / params.channels as f64 / params.rate.max(1) as f64);
        Ok(())
    }

    fn write(&mut self, frame: &[Sample]) -> PlaybackResult<()> {
        let producer = self.producer.as_mut().ok_or(PlaybackError::NotOpen)?;
        if frame.len() != self.channels {
            return Err(PlaybackError::ChannelMismatch {
                expected: self.channels,
                actual: frame.len(),
            });
        }

        let started = Instant::now();
        while producer.slots() < frame.len() {
            if self.thread.as_ref().map_or(true, |t| t.is_finished()) {
                return Err(PlaybackError::WriteFailed("stream thread is gone".to_string()));
            }
            if started.elapsed() > WRITE_TIMEOUT {
                return Err(PlaybackError::WriteFailed("device does not consume samples".to_string()));
            }
            thread::sleep(WRITE_POLL);
        }
        let dropped = push_frame(producer, frame);
        if dropped > 0 {
            self.dropped += dropped as u64;
            log::debug!("Playback ring buffer full, dropped {} samples", dropped);
        }
        Ok(())
    }

    fn close(&mut self) -> PlaybackResult<()> {
        let Some(producer) = self.producer.take() else {
            return Ok(());
        };

        // Counted before draining, the stream runs dry at the end anyway
        let underruns = self.underruns();

        // Let the stream play what is still queued
        let deadline = Instant::now() + self.drain_time;
        while producer.slots() < producer.buffer().capacity() && Instant::now() < deadline {
            thread::sleep(WRITE_POLL);
        }

        self.shutdown.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            thread.thread().unpark();
            if thread.join().is_err() {
                log::error!("CPAL playback thread panicked");
            }
        }
        if underruns > 0 || self.dropped > 0 {
            log::info!(
                "CPAL playback closed with {} underruns and {} dropped samples",
                underruns,
                self.dropped
            );
        }
        Ok(())
    }

    fn supported_devices(&self) -> Vec<String> {
        let host = cpal::default_host();
        match host.output_devices() {
            Ok(devices) => devices.filter_map(|d| d.name().ok()).collect(),
            Err(e) => {
                log::debug!("Could not enumerate playback devices: {}", e);
                Vec::new()
            }
        }
    }

    fn supported_bits(&self, device: &str) -> Vec<u32> {
        let Ok(device) = find_device(device) else {
            return Vec::new();
        };
        let Ok(configs) = device.supported_output_configs() else {
            return Vec::new();
        };
        let mut bits: Vec<u32> = configs.map(|c| (c.sample_format().sample_size() * 8) as u32).collect();
        bits.sort_unstable();
        bits.dedup();
        bits
    }

    fn detect_channels(&self, device: &str) -> (usize, usize) {
        let Ok(device) = find_device(device) else {
            return (0, 0);
        };
        let Ok(configs) = device.supported_output_configs() else {
            return (0, 0);
        };
        let (min, max) = configs.fold((usize::MAX, 0), |(min, max), c| {
            let channels = usize::from(c.channels());
            (min.min(channels), max.max(channels))
        });
        if max == 0 {
            (0, 0)
        } else {
            (min, max)
        }
    }
}

impl Drop for CpalDevice {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_frame_counts_dropped_samples() {
        let (mut producer, mut consumer) = rtrb::RingBuffer::<f32>::new(2);
        assert_eq!(push_frame(&mut producer, &[1, 2, 3]), 1);
        assert_eq!(push_frame(&mut producer, &[4]), 1);
        assert!(consumer.pop().is_ok());
        assert_eq!(push_frame(&mut producer, &[5]), 0);
    }

    #[test]
    fn test_closed_device_reports_nothing() {
        let mut device = CpalDevice::new();
        assert_eq!(device.underruns(), 0);
        assert_eq!(device.dropped_samples(), 0);
        assert!(device.close().is_ok());
        assert!(matches!(device.write(&[0]), Err(PlaybackError::NotOpen)));
    }
}
