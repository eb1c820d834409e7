//! Playback
//!
//! - [`PlaybackDevice`]: frame sink implemented per playback method
//! - [`PlaybackDeviceRegistry`]: owned list of device factories with
//!   fallback to the lowest-numbered supported method
//! - [`PlaybackController`]: start / loop / pause / continue / stop state
//!   machine with the streaming loop on a worker task
//! - [`PlaybackSink`]: pipeline sink for pre-listen
//!
//! Devices: [`CpalDevice`] (sound card, `cpal-backend` feature),
//! [`MemoryDevice`] (captures frames) and [`NullDevice`] (discards in real
//! time).

mod controller;
#[cfg(feature = "cpal-backend")]
mod cpal_device;
mod device;
mod error;
mod memory;
mod mixer;
mod null;
mod registry;
mod sink;

pub use controller::{PlaybackController, PlaybackState, POSITION_UPDATES_PER_SECOND};
#[cfg(feature = "cpal-backend")]
pub use cpal_device::CpalDevice;
pub use device::{PlaybackDevice, PlaybackMethod, PlaybackParams, DEFAULT_BUFFER_BASE, MAX_BUFFER_BASE};
pub use error::{PlaybackError, PlaybackResult};
pub use memory::{MemoryCapture, MemoryDevice, MemoryDeviceFactory, MEMORY_DEVICE_NAME};
pub use mixer::MixerMatrix;
pub use null::{NullDevice, NULL_DEVICE_NAME};
pub use registry::{BuiltinDeviceFactory, PlaybackDeviceFactory, PlaybackDeviceRegistry};
pub use sink::PlaybackSink;
