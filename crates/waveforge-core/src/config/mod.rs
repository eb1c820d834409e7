//! Editor configuration
//!
//! ```yaml
//! undo:
//!   limit_mib: 1024
//! playback:
//!   method: cpal
//!   device: ""
//!   channels: 2
//!   bits_per_sample: 16
//!   bufbase: 10
//! plugins:
//!   shutdown_timeout_ms: 3000
//!   pause_sleep_ms: 100
//! ```
//!
//! Missing keys take their defaults, so partial files are fine.

mod io;
mod paths;

pub use io::{load_config, save_config};
pub use paths::{default_config_dir, default_config_path, CONFIG_FILE_NAME};

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::playback::{PlaybackMethod, PlaybackParams, DEFAULT_BUFFER_BASE, MAX_BUFFER_BASE};
use crate::task::{DEFAULT_PAUSE_SLEEP, DEFAULT_STOP_TIMEOUT};
use crate::types::DEFAULT_BITS_PER_SAMPLE;
use crate::undo::DEFAULT_UNDO_LIMIT;

const MIB: usize = 1024 * 1024;

/// Sample widths a playback device can be opened with
pub const SUPPORTED_BITS_PER_SAMPLE: [u32; 4] = [8, 16, 24, 32];

/// Longest sleep per poll while a plugin is paused
pub const MAX_PAUSE_SLEEP_MS: u64 = 1000;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub undo: UndoConfig,
    pub playback: PlaybackConfig,
    pub plugins: PluginConfig,
}

impl EditorConfig {
    /// Clamp out-of-range values, returns one message per correction
    pub fn validate(&mut self) -> Vec<String> {
        let mut fixes = Vec::new();
        self.undo.validate(&mut fixes);
        self.playback.validate(&mut fixes);
        self.plugins.validate(&mut fixes);
        fixes
    }
}

/// Undo memory budget
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UndoConfig {
    /// Combined undo and redo memory in MiB
    /// Default: 1024
    pub limit_mib: usize,
}

impl Default for UndoConfig {
    fn default() -> Self {
        Self {
            limit_mib: DEFAULT_UNDO_LIMIT / MIB,
        }
    }
}

impl UndoConfig {
    pub fn limit_bytes(&self) -> usize {
        self.limit_mib.saturating_mul(MIB)
    }

    fn validate(&mut self, fixes: &mut Vec<String>) {
        if self.limit_mib == 0 {
            fixes.push("undo.limit_mib 0 raised to 1".to_string());
            self.limit_mib = 1;
        }
    }
}

/// Playback device selection
///
/// The sample rate is not configured; playback always uses the rate of
/// the signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub method: PlaybackMethod,
    /// Device name, empty for the default device
    pub device: String,
    pub channels: usize,
    pub bits_per_sample: u32,
    /// Buffer size exponent, `2^bufbase` samples
    pub bufbase: u32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            method: PlaybackMethod::default(),
            device: String::new(),
            channels: 2,
            bits_per_sample: DEFAULT_BITS_PER_SAMPLE,
            bufbase: DEFAULT_BUFFER_BASE,
        }
    }
}

impl PlaybackConfig {
    /// Device parameters for a signal with the given rate
    pub fn params(&self, rate: u64) -> PlaybackParams {
        PlaybackParams {
            rate,
            channels: self.channels.max(1),
            bits_per_sample: self.bits_per_sample,
            device: self.device.clone(),
            bufbase: self.bufbase.min(MAX_BUFFER_BASE),
        }
    }

    fn validate(&mut self, fixes: &mut Vec<String>) {
        if self.channels == 0 {
            fixes.push("playback.channels 0 raised to 1".to_string());
            self.channels = 1;
        }
        if !SUPPORTED_BITS_PER_SAMPLE.contains(&self.bits_per_sample) {
            fixes.push(format!(
                "playback.bits_per_sample {} replaced by {DEFAULT_BITS_PER_SAMPLE}",
                self.bits_per_sample
            ));
            self.bits_per_sample = DEFAULT_BITS_PER_SAMPLE;
        }
        if self.bufbase > MAX_BUFFER_BASE {
            fixes.push(format!("playback.bufbase {} lowered to {MAX_BUFFER_BASE}", self.bufbase));
            self.bufbase = MAX_BUFFER_BASE;
        }
    }
}

/// Plugin worker behaviour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    /// Bound of each shutdown escalation tier
    pub shutdown_timeout_ms: u64,
    /// Sleep per poll while a cancel confirmation is pending
    pub pause_sleep_ms: u64,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            shutdown_timeout_ms: DEFAULT_STOP_TIMEOUT.as_millis() as u64,
            pause_sleep_ms: DEFAULT_PAUSE_SLEEP.as_millis() as u64,
        }
    }
}

impl PluginConfig {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn pause_sleep(&self) -> Duration {
        Duration::from_millis(self.pause_sleep_ms)
    }

    fn validate(&mut self, fixes: &mut Vec<String>) {
        if self.shutdown_timeout_ms == 0 {
            fixes.push("plugins.shutdown_timeout_ms 0 raised to 1".to_string());
            self.shutdown_timeout_ms = 1;
        }
        let sleep = self.pause_sleep_ms.clamp(1, MAX_PAUSE_SLEEP_MS);
        if sleep != self.pause_sleep_ms {
            fixes.push(format!("plugins.pause_sleep_ms {} clamped to {sleep}", self.pause_sleep_ms));
            self.pause_sleep_ms = sleep;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EditorConfig::default();
        assert_eq!(config.undo.limit_mib, 1024);
        assert_eq!(config.undo.limit_bytes(), DEFAULT_UNDO_LIMIT);
        assert_eq!(config.plugins.shutdown_timeout(), Duration::from_secs(3));
        assert_eq!(config.playback.params(48000).buffer_size(), 1024);
    }

    #[test]
    fn test_partial_yaml() {
        let config: EditorConfig = serde_yaml::from_str("playback:\n  method: memory\n  bufbase: 40\n").unwrap();
        assert_eq!(config.playback.method, PlaybackMethod::Memory);
        assert_eq!(config.playback.channels, 2);
        assert_eq!(config.undo, UndoConfig::default());
        // Exponent is capped when building device parameters
        assert_eq!(config.playback.params(44100).bufbase, MAX_BUFFER_BASE);
    }

    #[test]
    fn test_validate_clamps() {
        let mut config = EditorConfig::default();
        assert!(config.validate().is_empty());

        config.undo.limit_mib = 0;
        config.playback.channels = 0;
        config.playback.bits_per_sample = 12;
        config.plugins.pause_sleep_ms = 60_000;
        let fixes = config.validate();
        assert_eq!(fixes.len(), 4);
        assert_eq!(config.undo.limit_mib, 1);
        assert_eq!(config.playback.channels, 1);
        assert_eq!(config.playback.bits_per_sample, DEFAULT_BITS_PER_SAMPLE);
        assert_eq!(config.plugins.pause_sleep_ms, MAX_PAUSE_SLEEP_MS);
        assert!(config.validate().is_empty());
    }
}
