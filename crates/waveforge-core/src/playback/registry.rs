//! Playback method registry
//!
//! Factories are registered with an explicitly owned registry that is
//! handed to the playback controller.

use std::sync::Arc;

use super::device::{PlaybackDevice, PlaybackMethod, PlaybackParams};
use super::error::{PlaybackError, PlaybackResult};
use super::null::NullDevice;

/// Creates devices for one or more playback methods
pub trait PlaybackDeviceFactory: Send + Sync {
    fn supported_methods(&self) -> Vec<PlaybackMethod>;

    fn create_device(&self, method: PlaybackMethod) -> Option<Box<dyn PlaybackDevice>>;
}

/// Factory for the methods built into the engine
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinDeviceFactory;

impl PlaybackDeviceFactory for BuiltinDeviceFactory {
    fn supported_methods(&self) -> Vec<PlaybackMethod> {
        let mut methods = Vec::new();
        #[cfg(feature = "cpal-backend")]
        methods.push(PlaybackMethod::Cpal);
        methods.push(PlaybackMethod::Null);
        methods
    }

    fn create_device(&self, method: PlaybackMethod) -> Option<Box<dyn PlaybackDevice>> {
        match method {
            #[cfg(feature = "cpal-backend")]
            PlaybackMethod::Cpal => Some(Box::new(super::cpal_device::CpalDevice::new())),
            PlaybackMethod::Null => Some(Box::new(NullDevice::new())),
            _ => None,
        }
    }
}

/// Registered playback device factories
#[derive(Default, Clone)]
pub struct PlaybackDeviceRegistry {
    factories: Vec<Arc<dyn PlaybackDeviceFactory>>,
}

impl std::fmt::Debug for PlaybackDeviceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackDeviceRegistry")
            .field("methods", &self.supported_methods())
            .finish()
    }
}

impl PlaybackDeviceRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in methods
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(BuiltinDeviceFactory));
        registry
    }

    pub fn register(&mut self, factory: Arc<dyn PlaybackDeviceFactory>) {
        self.factories.push(factory);
    }

    /// All supported methods, sorted by number
    pub fn supported_methods(&self) -> Vec<PlaybackMethod> {
        let mut methods: Vec<PlaybackMethod> =
            self.factories.iter().flat_map(|f| f.supported_methods()).collect();
        methods.sort();
        methods.dedup();
        methods
    }

    /// The requested method if supported, else the lowest-numbered one
    pub fn resolve_method(&self, requested: PlaybackMethod) -> Option<PlaybackMethod> {
        let methods = self.supported_methods();
        if methods.contains(&requested) {
            return Some(requested);
        }
        let fallback = methods.first().copied();
        if let Some(method) = fallback {
            log::warn!(
                "Playback method '{}' not available, falling back to '{}'",
                requested.name(),
                method.name()
            );
        }
        fallback
    }

    /// Create a device for `method` (no fallback)
    pub fn create_device(&self, method: PlaybackMethod) -> Option<Box<dyn PlaybackDevice>> {
        self.factories
            .iter()
            .filter(|f| f.supported_methods().contains(&method))
            .find_map(|f| f.create_device(method))
    }

    /// Resolve the method, create its device and open it
    pub fn open_device(
        &self,
        requested: PlaybackMethod,
        params: &PlaybackParams,
    ) -> PlaybackResult<(PlaybackMethod, Box<dyn PlaybackDevice>)> {
        let method = self.resolve_method(requested).ok_or(PlaybackError::NoMethod)?;
        let mut device = self
            .create_device(method)
            .ok_or(PlaybackError::UnsupportedMethod(method))?;
        device.open(params)?;
        log::info!(
            "Opened playback device '{}' via {}: {} Hz, {} channels, {} bits, buffer {}",
            params.device,
            method.name(),
            params.rate,
            params.channels,
            params.bits_per_sample,
            params.buffer_size()
        );
        Ok((method, device))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::playback::{MemoryCapture, MemoryDeviceFactory};

    #[test]
    fn test_fallback_to_lowest_method() {
        let mut registry = PlaybackDeviceRegistry::new();
        assert_eq!(registry.resolve_method(PlaybackMethod::Cpal), None);
        assert!(matches!(
            registry.open_device(PlaybackMethod::Cpal, &PlaybackParams::default()),
            Err(PlaybackError::NoMethod)
        ));

        registry.register(Arc::new(MemoryDeviceFactory::new(MemoryCapture::new())));
        assert_eq!(registry.resolve_method(PlaybackMethod::Cpal), Some(PlaybackMethod::Memory));
        assert_eq!(registry.resolve_method(PlaybackMethod::Null), Some(PlaybackMethod::Memory));

        registry.register(Arc::new(BuiltinDeviceFactory));
        assert_eq!(registry.resolve_method(PlaybackMethod::Null), Some(PlaybackMethod::Null));
        assert_eq!(registry.resolve_method(PlaybackMethod::Memory), Some(PlaybackMethod::Memory));
    }

    #[test]
    fn test_open_device() {
        let capture = MemoryCapture::new();
        let mut registry = PlaybackDeviceRegistry::new();
        registry.register(Arc::new(MemoryDeviceFactory::new(capture.clone())));

        let params = PlaybackParams::default().with_channels(1);
        let (method, mut device) = registry.open_device(PlaybackMethod::Memory, &params).unwrap();
        assert_eq!(method, PlaybackMethod::Memory);
        device.write(&[42]).unwrap();
        device.close().unwrap();
        assert_eq!(capture.frames(), vec![vec![42]]);
    }
}
