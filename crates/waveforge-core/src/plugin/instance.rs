//! Usage counted plugin instance

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::{Plugin, PluginParams};

/// A loaded plugin with its usage counter
///
/// Every run retains the instance before its worker starts and releases it
/// after `run` returned. The instance may only be unloaded once nothing
/// uses it any more.
pub struct PluginInstance {
    plugin: Arc<dyn Plugin>,
    usage: AtomicUsize,
    last_params: Mutex<Option<PluginParams>>,
}

impl std::fmt::Debug for PluginInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginInstance")
            .field("name", &self.plugin.name())
            .field("usage", &self.usage())
            .finish()
    }
}

impl PluginInstance {
    pub fn new(plugin: Arc<dyn Plugin>) -> Self {
        Self {
            plugin,
            usage: AtomicUsize::new(0),
            last_params: Mutex::new(None),
        }
    }

    pub fn plugin(&self) -> &Arc<dyn Plugin> {
        &self.plugin
    }

    pub fn name(&self) -> &str {
        self.plugin.name()
    }

    /// Increment the usage counter, returns the new count
    pub fn retain(&self) -> usize {
        self.usage.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Decrement the usage counter, returns the new count
    pub fn release(&self) -> usize {
        let previous = self
            .usage
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .unwrap_or_else(|n| {
                log::warn!("Plugin '{}' released more often than used", self.name());
                n + 1
            });
        previous - 1
    }

    pub fn usage(&self) -> usize {
        self.usage.load(Ordering::Acquire)
    }

    pub fn is_closable(&self) -> bool {
        self.usage() == 0
    }

    /// Parameters of the last successful setup
    pub fn last_params(&self) -> Option<PluginParams> {
        self.last_params.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn set_last_params(&self, params: PluginParams) {
        *self.last_params.lock().unwrap_or_else(PoisonError::into_inner) = Some(params);
    }
}
