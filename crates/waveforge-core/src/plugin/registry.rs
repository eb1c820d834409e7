//! Registry of available plugins

use std::collections::BTreeMap;
use std::sync::Arc;

use super::builtin::{AmplifyPlugin, NoisePlugin, ReversePlugin, ZeroPlugin};
use super::filter::FilterPluginAdapter;
use super::Plugin;

/// Plugins known to one editor context, by name
///
/// Owned by whoever sets up the editor and handed to the
/// [`PluginManager`](super::PluginManager).
#[derive(Default)]
pub struct PluginRegistry {
    plugins: BTreeMap<String, Arc<dyn Plugin>>,
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry").field("plugins", &self.names()).finish()
    }
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in plugins
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(FilterPluginAdapter::new(AmplifyPlugin)));
        registry.register(Arc::new(FilterPluginAdapter::new(NoisePlugin)));
        registry.register(Arc::new(ZeroPlugin::new()));
        registry.register(Arc::new(ReversePlugin::new()));
        registry
    }

    /// Add a plugin, replacing one with the same name
    pub fn register(&mut self, plugin: Arc<dyn Plugin>) -> Option<Arc<dyn Plugin>> {
        let name = plugin.name().to_string();
        log::debug!("Registering plugin '{}'", name);
        self.plugins.insert(name, plugin)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.plugins.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.plugins.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_plugins() {
        let registry = PluginRegistry::with_builtin();
        assert_eq!(registry.names(), vec!["amplify", "noise", "reverse", "zero"]);
        assert!(registry.get("amplify").is_some_and(|p| p.supports_pre_listen()));
        assert!(registry.get("zero").is_some_and(|p| !p.supports_pre_listen()));
        assert!(registry.get("echo").is_none());
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = PluginRegistry::new();
        assert!(registry.register(Arc::new(ZeroPlugin::new())).is_none());
        assert!(registry.register(Arc::new(ZeroPlugin::new())).is_some());
        assert_eq!(registry.len(), 1);
    }
}
