//! Reading and writing the editor configuration file

use std::path::Path;

use anyhow::{Context, Result};

use super::EditorConfig;

/// Load the editor configuration from a YAML file
///
/// A missing, unreadable or invalid file yields the defaults. Values out
/// of range are clamped and each correction is logged.
pub fn load_config(path: &Path) -> EditorConfig {
    let mut config = match read_config(path) {
        Ok(Some(config)) => config,
        Ok(None) => {
            log::info!("No config file at {:?}, using defaults", path);
            EditorConfig::default()
        }
        Err(e) => {
            log::warn!("Ignoring config file: {:#}", e);
            EditorConfig::default()
        }
    };
    for fix in config.validate() {
        log::warn!("Config {:?}: {}", path, fix);
    }
    config
}

fn read_config(path: &Path) -> Result<Option<EditorConfig>> {
    if !path.exists() {
        return Ok(None);
    }
    log::info!("Loading config from {:?}", path);
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    let config = serde_yaml::from_str(&contents).with_context(|| format!("Failed to parse {:?}", path))?;
    Ok(Some(config))
}

/// Save the editor configuration, creating parent directories
pub fn save_config(config: &EditorConfig, path: &Path) -> Result<()> {
    log::info!("Saving config to {:?}", path);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory {:?}", parent))?;
    }
    let yaml = serde_yaml::to_string(config).context("Failed to serialize config")?;
    std::fs::write(path, yaml).with_context(|| format!("Failed to write {:?}", path))?;
    Ok(())
}
