//! Path utilities for configuration files

use std::path::PathBuf;

/// File name of the editor configuration
pub const CONFIG_FILE_NAME: &str = "waveforge.yaml";

/// Directory holding the configuration
///
/// Returns: `~/.config/waveforge` (or the platform equivalent)
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("waveforge")
}

/// Returns: `{config dir}/waveforge.yaml`
pub fn default_config_path() -> PathBuf {
    default_config_dir().join(CONFIG_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_path_layout() {
        let path = default_config_path();
        assert!(path.ends_with("waveforge/waveforge.yaml"));
        assert_eq!(path.parent(), Some(default_config_dir().as_path()));
    }
}
