//! Configuration system
//!
//! File-backed configuration in TOML or RON, chosen by file extension.

mod selection;

use std::path::Path;

pub use serde::{Deserialize, Serialize};
pub use selection::{ArenaConfig, DeviceSelectionConfig, QueueRequestConfig};

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string())),
            Some("ron") => ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string())),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?,
            Some("ron") => ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?,
            _ => return Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Values parsed but are not usable
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("gpu_core_{}_{}", std::process::id(), name))
    }

    #[test]
    fn test_save_and_load_by_extension() {
        let mut config = ArenaConfig::default();
        config.buffer_sizes = vec![64, 128, 4096];

        for name in ["arena.toml", "arena.ron"] {
            let path = temp_path(name);
            config.save_to_file(&path).unwrap();
            let loaded = ArenaConfig::load_from_file(&path).unwrap();
            std::fs::remove_file(&path).ok();
            assert_eq!(loaded, config, "{name}");
        }
    }

    #[test]
    fn test_unknown_extension_is_rejected() {
        let path = temp_path("arena.json");
        std::fs::write(&path, "{}").unwrap();
        let result = ArenaConfig::load_from_file(&path);
        std::fs::remove_file(&path).ok();
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
        assert!(matches!(
            ArenaConfig::default().save_to_file(temp_path("arena.yaml")),
            Err(ConfigError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = DeviceSelectionConfig::load_from_file(temp_path("missing.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
