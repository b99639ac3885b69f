//! Probe configuration

use std::path::PathBuf;

use gpu_core::config::{ArenaConfig, Config, ConfigError, DeviceSelectionConfig};
use serde::{Deserialize, Serialize};

/// Which GPU backend the probe runs against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum BackendChoice {
    /// System Vulkan loader
    Vulkan {
        /// Application name reported to the driver
        #[serde(default = "default_app_name")]
        app_name: String,
        /// Enable validation layers in debug builds
        #[serde(default)]
        validation: bool,
    },
    /// Simulated devices described in a profile file
    Simulated {
        /// Path to a TOML or RON simulation profile
        profile: PathBuf,
    },
}

fn default_app_name() -> String {
    "gpu_probe".to_string()
}

impl Default for BackendChoice {
    fn default() -> Self {
        Self::Vulkan {
            app_name: default_app_name(),
            validation: false,
        }
    }
}

/// Everything one probe run needs
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Default log filter, overridable through `RUST_LOG`
    pub log_level: Option<String>,
    /// Backend to probe
    pub backend: BackendChoice,
    /// Device selection parameters
    pub selection: DeviceSelectionConfig,
    /// Buffer batch to allocate on the selected device
    pub arena: ArenaConfig,
}

impl Config for ProbeConfig {}

impl ProbeConfig {
    /// Check values that parse but cannot be used
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.selection.validate()?;
        if self.arena.buffer_sizes.iter().any(|&size| size == 0) {
            return Err(ConfigError::Invalid("arena buffer sizes must be non-zero".to_string()));
        }
        Ok(())
    }

    /// Log filter to start with
    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }
}
