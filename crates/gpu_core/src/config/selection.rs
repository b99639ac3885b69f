//! Device selection and arena settings loaded from configuration files

use serde::{Deserialize, Serialize};

use super::{Config, ConfigError};
use crate::types::{DeviceFeatures, DeviceType, MemoryProperties};

/// One queue to request at device selection
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QueueRequestConfig {
    /// Capabilities the queue must have
    pub capabilities: crate::types::QueueCapabilities,
    /// Priority in `0.0..=1.0`
    #[serde(default = "default_priority")]
    pub priority: f32,
}

fn default_priority() -> f32 {
    1.0
}

/// Device selection parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSelectionConfig {
    /// Queues in request order
    pub queues: Vec<QueueRequestConfig>,
    /// Device extensions every candidate must support
    pub required_extensions: Vec<String>,
    /// Features to enable where supported
    pub feature_hints: DeviceFeatures,
    /// Rank devices of this type above others
    pub preferred_device_type: Option<DeviceType>,
}

impl DeviceSelectionConfig {
    /// Check the request list before touching any device
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queues.is_empty() {
            return Err(ConfigError::Invalid("at least one queue must be requested".to_string()));
        }
        if let Some(queue) = self.queues.iter().find(|q| !(0.0..=1.0).contains(&q.priority)) {
            return Err(ConfigError::Invalid(format!(
                "queue priority {} is outside 0.0..=1.0",
                queue.priority
            )));
        }
        if self.queues.iter().any(|q| q.capabilities.is_empty()) {
            return Err(ConfigError::Invalid("queue requested with no capabilities".to_string()));
        }
        Ok(())
    }
}

impl Default for DeviceSelectionConfig {
    fn default() -> Self {
        Self {
            queues: vec![QueueRequestConfig {
                capabilities: crate::types::QueueCapabilities::GRAPHICS,
                priority: default_priority(),
            }],
            required_extensions: Vec::new(),
            feature_hints: DeviceFeatures::SAMPLER_ANISOTROPY,
            preferred_device_type: Some(DeviceType::DiscreteGpu),
        }
    }
}

impl Config for DeviceSelectionConfig {}

/// A batch of buffers to place in one memory block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    /// Byte size of each buffer in the batch
    pub buffer_sizes: Vec<u64>,
    /// Properties the memory type must have
    pub memory_properties: MemoryProperties,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            buffer_sizes: vec![256, 512],
            memory_properties: MemoryProperties::HOST_VISIBLE,
        }
    }
}

impl Config for ArenaConfig {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::QueueCapabilities;

    #[test]
    fn test_default_selection_is_valid() {
        assert!(DeviceSelectionConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_empty_queue_list() {
        let config = DeviceSelectionConfig {
            queues: Vec::new(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_out_of_range_priority() {
        let config = DeviceSelectionConfig {
            queues: vec![QueueRequestConfig {
                capabilities: QueueCapabilities::COMPUTE,
                priority: 1.5,
            }],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parses_from_ron() {
        let text = r#"(
            queues: [
                (capabilities: "GRAPHICS | PRESENT", priority: 1.0),
                (capabilities: "TRANSFER"),
            ],
            required_extensions: ["VK_KHR_swapchain"],
        )"#;
        let config: DeviceSelectionConfig = ron::from_str(text).unwrap();
        assert_eq!(config.queues.len(), 2);
        assert_eq!(config.queues[1].priority, 1.0);
        assert!(config.queues[0].capabilities.contains(QueueCapabilities::PRESENT));
        assert_eq!(config.preferred_device_type, Some(DeviceType::DiscreteGpu));
    }
}
