//! Error types shared by device selection and memory allocation

use ash::vk;
use thiserror::Error;

use crate::types::MemoryProperties;

/// Errors produced while negotiating devices or allocating device memory
#[derive(Error, Debug)]
pub enum GpuError {
    /// Native Vulkan call failed with a result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// Non-Vulkan backend failure
    #[error("Backend error: {0}")]
    Backend(String),

    /// No physical device satisfied the requested queues, extensions and surface
    #[error("No compatible device: no physical device satisfies the requested queues and extensions")]
    NoCompatibleDevice,

    /// No memory type satisfies the combined type mask and property mask
    #[error("No suitable memory type for type bits {type_bits:#b} with properties {properties:?}")]
    NoSuitableMemoryType {
        /// Intersection of every resource's acceptable memory types
        type_bits: u32,
        /// Property flags that were requested
        properties: MemoryProperties,
    },

    /// Caller broke a precondition of the API
    #[error("Contract violation: {0}")]
    ContractViolation(String),

    /// Access through a mapping fell outside the resource's sub-range
    #[error("Out of bounds: {len} bytes at offset {offset} exceed resource size {size}")]
    OutOfBounds {
        /// Requested offset relative to the resource
        offset: u64,
        /// Requested byte length
        len: u64,
        /// Size of the resource
        size: u64,
    },

    /// Instance or backend setup failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),
}

/// Result type for device and memory operations
pub type GpuResult<T> = Result<T, GpuError>;

impl From<vk::Result> for GpuError {
    fn from(result: vk::Result) -> Self {
        Self::Api(result)
    }
}
