//! # GPU Core
//!
//! Device negotiation and batched device-memory allocation over a pluggable
//! GPU backend.
//!
//! ## Features
//!
//! - **Device selection**: Scores every physical device, matches queue
//!   requests to the most specialized queue families and aliases queues when
//!   a family runs out
//! - **Memory arena**: Places a batch of buffers or images into a single
//!   allocation with reference-counted lifetime
//! - **Backends**: Vulkan through `ash`, plus a simulated backend driven by
//!   device profiles for tests and dry runs
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gpu_core::prelude::*;
//! use gpu_core::backend::simulated::{DeviceProfile, SimulatedInstance};
//!
//! fn main() -> Result<(), GpuError> {
//!     let instance = SimulatedInstance::new(vec![DeviceProfile::new("gpu", DeviceType::DiscreteGpu)
//!         .with_queue_family(QueueCapabilities::GRAPHICS | QueueCapabilities::TRANSFER, 2, false)
//!         .with_memory_type(MemoryProperties::HOST_VISIBLE | MemoryProperties::HOST_COHERENT)]);
//!
//!     let device = DeviceSelector::new(&instance)
//!         .with_queue(QueueCapabilities::GRAPHICS, 1.0)
//!         .select()?;
//!
//!     let buffers = MemoryArena::allocate_buffers(
//!         &device,
//!         &[BufferDesc { size: 256, usage: BufferUsage::UNIFORM }],
//!         MemoryProperties::HOST_VISIBLE,
//!     )?;
//!     buffers[0].write(0, &[1.0f32, 2.0, 3.0, 4.0])?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod backend;
pub mod config;
pub mod device;
pub mod error;
pub mod foundation;
pub mod memory;
pub mod types;

#[cfg(test)]
mod tests;

pub use error::{GpuError, GpuResult};

/// Common imports for library users
pub mod prelude {
    pub use crate::{
        backend::{DeviceBackend, InstanceBackend},
        config::{Config, DeviceSelectionConfig},
        device::{prefer_device_type, DeviceSelector, LogicalDevice, Queue, QueueRequest, ScoringContext},
        error::{GpuError, GpuResult},
        memory::{ArenaPlan, BindableResource, Buffer, Image, MemoryArena, MemoryBlock, ResourceKind},
        types::{
            BufferDesc, BufferUsage, DeviceFeatures, DeviceType, ImageDesc, ImageFormat, ImageUsage,
            MemoryProperties, QueueCapabilities,
        },
    };
}
