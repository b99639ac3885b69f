//! Native API seam
//!
//! Device selection and memory allocation only talk to the GPU through the two
//! traits in this module. [`vulkan`] forwards them to ash, [`simulated`] runs
//! them against described device profiles without any driver.

pub mod simulated;
pub mod vulkan;

use std::collections::BTreeSet;
use std::fmt::Debug;
use std::ptr::NonNull;

use crate::error::GpuResult;
use crate::types::{
    BufferDesc, DeviceFeatures, DeviceProperties, ImageDesc, MemoryRequirements, MemoryType,
    QueueFamilyInfo, SurfaceSupport,
};

/// Queue creation parameters for one queue family
#[derive(Debug, Clone, PartialEq)]
pub struct QueueCreateDesc {
    /// Family the queues are created in
    pub family_index: u32,
    /// One priority per queue to create
    pub priorities: Vec<f32>,
}

/// Everything the backend needs to create a logical device
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeviceCreateDesc {
    /// Queue families and their queue priorities
    pub queues: Vec<QueueCreateDesc>,
    /// Device extensions to enable
    pub extensions: Vec<String>,
    /// Features to enable
    pub features: DeviceFeatures,
}

/// Instance-level operations: physical device enumeration and device creation
pub trait InstanceBackend {
    /// Native physical device handle
    type PhysicalDevice: Copy + Debug;
    /// Native presentation surface handle
    type Surface: Copy + Debug;
    /// Logical device created by this instance
    type Device: DeviceBackend;

    /// All physical devices visible to the instance
    fn enumerate_physical_devices(&self) -> GpuResult<Vec<Self::PhysicalDevice>>;

    /// Queue family table of a physical device
    fn queue_family_properties(&self, physical_device: Self::PhysicalDevice) -> Vec<QueueFamilyInfo>;

    /// Names of the device extensions a physical device supports
    fn device_extensions(&self, physical_device: Self::PhysicalDevice) -> GpuResult<BTreeSet<String>>;

    /// Device extension required to present to surfaces on this platform
    fn surface_extension_name(&self) -> &str;

    /// Whether a queue family can present to the surface
    fn surface_support(
        &self,
        physical_device: Self::PhysicalDevice,
        family_index: u32,
        surface: Self::Surface,
    ) -> GpuResult<bool>;

    /// Surface formats and present modes available for the surface
    fn surface_formats_and_modes(
        &self,
        physical_device: Self::PhysicalDevice,
        surface: Self::Surface,
    ) -> GpuResult<SurfaceSupport>;

    /// Name, type and limits
    fn device_properties(&self, physical_device: Self::PhysicalDevice) -> DeviceProperties;

    /// Features the device supports
    fn device_features(&self, physical_device: Self::PhysicalDevice) -> DeviceFeatures;

    /// Memory types advertised by the device, indexed by memory type index
    fn memory_types(&self, physical_device: Self::PhysicalDevice) -> Vec<MemoryType>;

    /// Create a logical device
    fn create_device(
        &self,
        physical_device: Self::PhysicalDevice,
        desc: &DeviceCreateDesc,
    ) -> GpuResult<Self::Device>;
}

/// Device-level operations used by queues, pools and the memory arena
///
/// Implementations are cheap handles: cloning must refer to the same native
/// device. Destruction of the device itself happens only through
/// [`DeviceBackend::destroy_device`].
pub trait DeviceBackend: Clone {
    /// Native queue handle
    type Queue: Copy + Debug + PartialEq;
    /// Native command pool handle
    type CommandPool: Copy + Debug + PartialEq;
    /// Native device memory handle
    type Memory: Copy + Debug + PartialEq;
    /// Native buffer handle
    type Buffer: Copy + Debug + PartialEq;
    /// Native image handle
    type Image: Copy + Debug + PartialEq;

    /// Queue `queue_index` of family `family_index`
    fn get_queue(&self, family_index: u32, queue_index: u32) -> Self::Queue;

    /// Create a command pool; `transient` marks short-lived, frequently reset buffers
    fn create_command_pool(&self, family_index: u32, transient: bool) -> GpuResult<Self::CommandPool>;

    /// Destroy a command pool
    fn destroy_command_pool(&self, pool: Self::CommandPool);

    /// Create a buffer without memory
    fn create_buffer(&self, desc: &BufferDesc) -> GpuResult<Self::Buffer>;

    /// Destroy a buffer
    fn destroy_buffer(&self, buffer: Self::Buffer);

    /// Create an image without memory
    fn create_image(&self, desc: &ImageDesc) -> GpuResult<Self::Image>;

    /// Destroy an image
    fn destroy_image(&self, image: Self::Image);

    /// Memory requirements of a buffer
    fn buffer_memory_requirements(&self, buffer: Self::Buffer) -> MemoryRequirements;

    /// Memory requirements of an image
    fn image_memory_requirements(&self, image: Self::Image) -> MemoryRequirements;

    /// Allocate `size` bytes of memory type `memory_type_index`
    fn allocate_memory(&self, size: u64, memory_type_index: u32) -> GpuResult<Self::Memory>;

    /// Free an allocation
    fn free_memory(&self, memory: Self::Memory);

    /// Bind a buffer to memory at `offset`
    fn bind_buffer_memory(&self, buffer: Self::Buffer, memory: Self::Memory, offset: u64) -> GpuResult<()>;

    /// Bind an image to memory at `offset`
    fn bind_image_memory(&self, image: Self::Image, memory: Self::Memory, offset: u64) -> GpuResult<()>;

    /// Map `size` bytes at `offset` into host address space
    fn map_memory(&self, memory: Self::Memory, offset: u64, size: u64) -> GpuResult<NonNull<u8>>;

    /// Unmap previously mapped memory
    fn unmap_memory(&self, memory: Self::Memory);

    /// Block until the device is idle
    fn wait_idle(&self) -> GpuResult<()>;

    /// Destroy the native device
    fn destroy_device(&self);
}
