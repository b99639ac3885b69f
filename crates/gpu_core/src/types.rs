//! Backend-neutral descriptions of devices, queues and memory
//!
//! These types are what the selector and the arena reason about. Each backend
//! translates its native structures into them, so none of the decision logic
//! depends on a particular GPU API.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Operation categories a queue or queue family supports
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct QueueCapabilities: u32 {
        /// Graphics pipelines and draw commands
        const GRAPHICS = 1 << 0;
        /// Compute dispatches
        const COMPUTE = 1 << 1;
        /// Copy and transfer commands
        const TRANSFER = 1 << 2;
        /// Presentation to a surface
        const PRESENT = 1 << 3;
    }
}

impl QueueCapabilities {
    /// Number of capability bits present in one mask but not the other
    pub fn symmetric_difference_count(self, other: Self) -> u32 {
        (self ^ other).bits().count_ones()
    }
}

bitflags! {
    /// Property flags of a device memory type
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct MemoryProperties: u32 {
        /// Fastest memory for device access
        const DEVICE_LOCAL = 1 << 0;
        /// Can be mapped for host access
        const HOST_VISIBLE = 1 << 1;
        /// Host writes are visible without explicit flushes
        const HOST_COHERENT = 1 << 2;
        /// Host reads are cached
        const HOST_CACHED = 1 << 3;
        /// Backing may be allocated lazily
        const LAZILY_ALLOCATED = 1 << 4;
        /// Protected memory
        const PROTECTED = 1 << 5;
    }
}

bitflags! {
    /// Optional device features that can be hinted at device creation
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct DeviceFeatures: u64 {
        /// Full 32-bit index range for indexed draws
        const FULL_DRAW_INDEX_UINT32 = 1 << 0;
        /// Cube map arrays
        const IMAGE_CUBE_ARRAY = 1 << 1;
        /// Independent blend state per attachment
        const INDEPENDENT_BLEND = 1 << 2;
        /// Geometry shader stage
        const GEOMETRY_SHADER = 1 << 3;
        /// Tessellation stages
        const TESSELLATION_SHADER = 1 << 4;
        /// Per-sample shading
        const SAMPLE_RATE_SHADING = 1 << 5;
        /// Multiple draws per indirect call
        const MULTI_DRAW_INDIRECT = 1 << 6;
        /// Clamping of fragment depth
        const DEPTH_CLAMP = 1 << 7;
        /// Line and point polygon modes
        const FILL_MODE_NON_SOLID = 1 << 8;
        /// Line widths other than 1.0
        const WIDE_LINES = 1 << 9;
        /// Anisotropic texture filtering
        const SAMPLER_ANISOTROPY = 1 << 10;
        /// BC texture compression
        const TEXTURE_COMPRESSION_BC = 1 << 11;
        /// ETC2 texture compression
        const TEXTURE_COMPRESSION_ETC2 = 1 << 12;
        /// ASTC LDR texture compression
        const TEXTURE_COMPRESSION_ASTC_LDR = 1 << 13;
        /// Occlusion queries returning exact counts
        const OCCLUSION_QUERY_PRECISE = 1 << 14;
        /// Stores and atomics in fragment shaders
        const FRAGMENT_STORES_AND_ATOMICS = 1 << 15;
        /// 64-bit floats in shaders
        const SHADER_FLOAT64 = 1 << 16;
        /// 64-bit integers in shaders
        const SHADER_INT64 = 1 << 17;
        /// 16-bit integers in shaders
        const SHADER_INT16 = 1 << 18;
    }
}

bitflags! {
    /// Ways a buffer may be used
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct BufferUsage: u32 {
        /// Source of transfer commands
        const TRANSFER_SRC = 1 << 0;
        /// Destination of transfer commands
        const TRANSFER_DST = 1 << 1;
        /// Uniform buffer
        const UNIFORM = 1 << 2;
        /// Storage buffer
        const STORAGE = 1 << 3;
        /// Index buffer
        const INDEX = 1 << 4;
        /// Vertex buffer
        const VERTEX = 1 << 5;
        /// Indirect draw/dispatch arguments
        const INDIRECT = 1 << 6;
    }
}

bitflags! {
    /// Ways an image may be used
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct ImageUsage: u32 {
        /// Source of transfer commands
        const TRANSFER_SRC = 1 << 0;
        /// Destination of transfer commands
        const TRANSFER_DST = 1 << 1;
        /// Sampled in shaders
        const SAMPLED = 1 << 2;
        /// Storage image
        const STORAGE = 1 << 3;
        /// Color attachment
        const COLOR_ATTACHMENT = 1 << 4;
        /// Depth/stencil attachment
        const DEPTH_STENCIL_ATTACHMENT = 1 << 5;
    }
}

/// Kind of physical device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DeviceType {
    /// Anything not covered below
    #[default]
    Other,
    /// GPU sharing memory with the host
    IntegratedGpu,
    /// Dedicated GPU
    DiscreteGpu,
    /// GPU exposed through virtualization
    VirtualGpu,
    /// Software implementation on the CPU
    Cpu,
}

/// Subset of device limits relevant to allocation and queue planning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceLimits {
    /// Largest 2D image dimension
    pub max_image_dimension_2d: u32,
    /// Maximum number of live native memory allocations
    pub max_memory_allocation_count: u32,
    /// Maximum number of bound descriptor sets
    pub max_bound_descriptor_sets: u32,
    /// Maximum invocations in one compute work group
    pub max_compute_work_group_invocations: u32,
    /// Granularity at which buffers and images may share a page
    pub buffer_image_granularity: u64,
    /// Alignment for flushes of non-coherent mapped memory
    pub non_coherent_atom_size: u64,
}

impl Default for DeviceLimits {
    fn default() -> Self {
        Self {
            max_image_dimension_2d: 4096,
            max_memory_allocation_count: 4096,
            max_bound_descriptor_sets: 4,
            max_compute_work_group_invocations: 128,
            buffer_image_granularity: 1,
            non_coherent_atom_size: 1,
        }
    }
}

/// Identity and limits of a physical device
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceProperties {
    /// Human readable device name
    pub name: String,
    /// Kind of device
    pub device_type: DeviceType,
    /// Device limits
    pub limits: DeviceLimits,
}

/// One hardware queue family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueFamilyInfo {
    /// Operations every queue in this family supports (PRESENT is not reported here)
    pub capabilities: QueueCapabilities,
    /// Number of hardware queues in the family
    pub queue_count: u32,
}

/// One device memory type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryType {
    /// Property flags
    pub properties: MemoryProperties,
    /// Heap this type allocates from
    #[serde(default)]
    pub heap_index: u32,
}

/// Memory requirements reported for a buffer or image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemoryRequirements {
    /// Bytes the resource needs
    pub size: u64,
    /// Required alignment of the resource's offset
    pub alignment: u64,
    /// Bit `i` set when memory type `i` is acceptable
    pub memory_type_bits: u32,
}

/// How many surface formats and present modes a device offers for a surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SurfaceSupport {
    /// Supported surface formats
    pub format_count: u32,
    /// Supported present modes
    pub present_mode_count: u32,
}

impl SurfaceSupport {
    /// Whether the surface can be presented to at all
    pub fn is_usable(&self) -> bool {
        self.format_count > 0 && self.present_mode_count > 0
    }
}

/// Parameters for creating an unbound buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferDesc {
    /// Size in bytes
    pub size: u64,
    /// Intended usage
    pub usage: BufferUsage,
}

/// Pixel formats supported by image creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ImageFormat {
    /// 8-bit RGBA, unsigned normalized
    #[default]
    Rgba8Unorm,
    /// 8-bit RGBA, sRGB
    Rgba8Srgb,
    /// 8-bit BGRA, sRGB
    Bgra8Srgb,
    /// 16-bit float RGBA
    Rgba16Float,
    /// 32-bit float RGBA
    Rgba32Float,
    /// 32-bit float depth
    D32Float,
    /// 24-bit depth with 8-bit stencil
    D24UnormS8Uint,
}

impl ImageFormat {
    /// Bytes per texel
    pub fn texel_size(self) -> u64 {
        match self {
            Self::Rgba8Unorm | Self::Rgba8Srgb | Self::Bgra8Srgb | Self::D32Float | Self::D24UnormS8Uint => 4,
            Self::Rgba16Float => 8,
            Self::Rgba32Float => 16,
        }
    }
}

/// Parameters for creating an unbound 2D (or layered) image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDesc {
    /// Width in texels
    pub width: u32,
    /// Height in texels
    pub height: u32,
    /// Number of mip levels
    pub mip_levels: u32,
    /// Number of array layers
    pub array_layers: u32,
    /// Texel format
    pub format: ImageFormat,
    /// Intended usage
    pub usage: ImageUsage,
}

impl ImageDesc {
    /// Single-level, single-layer image
    pub fn new_2d(width: u32, height: u32, format: ImageFormat, usage: ImageUsage) -> Self {
        Self {
            width,
            height,
            mip_levels: 1,
            array_layers: 1,
            format,
            usage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symmetric_difference_count() {
        let requested = QueueCapabilities::GRAPHICS;
        assert_eq!(requested.symmetric_difference_count(QueueCapabilities::GRAPHICS), 0);
        assert_eq!(
            requested.symmetric_difference_count(QueueCapabilities::GRAPHICS | QueueCapabilities::COMPUTE),
            1
        );
        assert_eq!(
            requested.symmetric_difference_count(QueueCapabilities::COMPUTE | QueueCapabilities::TRANSFER),
            3
        );
    }

    #[test]
    fn test_surface_support_usable() {
        assert!(SurfaceSupport { format_count: 2, present_mode_count: 1 }.is_usable());
        assert!(!SurfaceSupport { format_count: 0, present_mode_count: 3 }.is_usable());
        assert!(!SurfaceSupport::default().is_usable());
    }
}
