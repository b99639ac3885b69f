//! Vulkan backend over ash
//!
//! `VulkanInstance` owns the loader entry, the instance, the surface loader and,
//! in debug builds, the validation messenger. `VulkanDevice` is a cheap clone of
//! the ash device table; it is destroyed explicitly by the owning
//! [`crate::device::LogicalDevice`].

use std::collections::BTreeSet;
use std::ffi::{c_char, CStr, CString};
use std::ptr::NonNull;

#[cfg(debug_assertions)]
use ash::extensions::ext::DebugUtils;
use ash::extensions::khr::{Surface, Swapchain};
use ash::{vk, Device, Entry, Instance};

use super::{DeviceBackend, DeviceCreateDesc, InstanceBackend};
use crate::error::{GpuError, GpuResult};
use crate::types::{
    BufferDesc, BufferUsage, DeviceFeatures, DeviceLimits, DeviceProperties, DeviceType, ImageDesc,
    ImageFormat, ImageUsage, MemoryProperties, MemoryRequirements, MemoryType, QueueCapabilities,
    QueueFamilyInfo, SurfaceSupport,
};

/// Vulkan instance wrapper with RAII cleanup
pub struct VulkanInstance {
    /// Vulkan entry point
    pub entry: Entry,
    /// Vulkan instance handle
    pub instance: Instance,
    /// Surface extension loader
    pub surface_loader: Surface,
    surface_extension: String,
    /// Debug utilities extension (debug builds)
    #[cfg(debug_assertions)]
    pub debug_utils: Option<DebugUtils>,
    /// Debug messenger handle (debug builds)
    #[cfg(debug_assertions)]
    pub debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
}

impl VulkanInstance {
    /// Create a new Vulkan instance
    ///
    /// `instance_extensions` are typically the surface extensions reported by
    /// the windowing library; validation layers are only enabled in debug builds.
    pub fn new(app_name: &str, enable_validation: bool, instance_extensions: &[String]) -> GpuResult<Self> {
        let entry = unsafe { Entry::load() }
            .map_err(|e| GpuError::InitializationFailed(format!("Failed to load Vulkan: {e:?}")))?;

        let app_name_cstr = to_cstring(app_name)?;
        let engine_name_cstr = to_cstring("gpu_core")?;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name_cstr)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(&engine_name_cstr)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_0);

        let cstr_extensions = instance_extensions
            .iter()
            .map(|ext| to_cstring(ext))
            .collect::<GpuResult<Vec<_>>>()?;

        #[allow(unused_mut)] // Mutable in debug builds for adding debug extensions
        let mut extensions: Vec<*const c_char> = cstr_extensions.iter().map(|ext| ext.as_ptr()).collect();

        #[cfg(debug_assertions)]
        if enable_validation {
            extensions.push(DebugUtils::name().as_ptr());
        }

        let layer_names = if cfg!(debug_assertions) && enable_validation {
            vec![to_cstring("VK_LAYER_KHRONOS_validation")?]
        } else {
            vec![]
        };
        let layer_names_ptrs: Vec<*const c_char> = layer_names.iter().map(|name| name.as_ptr()).collect();

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layer_names_ptrs);

        let instance = unsafe { entry.create_instance(&create_info, None)? };
        let surface_loader = Surface::new(&entry, &instance);

        #[cfg(debug_assertions)]
        let (debug_utils, debug_messenger) = if enable_validation {
            let debug_utils = DebugUtils::new(&entry, &instance);
            let debug_messenger = Self::setup_debug_messenger(&debug_utils)?;
            (Some(debug_utils), Some(debug_messenger))
        } else {
            (None, None)
        };

        log::info!(
            "Created Vulkan instance for '{}' (validation: {})",
            app_name,
            cfg!(debug_assertions) && enable_validation
        );

        Ok(Self {
            entry,
            instance,
            surface_loader,
            surface_extension: Swapchain::name().to_string_lossy().into_owned(),
            #[cfg(debug_assertions)]
            debug_utils,
            #[cfg(debug_assertions)]
            debug_messenger,
        })
    }

    #[cfg(debug_assertions)]
    fn setup_debug_messenger(debug_utils: &DebugUtils) -> GpuResult<vk::DebugUtilsMessengerEXT> {
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        Ok(unsafe { debug_utils.create_debug_utils_messenger(&create_info, None)? })
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        unsafe {
            #[cfg(debug_assertions)]
            if let (Some(debug_utils), Some(debug_messenger)) = (&self.debug_utils, &self.debug_messenger) {
                debug_utils.destroy_debug_utils_messenger(*debug_messenger, None);
            }

            self.instance.destroy_instance(None);
        }
    }
}

/// Debug callback for validation layers
#[cfg(debug_assertions)]
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let callback_data = *callback_data;
    let message = CStr::from_ptr(callback_data.p_message).to_string_lossy();

    if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::ERROR {
        log::error!("[Vulkan] {:?} - {}", message_type, message);
    } else if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING {
        log::warn!("[Vulkan] {:?} - {}", message_type, message);
    } else {
        log::debug!("[Vulkan] {:?} - {}", message_type, message);
    }

    vk::FALSE
}

impl InstanceBackend for VulkanInstance {
    type PhysicalDevice = vk::PhysicalDevice;
    type Surface = vk::SurfaceKHR;
    type Device = VulkanDevice;

    fn enumerate_physical_devices(&self) -> GpuResult<Vec<vk::PhysicalDevice>> {
        Ok(unsafe { self.instance.enumerate_physical_devices()? })
    }

    fn queue_family_properties(&self, physical_device: vk::PhysicalDevice) -> Vec<QueueFamilyInfo> {
        let families = unsafe { self.instance.get_physical_device_queue_family_properties(physical_device) };
        families
            .iter()
            .map(|family| QueueFamilyInfo {
                capabilities: queue_capabilities_from_vk(family.queue_flags),
                queue_count: family.queue_count,
            })
            .collect()
    }

    fn device_extensions(&self, physical_device: vk::PhysicalDevice) -> GpuResult<BTreeSet<String>> {
        let extensions = unsafe { self.instance.enumerate_device_extension_properties(physical_device)? };
        Ok(extensions
            .iter()
            .map(|available| {
                unsafe { CStr::from_ptr(available.extension_name.as_ptr()) }
                    .to_string_lossy()
                    .into_owned()
            })
            .collect())
    }

    fn surface_extension_name(&self) -> &str {
        &self.surface_extension
    }

    fn surface_support(
        &self,
        physical_device: vk::PhysicalDevice,
        family_index: u32,
        surface: vk::SurfaceKHR,
    ) -> GpuResult<bool> {
        Ok(unsafe {
            self.surface_loader
                .get_physical_device_surface_support(physical_device, family_index, surface)?
        })
    }

    fn surface_formats_and_modes(
        &self,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> GpuResult<SurfaceSupport> {
        let formats = unsafe {
            self.surface_loader
                .get_physical_device_surface_formats(physical_device, surface)?
        };
        let present_modes = unsafe {
            self.surface_loader
                .get_physical_device_surface_present_modes(physical_device, surface)?
        };
        Ok(SurfaceSupport {
            format_count: u32::try_from(formats.len()).unwrap_or(u32::MAX),
            present_mode_count: u32::try_from(present_modes.len()).unwrap_or(u32::MAX),
        })
    }

    fn device_properties(&self, physical_device: vk::PhysicalDevice) -> DeviceProperties {
        let properties = unsafe { self.instance.get_physical_device_properties(physical_device) };
        let name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }
            .to_string_lossy()
            .into_owned();
        let limits = &properties.limits;

        DeviceProperties {
            name,
            device_type: device_type_from_vk(properties.device_type),
            limits: DeviceLimits {
                max_image_dimension_2d: limits.max_image_dimension2_d,
                max_memory_allocation_count: limits.max_memory_allocation_count,
                max_bound_descriptor_sets: limits.max_bound_descriptor_sets,
                max_compute_work_group_invocations: limits.max_compute_work_group_invocations,
                buffer_image_granularity: limits.buffer_image_granularity,
                non_coherent_atom_size: limits.non_coherent_atom_size,
            },
        }
    }

    fn device_features(&self, physical_device: vk::PhysicalDevice) -> DeviceFeatures {
        let features = unsafe { self.instance.get_physical_device_features(physical_device) };
        features_from_vk(&features)
    }

    fn memory_types(&self, physical_device: vk::PhysicalDevice) -> Vec<MemoryType> {
        let mem_properties = unsafe { self.instance.get_physical_device_memory_properties(physical_device) };
        mem_properties.memory_types[..mem_properties.memory_type_count as usize]
            .iter()
            .map(|memory_type| MemoryType {
                properties: memory_properties_from_vk(memory_type.property_flags),
                heap_index: memory_type.heap_index,
            })
            .collect()
    }

    fn create_device(&self, physical_device: vk::PhysicalDevice, desc: &DeviceCreateDesc) -> GpuResult<VulkanDevice> {
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = desc
            .queues
            .iter()
            .map(|queue| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(queue.family_index)
                    .queue_priorities(&queue.priorities)
                    .build()
            })
            .collect();

        let extension_names = desc
            .extensions
            .iter()
            .map(|ext| to_cstring(ext))
            .collect::<GpuResult<Vec<_>>>()?;
        let extension_ptrs: Vec<*const c_char> = extension_names.iter().map(|ext| ext.as_ptr()).collect();

        let device_features = features_to_vk(desc.features);

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extension_ptrs)
            .enabled_features(&device_features);

        let device = unsafe { self.instance.create_device(physical_device, &create_info, None)? };
        Ok(VulkanDevice { device })
    }
}

/// Cloneable handle to a Vulkan logical device
#[derive(Clone)]
pub struct VulkanDevice {
    /// ash device function table
    pub device: Device,
}

impl VulkanDevice {
    /// Raw ash device
    pub fn raw(&self) -> &Device {
        &self.device
    }
}

impl DeviceBackend for VulkanDevice {
    type Queue = vk::Queue;
    type CommandPool = vk::CommandPool;
    type Memory = vk::DeviceMemory;
    type Buffer = vk::Buffer;
    type Image = vk::Image;

    fn get_queue(&self, family_index: u32, queue_index: u32) -> vk::Queue {
        unsafe { self.device.get_device_queue(family_index, queue_index) }
    }

    fn create_command_pool(&self, family_index: u32, transient: bool) -> GpuResult<vk::CommandPool> {
        let mut flags = vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER;
        if transient {
            flags |= vk::CommandPoolCreateFlags::TRANSIENT;
        }
        let pool_info = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(family_index)
            .flags(flags);

        Ok(unsafe { self.device.create_command_pool(&pool_info, None)? })
    }

    fn destroy_command_pool(&self, pool: vk::CommandPool) {
        unsafe { self.device.destroy_command_pool(pool, None) }
    }

    fn create_buffer(&self, desc: &BufferDesc) -> GpuResult<vk::Buffer> {
        let buffer_info = vk::BufferCreateInfo::builder()
            .size(desc.size)
            .usage(buffer_usage_to_vk(desc.usage))
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        Ok(unsafe { self.device.create_buffer(&buffer_info, None)? })
    }

    fn destroy_buffer(&self, buffer: vk::Buffer) {
        unsafe { self.device.destroy_buffer(buffer, None) }
    }

    fn create_image(&self, desc: &ImageDesc) -> GpuResult<vk::Image> {
        let image_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format_to_vk(desc.format))
            .extent(vk::Extent3D {
                width: desc.width,
                height: desc.height,
                depth: 1,
            })
            .mip_levels(desc.mip_levels)
            .array_layers(desc.array_layers)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(image_usage_to_vk(desc.usage))
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        Ok(unsafe { self.device.create_image(&image_info, None)? })
    }

    fn destroy_image(&self, image: vk::Image) {
        unsafe { self.device.destroy_image(image, None) }
    }

    fn buffer_memory_requirements(&self, buffer: vk::Buffer) -> MemoryRequirements {
        let requirements = unsafe { self.device.get_buffer_memory_requirements(buffer) };
        memory_requirements_from_vk(requirements)
    }

    fn image_memory_requirements(&self, image: vk::Image) -> MemoryRequirements {
        let requirements = unsafe { self.device.get_image_memory_requirements(image) };
        memory_requirements_from_vk(requirements)
    }

    fn allocate_memory(&self, size: u64, memory_type_index: u32) -> GpuResult<vk::DeviceMemory> {
        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(size)
            .memory_type_index(memory_type_index);

        Ok(unsafe { self.device.allocate_memory(&alloc_info, None)? })
    }

    fn free_memory(&self, memory: vk::DeviceMemory) {
        unsafe { self.device.free_memory(memory, None) }
    }

    fn bind_buffer_memory(&self, buffer: vk::Buffer, memory: vk::DeviceMemory, offset: u64) -> GpuResult<()> {
        Ok(unsafe { self.device.bind_buffer_memory(buffer, memory, offset)? })
    }

    fn bind_image_memory(&self, image: vk::Image, memory: vk::DeviceMemory, offset: u64) -> GpuResult<()> {
        Ok(unsafe { self.device.bind_image_memory(image, memory, offset)? })
    }

    fn map_memory(&self, memory: vk::DeviceMemory, offset: u64, size: u64) -> GpuResult<NonNull<u8>> {
        let ptr = unsafe {
            self.device
                .map_memory(memory, offset, size, vk::MemoryMapFlags::empty())?
        };
        NonNull::new(ptr.cast::<u8>())
            .ok_or_else(|| GpuError::Backend("vkMapMemory returned a null pointer".to_string()))
    }

    fn unmap_memory(&self, memory: vk::DeviceMemory) {
        unsafe { self.device.unmap_memory(memory) }
    }

    fn wait_idle(&self) -> GpuResult<()> {
        Ok(unsafe { self.device.device_wait_idle()? })
    }

    fn destroy_device(&self) {
        unsafe { self.device.destroy_device(None) }
    }
}

fn to_cstring(value: &str) -> GpuResult<CString> {
    CString::new(value).map_err(|e| GpuError::ContractViolation(format!("Invalid name '{value}': {e}")))
}

fn queue_capabilities_from_vk(flags: vk::QueueFlags) -> QueueCapabilities {
    let mut capabilities = QueueCapabilities::empty();
    if flags.contains(vk::QueueFlags::GRAPHICS) {
        capabilities |= QueueCapabilities::GRAPHICS;
    }
    if flags.contains(vk::QueueFlags::COMPUTE) {
        capabilities |= QueueCapabilities::COMPUTE;
    }
    if flags.contains(vk::QueueFlags::TRANSFER) {
        capabilities |= QueueCapabilities::TRANSFER;
    }
    capabilities
}

fn memory_properties_from_vk(flags: vk::MemoryPropertyFlags) -> MemoryProperties {
    const TABLE: [(vk::MemoryPropertyFlags, MemoryProperties); 6] = [
        (vk::MemoryPropertyFlags::DEVICE_LOCAL, MemoryProperties::DEVICE_LOCAL),
        (vk::MemoryPropertyFlags::HOST_VISIBLE, MemoryProperties::HOST_VISIBLE),
        (vk::MemoryPropertyFlags::HOST_COHERENT, MemoryProperties::HOST_COHERENT),
        (vk::MemoryPropertyFlags::HOST_CACHED, MemoryProperties::HOST_CACHED),
        (vk::MemoryPropertyFlags::LAZILY_ALLOCATED, MemoryProperties::LAZILY_ALLOCATED),
        (vk::MemoryPropertyFlags::PROTECTED, MemoryProperties::PROTECTED),
    ];

    TABLE
        .iter()
        .filter(|(native, _)| flags.contains(*native))
        .fold(MemoryProperties::empty(), |acc, (_, ours)| acc | *ours)
}

fn memory_requirements_from_vk(requirements: vk::MemoryRequirements) -> MemoryRequirements {
    MemoryRequirements {
        size: requirements.size,
        alignment: requirements.alignment,
        memory_type_bits: requirements.memory_type_bits,
    }
}

fn device_type_from_vk(device_type: vk::PhysicalDeviceType) -> DeviceType {
    match device_type {
        vk::PhysicalDeviceType::INTEGRATED_GPU => DeviceType::IntegratedGpu,
        vk::PhysicalDeviceType::DISCRETE_GPU => DeviceType::DiscreteGpu,
        vk::PhysicalDeviceType::VIRTUAL_GPU => DeviceType::VirtualGpu,
        vk::PhysicalDeviceType::CPU => DeviceType::Cpu,
        _ => DeviceType::Other,
    }
}

fn buffer_usage_to_vk(usage: BufferUsage) -> vk::BufferUsageFlags {
    const TABLE: [(BufferUsage, vk::BufferUsageFlags); 7] = [
        (BufferUsage::TRANSFER_SRC, vk::BufferUsageFlags::TRANSFER_SRC),
        (BufferUsage::TRANSFER_DST, vk::BufferUsageFlags::TRANSFER_DST),
        (BufferUsage::UNIFORM, vk::BufferUsageFlags::UNIFORM_BUFFER),
        (BufferUsage::STORAGE, vk::BufferUsageFlags::STORAGE_BUFFER),
        (BufferUsage::INDEX, vk::BufferUsageFlags::INDEX_BUFFER),
        (BufferUsage::VERTEX, vk::BufferUsageFlags::VERTEX_BUFFER),
        (BufferUsage::INDIRECT, vk::BufferUsageFlags::INDIRECT_BUFFER),
    ];

    TABLE
        .iter()
        .filter(|(ours, _)| usage.contains(*ours))
        .fold(vk::BufferUsageFlags::empty(), |acc, (_, native)| acc | *native)
}

fn image_usage_to_vk(usage: ImageUsage) -> vk::ImageUsageFlags {
    const TABLE: [(ImageUsage, vk::ImageUsageFlags); 6] = [
        (ImageUsage::TRANSFER_SRC, vk::ImageUsageFlags::TRANSFER_SRC),
        (ImageUsage::TRANSFER_DST, vk::ImageUsageFlags::TRANSFER_DST),
        (ImageUsage::SAMPLED, vk::ImageUsageFlags::SAMPLED),
        (ImageUsage::STORAGE, vk::ImageUsageFlags::STORAGE),
        (ImageUsage::COLOR_ATTACHMENT, vk::ImageUsageFlags::COLOR_ATTACHMENT),
        (ImageUsage::DEPTH_STENCIL_ATTACHMENT, vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT),
    ];

    TABLE
        .iter()
        .filter(|(ours, _)| usage.contains(*ours))
        .fold(vk::ImageUsageFlags::empty(), |acc, (_, native)| acc | *native)
}

fn format_to_vk(format: ImageFormat) -> vk::Format {
    match format {
        ImageFormat::Rgba8Unorm => vk::Format::R8G8B8A8_UNORM,
        ImageFormat::Rgba8Srgb => vk::Format::R8G8B8A8_SRGB,
        ImageFormat::Bgra8Srgb => vk::Format::B8G8R8A8_SRGB,
        ImageFormat::Rgba16Float => vk::Format::R16G16B16A16_SFLOAT,
        ImageFormat::Rgba32Float => vk::Format::R32G32B32A32_SFLOAT,
        ImageFormat::D32Float => vk::Format::D32_SFLOAT,
        ImageFormat::D24UnormS8Uint => vk::Format::D24_UNORM_S8_UINT,
    }
}

/// Generates the two-way mapping between `DeviceFeatures` and `vk::PhysicalDeviceFeatures`
macro_rules! feature_mapping {
    ($($flag:ident => $field:ident),* $(,)?) => {
        fn features_from_vk(features: &vk::PhysicalDeviceFeatures) -> DeviceFeatures {
            let mut supported = DeviceFeatures::empty();
            $(
                if features.$field == vk::TRUE {
                    supported |= DeviceFeatures::$flag;
                }
            )*
            supported
        }

        fn features_to_vk(features: DeviceFeatures) -> vk::PhysicalDeviceFeatures {
            let mut enabled = vk::PhysicalDeviceFeatures::default();
            $(
                enabled.$field = vk::Bool32::from(features.contains(DeviceFeatures::$flag));
            )*
            enabled
        }
    };
}

feature_mapping! {
    FULL_DRAW_INDEX_UINT32 => full_draw_index_uint32,
    IMAGE_CUBE_ARRAY => image_cube_array,
    INDEPENDENT_BLEND => independent_blend,
    GEOMETRY_SHADER => geometry_shader,
    TESSELLATION_SHADER => tessellation_shader,
    SAMPLE_RATE_SHADING => sample_rate_shading,
    MULTI_DRAW_INDIRECT => multi_draw_indirect,
    DEPTH_CLAMP => depth_clamp,
    FILL_MODE_NON_SOLID => fill_mode_non_solid,
    WIDE_LINES => wide_lines,
    SAMPLER_ANISOTROPY => sampler_anisotropy,
    TEXTURE_COMPRESSION_BC => texture_compression_bc,
    TEXTURE_COMPRESSION_ETC2 => texture_compression_etc2,
    TEXTURE_COMPRESSION_ASTC_LDR => texture_compression_astc_ldr,
    OCCLUSION_QUERY_PRECISE => occlusion_query_precise,
    FRAGMENT_STORES_AND_ATOMICS => fragment_stores_and_atomics,
    SHADER_FLOAT64 => shader_float64,
    SHADER_INT64 => shader_int64,
    SHADER_INT16 => shader_int16,
}
