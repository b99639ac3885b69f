//! Driverless backend built from device profiles
//!
//! Each physical device is described by a [`DeviceProfile`] (queue families,
//! extensions, features, memory types). Objects created through the device are
//! tracked in slot maps and memory is backed by host bytes, so mapping and
//! writes behave like the real thing. Native call counts are kept in
//! [`SimulationStats`] for inspection.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashSet};
use std::ptr::NonNull;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use slotmap::{new_key_type, SlotMap};

use super::{DeviceBackend, DeviceCreateDesc, InstanceBackend};
use crate::config::Config;
use crate::error::{GpuError, GpuResult};
use crate::types::{
    BufferDesc, DeviceFeatures, DeviceLimits, DeviceProperties, DeviceType, ImageDesc, MemoryProperties,
    MemoryRequirements, MemoryType, QueueCapabilities, QueueFamilyInfo, SurfaceSupport,
};

/// Swapchain extension name reported by simulated devices
pub const SIMULATED_SWAPCHAIN_EXTENSION: &str = "VK_KHR_swapchain";

/// One queue family of a simulated device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueFamilyProfile {
    /// Hardware capabilities (PRESENT is ignored, use `present`)
    pub capabilities: QueueCapabilities,
    /// Number of queues
    pub queue_count: u32,
    /// Whether the family can present to surfaces
    #[serde(default)]
    pub present: bool,
}

/// Description of a simulated physical device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceProfile {
    /// Device name
    pub name: String,
    /// Kind of device
    #[serde(default)]
    pub device_type: DeviceType,
    /// Queue family table
    pub queue_families: Vec<QueueFamilyProfile>,
    /// Supported device extensions
    #[serde(default)]
    pub extensions: Vec<String>,
    /// Supported features
    #[serde(default)]
    pub features: DeviceFeatures,
    /// Device limits
    #[serde(default)]
    pub limits: DeviceLimits,
    /// Memory types, indexed by memory type index
    pub memory_types: Vec<MemoryType>,
    /// Surface formats offered when presenting
    #[serde(default = "default_surface_count")]
    pub surface_formats: u32,
    /// Present modes offered when presenting
    #[serde(default = "default_surface_count")]
    pub present_modes: u32,
    /// Alignment folded into every reported resource size
    #[serde(default = "default_alignment")]
    pub alignment: u64,
    /// Memory types acceptable for buffers (all types when absent)
    #[serde(default)]
    pub buffer_memory_type_bits: Option<u32>,
    /// Memory types acceptable for images (all types when absent)
    #[serde(default)]
    pub image_memory_type_bits: Option<u32>,
    /// Per-family surface support queries return an error
    #[serde(default)]
    pub surface_support_fails: bool,
}

fn default_surface_count() -> u32 {
    1
}

fn default_alignment() -> u64 {
    256
}

impl DeviceProfile {
    /// Empty profile with no queue families or memory types
    pub fn new(name: impl Into<String>, device_type: DeviceType) -> Self {
        Self {
            name: name.into(),
            device_type,
            queue_families: Vec::new(),
            extensions: Vec::new(),
            features: DeviceFeatures::empty(),
            limits: DeviceLimits::default(),
            memory_types: Vec::new(),
            surface_formats: default_surface_count(),
            present_modes: default_surface_count(),
            alignment: default_alignment(),
            buffer_memory_type_bits: None,
            image_memory_type_bits: None,
            surface_support_fails: false,
        }
    }

    /// Add a queue family
    pub fn with_queue_family(mut self, capabilities: QueueCapabilities, queue_count: u32, present: bool) -> Self {
        self.queue_families.push(QueueFamilyProfile {
            capabilities: capabilities - QueueCapabilities::PRESENT,
            queue_count,
            present,
        });
        self
    }

    /// Add a supported extension
    pub fn with_extension(mut self, name: impl Into<String>) -> Self {
        self.extensions.push(name.into());
        self
    }

    /// Set supported features
    pub fn with_features(mut self, features: DeviceFeatures) -> Self {
        self.features = features;
        self
    }

    /// Add a memory type on heap 0
    pub fn with_memory_type(mut self, properties: MemoryProperties) -> Self {
        self.memory_types.push(MemoryType {
            properties,
            heap_index: 0,
        });
        self
    }

    /// Set the surface formats and present modes offered
    pub fn with_surface_support(mut self, formats: u32, present_modes: u32) -> Self {
        self.surface_formats = formats;
        self.present_modes = present_modes;
        self
    }

    /// Set the alignment folded into reported sizes
    pub fn with_alignment(mut self, alignment: u64) -> Self {
        self.alignment = alignment.max(1);
        self
    }

    /// Make per-family surface support queries fail
    pub fn with_failing_surface_support(mut self) -> Self {
        self.surface_support_fails = true;
        self
    }

    /// Restrict buffers to the given memory types
    pub fn with_buffer_memory_type_bits(mut self, bits: u32) -> Self {
        self.buffer_memory_type_bits = Some(bits);
        self
    }

    fn all_memory_type_bits(&self) -> u32 {
        match self.memory_types.len() {
            0 => 0,
            n if n >= 32 => u32::MAX,
            n => (1u32 << n) - 1,
        }
    }
}

/// A set of simulated devices, loadable from TOML or RON
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SimulationProfile {
    /// Physical devices in enumeration order
    pub devices: Vec<DeviceProfile>,
}

impl Config for SimulationProfile {}

/// Physical device handle: index into the instance's profiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SimPhysicalDevice(pub usize);

/// Surface handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SimSurface(pub u32);

/// Queue handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SimQueue {
    /// Family index
    pub family_index: u32,
    /// Queue index within the family
    pub queue_index: u32,
}

new_key_type! {
    /// Simulated device memory
    pub struct SimMemory;
    /// Simulated buffer
    pub struct SimBuffer;
    /// Simulated image
    pub struct SimImage;
    /// Simulated command pool
    pub struct SimCommandPool;
}

/// Native call counters of a simulated device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SimulationStats {
    /// Successful memory allocations
    pub allocations: u32,
    /// Memory frees
    pub frees: u32,
    /// Map calls
    pub maps: u32,
    /// Unmap calls
    pub unmaps: u32,
    /// Buffer and image binds
    pub binds: u32,
    /// Command pools created
    pub command_pools_created: u32,
    /// Command pools destroyed
    pub command_pools_destroyed: u32,
    /// Calls on handles that were unknown or already destroyed
    pub invalid_calls: u32,
}

struct Allocation {
    memory_type_index: u32,
    data: Box<[u8]>,
    mapped: bool,
}

struct ResourceRecord {
    requirements: MemoryRequirements,
    binding: Option<(SimMemory, u64)>,
}

struct PoolRecord {
    family_index: u32,
    transient: bool,
}

struct DeviceState {
    profile: DeviceProfile,
    desc: DeviceCreateDesc,
    memory: SlotMap<SimMemory, Allocation>,
    buffers: SlotMap<SimBuffer, ResourceRecord>,
    images: SlotMap<SimImage, ResourceRecord>,
    pools: SlotMap<SimCommandPool, PoolRecord>,
    stats: SimulationStats,
    destroyed: bool,
}

/// Instance over a list of device profiles
#[derive(Debug, Clone, Default)]
pub struct SimulatedInstance {
    devices: Vec<DeviceProfile>,
}

impl SimulatedInstance {
    /// Instance exposing `devices` in order
    pub fn new(devices: Vec<DeviceProfile>) -> Self {
        Self { devices }
    }

    /// Instance exposing the devices of a loaded profile
    pub fn from_profile(profile: SimulationProfile) -> Self {
        Self::new(profile.devices)
    }

    /// Profile of a physical device
    pub fn profile(&self, physical_device: SimPhysicalDevice) -> Option<&DeviceProfile> {
        self.devices.get(physical_device.0)
    }

    fn profile_or_err(&self, physical_device: SimPhysicalDevice) -> GpuResult<&DeviceProfile> {
        self.profile(physical_device)
            .ok_or_else(|| GpuError::Backend(format!("Unknown physical device {}", physical_device.0)))
    }
}

impl InstanceBackend for SimulatedInstance {
    type PhysicalDevice = SimPhysicalDevice;
    type Surface = SimSurface;
    type Device = SimulatedDevice;

    fn enumerate_physical_devices(&self) -> GpuResult<Vec<SimPhysicalDevice>> {
        Ok((0..self.devices.len()).map(SimPhysicalDevice).collect())
    }

    fn queue_family_properties(&self, physical_device: SimPhysicalDevice) -> Vec<QueueFamilyInfo> {
        self.profile(physical_device)
            .map(|profile| {
                profile
                    .queue_families
                    .iter()
                    .map(|family| QueueFamilyInfo {
                        capabilities: family.capabilities - QueueCapabilities::PRESENT,
                        queue_count: family.queue_count,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn device_extensions(&self, physical_device: SimPhysicalDevice) -> GpuResult<BTreeSet<String>> {
        Ok(self.profile_or_err(physical_device)?.extensions.iter().cloned().collect())
    }

    fn surface_extension_name(&self) -> &str {
        SIMULATED_SWAPCHAIN_EXTENSION
    }

    fn surface_support(&self, physical_device: SimPhysicalDevice, family_index: u32, _surface: SimSurface) -> GpuResult<bool> {
        let profile = self.profile_or_err(physical_device)?;
        if profile.surface_support_fails {
            return Err(GpuError::Backend(format!("'{}' lost the surface", profile.name)));
        }
        Ok(profile
            .queue_families
            .get(family_index as usize)
            .is_some_and(|family| family.present))
    }

    fn surface_formats_and_modes(&self, physical_device: SimPhysicalDevice, _surface: SimSurface) -> GpuResult<SurfaceSupport> {
        let profile = self.profile_or_err(physical_device)?;
        Ok(SurfaceSupport {
            format_count: profile.surface_formats,
            present_mode_count: profile.present_modes,
        })
    }

    fn device_properties(&self, physical_device: SimPhysicalDevice) -> DeviceProperties {
        self.profile(physical_device)
            .map(|profile| DeviceProperties {
                name: profile.name.clone(),
                device_type: profile.device_type,
                limits: profile.limits,
            })
            .unwrap_or_default()
    }

    fn device_features(&self, physical_device: SimPhysicalDevice) -> DeviceFeatures {
        self.profile(physical_device)
            .map(|profile| profile.features)
            .unwrap_or_default()
    }

    fn memory_types(&self, physical_device: SimPhysicalDevice) -> Vec<MemoryType> {
        self.profile(physical_device)
            .map(|profile| profile.memory_types.clone())
            .unwrap_or_default()
    }

    fn create_device(&self, physical_device: SimPhysicalDevice, desc: &DeviceCreateDesc) -> GpuResult<SimulatedDevice> {
        let profile = self.profile_or_err(physical_device)?;
        validate_create_desc(profile, desc)?;

        log::debug!(
            "Simulated device '{}' created with {} queue families",
            profile.name,
            desc.queues.len()
        );

        Ok(SimulatedDevice {
            state: Rc::new(RefCell::new(DeviceState {
                profile: profile.clone(),
                desc: desc.clone(),
                memory: SlotMap::with_key(),
                buffers: SlotMap::with_key(),
                images: SlotMap::with_key(),
                pools: SlotMap::with_key(),
                stats: SimulationStats::default(),
                destroyed: false,
            })),
        })
    }
}

/// Rejects descriptors a real driver would refuse
fn validate_create_desc(profile: &DeviceProfile, desc: &DeviceCreateDesc) -> GpuResult<()> {
    let mut seen = HashSet::new();
    for queue in &desc.queues {
        let family = profile
            .queue_families
            .get(queue.family_index as usize)
            .ok_or_else(|| GpuError::Backend(format!("Queue family {} does not exist", queue.family_index)))?;
        if !seen.insert(queue.family_index) {
            return Err(GpuError::Backend(format!(
                "Queue family {} listed more than once",
                queue.family_index
            )));
        }
        if queue.priorities.is_empty() || queue.priorities.len() > family.queue_count as usize {
            return Err(GpuError::Backend(format!(
                "Queue family {} requested {} queues but has {}",
                queue.family_index,
                queue.priorities.len(),
                family.queue_count
            )));
        }
        if queue.priorities.iter().any(|p| !(0.0..=1.0).contains(p)) {
            return Err(GpuError::Backend("Queue priority outside 0..=1".to_string()));
        }
    }

    if let Some(missing) = desc.extensions.iter().find(|ext| !profile.extensions.contains(ext)) {
        return Err(GpuError::Backend(format!("Extension {missing} not present")));
    }
    if !profile.features.contains(desc.features) {
        return Err(GpuError::Backend(format!(
            "Features {:?} not supported",
            desc.features - profile.features
        )));
    }
    Ok(())
}

/// Logical device of a [`SimulatedInstance`]
#[derive(Clone)]
pub struct SimulatedDevice {
    state: Rc<RefCell<DeviceState>>,
}

impl SimulatedDevice {
    /// Native call counters so far
    pub fn stats(&self) -> SimulationStats {
        self.state.borrow().stats
    }

    /// Descriptor the device was created with
    pub fn create_desc(&self) -> DeviceCreateDesc {
        self.state.borrow().desc.clone()
    }

    /// Number of allocations not yet freed
    pub fn live_allocations(&self) -> usize {
        self.state.borrow().memory.len()
    }

    /// Number of command pools not yet destroyed
    pub fn live_command_pools(&self) -> usize {
        self.state.borrow().pools.len()
    }

    /// Whether `destroy_device` has been called
    pub fn is_destroyed(&self) -> bool {
        self.state.borrow().destroyed
    }

    /// Whether an allocation is currently mapped
    pub fn is_mapped(&self, memory: SimMemory) -> bool {
        self.state.borrow().memory.get(memory).is_some_and(|a| a.mapped)
    }

    /// Size and memory type of a live allocation
    pub fn allocation_info(&self, memory: SimMemory) -> Option<(u64, u32)> {
        self.state
            .borrow()
            .memory
            .get(memory)
            .map(|a| (a.data.len() as u64, a.memory_type_index))
    }

    /// Memory and offset a buffer is bound to
    pub fn buffer_binding(&self, buffer: SimBuffer) -> Option<(SimMemory, u64)> {
        self.state.borrow().buffers.get(buffer).and_then(|b| b.binding)
    }

    /// Command pool family and transient flag
    pub fn command_pool_info(&self, pool: SimCommandPool) -> Option<(u32, bool)> {
        self.state
            .borrow()
            .pools
            .get(pool)
            .map(|p| (p.family_index, p.transient))
    }

    fn invalid_call(state: &mut DeviceState, what: &str) {
        state.stats.invalid_calls += 1;
        log::error!("Simulated device: {what}");
    }
}

fn aligned_size(size: u64, alignment: u64) -> u64 {
    let alignment = alignment.max(1);
    size.max(1).div_ceil(alignment) * alignment
}

fn image_size(desc: &ImageDesc) -> u64 {
    let mut total = 0;
    let (mut width, mut height) = (u64::from(desc.width.max(1)), u64::from(desc.height.max(1)));
    for _ in 0..desc.mip_levels.max(1) {
        total += width * height * desc.format.texel_size();
        width = (width / 2).max(1);
        height = (height / 2).max(1);
    }
    total * u64::from(desc.array_layers.max(1))
}

fn bind_record(
    state: &mut DeviceState,
    record_requirements: MemoryRequirements,
    memory: SimMemory,
    offset: u64,
) -> GpuResult<()> {
    let allocation = state
        .memory
        .get(memory)
        .ok_or_else(|| GpuError::Backend("Bind to unknown memory".to_string()))?;
    if offset % record_requirements.alignment.max(1) != 0 {
        return Err(GpuError::Backend(format!(
            "Offset {offset} violates alignment {}",
            record_requirements.alignment
        )));
    }
    if offset + record_requirements.size > allocation.data.len() as u64 {
        return Err(GpuError::Backend(format!(
            "Binding {} bytes at {offset} exceeds allocation of {}",
            record_requirements.size,
            allocation.data.len()
        )));
    }
    if record_requirements.memory_type_bits & (1 << allocation.memory_type_index) == 0 {
        return Err(GpuError::Backend(format!(
            "Memory type {} not acceptable for resource",
            allocation.memory_type_index
        )));
    }
    state.stats.binds += 1;
    Ok(())
}

impl DeviceBackend for SimulatedDevice {
    type Queue = SimQueue;
    type CommandPool = SimCommandPool;
    type Memory = SimMemory;
    type Buffer = SimBuffer;
    type Image = SimImage;

    fn get_queue(&self, family_index: u32, queue_index: u32) -> SimQueue {
        SimQueue {
            family_index,
            queue_index,
        }
    }

    fn create_command_pool(&self, family_index: u32, transient: bool) -> GpuResult<SimCommandPool> {
        let mut state = self.state.borrow_mut();
        if !state.desc.queues.iter().any(|q| q.family_index == family_index) {
            return Err(GpuError::Backend(format!(
                "Command pool for family {family_index} which has no queues"
            )));
        }
        state.stats.command_pools_created += 1;
        Ok(state.pools.insert(PoolRecord {
            family_index,
            transient,
        }))
    }

    fn destroy_command_pool(&self, pool: SimCommandPool) {
        let mut state = self.state.borrow_mut();
        if state.destroyed {
            Self::invalid_call(&mut state, "command pool destroyed after its device");
        }
        if state.pools.remove(pool).is_some() {
            state.stats.command_pools_destroyed += 1;
        } else {
            Self::invalid_call(&mut state, "destroy of unknown command pool");
        }
    }

    fn create_buffer(&self, desc: &BufferDesc) -> GpuResult<SimBuffer> {
        let mut state = self.state.borrow_mut();
        let profile = &state.profile;
        let requirements = MemoryRequirements {
            size: aligned_size(desc.size, profile.alignment),
            alignment: profile.alignment.max(1),
            memory_type_bits: profile
                .buffer_memory_type_bits
                .unwrap_or_else(|| profile.all_memory_type_bits()),
        };
        Ok(state.buffers.insert(ResourceRecord {
            requirements,
            binding: None,
        }))
    }

    fn destroy_buffer(&self, buffer: SimBuffer) {
        let mut state = self.state.borrow_mut();
        if state.buffers.remove(buffer).is_none() {
            Self::invalid_call(&mut state, "destroy of unknown buffer");
        }
    }

    fn create_image(&self, desc: &ImageDesc) -> GpuResult<SimImage> {
        let mut state = self.state.borrow_mut();
        let profile = &state.profile;
        if desc.width > profile.limits.max_image_dimension_2d || desc.height > profile.limits.max_image_dimension_2d {
            return Err(GpuError::Backend(format!(
                "Image {}x{} exceeds max dimension {}",
                desc.width, desc.height, profile.limits.max_image_dimension_2d
            )));
        }
        let requirements = MemoryRequirements {
            size: aligned_size(image_size(desc), profile.alignment),
            alignment: profile.alignment.max(1),
            memory_type_bits: profile
                .image_memory_type_bits
                .unwrap_or_else(|| profile.all_memory_type_bits()),
        };
        Ok(state.images.insert(ResourceRecord {
            requirements,
            binding: None,
        }))
    }

    fn destroy_image(&self, image: SimImage) {
        let mut state = self.state.borrow_mut();
        if state.images.remove(image).is_none() {
            Self::invalid_call(&mut state, "destroy of unknown image");
        }
    }

    fn buffer_memory_requirements(&self, buffer: SimBuffer) -> MemoryRequirements {
        self.state
            .borrow()
            .buffers
            .get(buffer)
            .map(|b| b.requirements)
            .unwrap_or_default()
    }

    fn image_memory_requirements(&self, image: SimImage) -> MemoryRequirements {
        self.state
            .borrow()
            .images
            .get(image)
            .map(|i| i.requirements)
            .unwrap_or_default()
    }

    fn allocate_memory(&self, size: u64, memory_type_index: u32) -> GpuResult<SimMemory> {
        let mut state = self.state.borrow_mut();
        if memory_type_index as usize >= state.profile.memory_types.len() {
            return Err(GpuError::Backend(format!("Memory type {memory_type_index} does not exist")));
        }
        if state.memory.len() >= state.profile.limits.max_memory_allocation_count as usize {
            return Err(GpuError::Backend("Too many live allocations".to_string()));
        }
        let len = usize::try_from(size).map_err(|_| GpuError::Backend(format!("Allocation of {size} bytes")))?;
        state.stats.allocations += 1;
        Ok(state.memory.insert(Allocation {
            memory_type_index,
            data: vec![0u8; len].into_boxed_slice(),
            mapped: false,
        }))
    }

    fn free_memory(&self, memory: SimMemory) {
        let mut state = self.state.borrow_mut();
        let removed = state.memory.remove(memory);
        match removed {
            Some(allocation) => {
                if allocation.mapped {
                    log::warn!("Simulated device: memory freed while mapped");
                }
                state.stats.frees += 1;
            }
            None => Self::invalid_call(&mut state, "free of unknown memory"),
        }
    }

    fn bind_buffer_memory(&self, buffer: SimBuffer, memory: SimMemory, offset: u64) -> GpuResult<()> {
        let mut state = self.state.borrow_mut();
        let record = state
            .buffers
            .get(buffer)
            .ok_or_else(|| GpuError::Backend("Bind of unknown buffer".to_string()))?;
        if record.binding.is_some() {
            return Err(GpuError::Backend("Buffer already bound".to_string()));
        }
        let requirements = record.requirements;
        bind_record(&mut state, requirements, memory, offset)?;
        if let Some(record) = state.buffers.get_mut(buffer) {
            record.binding = Some((memory, offset));
        }
        Ok(())
    }

    fn bind_image_memory(&self, image: SimImage, memory: SimMemory, offset: u64) -> GpuResult<()> {
        let mut state = self.state.borrow_mut();
        let record = state
            .images
            .get(image)
            .ok_or_else(|| GpuError::Backend("Bind of unknown image".to_string()))?;
        if record.binding.is_some() {
            return Err(GpuError::Backend("Image already bound".to_string()));
        }
        let requirements = record.requirements;
        bind_record(&mut state, requirements, memory, offset)?;
        if let Some(record) = state.images.get_mut(image) {
            record.binding = Some((memory, offset));
        }
        Ok(())
    }

    fn map_memory(&self, memory: SimMemory, offset: u64, size: u64) -> GpuResult<NonNull<u8>> {
        let mut state = self.state.borrow_mut();
        let memory_types = state.profile.memory_types.clone();
        let allocation = state
            .memory
            .get_mut(memory)
            .ok_or_else(|| GpuError::Backend("Map of unknown memory".to_string()))?;
        let host_visible = memory_types
            .get(allocation.memory_type_index as usize)
            .is_some_and(|t| t.properties.contains(MemoryProperties::HOST_VISIBLE));
        if !host_visible {
            return Err(GpuError::Backend("Map of memory that is not host visible".to_string()));
        }
        if allocation.mapped {
            return Err(GpuError::Backend("Memory is already mapped".to_string()));
        }
        if offset + size > allocation.data.len() as u64 {
            return Err(GpuError::Backend("Map range exceeds allocation".to_string()));
        }
        allocation.mapped = true;
        let ptr = allocation.data.as_mut_ptr().wrapping_add(offset as usize);
        state.stats.maps += 1;
        NonNull::new(ptr).ok_or_else(|| GpuError::Backend("Null mapping".to_string()))
    }

    fn unmap_memory(&self, memory: SimMemory) {
        let mut state = self.state.borrow_mut();
        let was_mapped = match state.memory.get_mut(memory) {
            Some(allocation) if allocation.mapped => {
                allocation.mapped = false;
                true
            }
            _ => false,
        };
        if was_mapped {
            state.stats.unmaps += 1;
        } else {
            Self::invalid_call(&mut state, "unmap of memory that is not mapped");
        }
    }

    fn wait_idle(&self) -> GpuResult<()> {
        Ok(())
    }

    fn destroy_device(&self) {
        let mut state = self.state.borrow_mut();
        if state.destroyed {
            Self::invalid_call(&mut state, "device destroyed twice");
            return;
        }
        if !state.pools.is_empty() {
            let live = state.pools.len();
            Self::invalid_call(&mut state, &format!("device destroyed with {live} live command pools"));
        }
        state.destroyed = true;
    }
}
