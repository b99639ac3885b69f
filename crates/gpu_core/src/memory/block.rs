//! Shared device memory blocks

use std::cell::Cell;
use std::ptr::NonNull;
use std::rc::Rc;

use crate::backend::DeviceBackend;
use crate::error::GpuResult;

/// One native allocation shared by every resource bound into it
///
/// Resources hold the block through an `Rc`; the block is unmapped (when
/// mapped) and freed when the last resource lets go of it. The mapping is
/// created on first use and covers the whole block.
pub struct MemoryBlock<D: DeviceBackend> {
    device: D,
    memory: D::Memory,
    size: u64,
    memory_type_index: u32,
    mapped: Cell<Option<NonNull<u8>>>,
}

impl<D: DeviceBackend> MemoryBlock<D> {
    pub(crate) fn allocate(device: &D, size: u64, memory_type_index: u32) -> GpuResult<Rc<Self>> {
        let memory = device.allocate_memory(size, memory_type_index)?;
        log::debug!("Allocated memory block: {} bytes, type {}", size, memory_type_index);
        Ok(Rc::new(Self {
            device: device.clone(),
            memory,
            size,
            memory_type_index,
            mapped: Cell::new(None),
        }))
    }

    /// Number of live references, one per bound resource plus any clones held elsewhere
    pub fn reference_count(self: &Rc<Self>) -> usize {
        Rc::strong_count(self)
    }

    /// Native memory handle
    pub fn handle(&self) -> D::Memory {
        self.memory
    }

    /// Size of the allocation in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Memory type the block was allocated from
    pub fn memory_type_index(&self) -> u32 {
        self.memory_type_index
    }

    /// Host pointer to the start of the block, mapping it on first call
    pub fn mapped_memory(&self) -> GpuResult<NonNull<u8>> {
        if let Some(ptr) = self.mapped.get() {
            return Ok(ptr);
        }
        let ptr = self.device.map_memory(self.memory, 0, self.size)?;
        self.mapped.set(Some(ptr));
        Ok(ptr)
    }

    /// Whether the block currently has a host mapping
    pub fn is_mapped(&self) -> bool {
        self.mapped.get().is_some()
    }

    /// Drop the host mapping; a later [`MemoryBlock::mapped_memory`] maps again
    pub fn unmap_memory(&self) {
        if self.mapped.take().is_some() {
            self.device.unmap_memory(self.memory);
        }
    }
}

impl<D: DeviceBackend> Drop for MemoryBlock<D> {
    fn drop(&mut self) {
        self.unmap_memory();
        self.device.free_memory(self.memory);
        log::debug!("Freed memory block: {} bytes, type {}", self.size, self.memory_type_index);
    }
}

impl<D: DeviceBackend> std::fmt::Debug for MemoryBlock<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBlock")
            .field("memory", &self.memory)
            .field("size", &self.size)
            .field("memory_type_index", &self.memory_type_index)
            .field("mapped", &self.is_mapped())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::simulated::{DeviceProfile, SimulatedDevice, SimulatedInstance};
    use crate::backend::{DeviceCreateDesc, InstanceBackend, QueueCreateDesc};
    use crate::backend::simulated::SimPhysicalDevice;
    use crate::types::{DeviceType, MemoryProperties, QueueCapabilities};

    fn device() -> SimulatedDevice {
        let profile = DeviceProfile::new("host", DeviceType::IntegratedGpu)
            .with_queue_family(QueueCapabilities::GRAPHICS, 1, false)
            .with_memory_type(MemoryProperties::DEVICE_LOCAL)
            .with_memory_type(MemoryProperties::HOST_VISIBLE | MemoryProperties::HOST_COHERENT);
        let instance = SimulatedInstance::new(vec![profile]);
        let desc = DeviceCreateDesc {
            queues: vec![QueueCreateDesc {
                family_index: 0,
                priorities: vec![1.0],
            }],
            ..Default::default()
        };
        instance.create_device(SimPhysicalDevice(0), &desc).unwrap()
    }

    #[test]
    fn test_mapping_is_cached() {
        let device = device();
        let block = MemoryBlock::allocate(&device, 512, 1).unwrap();

        let first = block.mapped_memory().unwrap();
        let second = block.mapped_memory().unwrap();
        assert_eq!(first, second);
        assert_eq!(device.stats().maps, 1);
        assert!(block.is_mapped());
    }

    #[test]
    fn test_unmap_then_remap() {
        let device = device();
        let block = MemoryBlock::allocate(&device, 256, 1).unwrap();

        block.mapped_memory().unwrap();
        block.unmap_memory();
        block.unmap_memory();
        assert!(!block.is_mapped());
        assert_eq!(device.stats().unmaps, 1);

        block.mapped_memory().unwrap();
        assert_eq!(device.stats().maps, 2);
    }

    #[test]
    fn test_drop_unmaps_before_free() {
        let device = device();
        let block = MemoryBlock::allocate(&device, 256, 1).unwrap();
        let memory = block.handle();
        block.mapped_memory().unwrap();
        assert!(device.is_mapped(memory));

        drop(block);
        let stats = device.stats();
        assert_eq!(stats.unmaps, 1);
        assert_eq!(stats.frees, 1);
        assert_eq!(stats.invalid_calls, 0);
        assert_eq!(device.live_allocations(), 0);
    }

    #[test]
    fn test_device_local_block_cannot_map() {
        let device = device();
        let block = MemoryBlock::allocate(&device, 256, 0).unwrap();
        assert!(block.mapped_memory().is_err());
        assert!(!block.is_mapped());
    }
}
