//! Batched placement of resources into a single allocation

use super::block::MemoryBlock;
use super::resource::{BindableResource, Buffer, Image, ResourceKind};
use crate::backend::DeviceBackend;
use crate::device::LogicalDevice;
use crate::error::{GpuError, GpuResult};
use crate::types::{BufferDesc, ImageDesc, MemoryProperties, MemoryRequirements, MemoryType};

/// Layout of a batch inside one block, computed without touching the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArenaPlan {
    /// Offset of each resource: the sum of the sizes before it
    pub offsets: Vec<u64>,
    /// Sum of every resource's size
    pub total_size: u64,
    /// Memory types acceptable to every resource
    pub memory_type_bits: u32,
}

impl ArenaPlan {
    /// Lay out resources back to back in request order
    pub fn new(requirements: &[MemoryRequirements]) -> GpuResult<Self> {
        if requirements.is_empty() {
            return Err(GpuError::ContractViolation(
                "memory arena needs at least one resource".to_string(),
            ));
        }

        let mut offsets = Vec::with_capacity(requirements.len());
        let mut total_size: u64 = 0;
        let mut memory_type_bits = u32::MAX;
        for requirement in requirements {
            offsets.push(total_size);
            total_size = total_size
                .checked_add(requirement.size)
                .ok_or_else(|| GpuError::ContractViolation("arena size overflows u64".to_string()))?;
            memory_type_bits &= requirement.memory_type_bits;
        }

        if total_size == 0 {
            return Err(GpuError::ContractViolation("arena resources are all empty".to_string()));
        }

        Ok(Self {
            offsets,
            total_size,
            memory_type_bits,
        })
    }
}

/// Index of the first memory type allowed by `type_bits` that has all of `properties`
pub fn find_memory_type(
    memory_types: &[MemoryType],
    type_bits: u32,
    properties: MemoryProperties,
) -> GpuResult<u32> {
    memory_types
        .iter()
        .enumerate()
        .take(32)
        .find(|&(i, memory_type)| (type_bits & (1u32 << i)) != 0 && memory_type.properties.contains(properties))
        .and_then(|(i, _)| u32::try_from(i).ok())
        .ok_or(GpuError::NoSuitableMemoryType { type_bits, properties })
}

/// Allocates one memory block per batch and binds every resource into it
///
/// The block lives as long as any resource bound to it.
pub struct MemoryArena;

impl MemoryArena {
    /// Bind every resource in `resources` to one new block
    ///
    /// A batch holds only buffers or only images. Nothing is allocated when
    /// the batch is empty or mixes kinds, when a resource is already bound, or
    /// when no memory type fits every resource. If binding fails
    /// part-way, resources bound so far keep the block alive.
    pub fn allocate<D, R>(
        device: &LogicalDevice<D>,
        resources: &mut [R],
        properties: MemoryProperties,
    ) -> GpuResult<ArenaPlan>
    where
        D: DeviceBackend,
        R: BindableResource<D>,
    {
        if let Some(first) = resources.first().map(|resource| resource.kind()) {
            if let Some(index) = resources.iter().position(|resource| resource.kind() != first) {
                return Err(GpuError::ContractViolation(format!(
                    "resource {index} is not a {} like the rest of the batch",
                    kind_name(first)
                )));
            }
        }
        if let Some(index) = resources.iter().position(|resource| resource.is_bound()) {
            return Err(GpuError::ContractViolation(format!(
                "resource {index} already has memory bound"
            )));
        }

        let requirements: Vec<MemoryRequirements> =
            resources.iter().map(|resource| resource.memory_requirements()).collect();
        let plan = ArenaPlan::new(&requirements)?;
        let memory_type_index = find_memory_type(device.memory_types(), plan.memory_type_bits, properties)?;

        let block = MemoryBlock::allocate(device.backend(), plan.total_size, memory_type_index)?;
        for (resource, offset) in resources.iter_mut().zip(&plan.offsets) {
            resource.bind(&block, *offset)?;
        }

        log::debug!(
            "Arena: {} resources, {} bytes, memory type {} ({:?})",
            resources.len(),
            plan.total_size,
            memory_type_index,
            properties
        );
        Ok(plan)
    }

    /// Create one buffer per descriptor and place them all in one block
    pub fn allocate_buffers<D: DeviceBackend>(
        device: &LogicalDevice<D>,
        descs: &[BufferDesc],
        properties: MemoryProperties,
    ) -> GpuResult<Vec<Buffer<D>>> {
        let mut buffers = descs
            .iter()
            .map(|desc| Buffer::new(device.backend(), *desc))
            .collect::<GpuResult<Vec<_>>>()?;
        Self::allocate(device, &mut buffers, properties)?;
        Ok(buffers)
    }

    /// Create one image per descriptor and place them all in one block
    pub fn allocate_images<D: DeviceBackend>(
        device: &LogicalDevice<D>,
        descs: &[ImageDesc],
        properties: MemoryProperties,
    ) -> GpuResult<Vec<Image<D>>> {
        let mut images = descs
            .iter()
            .map(|desc| Image::new(device.backend(), *desc))
            .collect::<GpuResult<Vec<_>>>()?;
        Self::allocate(device, &mut images, properties)?;
        Ok(images)
    }
}

fn kind_name(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Buffer => "buffer",
        ResourceKind::Image => "image",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn requirement(size: u64, memory_type_bits: u32) -> MemoryRequirements {
        MemoryRequirements {
            size,
            alignment: 256,
            memory_type_bits,
        }
    }

    fn memory_type(properties: MemoryProperties) -> MemoryType {
        MemoryType {
            properties,
            heap_index: 0,
        }
    }

    #[test]
    fn test_plan_offsets_are_prefix_sums() {
        let plan = ArenaPlan::new(&[requirement(256, 0b111), requirement(512, 0b101), requirement(1024, 0b100)]).unwrap();
        assert_eq!(plan.offsets, vec![0, 256, 768]);
        assert_eq!(plan.total_size, 1792);
        assert_eq!(plan.memory_type_bits, 0b100);
    }

    #[test]
    fn test_plan_rejects_empty_batch() {
        assert!(matches!(ArenaPlan::new(&[]), Err(GpuError::ContractViolation(_))));
    }

    #[test]
    fn test_plan_rejects_overflow() {
        let result = ArenaPlan::new(&[requirement(u64::MAX, 1), requirement(1, 1)]);
        assert!(matches!(result, Err(GpuError::ContractViolation(_))));
    }

    #[test]
    fn test_find_memory_type_first_match_in_mask() {
        let types = [
            memory_type(MemoryProperties::DEVICE_LOCAL),
            memory_type(MemoryProperties::HOST_VISIBLE | MemoryProperties::HOST_COHERENT),
            memory_type(MemoryProperties::HOST_VISIBLE),
        ];
        assert_eq!(find_memory_type(&types, 0b101, MemoryProperties::HOST_VISIBLE).unwrap(), 2);
        assert_eq!(find_memory_type(&types, 0b111, MemoryProperties::HOST_VISIBLE).unwrap(), 1);
        assert_eq!(find_memory_type(&types, 0b111, MemoryProperties::empty()).unwrap(), 0);
    }

    #[test]
    fn test_find_memory_type_reports_mask_and_properties() {
        let types = [memory_type(MemoryProperties::DEVICE_LOCAL)];
        match find_memory_type(&types, 0b1, MemoryProperties::HOST_VISIBLE) {
            Err(GpuError::NoSuitableMemoryType { type_bits, properties }) => {
                assert_eq!(type_bits, 0b1);
                assert_eq!(properties, MemoryProperties::HOST_VISIBLE);
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(find_memory_type(&types, 0, MemoryProperties::empty()).is_err());
    }
}
