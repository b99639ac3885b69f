//! Buffers and images that get their memory from an arena block

use std::rc::Rc;

use bytemuck::Pod;

use super::block::MemoryBlock;
use crate::backend::DeviceBackend;
use crate::error::{GpuError, GpuResult};
use crate::types::{BufferDesc, ImageDesc, MemoryRequirements};

/// What a bindable resource is; one batch holds one kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Linear buffer memory
    Buffer,
    /// Image memory, possibly in an optimal tiling
    Image,
}

/// A resource that can be placed into a shared memory block
pub trait BindableResource<D: DeviceBackend> {
    /// Buffer or image
    fn kind(&self) -> ResourceKind;

    /// Size, alignment and acceptable memory types
    fn memory_requirements(&self) -> MemoryRequirements;

    /// Whether the resource already has memory
    fn is_bound(&self) -> bool;

    /// Bind to `block` at `offset`, keeping a reference to the block
    fn bind(&mut self, block: &Rc<MemoryBlock<D>>, offset: u64) -> GpuResult<()>;
}

impl<D: DeviceBackend, T: BindableResource<D> + ?Sized> BindableResource<D> for &mut T {
    fn kind(&self) -> ResourceKind {
        (**self).kind()
    }

    fn memory_requirements(&self) -> MemoryRequirements {
        (**self).memory_requirements()
    }

    fn is_bound(&self) -> bool {
        (**self).is_bound()
    }

    fn bind(&mut self, block: &Rc<MemoryBlock<D>>, offset: u64) -> GpuResult<()> {
        (**self).bind(block, offset)
    }
}

/// Where a resource lives inside its block
struct Binding<D: DeviceBackend> {
    block: Rc<MemoryBlock<D>>,
    offset: u64,
}

impl<D: DeviceBackend> Binding<D> {
    fn host_range(&self, offset: u64, len: u64, size: u64) -> GpuResult<*mut u8> {
        let end = offset
            .checked_add(len)
            .ok_or(GpuError::OutOfBounds { offset, len, size })?;
        if end > size {
            return Err(GpuError::OutOfBounds { offset, len, size });
        }
        let start = usize::try_from(self.offset + offset)
            .map_err(|_| GpuError::OutOfBounds { offset, len, size })?;
        let base = self.block.mapped_memory()?;
        // In range: the block maps at least offset + size bytes
        Ok(unsafe { base.as_ptr().add(start) })
    }

    fn write<T: Pod>(&self, offset: u64, data: &[T], size: u64) -> GpuResult<()> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let dst = self.host_range(offset, bytes.len() as u64, size)?;
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), dst, bytes.len());
        }
        Ok(())
    }

    fn read<T: Pod>(&self, offset: u64, count: usize, size: u64) -> GpuResult<Vec<T>> {
        let mut out = vec![T::zeroed(); count];
        let bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut out);
        let src = self.host_range(offset, bytes.len() as u64, size)?;
        unsafe {
            std::ptr::copy_nonoverlapping(src, bytes.as_mut_ptr(), bytes.len());
        }
        Ok(out)
    }
}

fn not_bound(kind: &str) -> GpuError {
    GpuError::ContractViolation(format!("{kind} has no memory bound"))
}

/// GPU buffer whose memory comes from a shared block
///
/// Created unbound. Binding happens once, through
/// [`MemoryArena`](super::MemoryArena). Dropping the buffer destroys the
/// native buffer and then releases its block reference.
pub struct Buffer<D: DeviceBackend> {
    device: D,
    buffer: D::Buffer,
    desc: BufferDesc,
    requirements: MemoryRequirements,
    binding: Option<Binding<D>>,
}

impl<D: DeviceBackend> Buffer<D> {
    /// Create an unbound buffer
    pub fn new(device: &D, desc: BufferDesc) -> GpuResult<Self> {
        if desc.size == 0 {
            return Err(GpuError::ContractViolation("buffer size must be non-zero".to_string()));
        }
        let buffer = device.create_buffer(&desc)?;
        let requirements = device.buffer_memory_requirements(buffer);
        Ok(Self {
            device: device.clone(),
            buffer,
            desc,
            requirements,
            binding: None,
        })
    }

    /// Native buffer handle
    pub fn handle(&self) -> D::Buffer {
        self.buffer
    }

    /// Requested size in bytes
    pub fn size(&self) -> u64 {
        self.desc.size
    }

    /// Creation parameters
    pub fn desc(&self) -> &BufferDesc {
        &self.desc
    }

    /// Offset inside the memory block, once bound
    pub fn offset(&self) -> Option<u64> {
        self.binding.as_ref().map(|binding| binding.offset)
    }

    /// Block the buffer is bound to
    pub fn memory_block(&self) -> Option<&Rc<MemoryBlock<D>>> {
        self.binding.as_ref().map(|binding| &binding.block)
    }

    /// Copy `data` into the buffer at byte `offset`, mapping the block if needed
    pub fn write<T: Pod>(&self, offset: u64, data: &[T]) -> GpuResult<()> {
        self.binding
            .as_ref()
            .ok_or_else(|| not_bound("buffer"))?
            .write(offset, data, self.desc.size)
    }

    /// Read `count` values starting at byte `offset`
    pub fn read<T: Pod>(&self, offset: u64, count: usize) -> GpuResult<Vec<T>> {
        self.binding
            .as_ref()
            .ok_or_else(|| not_bound("buffer"))?
            .read(offset, count, self.desc.size)
    }
}

impl<D: DeviceBackend> BindableResource<D> for Buffer<D> {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Buffer
    }

    fn memory_requirements(&self) -> MemoryRequirements {
        self.requirements
    }

    fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    fn bind(&mut self, block: &Rc<MemoryBlock<D>>, offset: u64) -> GpuResult<()> {
        if self.binding.is_some() {
            return Err(GpuError::ContractViolation("buffer is already bound".to_string()));
        }
        self.device.bind_buffer_memory(self.buffer, block.handle(), offset)?;
        self.binding = Some(Binding {
            block: Rc::clone(block),
            offset,
        });
        Ok(())
    }
}

impl<D: DeviceBackend> Drop for Buffer<D> {
    fn drop(&mut self) {
        self.device.destroy_buffer(self.buffer);
        // Block reference goes after the native buffer
        self.binding = None;
    }
}

impl<D: DeviceBackend> std::fmt::Debug for Buffer<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("buffer", &self.buffer)
            .field("size", &self.desc.size)
            .field("offset", &self.offset())
            .finish()
    }
}

/// GPU image whose memory comes from a shared block
pub struct Image<D: DeviceBackend> {
    device: D,
    image: D::Image,
    desc: ImageDesc,
    requirements: MemoryRequirements,
    binding: Option<Binding<D>>,
}

impl<D: DeviceBackend> Image<D> {
    /// Create an unbound image
    pub fn new(device: &D, desc: ImageDesc) -> GpuResult<Self> {
        if desc.width == 0 || desc.height == 0 {
            return Err(GpuError::ContractViolation(format!(
                "image extent {}x{} must be non-zero",
                desc.width, desc.height
            )));
        }
        if desc.mip_levels == 0 || desc.array_layers == 0 {
            return Err(GpuError::ContractViolation(format!(
                "image needs at least one mip level and array layer, got {} and {}",
                desc.mip_levels, desc.array_layers
            )));
        }
        let image = device.create_image(&desc)?;
        let requirements = device.image_memory_requirements(image);
        Ok(Self {
            device: device.clone(),
            image,
            desc,
            requirements,
            binding: None,
        })
    }

    /// Native image handle
    pub fn handle(&self) -> D::Image {
        self.image
    }

    /// Bytes of memory the image occupies
    pub fn size(&self) -> u64 {
        self.requirements.size
    }

    /// Creation parameters
    pub fn desc(&self) -> &ImageDesc {
        &self.desc
    }

    /// Offset inside the memory block, once bound
    pub fn offset(&self) -> Option<u64> {
        self.binding.as_ref().map(|binding| binding.offset)
    }

    /// Block the image is bound to
    pub fn memory_block(&self) -> Option<&Rc<MemoryBlock<D>>> {
        self.binding.as_ref().map(|binding| &binding.block)
    }

    /// Copy raw texel data into the image's memory at byte `offset`
    ///
    /// Layout is whatever the backend chose; only meaningful for linear images.
    pub fn write<T: Pod>(&self, offset: u64, data: &[T]) -> GpuResult<()> {
        self.binding
            .as_ref()
            .ok_or_else(|| not_bound("image"))?
            .write(offset, data, self.requirements.size)
    }

    /// Read `count` values starting at byte `offset`
    pub fn read<T: Pod>(&self, offset: u64, count: usize) -> GpuResult<Vec<T>> {
        self.binding
            .as_ref()
            .ok_or_else(|| not_bound("image"))?
            .read(offset, count, self.requirements.size)
    }
}

impl<D: DeviceBackend> BindableResource<D> for Image<D> {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Image
    }

    fn memory_requirements(&self) -> MemoryRequirements {
        self.requirements
    }

    fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    fn bind(&mut self, block: &Rc<MemoryBlock<D>>, offset: u64) -> GpuResult<()> {
        if self.binding.is_some() {
            return Err(GpuError::ContractViolation("image is already bound".to_string()));
        }
        self.device.bind_image_memory(self.image, block.handle(), offset)?;
        self.binding = Some(Binding {
            block: Rc::clone(block),
            offset,
        });
        Ok(())
    }
}

impl<D: DeviceBackend> Drop for Image<D> {
    fn drop(&mut self) {
        self.device.destroy_image(self.image);
        self.binding = None;
    }
}

impl<D: DeviceBackend> std::fmt::Debug for Image<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Image")
            .field("image", &self.image)
            .field("width", &self.desc.width)
            .field("height", &self.desc.height)
            .field("offset", &self.offset())
            .finish()
    }
}
