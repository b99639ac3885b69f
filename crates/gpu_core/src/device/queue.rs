//! Queue requests and the queues/command pools they resolve to

use std::rc::Rc;

use crate::backend::DeviceBackend;
use crate::error::GpuResult;
use crate::types::QueueCapabilities;

/// A logical queue asked for before device selection
///
/// After selection the request records the family it landed on. A request
/// that could not be matched has its capabilities cleared; check
/// [`QueueRequest::is_supported`] before using the corresponding queue.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueueRequest {
    /// Required capabilities, empty once marked unsupported
    pub capabilities: QueueCapabilities,
    /// Priority in `0.0..=1.0`
    pub priority: f32,
    /// Assigned queue family, set by device selection
    pub family_index: Option<u32>,
}

impl QueueRequest {
    /// New unassigned request; priority is clamped to `0.0..=1.0`
    pub fn new(capabilities: QueueCapabilities, priority: f32) -> Self {
        Self {
            capabilities,
            priority: if priority.is_nan() { 0.0 } else { priority.clamp(0.0, 1.0) },
            family_index: None,
        }
    }

    /// Whether the request was matched to a family
    pub fn is_supported(&self) -> bool {
        !self.capabilities.is_empty()
    }

    pub(crate) fn mark_unsupported(&mut self) {
        self.capabilities = QueueCapabilities::empty();
        self.family_index = None;
    }
}

/// Command pool owned by one or more queues
pub struct CommandPool<D: DeviceBackend> {
    device: D,
    pool: D::CommandPool,
    family_index: u32,
    transient: bool,
}

impl<D: DeviceBackend> CommandPool<D> {
    pub(crate) fn new(device: &D, family_index: u32, transient: bool) -> GpuResult<Self> {
        let pool = device.create_command_pool(family_index, transient)?;
        Ok(Self {
            device: device.clone(),
            pool,
            family_index,
            transient,
        })
    }

    /// Native pool handle
    pub fn handle(&self) -> D::CommandPool {
        self.pool
    }

    /// Family the pool allocates command buffers for
    pub fn family_index(&self) -> u32 {
        self.family_index
    }

    /// Whether the pool was created for short-lived command buffers
    pub fn is_transient(&self) -> bool {
        self.transient
    }
}

impl<D: DeviceBackend> Drop for CommandPool<D> {
    fn drop(&mut self) {
        self.device.destroy_command_pool(self.pool);
    }
}

impl<D: DeviceBackend> std::fmt::Debug for CommandPool<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandPool")
            .field("pool", &self.pool)
            .field("family_index", &self.family_index)
            .field("transient", &self.transient)
            .finish()
    }
}

/// A resolved queue with its command pools
///
/// Aliased queues share the handle and both pools of the queue they alias.
/// Queues are owned by their [`LogicalDevice`](super::LogicalDevice) and only
/// handed out by reference, so no pool outlives the device.
pub struct Queue<D: DeviceBackend> {
    handle: D::Queue,
    family_index: u32,
    queue_index: u32,
    capabilities: QueueCapabilities,
    command_pool: Rc<CommandPool<D>>,
    transient_pool: Rc<CommandPool<D>>,
    aliased: bool,
}

impl<D: DeviceBackend> Queue<D> {
    pub(crate) fn create(
        device: &D,
        family_index: u32,
        queue_index: u32,
        capabilities: QueueCapabilities,
    ) -> GpuResult<Self> {
        let handle = device.get_queue(family_index, queue_index);
        let command_pool = Rc::new(CommandPool::new(device, family_index, false)?);
        let transient_pool = Rc::new(CommandPool::new(device, family_index, true)?);

        Ok(Self {
            handle,
            family_index,
            queue_index,
            capabilities,
            command_pool,
            transient_pool,
            aliased: false,
        })
    }

    /// Share this queue with another request that asked for `capabilities`
    pub(crate) fn alias(&self, capabilities: QueueCapabilities) -> Self {
        Self {
            handle: self.handle,
            family_index: self.family_index,
            queue_index: self.queue_index,
            capabilities,
            command_pool: Rc::clone(&self.command_pool),
            transient_pool: Rc::clone(&self.transient_pool),
            aliased: true,
        }
    }

    /// Native queue handle
    pub fn handle(&self) -> D::Queue {
        self.handle
    }

    /// Queue family index
    pub fn family_index(&self) -> u32 {
        self.family_index
    }

    /// Index of the queue within its family
    pub fn queue_index(&self) -> u32 {
        self.queue_index
    }

    /// Capabilities the request asked for
    pub fn capabilities(&self) -> QueueCapabilities {
        self.capabilities
    }

    /// Reusable command pool
    pub fn command_pool(&self) -> &CommandPool<D> {
        &self.command_pool
    }

    /// Pool for short-lived, frequently reset command buffers
    pub fn transient_pool(&self) -> &CommandPool<D> {
        &self.transient_pool
    }

    /// Whether this queue reuses another request's queue
    pub fn is_aliased(&self) -> bool {
        self.aliased
    }
}

impl<D: DeviceBackend> std::fmt::Debug for Queue<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Queue")
            .field("handle", &self.handle)
            .field("family_index", &self.family_index)
            .field("queue_index", &self.queue_index)
            .field("capabilities", &self.capabilities)
            .field("aliased", &self.aliased)
            .finish()
    }
}
