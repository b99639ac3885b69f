//! Logical device wrapper with RAII cleanup

use super::family::QueueSlot;
use super::queue::{Queue, QueueRequest};
use crate::backend::DeviceBackend;
use crate::error::{GpuError, GpuResult};
use crate::types::{DeviceFeatures, DeviceProperties, MemoryType, QueueFamilyInfo};

/// A created device with its resolved queues
///
/// Holds one entry per original queue request, in request order. Unsupported
/// requests have no queue. Dropping the device waits for idle, destroys the
/// queues' command pools and then the native device. Buffers, images and
/// memory blocks created from it must be dropped before that.
pub struct LogicalDevice<D: DeviceBackend> {
    queues: Vec<Option<Queue<D>>>,
    requests: Vec<QueueRequest>,
    device: D,
    properties: DeviceProperties,
    queue_families: Vec<QueueFamilyInfo>,
    memory_types: Vec<MemoryType>,
    enabled_extensions: Vec<String>,
    enabled_features: DeviceFeatures,
}

impl<D: DeviceBackend> LogicalDevice<D> {
    /// Fetch queues and create their command pools according to `slots`
    pub(crate) fn new(
        device: D,
        properties: DeviceProperties,
        queue_families: Vec<QueueFamilyInfo>,
        memory_types: Vec<MemoryType>,
        requests: Vec<QueueRequest>,
        slots: &[Option<QueueSlot>],
        enabled_extensions: Vec<String>,
        enabled_features: DeviceFeatures,
    ) -> GpuResult<Self> {
        // Construct first so a failure below still tears the device down
        let mut logical = Self {
            queues: Vec::with_capacity(requests.len()),
            requests,
            device,
            properties,
            queue_families,
            memory_types,
            enabled_extensions,
            enabled_features,
        };

        for (index, slot) in slots.iter().enumerate() {
            let queue = match slot {
                None => None,
                Some(QueueSlot {
                    alias_of: Some(target),
                    ..
                }) => {
                    let owner = logical
                        .queues
                        .get(*target)
                        .and_then(Option::as_ref)
                        .ok_or_else(|| {
                            GpuError::ContractViolation(format!("queue {index} aliases missing queue {target}"))
                        })?;
                    Some(owner.alias(logical.requests[index].capabilities))
                }
                Some(slot) => {
                    if slot.family_index as usize >= logical.queue_families.len() {
                        return Err(GpuError::ContractViolation(format!(
                            "queue family {} out of range",
                            slot.family_index
                        )));
                    }
                    Some(Queue::create(
                        &logical.device,
                        slot.family_index,
                        slot.queue_index,
                        logical.requests[index].capabilities,
                    )?)
                }
            };
            logical.queues.push(queue);
        }

        Ok(logical)
    }

    /// Backend device handle
    pub fn backend(&self) -> &D {
        &self.device
    }

    /// Name, type and limits of the physical device
    pub fn properties(&self) -> &DeviceProperties {
        &self.properties
    }

    /// Memory types of the physical device
    pub fn memory_types(&self) -> &[MemoryType] {
        &self.memory_types
    }

    /// Queue family table of the physical device
    pub fn queue_families(&self) -> &[QueueFamilyInfo] {
        &self.queue_families
    }

    /// Requests after selection: family assigned, or capabilities cleared
    pub fn requests(&self) -> &[QueueRequest] {
        &self.requests
    }

    /// Queue for request `index`, `None` if unsupported or out of range
    pub fn queue(&self, index: usize) -> Option<&Queue<D>> {
        self.queues.get(index).and_then(Option::as_ref)
    }

    /// All queues in request order
    pub fn queues(&self) -> impl Iterator<Item = Option<&Queue<D>>> {
        self.queues.iter().map(Option::as_ref)
    }

    /// Whether request `index` ended up with a usable queue
    pub fn is_queue_supported(&self, index: usize) -> bool {
        self.requests.get(index).is_some_and(QueueRequest::is_supported)
    }

    /// Extensions the device was created with
    pub fn enabled_extensions(&self) -> &[String] {
        &self.enabled_extensions
    }

    /// Features the device was created with
    pub fn enabled_features(&self) -> DeviceFeatures {
        self.enabled_features
    }

    /// Block until the device is idle
    pub fn wait_idle(&self) -> GpuResult<()> {
        self.device.wait_idle()
    }
}

impl<D: DeviceBackend> Drop for LogicalDevice<D> {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            log::warn!("wait_idle failed during device teardown: {}", e);
        }
        self.queues.clear();
        self.device.destroy_device();
    }
}
