//! Shared device profiles for scenario tests

use crate::backend::simulated::{DeviceProfile, SimulatedDevice, SimulatedInstance};
use crate::device::{DeviceSelector, LogicalDevice};
use crate::types::{DeviceType, MemoryProperties, QueueCapabilities};

pub const G: QueueCapabilities = QueueCapabilities::GRAPHICS;
pub const C: QueueCapabilities = QueueCapabilities::COMPUTE;
pub const T: QueueCapabilities = QueueCapabilities::TRANSFER;
pub const P: QueueCapabilities = QueueCapabilities::PRESENT;

/// Memory types 0: device local, 1: host visible + coherent, 2: host visible
pub fn arena_profile() -> DeviceProfile {
    DeviceProfile::new("arena", DeviceType::DiscreteGpu)
        .with_queue_family(G | C | T, 1, false)
        .with_memory_type(MemoryProperties::DEVICE_LOCAL)
        .with_memory_type(MemoryProperties::HOST_VISIBLE | MemoryProperties::HOST_COHERENT)
        .with_memory_type(MemoryProperties::HOST_VISIBLE)
        .with_alignment(256)
}

/// Single graphics queue on the only device of `instance`
pub fn graphics_device(instance: &SimulatedInstance) -> LogicalDevice<SimulatedDevice> {
    crate::foundation::logging::init_for_tests();
    DeviceSelector::new(instance)
        .with_queue(G, 1.0)
        .select()
        .expect("device selection")
}
