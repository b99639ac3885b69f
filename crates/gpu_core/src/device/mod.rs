//! Device negotiation: queue requests, family matching, selection and the logical device

pub mod family;
mod logical;
mod queue;
mod selector;

pub use logical::LogicalDevice;
pub use queue::{CommandPool, Queue, QueueRequest};
pub use selector::{prefer_device_type, DeviceScorer, DeviceSelector, ScoringContext};
