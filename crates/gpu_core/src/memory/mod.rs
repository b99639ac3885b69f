//! Memory arena: many resources, one allocation

mod arena;
mod block;
mod resource;

pub use arena::{find_memory_type, ArenaPlan, MemoryArena};
pub use block::MemoryBlock;
pub use resource::{BindableResource, Buffer, Image, ResourceKind};
