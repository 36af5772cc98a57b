pub mod allocator;
pub mod assert;
pub mod error;
pub mod math;
pub mod thread;

pub use allocator::{
    Allocator, BufferAllocator, BumpPointerAllocator, OomAllocator, StatsAllocator,
    SystemAllocator,
};
pub use error::{Error, Result, merge};
pub use thread::{ThreadPriority, thread_boot};
