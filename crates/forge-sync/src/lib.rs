pub mod mutex;
pub mod thread;
pub mod waitable_event;

pub use mutex::Mutex;
pub use thread::{Thread, ThreadPriority, ThreadState, sleep};
pub use waitable_event::WaitableEvent;
