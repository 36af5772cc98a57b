pub mod worker;
pub mod worker_pool;

pub use worker::{MAX_ITEM_SIZE, Worker};
pub use worker_pool::WorkerPool;
