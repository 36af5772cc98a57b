use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use forge_core::error::{Error, Result, merge};

use crate::worker::Worker;

/// Multiplexes work items across a fixed set of [`Worker`]s using round-robin
/// dispatch, typically one worker per available CPU.
pub struct WorkerPool<T> {
    workers: Vec<Worker<T>>,
    next_index: AtomicUsize,
}

impl<T: Send + 'static> WorkerPool<T> {
    pub fn spawn(
        worker_count: usize,
        queue_bound: Option<usize>,
        worker_func: impl Fn(T) -> Result<()> + Send + Sync + Clone + 'static,
    ) -> Result<Self> {
        if worker_count == 0 {
            return Err(Error::InvalidArgument);
        }
        let mut workers = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            workers.push(Worker::spawn(None, queue_bound, worker_func.clone())?);
        }
        Ok(WorkerPool { workers, next_index: AtomicUsize::new(0) })
    }

    /// Dispatches `item` to the next worker in round-robin order.
    pub fn enqueue(&self, item: T) -> Result<()> {
        let index = self.next_index.fetch_add(1, Ordering::Relaxed) % self.workers.len();
        self.workers[index].enqueue(item)
    }

    /// Requests all workers to stop gracefully, without blocking.
    pub fn stop(&self, drain: bool) {
        for worker in &self.workers {
            worker.stop(drain);
        }
    }

    /// Waits for every worker to finish shutting down, merging errors from workers
    /// that fail to shut down in time.
    pub fn wait(&self, timeout: Duration) -> Result<()> {
        let mut result = Error::Ok;
        for worker in &self.workers {
            result = merge(result, worker.wait(timeout).err().unwrap_or(Error::Ok));
        }
        if result.is_ok() { Ok(()) } else { Err(result) }
    }

    pub fn dispose(self) -> Result<()> {
        let mut result = Error::Ok;
        for worker in self.workers {
            result = merge(result, worker.dispose().err().unwrap_or(Error::Ok));
        }
        if result.is_ok() { Ok(()) } else { Err(result) }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }
}
