use std::collections::VecDeque;

use forge_core::error::{Error, Result};

/// Ring buffer of element slots. Unbounded queues double their backing capacity on
/// full; bounded queues reject further enqueues with [`Error::LimitExceeded`].
#[derive(Debug)]
pub struct Queue<T> {
    buf: VecDeque<T>,
    bound: Option<usize>,
}

impl<T> Queue<T> {
    pub fn unbounded() -> Self {
        Queue { buf: VecDeque::new(), bound: None }
    }

    pub fn bounded(capacity: usize) -> Self {
        Queue { buf: VecDeque::with_capacity(capacity), bound: Some(capacity) }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn enqueue(&mut self, value: T) -> Result<()> {
        if let Some(bound) = self.bound {
            if self.buf.len() >= bound {
                return Err(Error::LimitExceeded);
            }
        }
        self.buf.push_back(value);
        Ok(())
    }

    /// Dequeue from an empty queue returns `InvalidState`.
    pub fn dequeue(&mut self) -> Result<T> {
        self.buf.pop_front().ok_or(Error::InvalidState)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order_is_preserved() {
        let mut q = Queue::unbounded();
        for v in 0..4 {
            q.enqueue(v).unwrap();
        }
        for expected in 0..4 {
            assert_eq!(q.dequeue().unwrap(), expected);
        }
        assert_eq!(q.dequeue(), Err(Error::InvalidState));
    }

    #[test]
    fn bounded_queue_rejects_overflow() {
        let mut q = Queue::bounded(2);
        q.enqueue(1).unwrap();
        q.enqueue(2).unwrap();
        assert_eq!(q.enqueue(3), Err(Error::LimitExceeded));
    }
}
