use std::sync::{Condvar, Mutex};
use std::time::Duration;

use forge_core::error::{Error, Result};

/// Auto-reset, one-shot signal: `(Condvar, Mutex<bool>)`, matching the contract
/// exactly. A signal issued before anyone waits latches until the next `wait`; a
/// signal wakes at most one waiter.
pub struct WaitableEvent {
    signaled: Mutex<bool>,
    cv: Condvar,
}

impl Default for WaitableEvent {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitableEvent {
    pub fn new() -> Self {
        WaitableEvent { signaled: Mutex::new(false), cv: Condvar::new() }
    }

    /// Blocks until signaled or `timeout` elapses. On success the signaled state is
    /// consumed (auto-reset).
    pub fn wait(&self, timeout: Duration) -> Result<()> {
        let mut guard = self.signaled.lock().expect("waitable event mutex poisoned");
        let deadline = std::time::Instant::now() + timeout;
        while !*guard {
            let now = std::time::Instant::now();
            if now >= deadline {
                return Err(Error::Timeout);
            }
            let (next_guard, result) =
                self.cv.wait_timeout(guard, deadline - now).expect("waitable event mutex poisoned");
            guard = next_guard;
            if result.timed_out() && !*guard {
                return Err(Error::Timeout);
            }
        }
        *guard = false;
        Ok(())
    }

    /// Sets the signal and wakes at most one waiter.
    pub fn signal(&self) {
        let mut guard = self.signaled.lock().expect("waitable event mutex poisoned");
        *guard = true;
        self.cv.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    #[test]
    fn wait_without_signal_times_out() {
        let event = WaitableEvent::new();
        let start = Instant::now();
        let result = event.wait(Duration::from_millis(250));
        assert_eq!(result, Err(Error::Timeout));
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(200), "elapsed = {elapsed:?}");
    }

    #[test]
    fn signal_before_wait_latches() {
        let event = WaitableEvent::new();
        event.signal();
        event.wait(Duration::from_millis(100)).unwrap();
    }

    #[test]
    fn signal_wakes_a_blocked_waiter() {
        let event = Arc::new(WaitableEvent::new());
        let waiter = event.clone();
        let handle = std::thread::spawn(move || waiter.wait(Duration::from_secs(5)));
        std::thread::sleep(Duration::from_millis(50));
        event.signal();
        assert!(handle.join().unwrap().is_ok());
    }
}
