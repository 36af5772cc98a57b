use std::sync::Mutex;
use std::sync::atomic::{AtomicU8, Ordering};
use std::thread::{JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use forge_core::error::{Error, Result};
pub use forge_core::thread::ThreadPriority;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ThreadState {
    Unstarted = 0,
    Running = 1,
    AbortRequested = 2,
    Stopped = 3,
}

impl ThreadState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => ThreadState::Unstarted,
            1 => ThreadState::Running,
            2 => ThreadState::AbortRequested,
            _ => ThreadState::Stopped,
        }
    }
}

/// Cooperative thread handle. Spawning creates a trampoline that sets state to
/// `Running`, runs the user function, stores its result, sets state to `Stopped`.
/// `abort` only flips a flag the trampoline (or a worker loop built on top of this
/// thread) is expected to poll — it never interrupts the OS thread.
///
/// Ownership mirrors the spec's "two references, the handle and the running task"
/// model with an `Arc`-backed shared state: dropping this handle without joining lets
/// the OS thread continue to completion and clean up on its own, exactly like a
/// detached `std::thread::JoinHandle`.
pub struct Thread {
    state: std::sync::Arc<AtomicU8>,
    id: ThreadId,
    name: Option<String>,
    join_handle: Mutex<Option<JoinHandle<Error>>>,
}

impl Thread {
    pub fn spawn(
        name: Option<String>,
        core: Option<usize>,
        priority: ThreadPriority,
        f: impl FnOnce() -> Result<()> + Send + 'static,
    ) -> Result<Self> {
        let state = std::sync::Arc::new(AtomicU8::new(ThreadState::Unstarted as u8));
        let trampoline_state = state.clone();
        let mut builder = std::thread::Builder::new();
        if let Some(n) = &name {
            builder = builder.name(n.clone());
        }
        let join_handle = builder
            .spawn(move || {
                trampoline_state.store(ThreadState::Running as u8, Ordering::Release);
                forge_core::thread::thread_boot(core, priority);
                let result = f();
                let exit_error = result.err().unwrap_or(Error::Ok);
                trampoline_state.store(ThreadState::Stopped as u8, Ordering::Release);
                exit_error
            })
            .map_err(|_| Error::PlatformDependent)?;
        let id = join_handle.thread().id();
        Ok(Thread { state, id, name, join_handle: Mutex::new(Some(join_handle)) })
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn state(&self) -> ThreadState {
        ThreadState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Idempotent; no effect if the thread has already stopped.
    pub fn abort(&self) {
        let _ = self.state.compare_exchange(
            ThreadState::Running as u8,
            ThreadState::AbortRequested as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        let _ = self.state.compare_exchange(
            ThreadState::Unstarted as u8,
            ThreadState::AbortRequested as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    pub fn should_run(&self) -> bool {
        self.state() != ThreadState::AbortRequested && self.state() != ThreadState::Stopped
    }

    /// Blocks until `Stopped` or `timeout` elapses. Rejected with `InvalidArgument` if
    /// called from the thread itself.
    pub fn join(&self, timeout: Duration) -> Result<Error> {
        if std::thread::current().id() == self.id {
            return Err(Error::InvalidArgument);
        }
        let deadline = Instant::now() + timeout;
        loop {
            if self.state() == ThreadState::Stopped {
                let mut guard = self.join_handle.lock().expect("join handle mutex poisoned");
                return match guard.take() {
                    Some(handle) => Ok(handle.join().unwrap_or(Error::PlatformDependent)),
                    None => Ok(Error::Ok),
                };
            }
            if Instant::now() >= deadline {
                return Err(Error::Timeout);
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }
}

/// Bounded nanosleep.
pub fn sleep(duration: Duration) {
    std::thread::sleep(duration);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;

    #[test]
    fn thread_runs_and_reports_stopped() {
        let ran = Arc::new(AtomicBool::new(false));
        let ran2 = ran.clone();
        let t = Thread::spawn(Some("worker".into()), None, ThreadPriority::OSDefault, move || {
            ran2.store(true, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();
        t.join(Duration::from_secs(2)).unwrap();
        assert!(ran.load(Ordering::SeqCst));
        assert_eq!(t.state(), ThreadState::Stopped);
    }

    #[test]
    fn abort_is_idempotent_after_stopped() {
        let t = Thread::spawn(None, None, ThreadPriority::OSDefault, || Ok(())).unwrap();
        t.join(Duration::from_secs(2)).unwrap();
        t.abort();
        assert_eq!(t.state(), ThreadState::Stopped);
    }

    #[test]
    fn cooperative_loop_observes_abort() {
        let t = Thread::spawn(None, None, ThreadPriority::OSDefault, || {
            // In a real worker this loop would be `while self.should_run() { .. }`;
            // here we just simulate bounded cooperative work.
            std::thread::sleep(Duration::from_millis(20));
            Ok(())
        })
        .unwrap();
        t.abort();
        t.join(Duration::from_secs(2)).unwrap();
        assert_eq!(t.state(), ThreadState::Stopped);
    }
}
