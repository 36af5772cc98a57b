use std::marker::PhantomData;
use std::rc::{Rc, Weak};
use std::sync::{Mutex as StdMutex, MutexGuard};
use std::thread::ThreadId;

/// Recursive mutex: the owning thread may lock it again without deadlocking.
///
/// The real `std::sync::Mutex` guard lives behind an `Rc`, shared by every handle the
/// owning thread currently holds open, instead of a depth counter each handle
/// decrements on drop. That makes unlocking correct no matter which handle the caller
/// drops first: the real guard -- and the owner record -- only go away once the last
/// live handle for this acquisition chain is dropped, which `Rc`'s own refcounting
/// already guarantees regardless of drop order.
pub struct Mutex<T> {
    inner: StdMutex<T>,
    active: StdMutex<Option<(ThreadId, Weak<GuardSlot<T>>)>>,
}

/// The 'static here is a lie: the guard really borrows `self.inner` for as long as
/// `Mutex<T>` is alive. That's enforced indirectly -- `GuardSlot` is only ever reachable
/// through a `MutexHandle<'a, T>` borrowing the `Mutex` for `'a`, which the borrow
/// checker won't let outlive `self`.
struct GuardSlot<T> {
    guard: MutexGuard<'static, T>,
}

// Both auto impls are overridden here because `Weak<GuardSlot<T>>` (via its
// `MutexGuard<'static, T>`) is otherwise `!Send`. The real guard it points to is only
// ever touched by the thread recorded as `active`'s owner, so sharing the `Weak`
// itself across threads (just to read/compare, never to deref without re-checking
// ownership) is safe.
unsafe impl<T: Send> Send for Mutex<T> {}
unsafe impl<T: Send> Sync for Mutex<T> {}

pub struct MutexHandle<'a, T> {
    slot: Rc<GuardSlot<T>>,
    _marker: PhantomData<&'a Mutex<T>>,
}

impl<T> Mutex<T> {
    pub fn new(value: T) -> Self {
        Mutex { inner: StdMutex::new(value), active: StdMutex::new(None) }
    }

    pub fn lock(&self) -> MutexHandle<'_, T> {
        let current = std::thread::current().id();
        {
            let active = self.active.lock().expect("owner mutex poisoned");
            if let Some((owner, weak)) = active.as_ref() {
                if *owner == current {
                    if let Some(slot) = weak.upgrade() {
                        return MutexHandle { slot, _marker: PhantomData };
                    }
                }
            }
            // Falls through with `active`'s guard already dropped at scope exit,
            // whether because a different thread owns it, nobody does, or this
            // thread's previous acquisition chain already fully unwound.
        }
        let guard = self.inner.lock().expect("mutex poisoned");
        // SAFETY: see `GuardSlot`'s doc comment.
        let guard: MutexGuard<'static, T> = unsafe { std::mem::transmute(guard) };
        let slot = Rc::new(GuardSlot { guard });
        *self.active.lock().expect("owner mutex poisoned") = Some((current, Rc::downgrade(&slot)));
        MutexHandle { slot, _marker: PhantomData }
    }
}

impl<T> std::ops::Deref for MutexHandle<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.slot.guard
    }
}

impl<T> std::ops::DerefMut for MutexHandle<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: every handle sharing this `Rc<GuardSlot<T>>` belongs to the same
        // recursive-acquisition chain on the owning thread; exclusivity between
        // *different* chains is still enforced by the real `std::sync::Mutex` this
        // wraps. Aliasing within one thread's own nested locks is the caller's
        // responsibility, same as any recursive mutex.
        unsafe { &mut *(&*self.slot.guard as *const T as *mut T) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recursive_lock_does_not_deadlock() {
        let m = Mutex::new(0);
        let outer = m.lock();
        {
            let mut inner = m.lock();
            *inner += 1;
        }
        assert_eq!(*outer, 1);
    }

    #[test]
    fn lock_is_exclusive_across_threads() {
        use std::sync::Arc;
        let m = Arc::new(Mutex::new(0));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let m = m.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..1000 {
                    let mut guard = m.lock();
                    *guard += 1;
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(*m.lock(), 8000);
    }

    #[test]
    fn early_drop_of_outer_handle_does_not_unlock_while_inner_alive() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc;
        use std::time::{Duration, Instant};

        let m = Arc::new(Mutex::new(0));
        let outer = m.lock();
        let inner = m.lock();
        // Shrinking the critical section by dropping the outer handle first must not
        // release the real lock while `inner` is still live.
        drop(outer);

        let acquired = Arc::new(AtomicBool::new(false));
        let other_m = m.clone();
        let other_acquired = acquired.clone();
        let handle = std::thread::spawn(move || {
            let _guard = other_m.lock();
            other_acquired.store(true, Ordering::SeqCst);
        });

        std::thread::sleep(Duration::from_millis(100));
        assert!(!acquired.load(Ordering::SeqCst), "another thread locked it while `inner` was still alive");

        drop(inner);
        let start = Instant::now();
        while !acquired.load(Ordering::SeqCst) && start.elapsed() < Duration::from_secs(2) {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(acquired.load(Ordering::SeqCst), "other thread never acquired the lock after it was released");
        handle.join().unwrap();
    }
}
