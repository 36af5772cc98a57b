//! The allocator family: a uniform `allocate`/`free`/`realloc` contract over a handful
//! of pluggable strategies (System, BumpPointer, Stats, OOM, Buffer).

use std::alloc::{GlobalAlloc, Layout, System as StdSystem};
use std::cell::Cell;
use std::ptr::NonNull;

use crate::error::{Error, Result};
use crate::math::align_up;

/// Every block returned by an allocator in this family is aligned to at least this many
/// bytes, matching the "fixed machine-word multiple (implementation-defined, >= 16)"
/// contract in the allocator family specification.
pub const MIN_ALIGN: usize = 16;

/// Allocations above half a segment are routed to the large-object side list.
pub const BUMP_POINTER_SEGMENT_SIZE: usize = 256 * 1024;
pub const LARGE_OBJECT_SIZE_THRESHOLD: usize = BUMP_POINTER_SEGMENT_SIZE / 2;

/// Polymorphic allocator capability set: `allocate(n) -> pointer-or-null`, `free(p)`.
///
/// Dynamic dispatch (`Box<dyn Allocator>`) is used throughout for composition (Stats,
/// OOM and BumpPointer all wrap a base allocator) since none of these are hot paths in
/// the sense that the core's data-structure operations are.
pub trait Allocator: std::fmt::Debug {
    /// Returns a block of at least `size` bytes aligned to [`MIN_ALIGN`], or `None` on
    /// exhaustion. `size == 0` still returns a valid, distinct, freeable pointer.
    fn allocate(&self, size: usize) -> Option<NonNull<u8>>;

    /// Releases a block previously returned by `allocate`/`realloc` on this allocator.
    /// `size` must be the block's current size. A no-op for allocators that never free
    /// per-object (BumpPointer).
    fn free(&self, ptr: NonNull<u8>, size: usize);

    /// Zero-initialized allocation; equivalent to `allocate` followed by a zero-fill.
    fn allocate_zeroed(&self, size: usize) -> Option<NonNull<u8>> {
        let ptr = self.allocate(size)?;
        unsafe { ptr.as_ptr().write_bytes(0, size) };
        Some(ptr)
    }

    /// `new_size <= old_size` returns `old` unchanged; otherwise allocates `new_size`,
    /// copies `old_size` bytes, frees the old block, and returns the new pointer (or
    /// `None`, leaving `old` intact).
    fn realloc(&self, old: NonNull<u8>, old_size: usize, new_size: usize) -> Option<NonNull<u8>> {
        if new_size <= old_size {
            return Some(old);
        }
        let new_ptr = self.allocate(new_size)?;
        unsafe { new_ptr.as_ptr().copy_from_nonoverlapping(old.as_ptr(), old_size) };
        self.free(old, old_size);
        Some(new_ptr)
    }
}

fn layout_for(size: usize) -> Layout {
    let size = align_up(size.max(1), MIN_ALIGN).unwrap_or(size.max(1));
    Layout::from_size_align(size, MIN_ALIGN).expect("size/align computed from a bounded request")
}

/// Direct passthrough to the process allocator. Thread-safe; `dispose` is a no-op
/// (there is nothing to tear down).
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemAllocator;

impl Allocator for SystemAllocator {
    fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        let layout = layout_for(size);
        let ptr = unsafe { StdSystem.alloc(layout) };
        NonNull::new(ptr)
    }

    fn free(&self, ptr: NonNull<u8>, size: usize) {
        let layout = layout_for(size);
        unsafe { StdSystem.dealloc(ptr.as_ptr(), layout) };
    }
}

struct Segment {
    data: Box<[u8]>,
    index: usize,
}

impl Segment {
    fn new(size: usize) -> Self {
        Segment { data: vec![0u8; size].into_boxed_slice(), index: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.index
    }
}

/// A monotonic region allocator: bumps an index into a list of fixed-size segments.
/// Allocations larger than [`LARGE_OBJECT_SIZE_THRESHOLD`] bypass the segments and are
/// tracked in a side list, freed individually on `dispose`. `free` is a no-op for
/// segment-backed blocks (there is no per-object bookkeeping to reclaim); large objects
/// are only released on `dispose`, matching the "no per-object free" contract.
///
/// Not safe for concurrent use — confine to a single thread or add external
/// synchronization.
#[derive(Debug)]
pub struct BumpPointerAllocator {
    segment_size: usize,
    segments: std::cell::RefCell<Vec<Segment>>,
    large_objects: std::cell::RefCell<Vec<(NonNull<u8>, usize)>>,
}

impl Default for BumpPointerAllocator {
    fn default() -> Self {
        Self::new(BUMP_POINTER_SEGMENT_SIZE)
    }
}

impl BumpPointerAllocator {
    pub fn new(segment_size: usize) -> Self {
        BumpPointerAllocator {
            segment_size,
            segments: std::cell::RefCell::new(Vec::new()),
            large_objects: std::cell::RefCell::new(Vec::new()),
        }
    }

    fn large_object_threshold(&self) -> usize {
        self.segment_size / 2
    }

    fn allocate_large(&self, size: usize) -> Option<NonNull<u8>> {
        let layout = layout_for(size);
        let ptr = unsafe { StdSystem.alloc(layout) };
        let ptr = NonNull::new(ptr)?;
        self.large_objects.borrow_mut().push((ptr, size));
        Some(ptr)
    }
}

impl Allocator for BumpPointerAllocator {
    fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        let aligned = align_up(size, MIN_ALIGN).ok()?;
        if aligned > self.large_object_threshold() {
            return self.allocate_large(aligned);
        }
        let mut segments = self.segments.borrow_mut();
        if segments.last().is_none_or(|s| s.remaining() < aligned) {
            segments.push(Segment::new(self.segment_size.max(aligned)));
        }
        let segment = segments.last_mut().expect("just pushed if empty");
        let start = segment.index;
        segment.index += aligned;
        NonNull::new(unsafe { segment.data.as_mut_ptr().add(start) })
    }

    fn free(&self, _ptr: NonNull<u8>, _size: usize) {}
}

impl Drop for BumpPointerAllocator {
    fn drop(&mut self) {
        for (ptr, size) in self.large_objects.borrow_mut().drain(..) {
            let layout = layout_for(size);
            unsafe { StdSystem.dealloc(ptr.as_ptr(), layout) };
        }
    }
}

/// Wraps another allocator and counts every `allocate` call. Tracking can be toggled
/// off without losing the running total. `dispose` (the `Drop` impl) cascades to the
/// wrapped allocator.
#[derive(Debug)]
pub struct StatsAllocator {
    base: Box<dyn Allocator>,
    total_alloc_count: Cell<usize>,
    is_tracking: Cell<bool>,
}

impl StatsAllocator {
    pub fn new(base: Box<dyn Allocator>) -> Self {
        StatsAllocator { base, total_alloc_count: Cell::new(0), is_tracking: Cell::new(true) }
    }

    pub fn total_alloc_count(&self) -> usize {
        self.total_alloc_count.get()
    }

    pub fn set_tracking(&self, tracking: bool) {
        self.is_tracking.set(tracking);
    }
}

impl Allocator for StatsAllocator {
    fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        if self.is_tracking.get() {
            self.total_alloc_count.set(self.total_alloc_count.get() + 1);
        }
        self.base.allocate(size)
    }

    fn free(&self, ptr: NonNull<u8>, size: usize) {
        self.base.free(ptr, size);
    }
}

/// Wraps another allocator and fails starting at the `failed_alloc_number`-th
/// `allocate` call (0-indexed: the first `failed_alloc_number` calls succeed). Used
/// exclusively to drive injection-based recovery tests, never in a production path.
#[derive(Debug)]
pub struct OomAllocator {
    base: Box<dyn Allocator>,
    total_alloc_count: Cell<usize>,
    failed_alloc_number: usize,
    is_tracking: Cell<bool>,
}

impl OomAllocator {
    pub fn new(base: Box<dyn Allocator>, failed_alloc_number: usize) -> Self {
        OomAllocator {
            base,
            total_alloc_count: Cell::new(0),
            failed_alloc_number,
            is_tracking: Cell::new(true),
        }
    }

    pub fn set_tracking(&self, tracking: bool) {
        self.is_tracking.set(tracking);
    }

    /// True once `total_alloc_count >= failed_alloc_number`.
    pub fn is_out_of_memory(&self) -> bool {
        self.total_alloc_count.get() >= self.failed_alloc_number
    }
}

impl Allocator for OomAllocator {
    fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        if !self.is_tracking.get() {
            return self.base.allocate(size);
        }
        if self.is_out_of_memory() {
            return None;
        }
        self.total_alloc_count.set(self.total_alloc_count.get() + 1);
        self.base.allocate(size)
    }

    fn free(&self, ptr: NonNull<u8>, size: usize) {
        self.base.free(ptr, size);
    }
}

/// Satisfies requests from a caller-supplied fixed region until exhausted; overflow
/// falls through to an optional fallback allocator, or fails.
#[derive(Debug)]
pub struct BufferAllocator {
    buffer: std::cell::RefCell<Box<[u8]>>,
    index: Cell<usize>,
    fallback: Option<Box<dyn Allocator>>,
}

impl BufferAllocator {
    pub fn new(capacity: usize, fallback: Option<Box<dyn Allocator>>) -> Self {
        BufferAllocator {
            buffer: std::cell::RefCell::new(vec![0u8; capacity].into_boxed_slice()),
            index: Cell::new(0),
            fallback,
        }
    }
}

impl Allocator for BufferAllocator {
    fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        let aligned = align_up(size, MIN_ALIGN).ok()?;
        let mut buffer = self.buffer.borrow_mut();
        if buffer.len() - self.index.get() >= aligned {
            let start = self.index.get();
            self.index.set(start + aligned);
            return NonNull::new(unsafe { buffer.as_mut_ptr().add(start) });
        }
        drop(buffer);
        self.fallback.as_ref().and_then(|f| f.allocate(size))
    }

    fn free(&self, ptr: NonNull<u8>, size: usize) {
        if let Some(fallback) = &self.fallback {
            let buffer = self.buffer.borrow();
            let base = buffer.as_ptr() as usize;
            let p = ptr.as_ptr() as usize;
            if p < base || p >= base + buffer.len() {
                drop(buffer);
                fallback.free(ptr, size);
            }
        }
    }
}

/// Validates that `size` respects the allocator contract's upper bound before an
/// operation that would otherwise overflow a size computation; matches the "explicit
/// panic path used for truly impossible conditions" called out in the error handling
/// design — callers of this helper are expected to have already validated user input,
/// so a failure here indicates a logic error in the core itself.
pub fn checked_alloc_size(count: usize, elem_size: usize) -> Result<usize> {
    count.checked_mul(elem_size).ok_or(Error::Overflow)
}
