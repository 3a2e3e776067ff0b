//! Allocation capability injected into a tree at creation time
//!
//! The node arena never talks to the global allocator directly. Every slab
//! it needs goes through an [`Allocator`] handed to the tree when it is
//! created, which lets embedders route node memory into their own heap
//! and lets tests count or cap slab requests.
//!
//! # Example
//!
//! ```rust
//! use cidrtree::allocator::CountingAllocator;
//! use cidrtree::{Preallocate, RadixTree};
//!
//! let alloc = CountingAllocator::new();
//! let mut tree = RadixTree::<u32, _>::create(alloc, Preallocate::Disabled)?;
//! tree.insert(0x0A00_0000, 0xFF00_0000, 7)?;
//! assert_eq!(tree.allocator().calls(), 1);
//! # Ok::<(), cidrtree::RadixError>(())
//! ```

use std::alloc::{self, Layout};
use std::mem::{align_of, size_of};
use std::ptr::NonNull;

/// A source of raw memory blocks
///
/// Implementations behave like `malloc`/`free`: `allocate` returns `None`
/// when it cannot satisfy a request, and `deallocate` is only ever called with
/// a pointer and size previously returned by `allocate` on the same instance.
pub trait Allocator {
    /// Allocate `size` bytes aligned to at least `align_of::<usize>()`
    fn allocate(&mut self, size: usize) -> Option<NonNull<u8>>;

    /// Return a block obtained from [`Allocator::allocate`]
    ///
    /// # Safety
    /// `ptr` must come from `allocate` on this allocator with the same `size`,
    /// and must not be used afterwards.
    unsafe fn deallocate(&mut self, ptr: NonNull<u8>, size: usize);
}

/// Allocator backed by the Rust global allocator
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemAllocator;

impl SystemAllocator {
    fn layout(size: usize) -> Option<Layout> {
        Layout::from_size_align(size.max(1), align_of::<usize>()).ok()
    }
}

impl Allocator for SystemAllocator {
    fn allocate(&mut self, size: usize) -> Option<NonNull<u8>> {
        let layout = Self::layout(size)?;
        // SAFETY: layout has non-zero size
        NonNull::new(unsafe { alloc::alloc(layout) })
    }

    unsafe fn deallocate(&mut self, ptr: NonNull<u8>, size: usize) {
        if let Some(layout) = Self::layout(size) {
            alloc::dealloc(ptr.as_ptr(), layout);
        }
    }
}

/// Wrapper that counts allocation calls and can refuse requests past a limit
///
/// Used by tests to prove the free-list satisfies inserts before the
/// underlying allocator is asked for more memory, and to inject
/// out-of-memory failures.
#[derive(Debug, Clone, Default)]
pub struct CountingAllocator<A = SystemAllocator> {
    inner: A,
    calls: usize,
    bytes: usize,
    releases: usize,
    limit: Option<usize>,
}

impl CountingAllocator<SystemAllocator> {
    /// Counting allocator over the system allocator, without a limit
    pub fn new() -> Self {
        Self::wrap(SystemAllocator)
    }

    /// Counting allocator that refuses every request after `limit` successful ones
    pub fn with_limit(limit: usize) -> Self {
        let mut alloc = Self::new();
        alloc.limit = Some(limit);
        alloc
    }
}

impl<A: Allocator> CountingAllocator<A> {
    /// Wrap an existing allocator
    pub fn wrap(inner: A) -> Self {
        Self {
            inner,
            calls: 0,
            bytes: 0,
            releases: 0,
            limit: None,
        }
    }

    /// Number of successful `allocate` calls
    pub fn calls(&self) -> usize {
        self.calls
    }

    /// Total bytes handed out by successful calls
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    /// Number of `deallocate` calls
    pub fn releases(&self) -> usize {
        self.releases
    }

    /// Change (or clear) the refusal limit
    pub fn set_limit(&mut self, limit: Option<usize>) {
        self.limit = limit;
    }
}

impl<A: Allocator> Allocator for CountingAllocator<A> {
    fn allocate(&mut self, size: usize) -> Option<NonNull<u8>> {
        if self.limit.is_some_and(|limit| self.calls >= limit) {
            return None;
        }
        let ptr = self.inner.allocate(size)?;
        self.calls += 1;
        self.bytes += size;
        Some(ptr)
    }

    unsafe fn deallocate(&mut self, ptr: NonNull<u8>, size: usize) {
        self.releases += 1;
        self.inner.deallocate(ptr, size);
    }
}

/// Platform page size in bytes
pub fn page_size() -> usize {
    // SAFETY: sysconf has no preconditions
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 {
        size as usize
    } else {
        4096
    }
}

/// Bytes requested from the allocator for an aligned block of `size` bytes
pub(crate) fn aligned_request(size: usize, align: usize) -> usize {
    size + align + size_of::<*mut u8>()
}

/// Allocate `size` bytes aligned to `align` (a power of two, at least pointer-aligned)
///
/// Over-allocates, rounds the pointer up, and stores the true allocation
/// origin in the word just before the aligned pointer.
pub(crate) fn allocate_aligned<A: Allocator>(
    allocator: &mut A,
    size: usize,
    align: usize,
) -> Option<NonNull<u8>> {
    debug_assert!(align.is_power_of_two() && align >= align_of::<*mut u8>());

    let raw = allocator.allocate(aligned_request(size, align))?;
    let origin = raw.as_ptr() as usize;
    let aligned = (origin + align + size_of::<*mut u8>()) & !(align - 1);

    // SAFETY: aligned - origin lies in (size_of::<*mut u8>(), align + size_of::<*mut u8>()],
    // so both the stored origin word and `size` bytes past `aligned` are inside the block.
    unsafe {
        let ptr = raw.as_ptr().add(aligned - origin);
        (ptr as *mut *mut u8).sub(1).write(raw.as_ptr());
        Some(NonNull::new_unchecked(ptr))
    }
}

/// Release a block obtained from [`allocate_aligned`]
///
/// # Safety
/// `ptr`, `size` and `align` must match a prior `allocate_aligned` call on
/// the same allocator.
pub(crate) unsafe fn release_aligned<A: Allocator>(
    allocator: &mut A,
    ptr: NonNull<u8>,
    size: usize,
    align: usize,
) {
    let origin = (ptr.as_ptr() as *mut *mut u8).sub(1).read();
    if let Some(origin) = NonNull::new(origin) {
        allocator.deallocate(origin, aligned_request(size, align));
    }
}
