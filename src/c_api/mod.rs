//! C API for cidrtree
//!
//! A stable C ABI over the radix tree. The host supplies the allocation
//! function that node slabs are drawn from, mirroring embedders (scripting
//! runtimes, servers) that account for all memory through their own heap.
//!
//! ```c
//! static void *host_alloc(void *ud, void *ptr, size_t osize, size_t nsize) {
//!     if (nsize == 0) { free(ptr); return NULL; }
//!     return realloc(ptr, nsize);
//! }
//!
//! radix_tree_t *tree = radix_tree_create(host_alloc, NULL, -1);
//! radix32tree_insert(tree, 0x0A000000, 0xFF000000, 42);   /* 10.0.0.0/8 */
//! uintptr_t v = radix32tree_find(tree, 0x0A010203);       /* 42 */
//! radix_tree_destroy(tree);
//! ```

#![allow(non_camel_case_types)]

use crate::allocator::Allocator;
use crate::config::Preallocate;
use crate::error::Status;
use crate::tree::{Radix128Tree, Radix32Tree};
use std::os::raw::c_void;
use std::ptr::{self, NonNull};

pub use crate::error::{RADIX_BUSY, RADIX_ERROR, RADIX_OK};

/// Returned by the find functions when no stored prefix covers the key
pub const RADIX_NO_VALUE: usize = usize::MAX;

/// Host allocation function
///
/// Called as `f(ud, NULL, 0, n)` to allocate `n` bytes (return NULL on
/// failure) and as `f(ud, p, n, 0)` to free a block of `n` bytes.
pub type radix_alloc_fn = Option<
    unsafe extern "C" fn(ud: *mut c_void, ptr: *mut c_void, osize: usize, nsize: usize) -> *mut c_void,
>;

/// Opaque tree handle
#[repr(C)]
pub struct radix_tree_t {
    _private: [u8; 0],
}

#[derive(Clone, Copy)]
struct HostAllocator {
    alloc: unsafe extern "C" fn(*mut c_void, *mut c_void, usize, usize) -> *mut c_void,
    ud: *mut c_void,
}

impl Allocator for HostAllocator {
    fn allocate(&mut self, size: usize) -> Option<NonNull<u8>> {
        // SAFETY: the host promised a malloc-like function at creation time
        let ptr = unsafe { (self.alloc)(self.ud, ptr::null_mut(), 0, size) };
        NonNull::new(ptr as *mut u8)
    }

    unsafe fn deallocate(&mut self, ptr: NonNull<u8>, size: usize) {
        (self.alloc)(self.ud, ptr.as_ptr() as *mut c_void, size, 0);
    }
}

struct RadixTreeInternal {
    v4: Radix32Tree<HostAllocator>,
    v6: Radix128Tree<HostAllocator>,
}

impl radix_tree_t {
    fn from_internal(internal: Box<RadixTreeInternal>) -> *mut Self {
        Box::into_raw(internal) as *mut Self
    }

    unsafe fn into_internal(ptr: *mut Self) -> Box<RadixTreeInternal> {
        Box::from_raw(ptr as *mut RadixTreeInternal)
    }

    unsafe fn as_internal<'a>(ptr: *const Self) -> &'a RadixTreeInternal {
        &*(ptr as *const RadixTreeInternal)
    }

    unsafe fn as_internal_mut<'a>(ptr: *mut Self) -> &'a mut RadixTreeInternal {
        &mut *(ptr as *mut RadixTreeInternal)
    }
}

fn code<T>(result: &crate::Result<T>) -> i32 {
    Status::from(result).code()
}

unsafe fn read_key128(ptr: *const u8) -> [u8; 16] {
    ptr::read(ptr as *const [u8; 16])
}

/// Create a tree
///
/// # Parameters
/// * `alloc` - Host allocation function (must not be NULL)
/// * `ud` - Opaque context passed to every `alloc` call
/// * `preallocate` - Warm-up levels: 0 disables, positive is explicit, negative picks automatically
///
/// # Returns
/// * Non-null handle on success
/// * NULL if `alloc` is NULL or cannot supply the root and warm-up nodes
///
/// # Safety
/// `alloc` must behave as documented on [`radix_alloc_fn`] and stay valid,
/// together with `ud`, until the tree is destroyed.
#[no_mangle]
pub unsafe extern "C" fn radix_tree_create(
    alloc: radix_alloc_fn,
    ud: *mut c_void,
    preallocate: i32,
) -> *mut radix_tree_t {
    let Some(alloc) = alloc else {
        return ptr::null_mut();
    };
    let host = HostAllocator { alloc, ud };
    let preallocate = Preallocate::from_hint(preallocate);

    let v4 = match Radix32Tree::create(host, preallocate) {
        Ok(tree) => tree,
        Err(_) => return ptr::null_mut(),
    };
    let v6 = match Radix128Tree::create(host, preallocate) {
        Ok(tree) => tree,
        Err(_) => return ptr::null_mut(),
    };

    radix_tree_t::from_internal(Box::new(RadixTreeInternal { v4, v6 }))
}

/// Destroy a tree, returning all of its slabs to the host allocator
///
/// # Safety
/// `tree` must be NULL or a handle from `radix_tree_create` not yet destroyed.
#[no_mangle]
pub unsafe extern "C" fn radix_tree_destroy(tree: *mut radix_tree_t) {
    if !tree.is_null() {
        drop(radix_tree_t::into_internal(tree));
    }
}

/// Insert a 32-bit prefix
///
/// # Returns
/// * RADIX_OK on success
/// * RADIX_BUSY if the prefix already holds a value
/// * RADIX_ERROR on allocation failure or NULL handle
///
/// # Safety
/// `tree` must be NULL or a live handle.
#[no_mangle]
pub unsafe extern "C" fn radix32tree_insert(
    tree: *mut radix_tree_t,
    key: u32,
    mask: u32,
    value: usize,
) -> i32 {
    if tree.is_null() {
        return RADIX_ERROR;
    }
    let internal = radix_tree_t::as_internal_mut(tree);
    code(&internal.v4.insert(key, mask, value))
}

/// Delete a 32-bit prefix
///
/// # Returns
/// * RADIX_OK on success
/// * RADIX_ERROR if the prefix holds no value or the handle is NULL
///
/// # Safety
/// `tree` must be NULL or a live handle.
#[no_mangle]
pub unsafe extern "C" fn radix32tree_delete(tree: *mut radix_tree_t, key: u32, mask: u32) -> i32 {
    if tree.is_null() {
        return RADIX_ERROR;
    }
    let internal = radix_tree_t::as_internal_mut(tree);
    code(&internal.v4.delete(key, mask))
}

/// Longest-prefix match for a 32-bit key; RADIX_NO_VALUE when nothing covers it
///
/// # Safety
/// `tree` must be NULL or a live handle.
#[no_mangle]
pub unsafe extern "C" fn radix32tree_find(tree: *const radix_tree_t, key: u32) -> usize {
    if tree.is_null() {
        return RADIX_NO_VALUE;
    }
    radix_tree_t::as_internal(tree)
        .v4
        .find(key)
        .unwrap_or(RADIX_NO_VALUE)
}

/// Insert a 128-bit prefix; `key` and `mask` point to 16 bytes each
///
/// # Safety
/// `tree` must be NULL or a live handle; `key` and `mask` must be NULL or
/// readable for 16 bytes.
#[no_mangle]
pub unsafe extern "C" fn radix128tree_insert(
    tree: *mut radix_tree_t,
    key: *const u8,
    mask: *const u8,
    value: usize,
) -> i32 {
    if tree.is_null() || key.is_null() || mask.is_null() {
        return RADIX_ERROR;
    }
    let internal = radix_tree_t::as_internal_mut(tree);
    code(&internal.v6.insert(read_key128(key), read_key128(mask), value))
}

/// Delete a 128-bit prefix
///
/// # Safety
/// As for [`radix128tree_insert`].
#[no_mangle]
pub unsafe extern "C" fn radix128tree_delete(
    tree: *mut radix_tree_t,
    key: *const u8,
    mask: *const u8,
) -> i32 {
    if tree.is_null() || key.is_null() || mask.is_null() {
        return RADIX_ERROR;
    }
    let internal = radix_tree_t::as_internal_mut(tree);
    code(&internal.v6.delete(read_key128(key), read_key128(mask)))
}

/// Longest-prefix match for a 128-bit key; RADIX_NO_VALUE when nothing covers it
///
/// # Safety
/// `tree` must be NULL or a live handle; `key` must be NULL or readable for 16 bytes.
#[no_mangle]
pub unsafe extern "C" fn radix128tree_find(tree: *const radix_tree_t, key: *const u8) -> usize {
    if tree.is_null() || key.is_null() {
        return RADIX_NO_VALUE;
    }
    radix_tree_t::as_internal(tree)
        .v6
        .find(read_key128(key))
        .unwrap_or(RADIX_NO_VALUE)
}
