//! Slab arena for trie nodes
//!
//! Nodes are fixed-size records carved out of page-sized, page-aligned slabs
//! obtained from the tree's [`Allocator`]. Unlinked nodes go onto an explicit
//! free-list and are handed out again before any new slab is requested.
//! Slabs are never returned one by one: the whole arena is released when it
//! is dropped.
//!
//! ```text
//!  slab 0 (one page)            slab 1 (one page)
//! ┌──────┬──────┬─────┬──────┐ ┌──────┬──────┬──────────────┐
//! │ Node │ Free │ ... │ Node │ │ Node │ Node │  (uncarved)  │
//! └──────┴──┬───┴─────┴──────┘ └──────┴──────┴──────────────┘
//!           └─> next free slot ...          ^ cursor
//! ```

use crate::allocator::{allocate_aligned, release_aligned, Allocator};
use crate::error::{RadixError, Result};
use log::{debug, error, trace};
use std::mem::{align_of, size_of};
use std::num::NonZeroU32;
use std::ptr::NonNull;

/// Sentinel payload meaning "no value stored at this node"
pub const NO_VALUE: usize = usize::MAX;

/// Handle to a node slot in the arena
///
/// Non-zero so that `Option<NodeId>` stays four bytes wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(NonZeroU32);

impl NodeId {
    fn from_index(index: usize) -> Option<Self> {
        let raw = u32::try_from(index.checked_add(1)?).ok()?;
        NonZeroU32::new(raw).map(NodeId)
    }

    /// Dense slot index (slab * slots_per_slab + offset)
    pub fn index(self) -> usize {
        (self.0.get() - 1) as usize
    }
}

/// A trie node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Node {
    /// Child for key bit 1
    pub right: Option<NodeId>,
    /// Child for key bit 0
    pub left: Option<NodeId>,
    /// Structural parent; `None` only for the root
    pub parent: Option<NodeId>,
    /// Payload, or [`NO_VALUE`]
    pub value: usize,
}

impl Node {
    /// Valueless, childless node under `parent`
    pub fn new(parent: Option<NodeId>) -> Self {
        Self {
            right: None,
            left: None,
            parent,
            value: NO_VALUE,
        }
    }

    /// Child selected by a key bit
    #[inline]
    pub fn child(&self, bit: bool) -> Option<NodeId> {
        if bit {
            self.right
        } else {
            self.left
        }
    }

    #[inline]
    pub(crate) fn set_child(&mut self, bit: bool, child: Option<NodeId>) {
        if bit {
            self.right = child;
        } else {
            self.left = child;
        }
    }

    /// True when neither child is present
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.right.is_none() && self.left.is_none()
    }

    /// True when the node carries a real payload
    #[inline]
    pub fn has_value(&self) -> bool {
        self.value != NO_VALUE
    }
}

/// Contents of one arena slot
#[derive(Debug, Clone, Copy)]
enum Slot {
    Linked(Node),
    Free { next: Option<NodeId> },
}

/// Bytes occupied by one node slot
pub const SLOT_SIZE: usize = size_of::<Slot>();

/// Page-slab node allocator with a recycling free-list
pub struct NodeArena<A: Allocator> {
    allocator: A,
    page_size: usize,
    slots_per_slab: usize,
    slabs: Vec<NonNull<Slot>>,
    /// Uncarved slots left in the newest slab
    remaining: usize,
    free: Option<NodeId>,
    free_len: usize,
    live: usize,
}

// SAFETY: the arena exclusively owns its slabs; no slot pointer escapes
// except through borrows tied to `&self`/`&mut self`.
unsafe impl<A: Allocator + Send> Send for NodeArena<A> {}
unsafe impl<A: Allocator + Sync> Sync for NodeArena<A> {}

impl<A: Allocator> NodeArena<A> {
    /// Create an empty arena that requests `page_size` slabs from `allocator`
    ///
    /// No memory is requested until the first node is allocated.
    pub fn new(allocator: A, page_size: usize) -> Result<Self> {
        if !page_size.is_power_of_two() {
            return Err(RadixError::Config(format!(
                "page size {} is not a power of two",
                page_size
            )));
        }
        if page_size < SLOT_SIZE || page_size < align_of::<*mut u8>() {
            return Err(RadixError::Config(format!(
                "page size {} cannot hold a {}-byte node",
                page_size, SLOT_SIZE
            )));
        }

        Ok(Self {
            allocator,
            page_size,
            slots_per_slab: page_size / SLOT_SIZE,
            slabs: Vec::new(),
            remaining: 0,
            free: None,
            free_len: 0,
            live: 0,
        })
    }

    /// Store `node` in a slot and return its handle
    ///
    /// Reuses the free-list head when there is one; otherwise carves the next
    /// slot of the current slab, requesting a fresh page-aligned slab first if
    /// the current one is exhausted.
    pub fn allocate_node(&mut self, node: Node) -> Result<NodeId> {
        if let Some(id) = self.free {
            let slot = self.slot_ptr(id);
            // SAFETY: free-list ids always name carved slots
            match unsafe { *slot } {
                Slot::Free { next } => {
                    unsafe { slot.write(Slot::Linked(node)) };
                    self.free = next;
                    self.free_len -= 1;
                    self.live += 1;
                    return Ok(id);
                }
                Slot::Linked(_) => {
                    // Never hand out a linked slot; carve fresh ones instead
                    error!(
                        "free-list head {} is still linked, dropping {} free node(s)",
                        id.index(),
                        self.free_len
                    );
                    self.free = None;
                    self.free_len = 0;
                }
            }
        }

        if self.remaining == 0 {
            self.grow()?;
        }

        let offset = self.slots_per_slab - self.remaining;
        let index = (self.slabs.len() - 1) * self.slots_per_slab + offset;
        let id = NodeId::from_index(index).ok_or(RadixError::OutOfMemory)?;

        // SAFETY: offset < slots_per_slab, so the slot lies inside the newest slab
        unsafe { self.slot_ptr(id).write(Slot::Linked(node)) };
        self.remaining -= 1;
        self.live += 1;
        Ok(id)
    }

    /// Push a node onto the free-list
    ///
    /// The caller must already have unlinked it from the trie.
    pub fn recycle_node(&mut self, id: NodeId) {
        trace!("recycling node {}", id.index());
        let slot = self.slot_ptr(id);
        debug_assert!(matches!(unsafe { *slot }, Slot::Linked(_)), "double recycle");
        // SAFETY: id names a carved slot
        unsafe { slot.write(Slot::Free { next: self.free }) };
        self.free = Some(id);
        self.free_len += 1;
        self.live -= 1;
    }

    /// Borrow a linked node
    ///
    /// # Panics
    /// Panics if `id` is on the free-list.
    pub fn node(&self, id: NodeId) -> &Node {
        // SAFETY: ids are only minted for carved slots, which stay valid until drop
        match unsafe { &*self.slot_ptr(id) } {
            Slot::Linked(node) => node,
            Slot::Free { .. } => panic!("node {:?} used after recycle", id),
        }
    }

    /// Mutably borrow a linked node
    ///
    /// # Panics
    /// Panics if `id` is on the free-list.
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        // SAFETY: as in `node`, and `&mut self` guarantees exclusivity
        match unsafe { &mut *self.slot_ptr(id) } {
            Slot::Linked(node) => node,
            Slot::Free { .. } => panic!("node {:?} used after recycle", id),
        }
    }

    /// Nodes currently linked into the trie
    pub fn live_nodes(&self) -> usize {
        self.live
    }

    /// Nodes waiting on the free-list
    pub fn free_nodes(&self) -> usize {
        self.free_len
    }

    /// Slabs requested from the allocator so far
    pub fn slab_count(&self) -> usize {
        self.slabs.len()
    }

    /// Node slots per slab
    pub fn slots_per_slab(&self) -> usize {
        self.slots_per_slab
    }

    /// Slab size in bytes
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// The allocator backing this arena
    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    /// Mutable access to the allocator (for example to adjust a test limit)
    pub fn allocator_mut(&mut self) -> &mut A {
        &mut self.allocator
    }

    fn grow(&mut self) -> Result<()> {
        let slab = allocate_aligned(&mut self.allocator, self.page_size, self.page_size)
            .ok_or(RadixError::OutOfMemory)?;
        self.slabs.push(slab.cast::<Slot>());
        self.remaining = self.slots_per_slab;
        debug!(
            "node arena grew to {} slab(s) of {} bytes",
            self.slabs.len(),
            self.page_size
        );
        Ok(())
    }

    #[inline]
    fn slot_ptr(&self, id: NodeId) -> *mut Slot {
        let index = id.index();
        let slab = self.slabs[index / self.slots_per_slab];
        // SAFETY: index % slots_per_slab < slots_per_slab, which fits in one page
        unsafe { slab.as_ptr().add(index % self.slots_per_slab) }
    }
}

impl<A: Allocator> Drop for NodeArena<A> {
    fn drop(&mut self) {
        for slab in self.slabs.drain(..) {
            // SAFETY: every slab came from allocate_aligned with these arguments;
            // Slot is Copy so nothing inside needs dropping.
            unsafe {
                release_aligned(
                    &mut self.allocator,
                    slab.cast::<u8>(),
                    self.page_size,
                    self.page_size,
                )
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::CountingAllocator;

    fn arena(page_size: usize) -> NodeArena<CountingAllocator> {
        NodeArena::new(CountingAllocator::new(), page_size).unwrap()
    }

    #[test]
    fn test_node_id_is_compact() {
        assert_eq!(size_of::<Option<NodeId>>(), 4);
    }

    #[test]
    fn test_rejects_bad_page_size() {
        assert!(matches!(
            NodeArena::new(CountingAllocator::new(), 1000),
            Err(RadixError::Config(_))
        ));
        assert!(matches!(
            NodeArena::new(CountingAllocator::new(), 8),
            Err(RadixError::Config(_))
        ));
    }

    #[test]
    fn test_slab_per_page() {
        let mut arena = arena(4096);
        let per_slab = arena.slots_per_slab();
        assert_eq!(arena.allocator().calls(), 0);

        for _ in 0..per_slab {
            arena.allocate_node(Node::new(None)).unwrap();
        }
        assert_eq!(arena.allocator().calls(), 1);

        arena.allocate_node(Node::new(None)).unwrap();
        assert_eq!(arena.allocator().calls(), 2);
        assert_eq!(arena.slab_count(), 2);
        assert_eq!(arena.live_nodes(), per_slab + 1);
    }

    #[test]
    fn test_free_list_is_lifo_and_avoids_allocator() {
        let mut arena = arena(4096);
        let a = arena.allocate_node(Node::new(None)).unwrap();
        let b = arena.allocate_node(Node::new(Some(a))).unwrap();
        assert_eq!(arena.node(b).parent, Some(a));

        arena.recycle_node(a);
        arena.recycle_node(b);
        assert_eq!(arena.free_nodes(), 2);

        let calls = arena.allocator().calls();
        let mut node = Node::new(None);
        node.value = 42;
        assert_eq!(arena.allocate_node(node).unwrap(), b);
        assert_eq!(arena.allocate_node(Node::new(None)).unwrap(), a);
        assert_eq!(arena.allocator().calls(), calls);
        assert_eq!(arena.node(b).value, 42);
        assert_eq!(arena.free_nodes(), 0);
    }

    #[test]
    fn test_out_of_memory() {
        let mut arena = NodeArena::new(CountingAllocator::with_limit(1), 4096).unwrap();
        for _ in 0..arena.slots_per_slab() {
            arena.allocate_node(Node::new(None)).unwrap();
        }
        assert_eq!(
            arena.allocate_node(Node::new(None)),
            Err(RadixError::OutOfMemory)
        );
    }

    #[test]
    fn test_linked_free_head_is_abandoned() {
        let mut arena = arena(4096);
        let a = arena.allocate_node(Node::new(None)).unwrap();
        let b = arena.allocate_node(Node::new(Some(a))).unwrap();
        arena.recycle_node(b);

        // Corrupt the list: its head now names a slot that is in use
        arena.free = Some(a);
        let c = arena.allocate_node(Node::new(None)).unwrap();
        assert_ne!(c, a);
        assert_ne!(c, b);
        assert_eq!(arena.free_nodes(), 0);
        assert_eq!(arena.node(a).parent, None);
    }

    #[test]
    #[should_panic(expected = "used after recycle")]
    fn test_use_after_recycle_panics() {
        let mut arena = arena(4096);
        let a = arena.allocate_node(Node::new(None)).unwrap();
        arena.recycle_node(a);
        let _ = arena.node(a);
    }
}
