//! Longest-prefix-match radix tree
//!
//! A binary trie over fixed-width keys. Each edge consumes one key bit, most
//! significant first: `right` for a 1 bit, `left` for a 0 bit. A prefix of
//! length N lives at depth N, so the deepest valued node on a key's path is
//! its longest matching prefix.
//!
//! ```text
//!              root
//!            0/    \1
//!           .      [A]   1/1  -> A
//!                 0/
//!                [B]          10/2 -> B
//!
//! find(0b11..) = A, find(0b10..) = B, find(0b0...) = none
//! ```
//!
//! The same algorithm serves IPv4 (`RadixTree<u32>`) and IPv6
//! (`RadixTree<[u8; 16]>`); see [`RadixKey`].

use crate::allocator::{Allocator, SystemAllocator};
use crate::arena::{Node, NodeArena, NodeId, NO_VALUE};
use crate::config::{Preallocate, TreeConfig, MAX_PREALLOCATE_LEVELS};
use crate::error::{RadixError, Result};
use crate::key::RadixKey;
use log::{debug, warn};
use serde::Serialize;
use std::marker::PhantomData;

/// Radix tree mapping prefixes to word-sized values
///
/// Mutating operations take `&mut self`, lookups take `&self`; callers that
/// share a tree across threads wrap it in their own lock.
pub struct RadixTree<K: RadixKey, A: Allocator = SystemAllocator> {
    arena: NodeArena<A>,
    root: NodeId,
    _key: PhantomData<fn() -> K>,
}

/// IPv4 tree
pub type Radix32Tree<A = SystemAllocator> = RadixTree<u32, A>;
/// IPv6 tree
pub type Radix128Tree<A = SystemAllocator> = RadixTree<[u8; 16], A>;

/// Where a masked descent stopped
struct Descent {
    node: NodeId,
    depth: u32,
    /// True when every masked bit had an existing node
    complete: bool,
}

/// Node accounting for a tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TreeStats {
    /// Nodes reachable from the root
    pub reachable_nodes: usize,
    /// Reachable nodes carrying a real value
    pub valued_nodes: usize,
    /// Nodes the arena has handed out and not recycled
    pub live_nodes: usize,
    /// Nodes on the free-list
    pub free_nodes: usize,
    /// Page slabs obtained from the allocator
    pub slabs: usize,
    /// Slab size in bytes
    pub page_size: usize,
}

impl<K: RadixKey> RadixTree<K, SystemAllocator> {
    /// Tree on the system allocator with automatic warm-up
    pub fn new() -> Result<Self> {
        Self::create(SystemAllocator, Preallocate::Auto)
    }
}

impl<K: RadixKey, A: Allocator> RadixTree<K, A> {
    /// Create a tree whose node slabs come from `allocator`
    ///
    /// Allocates the root and runs the warm-up pass. Fails with
    /// [`RadixError::OutOfMemory`] if the allocator cannot supply the root
    /// or any warm-up node.
    pub fn create(allocator: A, preallocate: Preallocate) -> Result<Self> {
        Self::with_config(allocator, &TreeConfig::with_preallocate(preallocate))
    }

    /// Create a tree from a full [`TreeConfig`]
    pub fn with_config(allocator: A, config: &TreeConfig) -> Result<Self> {
        let mut arena = NodeArena::new(allocator, config.resolved_page_size())?;
        let root = arena.allocate_node(Node::new(None))?;

        let mut tree = Self {
            arena,
            root,
            _key: PhantomData,
        };

        let requested = config.preallocate.levels(tree.arena.slots_per_slab());
        let limit = K::BITS.min(MAX_PREALLOCATE_LEVELS);
        let levels = if requested > limit {
            warn!(
                "clamping preallocation from {} to {} levels for {}-bit keys",
                requested,
                limit,
                K::BITS
            );
            limit
        } else {
            requested
        };

        tree.preallocate(levels)?;
        debug!(
            "created {}-bit radix tree: {} preallocated level(s), {} node(s), {}-byte slabs",
            K::BITS,
            levels,
            tree.arena.live_nodes(),
            tree.arena.page_size()
        );
        Ok(tree)
    }

    /// Insert every prefix of length 1..=levels with no value
    ///
    /// Builds the top of the trie contiguously so early lookups touch few pages.
    fn preallocate(&mut self, levels: u32) -> Result<()> {
        for len in 1..=levels {
            let mask = K::prefix_mask(len);
            for prefix in 0..(1u64 << len) {
                self.insert(K::from_prefix(prefix, len), mask, NO_VALUE)?;
            }
        }
        Ok(())
    }

    /// Follow masked key bits from the root as far as nodes exist
    fn descend(&self, key: &K, mask: &K) -> Descent {
        let mut node = self.root;
        let mut depth = 0;

        while depth < K::BITS && mask.bit(depth) {
            match self.arena.node(node).child(key.bit(depth)) {
                Some(next) => {
                    node = next;
                    depth += 1;
                }
                None => {
                    return Descent {
                        node,
                        depth,
                        complete: false,
                    }
                }
            }
        }

        Descent {
            node,
            depth,
            complete: true,
        }
    }

    /// Associate `value` with the prefix `key`/`mask`
    ///
    /// Only the leading set bits of `mask` are consumed. An occupied prefix is
    /// never overwritten: it fails with [`RadixError::Busy`] and the old value
    /// stays. On [`RadixError::OutOfMemory`] the nodes already linked remain
    /// as valueless structure.
    ///
    /// Passing [`NO_VALUE`] creates the path without storing anything.
    pub fn insert(&mut self, key: K, mask: K, value: usize) -> Result<()> {
        let Descent {
            mut node,
            mut depth,
            complete,
        } = self.descend(&key, &mask);

        if complete {
            let target = self.arena.node_mut(node);
            if target.has_value() {
                return Err(RadixError::Busy);
            }
            target.value = value;
            return Ok(());
        }

        while depth < K::BITS && mask.bit(depth) {
            let child = self.arena.allocate_node(Node::new(Some(node)))?;
            self.arena
                .node_mut(node)
                .set_child(key.bit(depth), Some(child));
            node = child;
            depth += 1;
        }

        self.arena.node_mut(node).value = value;
        Ok(())
    }

    /// Remove the prefix `key`/`mask`
    ///
    /// A leaf is unlinked and recycled whether or not it holds a value, and
    /// so is every ancestor left without children or value, up to the first
    /// one that still matters or the root. A node that still has children (or
    /// the root) only loses its value, and fails with
    /// [`RadixError::NotFound`] if it had none.
    pub fn delete(&mut self, key: K, mask: K) -> Result<()> {
        let Descent { node, complete, .. } = self.descend(&key, &mask);
        if !complete {
            return Err(RadixError::NotFound);
        }

        let target = *self.arena.node(node);
        if target.is_leaf() && target.parent.is_some() {
            self.prune(node);
            return Ok(());
        }

        if !target.has_value() {
            return Err(RadixError::NotFound);
        }
        self.arena.node_mut(node).value = NO_VALUE;
        Ok(())
    }

    /// Unlink and recycle `node`, then every ancestor it leaves dead
    fn prune(&mut self, mut node: NodeId) {
        while let Some(parent) = self.arena.node(node).parent {
            let up = self.arena.node_mut(parent);
            if up.right == Some(node) {
                up.right = None;
            } else {
                up.left = None;
            }
            self.arena.recycle_node(node);

            let up = self.arena.node(parent);
            if !up.is_leaf() || up.has_value() || up.parent.is_none() {
                break;
            }
            node = parent;
        }
    }

    /// Longest-prefix match for `key`
    ///
    /// Returns the value of the deepest valued node on the key's path, or
    /// `None` when no stored prefix covers it.
    pub fn find(&self, key: K) -> Option<usize> {
        let mut best = NO_VALUE;
        let mut node = Some(self.root);
        let mut depth = 0;

        while let Some(id) = node {
            let current = self.arena.node(id);
            if current.has_value() {
                best = current.value;
            }
            if depth == K::BITS {
                break;
            }
            node = current.child(key.bit(depth));
            depth += 1;
        }

        (best != NO_VALUE).then_some(best)
    }

    /// Nodes reachable from the root, root included
    pub fn node_count(&self) -> usize {
        self.walk().0
    }

    /// Node and slab accounting
    pub fn stats(&self) -> TreeStats {
        let (reachable_nodes, valued_nodes) = self.walk();
        TreeStats {
            reachable_nodes,
            valued_nodes,
            live_nodes: self.arena.live_nodes(),
            free_nodes: self.arena.free_nodes(),
            slabs: self.arena.slab_count(),
            page_size: self.arena.page_size(),
        }
    }

    /// The allocator backing this tree
    pub fn allocator(&self) -> &A {
        self.arena.allocator()
    }

    /// Mutable access to the allocator
    pub fn allocator_mut(&mut self) -> &mut A {
        self.arena.allocator_mut()
    }

    /// Count (reachable, valued) nodes
    fn walk(&self) -> (usize, usize) {
        let mut reachable = 0;
        let mut valued = 0;
        let mut stack = vec![self.root];

        while let Some(id) = stack.pop() {
            let node = self.arena.node(id);
            reachable += 1;
            if node.has_value() {
                valued += 1;
            }
            stack.extend(node.left);
            stack.extend(node.right);
        }

        (reachable, valued)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::CountingAllocator;

    const MASK_8: u32 = 0xFF00_0000;
    const MASK_16: u32 = 0xFFFF_0000;
    const MASK_24: u32 = 0xFFFF_FF00;
    const MASK_32: u32 = 0xFFFF_FFFF;

    fn v4(a: u8, b: u8, c: u8, d: u8) -> u32 {
        u32::from_be_bytes([a, b, c, d])
    }

    fn empty_tree() -> RadixTree<u32, CountingAllocator> {
        RadixTree::create(CountingAllocator::new(), Preallocate::Disabled).unwrap()
    }

    #[test]
    fn test_insert_find_roundtrip() {
        let mut tree = empty_tree();
        tree.insert(v4(10, 0, 0, 0), MASK_8, 1).unwrap();

        assert_eq!(tree.find(v4(10, 1, 2, 3)), Some(1));
        assert_eq!(tree.find(v4(11, 0, 0, 0)), None);
    }

    #[test]
    fn test_more_specific_wins() {
        let mut tree = empty_tree();
        tree.insert(v4(10, 0, 0, 0), MASK_8, 1).unwrap();
        tree.insert(v4(10, 10, 0, 0), MASK_16, 2).unwrap();

        assert_eq!(tree.find(v4(10, 10, 5, 5)), Some(2));
        assert_eq!(tree.find(v4(10, 5, 5, 5)), Some(1));
    }

    #[test]
    fn test_insert_order_does_not_matter() {
        let mut tree = empty_tree();
        tree.insert(v4(192, 0, 2, 1), MASK_32, 32).unwrap();
        tree.insert(v4(192, 0, 2, 0), MASK_24, 24).unwrap();

        assert_eq!(tree.find(v4(192, 0, 2, 1)), Some(32));
        assert_eq!(tree.find(v4(192, 0, 2, 2)), Some(24));
    }

    #[test]
    fn test_duplicate_is_busy() {
        let mut tree = empty_tree();
        tree.insert(v4(10, 0, 0, 0), MASK_8, 1).unwrap();
        assert_eq!(tree.insert(v4(10, 0, 0, 0), MASK_8, 2), Err(RadixError::Busy));
        // Host bits beyond the mask do not make a different prefix
        assert_eq!(tree.insert(v4(10, 9, 9, 9), MASK_8, 3), Err(RadixError::Busy));
        assert_eq!(tree.find(v4(10, 0, 0, 1)), Some(1));
    }

    #[test]
    fn test_zero_mask_is_default_route() {
        let mut tree = empty_tree();
        tree.insert(0, 0, 99).unwrap();
        tree.insert(v4(10, 0, 0, 0), MASK_8, 1).unwrap();

        assert_eq!(tree.find(v4(8, 8, 8, 8)), Some(99));
        assert_eq!(tree.find(v4(10, 0, 0, 1)), Some(1));

        tree.delete(0, 0).unwrap();
        assert_eq!(tree.find(v4(8, 8, 8, 8)), None);
        assert_eq!(tree.delete(0, 0), Err(RadixError::NotFound));
    }

    #[test]
    fn test_delete_falls_back_to_shorter_prefix() {
        let mut tree = empty_tree();
        tree.insert(v4(10, 0, 0, 0), MASK_8, 1).unwrap();
        tree.insert(v4(10, 10, 0, 0), MASK_16, 2).unwrap();

        tree.delete(v4(10, 10, 0, 0), MASK_16).unwrap();
        assert_eq!(tree.find(v4(10, 10, 5, 5)), Some(1));

        tree.delete(v4(10, 0, 0, 0), MASK_8).unwrap();
        assert_eq!(tree.find(v4(10, 10, 5, 5)), None);
    }

    #[test]
    fn test_delete_interior_keeps_children() {
        let mut tree = empty_tree();
        tree.insert(v4(10, 0, 0, 0), MASK_8, 1).unwrap();
        tree.insert(v4(10, 10, 0, 0), MASK_16, 2).unwrap();
        let nodes = tree.node_count();

        tree.delete(v4(10, 0, 0, 0), MASK_8).unwrap();
        assert_eq!(tree.node_count(), nodes);
        assert_eq!(tree.find(v4(10, 10, 1, 1)), Some(2));
        assert_eq!(tree.find(v4(10, 1, 1, 1)), None);

        // Interior node without a value
        assert_eq!(tree.delete(v4(10, 0, 0, 0), MASK_8), Err(RadixError::NotFound));
    }

    #[test]
    fn test_delete_missing() {
        let mut tree = empty_tree();
        assert_eq!(tree.delete(v4(10, 0, 0, 0), MASK_8), Err(RadixError::NotFound));

        tree.insert(v4(10, 10, 0, 0), MASK_16, 2).unwrap();
        // Valueless leaf-less path node
        assert_eq!(tree.delete(v4(10, 0, 0, 0), MASK_8), Err(RadixError::NotFound));
        // Longer than anything stored
        assert_eq!(
            tree.delete(v4(10, 10, 1, 0), MASK_24),
            Err(RadixError::NotFound)
        );
    }

    #[test]
    fn test_pruning_returns_to_baseline() {
        let mut tree = empty_tree();
        let baseline = tree.node_count();
        assert_eq!(baseline, 1);

        tree.insert(v4(10, 0, 0, 0), MASK_8, 1).unwrap();
        let with_eight = tree.node_count();
        assert_eq!(with_eight, 9);

        tree.insert(v4(10, 20, 30, 40), MASK_32, 2).unwrap();
        assert_eq!(tree.node_count(), with_eight + 24);

        tree.delete(v4(10, 20, 30, 40), MASK_32).unwrap();
        assert_eq!(tree.node_count(), with_eight);

        tree.delete(v4(10, 0, 0, 0), MASK_8).unwrap();
        assert_eq!(tree.node_count(), baseline);
        assert_eq!(tree.stats().live_nodes, baseline);
    }

    #[test]
    fn test_pruning_stops_at_branch() {
        let mut tree = empty_tree();
        tree.insert(v4(10, 0, 0, 0), MASK_16, 1).unwrap();
        tree.insert(v4(10, 128, 0, 0), MASK_16, 2).unwrap();
        let both = tree.node_count();

        // The two /16s share the first 8 bits, then split at bit 8
        tree.delete(v4(10, 128, 0, 0), MASK_16).unwrap();
        assert_eq!(tree.node_count(), both - 8);
        assert_eq!(tree.find(v4(10, 0, 1, 1)), Some(1));
    }

    #[test]
    fn test_free_list_reuse_avoids_allocator() {
        let mut tree = empty_tree();
        tree.insert(v4(172, 16, 0, 0), MASK_16, 1).unwrap();
        let calls = tree.allocator().calls();

        tree.delete(v4(172, 16, 0, 0), MASK_16).unwrap();
        assert_eq!(tree.stats().free_nodes, 16);

        tree.insert(v4(192, 168, 0, 0), MASK_16, 2).unwrap();
        assert_eq!(tree.allocator().calls(), calls);
        assert_eq!(tree.stats().free_nodes, 0);
        assert_eq!(tree.find(v4(192, 168, 3, 3)), Some(2));
    }

    #[test]
    fn test_out_of_memory_leaves_usable_tree() {
        let config = TreeConfig {
            preallocate: Preallocate::Disabled,
            page_size: Some(256),
        };
        let mut tree: RadixTree<u32, _> =
            RadixTree::with_config(CountingAllocator::with_limit(1), &config).unwrap();
        let per_slab = 256 / crate::arena::SLOT_SIZE;

        // Root already took one slot of the only slab we may get
        assert_eq!(
            tree.insert(v4(10, 0, 0, 0), MASK_32, 1),
            Err(RadixError::OutOfMemory)
        );
        assert_eq!(tree.node_count(), per_slab);
        assert_eq!(tree.find(v4(10, 0, 0, 0)), None);

        tree.allocator_mut().set_limit(None);
        tree.insert(v4(10, 0, 0, 0), MASK_32, 1).unwrap();
        assert_eq!(tree.find(v4(10, 0, 0, 0)), Some(1));
    }

    #[test]
    fn test_preallocation_node_count() {
        let tree: RadixTree<u32, _> =
            RadixTree::create(CountingAllocator::new(), Preallocate::Levels(4)).unwrap();
        // root + 2 + 4 + 8 + 16
        assert_eq!(tree.node_count(), 31);
        assert_eq!(tree.stats().valued_nodes, 0);
        assert_eq!(tree.find(v4(1, 2, 3, 4)), None);
    }

    #[test]
    fn test_preallocated_nodes_are_not_matches() {
        let mut tree: RadixTree<u32, _> =
            RadixTree::create(CountingAllocator::new(), Preallocate::Levels(3)).unwrap();
        tree.insert(v4(10, 0, 0, 0), MASK_8, 5).unwrap();
        assert_eq!(tree.find(v4(10, 1, 1, 1)), Some(5));
        assert_eq!(tree.find(v4(200, 1, 1, 1)), None);

        // Warm-up prefixes can be claimed like any other
        tree.insert(0x8000_0000, 0x8000_0000, 7).unwrap();
        assert_eq!(tree.find(v4(200, 1, 1, 1)), Some(7));
    }

    #[test]
    fn test_auto_preallocation_fits_one_slab() {
        let tree: RadixTree<u32, _> =
            RadixTree::create(CountingAllocator::new(), Preallocate::Auto).unwrap();
        let stats = tree.stats();
        let per_slab = stats.page_size / crate::arena::SLOT_SIZE;
        let levels = Preallocate::Auto.levels(per_slab);
        assert_eq!(stats.reachable_nodes, (1 << (levels + 1)) - 1);
    }

    #[test]
    fn test_non_contiguous_mask_stops_at_hole() {
        let mut tree = empty_tree();
        tree.insert(v4(10, 0, 0, 0), 0xFF00_FF00, 1).unwrap();
        // Only the leading /8 was consumed
        assert_eq!(tree.find(v4(10, 200, 0, 0)), Some(1));
        assert_eq!(tree.insert(v4(10, 0, 0, 0), MASK_8, 2), Err(RadixError::Busy));
    }

    #[test]
    fn test_structure_only_path_is_removable() {
        let mut tree = empty_tree();
        tree.insert(v4(10, 1, 2, 3), MASK_32, NO_VALUE).unwrap();
        assert_eq!(tree.node_count(), 33);
        assert_eq!(tree.find(v4(10, 1, 2, 3)), None);

        tree.delete(v4(10, 1, 2, 3), MASK_32).unwrap();
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.stats().free_nodes, 32);
    }

    #[test]
    fn test_preallocated_leaf_is_removable() {
        let mut tree: RadixTree<u32, _> =
            RadixTree::create(CountingAllocator::new(), Preallocate::Levels(3)).unwrap();
        assert_eq!(tree.node_count(), 15);

        // 111/3 is a warm-up leaf; its /2 parent keeps the 110/3 sibling
        tree.delete(0xE000_0000, 0xE000_0000).unwrap();
        assert_eq!(tree.node_count(), 14);

        // Warm-up interior nodes still have children
        assert_eq!(
            tree.delete(0x8000_0000, 0x8000_0000),
            Err(RadixError::NotFound)
        );
        assert_eq!(tree.node_count(), 14);
    }
}
