//! cidrtree - Longest-Prefix-Match Radix Tree for IP Prefixes
//!
//! cidrtree stores IPv4 and IPv6 prefixes with word-sized values and answers
//! "which stored prefix is the most specific one containing this address?".
//! It is the building block for routing tables, ACL and ban lists, and
//! CIDR-keyed tagging.
//!
//! # Quick Start
//!
//! ```rust
//! use cidrtree::RadixTree;
//!
//! let mut tree = RadixTree::<u32>::new()?;
//!
//! // 10.0.0.0/8 -> 1, 10.10.0.0/16 -> 2
//! tree.insert(0x0A00_0000, 0xFF00_0000, 1)?;
//! tree.insert(0x0A0A_0000, 0xFFFF_0000, 2)?;
//!
//! assert_eq!(tree.find(0x0A0A_0505), Some(2)); // 10.10.5.5
//! assert_eq!(tree.find(0x0A05_0505), Some(1)); // 10.5.5.5
//! assert_eq!(tree.find(0x0B00_0000), None);    // 11.0.0.0
//!
//! // Duplicates are rejected, not overwritten
//! assert!(tree.insert(0x0A00_0000, 0xFF00_0000, 3).is_err());
//!
//! tree.delete(0x0A0A_0000, 0xFFFF_0000)?;
//! assert_eq!(tree.find(0x0A0A_0505), Some(1));
//! # Ok::<(), cidrtree::RadixError>(())
//! ```
//!
//! For address-typed access with CIDR strings see [`IpTable`].
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │  IpTable / C API / CLI               │  parse CIDRs, pick key width
//! ├──────────────────────────────────────┤
//! │  RadixTree<K>  (K = u32 | [u8; 16])  │  insert / delete / find
//! ├──────────────────────────────────────┤
//! │  NodeArena: page slabs + free-list   │  fixed-size nodes
//! ├──────────────────────────────────────┤
//! │  Allocator (injected at creation)    │  slab memory
//! └──────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Module declarations
/// Allocation capability for node slabs
pub mod allocator;
/// Slab arena holding trie nodes
pub mod arena;
/// Tree configuration
pub mod config;
/// Error types for radix tree operations
pub mod error;
/// Prefix-list reading with gzip support
pub mod file_reader;
/// Fixed-width key abstraction
pub mod key;
/// IPv4/IPv6 prefix table
pub mod table;
/// The radix tree engine
pub mod tree;

// Public C API
pub mod c_api;

// Re-exports for Rust consumers
pub use crate::allocator::{Allocator, CountingAllocator, SystemAllocator};
pub use crate::arena::NO_VALUE;
pub use crate::config::{Preallocate, TreeConfig};
pub use crate::error::{RadixError, Result, Status, RADIX_BUSY, RADIX_ERROR, RADIX_OK};
pub use crate::key::RadixKey;
pub use crate::table::{parse_cidr, IpTable, TableStats};
pub use crate::tree::{Radix128Tree, Radix32Tree, RadixTree, TreeStats};

// Version information
/// Library version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
