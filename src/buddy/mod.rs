//! Buddy page allocator module
//!
//! This module provides a complete buddy system implementation with:
//! - Order arithmetic and buddy computation
//! - Sorted free lists backed by an index-based node pool
//! - Split/merge, allocation, release and reservation engines
//! - Statistics and invariant verification

pub mod buddy_allocator;
pub mod buddy_set;
pub mod free_list;
pub mod node_pool;
pub mod order;
pub mod stats;

pub use buddy_allocator::BuddyPageAllocator;
pub use buddy_set::BuddySet;
pub use free_list::{FreeList, FreeListIter};
pub use node_pool::{ListNode, NodePool, NodePoolStats};
pub use order::{block_size, buddy_of, is_aligned, BuddyBlock, DEFAULT_MAX_ORDER};
pub use stats::{BuddyStats, MemoryStatsReporter};
