//! Node pool for the buddy free lists
//!
//! Provides a single arena of list nodes shared across all orders. Nodes are
//! addressed by index, so free lists never embed links inside page metadata.

use alloc::vec::Vec;

/// Simple linked list node stored in the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListNode {
    /// First frame of the free block this node stands for.
    pub pfn: usize,
    pub next: Option<usize>,
}

/// Node pool - all orders share nodes from this pool
///
/// Released nodes are chained into a free list and reused before the arena
/// grows.
pub struct NodePool {
    nodes: Vec<ListNode>,
    /// Free list head - first reusable node index
    free_head: Option<usize>,
    /// Current number of free nodes in the pool
    free_nodes: usize,
    /// Allocation statistics
    total_allocations: usize,
    total_deallocations: usize,
}

impl NodePool {
    /// Create an empty pool
    pub const fn new() -> Self {
        Self {
            nodes: Vec::new(),
            free_head: None,
            free_nodes: 0,
            total_allocations: 0,
            total_deallocations: 0,
        }
    }

    /// Create a pool with room for `capacity` nodes before growing
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            ..Self::new()
        }
    }

    /// Allocate a node holding `pfn`
    ///
    /// Returns the index of the allocated node.
    pub fn alloc_node(&mut self, pfn: usize, next: Option<usize>) -> usize {
        self.total_allocations += 1;

        match self.free_head {
            Some(idx) => {
                let node = &mut self.nodes[idx];
                self.free_head = node.next;
                *node = ListNode { pfn, next };
                self.free_nodes -= 1;
                idx
            }
            None => {
                self.nodes.push(ListNode { pfn, next });
                self.nodes.len() - 1
            }
        }
    }

    /// Deallocate a node back to the pool
    ///
    /// The node should not be part of any active list when freed
    pub fn dealloc_node(&mut self, node_idx: usize) {
        self.nodes[node_idx] = ListNode {
            pfn: 0,
            next: self.free_head,
        };
        self.free_head = Some(node_idx);
        self.total_deallocations += 1;
        self.free_nodes += 1;
    }

    /// Get a reference to a node by index
    pub fn get_node(&self, node_idx: usize) -> Option<&ListNode> {
        self.nodes.get(node_idx)
    }

    /// Get a mutable reference to a node by index
    pub fn get_node_mut(&mut self, node_idx: usize) -> Option<&mut ListNode> {
        self.nodes.get_mut(node_idx)
    }

    /// Get the number of free nodes in the pool
    pub fn free_node_count(&self) -> usize {
        self.free_nodes
    }

    /// Get the number of allocated nodes
    pub fn allocated_node_count(&self) -> usize {
        self.nodes.len() - self.free_nodes
    }

    /// Drop every node, live or free
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free_head = None;
        self.free_nodes = 0;
    }

    /// Get pool statistics
    pub fn get_stats(&self) -> NodePoolStats {
        NodePoolStats {
            total_nodes: self.nodes.len(),
            free_nodes: self.free_nodes,
            allocated_nodes: self.allocated_node_count(),
            total_allocations: self.total_allocations,
            total_deallocations: self.total_deallocations,
        }
    }
}

impl Default for NodePool {
    fn default() -> Self {
        Self::new()
    }
}

/// Node pool statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NodePoolStats {
    pub total_nodes: usize,
    pub free_nodes: usize,
    pub allocated_nodes: usize,
    pub total_allocations: usize,
    pub total_deallocations: usize,
}
