//! Sorted free list of buddy blocks
//!
//! Provides singly linked lists that draw nodes from a shared [`NodePool`].
//! Each list holds the first frame of every free block of one order, in
//! ascending order.

#[cfg(feature = "log")]
use log::{error, warn};

use super::{node_pool::NodePool, order::block_size};

/// Free list - uses nodes from the node pool
///
/// This maintains only the list structure (head/len), while all nodes are
/// allocated from the pool.
pub struct FreeList {
    head: Option<usize>,
    len: usize,
}

impl FreeList {
    /// Create a new empty free list
    pub const fn new() -> Self {
        Self { head: None, len: 0 }
    }

    /// Insert a frame in sorted order (ascending by frame number)
    ///
    /// Returns the index of the node holding `pfn`. Inserting a frame that is
    /// already present leaves the list untouched and returns its node. Returns
    /// `None` if the list is corrupted (cycle or dangling node).
    pub fn insert_sorted(&mut self, pool: &mut NodePool, pfn: usize) -> Option<usize> {
        // Find insertion position
        let mut prev_idx = None;
        let mut current_idx = self.head;
        let mut visited = 0;

        while let Some(idx) = current_idx {
            if visited > self.len {
                error!("Potential cycle detected during insert");
                return None;
            }

            let node = match pool.get_node(idx) {
                Some(node) => node,
                None => {
                    error!("Invalid node reference {} in free list", idx);
                    return None;
                }
            };
            if node.pfn == pfn {
                warn!("Frame {:#x} is already in the free list", pfn);
                return Some(idx);
            }
            if node.pfn > pfn {
                break; // Found position
            }
            prev_idx = current_idx;
            current_idx = node.next;
            visited += 1;
        }

        let new_idx = pool.alloc_node(pfn, current_idx);

        // Update links
        match prev_idx.and_then(|prev| pool.get_node_mut(prev)) {
            Some(prev_node) => prev_node.next = Some(new_idx),
            None => self.head = Some(new_idx),
        }

        self.len += 1;
        Some(new_idx)
    }

    /// Find a node by frame number
    ///
    /// Returns (node_idx, prev_idx) where prev_idx is the node before it (or None if head)
    pub fn find_by_pfn(&self, pool: &NodePool, pfn: usize) -> Option<(usize, Option<usize>)> {
        let mut prev_idx = None;
        let mut current_idx = self.head;
        let mut visited = 0;

        while let Some(idx) = current_idx {
            if visited > self.len {
                error!("Potential cycle detected during search");
                return None;
            }

            let node = pool.get_node(idx)?;
            // Early termination: list is sorted by frame number
            if node.pfn > pfn {
                break;
            }
            if node.pfn == pfn {
                return Some((idx, prev_idx));
            }
            prev_idx = current_idx;
            current_idx = node.next;
            visited += 1;
        }

        None
    }

    /// Whether `pfn` starts a block in this list
    pub fn contains(&self, pool: &NodePool, pfn: usize) -> bool {
        self.find_by_pfn(pool, pfn).is_some()
    }

    /// Find the block of `order` in this list that contains frame `pfn`
    pub fn find_containing(&self, pool: &NodePool, pfn: usize, order: usize) -> Option<usize> {
        self.find_overlapping(pool, pfn, pfn.saturating_add(1), order)
    }

    /// Find the first block of `order` in this list that overlaps the frame range [start, end)
    pub fn find_overlapping(
        &self,
        pool: &NodePool,
        start: usize,
        end: usize,
        order: usize,
    ) -> Option<usize> {
        self.iter(pool)
            .take(self.len)
            .take_while(|&block| block < end)
            .find(|&block| block + block_size(order) > start)
    }

    /// Remove the block starting at `pfn`
    ///
    /// Returns `false` if the block is not in the list.
    pub fn remove(&mut self, pool: &mut NodePool, pfn: usize) -> bool {
        match self.find_by_pfn(pool, pfn) {
            Some((node_idx, prev_idx)) => {
                self.remove_with_prev(pool, node_idx, prev_idx);
                true
            }
            None => false,
        }
    }

    /// Remove a node using known prev_idx (O(1) operation)
    ///
    /// This is used when we already know the previous node index from
    /// find_by_pfn(), avoiding a second traversal of the list.
    pub fn remove_with_prev(
        &mut self,
        pool: &mut NodePool,
        node_idx: usize,
        prev_idx: Option<usize>,
    ) {
        let next_idx = pool.get_node(node_idx).and_then(|n| n.next);

        match prev_idx.and_then(|prev| pool.get_node_mut(prev)) {
            Some(prev_node) => prev_node.next = next_idx,
            None => self.head = next_idx,
        }

        pool.dealloc_node(node_idx);
        self.len -= 1;
    }

    /// Pop the lowest block from the list
    pub fn pop_front(&mut self, pool: &mut NodePool) -> Option<usize> {
        let head_idx = self.head?;
        let pfn = pool.get_node(head_idx)?.pfn;
        self.remove_with_prev(pool, head_idx, None);
        Some(pfn)
    }

    /// The lowest block in the list
    pub fn first(&self, pool: &NodePool) -> Option<usize> {
        self.head
            .and_then(|idx| pool.get_node(idx))
            .map(|node| node.pfn)
    }

    /// Check if the list is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Get the length of the list
    pub fn len(&self) -> usize {
        self.len
    }

    /// Get iterator over the frame numbers in the list
    pub fn iter<'a>(&self, pool: &'a NodePool) -> FreeListIter<'a> {
        FreeListIter {
            pool,
            current: self.head,
        }
    }

    /// Clear all nodes from the list
    ///
    /// Returns all nodes to the pool
    pub fn clear(&mut self, pool: &mut NodePool) {
        while self.pop_front(pool).is_some() {}
        self.head = None;
        self.len = 0;
    }
}

impl Default for FreeList {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over the frame numbers of a [`FreeList`]
pub struct FreeListIter<'a> {
    pool: &'a NodePool,
    current: Option<usize>,
}

impl Iterator for FreeListIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.pool.get_node(self.current?);
        self.current = node.and_then(|n| n.next);
        node.map(|n| n.pfn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    fn list_of(pool: &mut NodePool, pfns: &[usize]) -> FreeList {
        let mut list = FreeList::new();
        for &pfn in pfns {
            list.insert_sorted(pool, pfn);
        }
        list
    }

    #[test]
    fn test_free_list_basic() {
        let mut pool = NodePool::new();
        let mut list = FreeList::new();

        assert!(list.is_empty());
        assert_eq!(list.len(), 0);

        list.insert_sorted(&mut pool, 1);
        list.insert_sorted(&mut pool, 2);
        list.insert_sorted(&mut pool, 3);

        assert_eq!(list.len(), 3);
        assert_eq!(pool.allocated_node_count(), 3);

        assert_eq!(list.pop_front(&mut pool), Some(1));
        assert_eq!(list.pop_front(&mut pool), Some(2));
        assert_eq!(list.len(), 1);
        assert_eq!(pool.allocated_node_count(), 1);

        // Clear remaining
        list.clear(&mut pool);
        assert!(list.is_empty());
        assert_eq!(pool.allocated_node_count(), 0);
    }

    #[test]
    fn test_insert_sorted() {
        let mut pool = NodePool::new();
        let list = list_of(&mut pool, &[5, 3, 7, 1]);

        let items: Vec<_> = list.iter(&pool).collect();
        assert_eq!(items, [1, 3, 5, 7]);
        assert_eq!(list.first(&pool), Some(1));
    }

    #[test]
    fn test_insert_returns_slot() {
        let mut pool = NodePool::new();
        let mut list = list_of(&mut pool, &[4, 12]);

        let slot = list.insert_sorted(&mut pool, 8).unwrap();
        assert_eq!(pool.get_node(slot).unwrap().pfn, 8);

        // Duplicate inserts hand back the existing node
        assert_eq!(list.insert_sorted(&mut pool, 8), Some(slot));
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn test_find_and_remove() {
        let mut pool = NodePool::new();
        let mut list = list_of(&mut pool, &[1, 2, 3]);

        let (_, prev) = list.find_by_pfn(&pool, 2).unwrap();
        assert!(prev.is_some());
        assert!(list.remove(&mut pool, 2));
        assert!(!list.remove(&mut pool, 2));

        assert_eq!(list.len(), 2);
        let items: Vec<_> = list.iter(&pool).collect();
        assert_eq!(items, [1, 3]);
    }

    #[test]
    fn test_remove_head_and_tail() {
        let mut pool = NodePool::new();
        let mut list = list_of(&mut pool, &[0, 4, 8]);

        assert!(list.remove(&mut pool, 0));
        assert!(list.remove(&mut pool, 8));
        assert_eq!(list.first(&pool), Some(4));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_find_containing() {
        let mut pool = NodePool::new();
        let list = list_of(&mut pool, &[0, 8, 24]);

        assert_eq!(list.find_containing(&pool, 3, 2), Some(0));
        assert_eq!(list.find_containing(&pool, 4, 2), None);
        assert_eq!(list.find_containing(&pool, 11, 2), Some(8));
        assert_eq!(list.find_containing(&pool, 27, 2), Some(24));
        assert_eq!(list.find_containing(&pool, 28, 2), None);
    }

    #[test]
    fn test_find_overlapping() {
        let mut pool = NodePool::new();
        let list = list_of(&mut pool, &[2, 6]);

        assert_eq!(list.find_overlapping(&pool, 0, 4, 0), Some(2));
        assert_eq!(list.find_overlapping(&pool, 3, 6, 0), None);
        assert_eq!(list.find_overlapping(&pool, 4, 8, 1), Some(6));
    }

    #[test]
    fn test_cycle_guard_on_insert() {
        let mut pool = NodePool::new();
        let mut list = list_of(&mut pool, &[1, 2]);

        // Link the tail back to the head
        let (tail, _) = list.find_by_pfn(&pool, 2).unwrap();
        pool.get_node_mut(tail).unwrap().next = list.head;

        assert_eq!(list.insert_sorted(&mut pool, 5), None);
        assert_eq!(list.find_by_pfn(&pool, 5), None);
        assert_eq!(list.len(), 2);
        assert_eq!(pool.allocated_node_count(), 2);
    }
}
