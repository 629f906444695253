//! Buddy free-list store and the engines operating on it
//!
//! Implements the core buddy system over page frame numbers: sorted per-order
//! free lists drawn from one node pool, split/merge, allocation with lazy
//! splitting, release with greedy merging, single-page reservation and
//! initialization from an arbitrary page range.
//!
//! Every public operation leaves the store consistent: blocks are aligned to
//! their order, lists are strictly ascending, and no two free blocks overlap.
//! Preconditions are checked before the store is touched, so a returned
//! [`InvariantViolation`] never comes with a half-applied change.

use alloc::vec::Vec;

use crate::{AllocError, AllocResult, InvariantViolation};

#[cfg(feature = "log")]
use log::{error, trace, warn};

use super::{
    free_list::FreeList,
    node_pool::{NodePool, NodePoolStats},
    order::{block_size, buddy_of, is_aligned, BuddyBlock, DEFAULT_MAX_ORDER},
    stats::BuddyStats,
};

/// A buddy set over one contiguous range of page frames
///
/// Uses sorted free lists whose nodes come from a single node pool.
pub struct BuddySet<const MAX_ORDER: usize = DEFAULT_MAX_ORDER> {
    base_pfn: usize,
    end_pfn: usize,
    total_pages: usize,
    /// Free lists for each order
    free_lists: Vec<FreeList>,
    pool: NodePool,
}

impl<const MAX_ORDER: usize> BuddySet<MAX_ORDER> {
    /// Create an empty buddy set (must call init() before allocating)
    pub fn new() -> Self {
        Self {
            base_pfn: 0,
            end_pfn: 0,
            total_pages: 0,
            free_lists: (0..=MAX_ORDER).map(|_| FreeList::new()).collect(),
            pool: NodePool::new(),
        }
    }

    /// Insert the block at `pfn` into the free list of `order`
    ///
    /// Returns the pool slot of the new entry. The caller guarantees that the
    /// block overlaps nothing already free.
    ///
    /// # Panics
    ///
    /// Panics if `order` exceeds the maximum order.
    pub fn insert(&mut self, pfn: usize, order: usize) -> Result<usize, InvariantViolation> {
        self.free_lists[order]
            .insert_sorted(&mut self.pool, pfn)
            .ok_or(InvariantViolation::CycleDetected { order })
    }

    /// Remove the block at `pfn` from the free list of `order`
    pub fn remove(&mut self, pfn: usize, order: usize) -> Result<(), InvariantViolation> {
        let removed = match self.free_lists.get_mut(order) {
            Some(list) => list.remove(&mut self.pool, pfn),
            None => false,
        };
        if !removed {
            error!("Block {:#x} is not in the order-{} free list", pfn, order);
            return Err(InvariantViolation::MissingBlock { pfn, order });
        }
        Ok(())
    }

    /// Frame number of the block stored in `slot`
    pub fn slot_pfn(&self, slot: usize) -> Option<usize> {
        self.pool.get_node(slot).map(|node| node.pfn)
    }

    /// Split the free block at `pfn` into two buddies one order below
    ///
    /// Returns the left half, which starts at `pfn`.
    pub fn split(&mut self, pfn: usize, order: usize) -> Result<usize, InvariantViolation> {
        if order == 0 {
            error!("Cannot split order-0 block {:#x}", pfn);
            return Err(InvariantViolation::SplitOrderZero { pfn });
        }
        if order > MAX_ORDER || !is_aligned(pfn, order) {
            error!("Block {:#x} is not aligned for order {}", pfn, order);
            return Err(InvariantViolation::Misaligned { pfn, order });
        }

        let lower = order - 1;
        let left = pfn;
        let right = pfn + block_size(lower);
        if buddy_of(right, lower, MAX_ORDER) != Some(left) {
            error!(
                "Split halves {:#x} and {:#x} are not buddies at order {}",
                left, right, lower
            );
            return Err(InvariantViolation::NotBuddies {
                left,
                right,
                order: lower,
            });
        }

        self.remove(pfn, order)?;
        self.insert(left, lower)?;
        self.insert(right, lower)?;

        trace!("split {:#x}: order {} -> 2 x order {}", pfn, order, lower);
        Ok(left)
    }

    /// Merge the free block at `pfn` with its free buddy one order up
    ///
    /// Whichever of the pair is aligned for `order + 1` becomes the start of
    /// the merged block. Returns the pool slot of the merged block.
    pub fn merge(&mut self, pfn: usize, order: usize) -> Result<usize, InvariantViolation> {
        if order >= MAX_ORDER {
            error!("Cannot merge block {:#x} above order {}", pfn, MAX_ORDER);
            return Err(InvariantViolation::MergeAtMaxOrder { pfn });
        }
        let buddy = match buddy_of(pfn, order, MAX_ORDER) {
            Some(buddy) => buddy,
            None => {
                error!("Block {:#x} is not aligned for order {}", pfn, order);
                return Err(InvariantViolation::Misaligned { pfn, order });
            }
        };

        // Both halves must be free before either is unlinked
        for block in [pfn, buddy] {
            if !self.free_lists[order].contains(&self.pool, block) {
                error!("Block {:#x} is not in the order-{} free list", block, order);
                return Err(InvariantViolation::MissingBlock { pfn: block, order });
            }
        }

        self.remove(pfn, order)?;
        self.remove(buddy, order)?;

        let upper = order + 1;
        let merged = if is_aligned(pfn, upper) { pfn } else { buddy };

        trace!("merge {:#x} + {:#x}: order {} -> {}", pfn, buddy, order, upper);
        self.insert(merged, upper)
    }

    /// Initialize the buddy set with `count` frames starting at `first_pfn`
    ///
    /// Any previous content of the free lists is discarded. The range is carved
    /// greedily into the largest blocks that are both aligned and fit, so a
    /// range starting at a multiple of `2^MAX_ORDER` yields as many top-order
    /// blocks as fit followed by strictly decreasing orders.
    ///
    /// Returns `true` if every frame was placed.
    pub fn init(&mut self, first_pfn: usize, count: usize) -> bool {
        // Reset free lists
        for list in &mut self.free_lists {
            list.clear(&mut self.pool);
        }
        self.pool.clear();

        let end = match first_pfn.checked_add(count) {
            Some(end) => end,
            None => {
                error!(
                    "Frame range {:#x} + {:#x} overflows the frame space",
                    first_pfn, count
                );
                self.base_pfn = 0;
                self.end_pfn = 0;
                self.total_pages = 0;
                return false;
            }
        };

        self.base_pfn = first_pfn;
        self.end_pfn = end;
        self.total_pages = count;

        let mut pfn = first_pfn;
        let mut pages_added = 0;
        while pfn < end {
            let remaining = end - pfn;
            let order = (0..=MAX_ORDER)
                .rev()
                .find(|&order| is_aligned(pfn, order) && block_size(order) <= remaining);

            match order {
                Some(order) => {
                    if self.insert(pfn, order).is_err() {
                        break;
                    }
                    pfn += block_size(order);
                    pages_added += block_size(order);
                }
                None => break,
            }
        }

        pages_added == count
    }

    /// Allocate a block of exactly `order`, splitting larger blocks on demand
    pub fn alloc(&mut self, order: usize) -> AllocResult<usize> {
        if order > MAX_ORDER {
            error!("required order: {}, max order: {}", order, MAX_ORDER);
            return Err(AllocError::InvalidParam);
        }

        // Climb until some order has a block to offer
        let mut current = order;
        while self.free_lists[current].is_empty() {
            current += 1;
            if current > MAX_ORDER {
                return Err(AllocError::NoMemory);
            }
        }

        let mut block = self.free_lists[current]
            .first(&self.pool)
            .ok_or(InvariantViolation::CountMismatch {
                order: current,
                recorded: self.free_lists[current].len(),
                linked: 0,
            })?;

        // Split down to required order, always keeping the left half
        while current > order {
            block = self.split(block, current)?;
            current -= 1;
        }

        self.remove(block, order)?;
        Ok(block)
    }

    /// Return a block to the free lists, merging with free buddies greedily
    pub fn dealloc(&mut self, pfn: usize, order: usize) -> AllocResult {
        if order > MAX_ORDER {
            error!("Order {} exceeds maximum order {}", order, MAX_ORDER);
            return Err(AllocError::InvalidParam);
        }

        // Check alignment using PFN
        if !is_aligned(pfn, order) {
            error!(
                "Frame {:#x} is not properly aligned for order {} (needs alignment to {} pages)",
                pfn,
                order,
                block_size(order)
            );
            return Err(InvariantViolation::Misaligned { pfn, order }.into());
        }

        let in_range = match pfn.checked_add(block_size(order)) {
            Some(end) => pfn >= self.base_pfn && end <= self.end_pfn,
            None => false,
        };
        if !in_range {
            error!(
                "Block {:#x} (order {}) is outside the managed range [{:#x}, {:#x})",
                pfn, order, self.base_pfn, self.end_pfn
            );
            return Err(AllocError::InvalidParam);
        }

        let block = BuddyBlock::new(order, pfn);

        // Double-free detection: nothing inside the block may already be free
        if let Some(free) = self.find_overlapping_block(&block) {
            warn!(
                "Double free detected at {:#x} (order {}): overlaps free block {:#x} (order {})",
                pfn, order, free.pfn, free.order
            );
            return Err(InvariantViolation::DoubleFree {
                pfn,
                order,
                free_pfn: free.pfn,
                free_order: free.order,
            }
            .into());
        }

        let mut slot = self.insert(pfn, order)?;
        let mut current = order;

        while current < MAX_ORDER {
            let current_pfn = self
                .slot_pfn(slot)
                .ok_or(InvariantViolation::MissingBlock {
                    pfn,
                    order: current,
                })?;
            let buddy = match buddy_of(current_pfn, current, MAX_ORDER) {
                Some(buddy) => buddy,
                None => break,
            };
            if !self.free_lists[current].contains(&self.pool, buddy) {
                break;
            }
            slot = self.merge(current_pfn, current)?;
            current += 1;
        }

        Ok(())
    }

    /// Take the single frame `pfn` out of circulation
    ///
    /// Returns `Ok(false)` if the frame is not inside any free block.
    pub fn reserve(&mut self, pfn: usize) -> AllocResult<bool> {
        let mut block = match self.find_free_block(pfn) {
            Some(block) => block,
            None => {
                warn!("Frame {:#x} is not free and cannot be reserved", pfn);
                return Ok(false);
            }
        };

        // Halve the block, following the half that holds the frame
        while block.order > 0 {
            let left = self.split(block.pfn, block.order)?;
            let lower = block.order - 1;
            let left_block = BuddyBlock::new(lower, left);

            block = if left_block.contains(pfn) {
                left_block
            } else {
                let right = buddy_of(left, lower, MAX_ORDER)
                    .ok_or(InvariantViolation::Misaligned {
                        pfn: left,
                        order: lower,
                    })?;
                BuddyBlock::new(lower, right)
            };
        }

        self.remove(block.pfn, 0)?;
        Ok(true)
    }

    /// Find the free block containing frame `pfn`, searching from the top order down
    pub fn find_free_block(&self, pfn: usize) -> Option<BuddyBlock> {
        (0..=MAX_ORDER).rev().find_map(|order| {
            self.free_lists[order]
                .find_containing(&self.pool, pfn, order)
                .map(|start| BuddyBlock::new(order, start))
        })
    }

    /// Find any free block sharing a frame with `block`
    pub fn find_overlapping_block(&self, block: &BuddyBlock) -> Option<BuddyBlock> {
        (0..=MAX_ORDER).find_map(|order| {
            self.free_lists[order]
                .find_overlapping(&self.pool, block.pfn, block.end(), order)
                .map(|start| BuddyBlock::new(order, start))
        })
    }

    /// Whether frame `pfn` lies inside a free block
    pub fn is_free(&self, pfn: usize) -> bool {
        self.find_free_block(pfn).is_some()
    }

    /// Get free blocks of a specific order as an iterator over frame numbers
    pub fn free_blocks(&self, order: usize) -> impl Iterator<Item = usize> + '_ {
        self.free_lists
            .get(order)
            .into_iter()
            .flat_map(move |list| list.iter(&self.pool))
    }

    /// Get the number of blocks in a specific order
    pub fn block_count(&self, order: usize) -> usize {
        self.free_lists.get(order).map_or(0, FreeList::len)
    }

    /// Number of free frames across all orders
    pub fn free_pages(&self) -> usize {
        self.free_lists
            .iter()
            .enumerate()
            .map(|(order, list)| list.len() * block_size(order))
            .sum()
    }

    /// Number of frames handed to init()
    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    /// Get statistics for this set
    pub fn get_stats(&self) -> BuddyStats {
        let mut stats = BuddyStats::new(MAX_ORDER);
        stats.total_pages = self.total_pages;

        for (order, list) in self.free_lists.iter().enumerate() {
            stats.free_blocks_by_order[order] = list.len();
            stats.free_pages += list.len() * block_size(order);
        }

        stats.used_pages = stats.total_pages.saturating_sub(stats.free_pages);
        stats
    }

    /// Get node pool statistics
    pub fn node_pool_stats(&self) -> NodePoolStats {
        self.pool.get_stats()
    }

    /// Walk every free list and report the first broken invariant
    pub fn verify(&self) -> Result<(), InvariantViolation> {
        let mut blocks = Vec::new();

        for (order, list) in self.free_lists.iter().enumerate() {
            let mut prev = None;
            let mut linked = 0;

            for pfn in list.iter(&self.pool) {
                linked += 1;
                if linked > list.len() {
                    return Err(InvariantViolation::CycleDetected { order });
                }
                if !is_aligned(pfn, order) {
                    return Err(InvariantViolation::Misaligned { pfn, order });
                }
                if prev.is_some_and(|prev| pfn <= prev) {
                    return Err(InvariantViolation::Unsorted { order, pfn });
                }
                prev = Some(pfn);
                blocks.push(BuddyBlock::new(order, pfn));
            }

            if linked != list.len() {
                return Err(InvariantViolation::CountMismatch {
                    order,
                    recorded: list.len(),
                    linked,
                });
            }
        }

        blocks.sort_unstable_by_key(|block| block.pfn);
        for pair in blocks.windows(2) {
            if pair[0].overlaps(&pair[1]) {
                return Err(InvariantViolation::Overlap {
                    pfn: pair[0].pfn,
                    other: pair[1].pfn,
                });
            }
        }

        Ok(())
    }
}

impl<const MAX_ORDER: usize> Default for BuddySet<MAX_ORDER> {
    fn default() -> Self {
        Self::new()
    }
}
