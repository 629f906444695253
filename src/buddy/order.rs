//! Order arithmetic
//!
//! A block of order `k` spans `2^k` pages and starts at a frame number that
//! is a multiple of `2^k`.

/// Maximum order supported by default (blocks of up to 2^17 pages)
pub const DEFAULT_MAX_ORDER: usize = 17;

/// Number of pages in a block of `order`.
#[inline]
pub const fn block_size(order: usize) -> usize {
    1 << order
}

/// Whether `pfn` may start a block of `order`.
#[inline]
pub const fn is_aligned(pfn: usize, order: usize) -> bool {
    crate::is_aligned(pfn, block_size(order))
}

/// Calculate the first frame of the buddy of the block at `pfn`.
///
/// The buddy is the other half of the parent block at the next higher order:
/// to the right when `pfn` is aligned for `order + 1`, to the left otherwise.
/// Returns `None` for blocks of `max_order` or above, and for misaligned
/// blocks.
#[inline]
pub const fn buddy_of(pfn: usize, order: usize, max_order: usize) -> Option<usize> {
    if order >= max_order || !is_aligned(pfn, order) {
        return None;
    }
    if is_aligned(pfn, order + 1) {
        Some(pfn + block_size(order))
    } else {
        Some(pfn - block_size(order))
    }
}

/// Buddy block metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuddyBlock {
    pub order: usize,
    pub pfn: usize,
}

impl BuddyBlock {
    /// Create a new buddy block
    pub const fn new(order: usize, pfn: usize) -> Self {
        Self { order, pfn }
    }

    /// One past the last frame of the block, clamped to `usize::MAX`.
    pub const fn end(&self) -> usize {
        self.pfn.saturating_add(block_size(self.order))
    }

    /// Whether frame `pfn` lies inside this block.
    pub const fn contains(&self, pfn: usize) -> bool {
        pfn >= self.pfn && pfn < self.end()
    }

    /// Whether this block shares at least one frame with `other`.
    pub const fn overlaps(&self, other: &BuddyBlock) -> bool {
        self.pfn < other.end() && other.pfn < self.end()
    }
}
