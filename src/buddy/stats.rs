//! Statistics and debugging for buddy allocator
//!
//! Provides free-page accounting and allocation failure reporting.

use alloc::vec;
use alloc::vec::Vec;

/// Buddy system statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuddyStats {
    pub total_pages: usize,
    pub free_pages: usize,
    pub used_pages: usize,
    /// Number of free blocks in each order, indexed by order
    pub free_blocks_by_order: Vec<usize>,
}

impl BuddyStats {
    pub fn new(max_order: usize) -> Self {
        Self {
            total_pages: 0,
            free_pages: 0,
            used_pages: 0,
            free_blocks_by_order: vec![0; max_order + 1],
        }
    }

    /// Highest order with at least one free block
    pub fn largest_free_order(&self) -> Option<usize> {
        self.free_blocks_by_order.iter().rposition(|&count| count > 0)
    }
}

/// Detailed memory statistics reporter
pub struct MemoryStatsReporter;

impl MemoryStatsReporter {
    /// Print detailed allocation failure statistics
    /// This is a standalone function to keep allocation logic clean
    #[cfg(feature = "tracking")]
    #[allow(unused_variables)]
    pub fn print_alloc_failure_stats(stats: &BuddyStats, request_order: usize) {
        #[cfg(feature = "log")]
        use log::error;

        use super::order::block_size;

        let request_pages = block_size(request_order);
        error!("========================================");
        error!("Request: order {} ({} pages)", request_order, request_pages);
        error!("  Total pages: {}", stats.total_pages);
        error!("  Free pages: {}", stats.free_pages);
        error!("  Used pages: {}", stats.used_pages);
        error!("  Free blocks by order:");

        for (order, &count) in stats.free_blocks_by_order.iter().enumerate().rev() {
            if count > 0 {
                let pages = block_size(order);
                error!(
                    "    Order {}: {} blocks ({} pages each, {} pages total)",
                    order,
                    count,
                    pages,
                    count * pages
                );
            }
        }

        error!("========================================");
    }

    #[cfg(not(feature = "tracking"))]
    pub fn print_alloc_failure_stats(_stats: &BuddyStats, _request_order: usize) {
        // No-op when tracking is disabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_stats_are_empty() {
        let stats = BuddyStats::new(3);
        assert_eq!(stats.free_blocks_by_order, vec![0, 0, 0, 0]);
        assert_eq!(stats.largest_free_order(), None);
    }

    #[test]
    fn test_largest_free_order() {
        let mut stats = BuddyStats::new(5);
        stats.free_blocks_by_order[1] = 2;
        stats.free_blocks_by_order[3] = 1;
        assert_eq!(stats.largest_free_order(), Some(3));
    }
}
