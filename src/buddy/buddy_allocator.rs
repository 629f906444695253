//! Buddy page allocator over page descriptors
//!
//! Wraps a [`BuddySet`] with the page descriptor table it was constructed
//! with. Callers hand in and receive descriptors; the free lists only ever see
//! page frame numbers.

use alloc::string::String;
use core::fmt::Write;

use crate::page_table::PageTable;
use crate::{AllocError, AllocResult, InvariantViolation, PageAllocator};

#[cfg(feature = "log")]
use log::debug;

use super::{
    buddy_set::BuddySet,
    node_pool::NodePoolStats,
    order::DEFAULT_MAX_ORDER,
    stats::{BuddyStats, MemoryStatsReporter},
};

/// Buddy page allocator
///
/// Owns its free-list store exclusively; the page table only provides the
/// descriptor <-> frame number mapping. Callers must serialize access: no
/// operation may run while another one is in progress.
pub struct BuddyPageAllocator<T: PageTable, const MAX_ORDER: usize = DEFAULT_MAX_ORDER> {
    page_table: T,
    set: BuddySet<MAX_ORDER>,
    #[cfg(feature = "tracking")]
    stats: BuddyStats,
}

impl<T: PageTable, const MAX_ORDER: usize> BuddyPageAllocator<T, MAX_ORDER> {
    /// Name reported by [`name`](Self::name).
    pub const NAME: &'static str = "buddy";

    /// Create an empty allocator resolving descriptors through `page_table`
    pub fn new(page_table: T) -> Self {
        Self {
            page_table,
            set: BuddySet::new(),
            #[cfg(feature = "tracking")]
            stats: BuddyStats::new(MAX_ORDER),
        }
    }

    /// Populate the free lists with `count` pages starting at `first`
    ///
    /// Returns `true` if every page was placed.
    pub fn init(&mut self, first: T::Descriptor, count: usize) -> bool {
        let first_pfn = self.page_table.pfn_of(first);
        let placed = self.set.init(first_pfn, count);

        debug!(
            "buddy allocator: init [{:#x}, {:#x}) ({} pages), placed: {}",
            first_pfn,
            first_pfn.saturating_add(count),
            count,
            placed
        );

        #[cfg(feature = "tracking")]
        self.update_stats();
        placed
    }

    /// Allocate `2^order` contiguous pages, returning the first one
    pub fn allocate(&mut self, order: usize) -> AllocResult<T::Descriptor> {
        match self.set.alloc(order) {
            Ok(pfn) => {
                #[cfg(feature = "tracking")]
                self.update_stats();
                Ok(self.page_table.descriptor_of(pfn))
            }
            Err(AllocError::NoMemory) => {
                debug!(
                    "buddy allocator: Allocation failure: order {}, {} pages free",
                    order,
                    self.set.free_pages()
                );
                MemoryStatsReporter::print_alloc_failure_stats(&self.set.get_stats(), order);
                Err(AllocError::NoMemory)
            }
            Err(e) => Err(e),
        }
    }

    /// Free `2^order` contiguous pages starting at `first`
    pub fn release(&mut self, first: T::Descriptor, order: usize) -> AllocResult {
        let pfn = self.page_table.pfn_of(first);
        self.set.dealloc(pfn, order)?;

        #[cfg(feature = "tracking")]
        self.update_stats();
        Ok(())
    }

    /// Take `page` out of circulation
    ///
    /// Returns `Ok(false)` if the page is already allocated or reserved.
    pub fn reserve(&mut self, page: T::Descriptor) -> AllocResult<bool> {
        let pfn = self.page_table.pfn_of(page);
        let reserved = self.set.reserve(pfn)?;

        #[cfg(feature = "tracking")]
        self.update_stats();
        Ok(reserved)
    }

    /// Whether `page` currently lies inside a free block
    pub fn is_free(&self, page: T::Descriptor) -> bool {
        self.set.is_free(self.page_table.pfn_of(page))
    }

    /// Descriptors of the free blocks of `order`, in ascending frame order
    pub fn free_blocks(&self, order: usize) -> impl Iterator<Item = T::Descriptor> + '_ {
        self.set
            .free_blocks(order)
            .map(move |pfn| self.page_table.descriptor_of(pfn))
    }

    /// Number of free blocks of `order`
    pub fn block_count(&self, order: usize) -> usize {
        self.set.block_count(order)
    }

    /// Number of free pages across all orders
    pub fn available_pages(&self) -> usize {
        self.set.free_pages()
    }

    /// Number of pages handed to init()
    pub fn total_pages(&self) -> usize {
        self.set.total_pages()
    }

    /// Current free-list statistics
    pub fn stats(&self) -> BuddyStats {
        #[cfg(feature = "tracking")]
        return self.stats.clone();
        #[cfg(not(feature = "tracking"))]
        return self.set.get_stats();
    }

    /// Get node pool statistics
    pub fn node_pool_stats(&self) -> NodePoolStats {
        self.set.node_pool_stats()
    }

    /// Check every free-list invariant
    pub fn verify(&self) -> Result<(), InvariantViolation> {
        self.set.verify()
    }

    /// Friendly name of the algorithm, for debugging and selection purposes
    pub fn name(&self) -> &'static str {
        Self::NAME
    }

    /// Dump the free lists, one line per order
    ///
    /// Each line lists the frame numbers of the free blocks of that order in
    /// hex. The lines are logged at debug level and returned.
    pub fn dump_state(&self) -> String {
        let mut out = String::new();
        debug!("BUDDY STATE:");

        for order in 0..=MAX_ORDER {
            let mut line = String::new();
            // Writing into a String cannot fail
            let _ = write!(line, "[{}]", order);
            for pfn in self.set.free_blocks(order) {
                let _ = write!(line, " {:x}", pfn);
            }

            debug!("{}", line);
            out.push_str(&line);
            out.push('\n');
        }

        out
    }

    /// Update the cached statistics from the free lists
    #[cfg(feature = "tracking")]
    fn update_stats(&mut self) {
        self.stats = self.set.get_stats();
    }
}

impl<T: PageTable + Default, const MAX_ORDER: usize> Default
    for BuddyPageAllocator<T, MAX_ORDER>
{
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: PageTable, const MAX_ORDER: usize> PageAllocator for BuddyPageAllocator<T, MAX_ORDER> {
    type Descriptor = T::Descriptor;

    fn init(&mut self, first: T::Descriptor, count: usize) -> bool {
        BuddyPageAllocator::init(self, first, count)
    }

    fn alloc_pages(&mut self, order: usize) -> AllocResult<T::Descriptor> {
        self.allocate(order)
    }

    fn free_pages(&mut self, first: T::Descriptor, order: usize) -> AllocResult {
        self.release(first, order)
    }

    fn reserve_page(&mut self, page: T::Descriptor) -> AllocResult<bool> {
        self.reserve(page)
    }

    fn dump_state(&self) -> String {
        BuddyPageAllocator::dump_state(self)
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }
}
