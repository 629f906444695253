//! Global page allocator instance
//!
//! Wraps a [`BuddyPageAllocator`] in an IRQ-disabling spin lock so that a
//! kernel can share one instance between contexts. Each call holds the lock
//! for its full duration; split/merge never runs concurrently with anything
//! else.

use alloc::string::String;
use core::sync::atomic::{AtomicBool, Ordering};

use kspin::SpinNoIrq;

use crate::buddy::{BuddyPageAllocator, BuddyStats, DEFAULT_MAX_ORDER};
use crate::page_table::PageTable;
use crate::{AllocError, AllocResult};

#[cfg(feature = "log")]
use log::{error, warn};

/// Global allocator that serializes access to one buddy allocator
pub struct GlobalPageAllocator<T: PageTable, const MAX_ORDER: usize = DEFAULT_MAX_ORDER> {
    allocator: SpinNoIrq<Option<BuddyPageAllocator<T, MAX_ORDER>>>,
    initialized: AtomicBool,
}

impl<T: PageTable, const MAX_ORDER: usize> GlobalPageAllocator<T, MAX_ORDER> {
    pub const fn new() -> Self {
        Self {
            allocator: SpinNoIrq::new(None),
            initialized: AtomicBool::new(false),
        }
    }

    /// Initialize allocator with `count` pages starting at `first`
    ///
    /// Returns whether every page was placed. Fails with
    /// [`AllocError::AlreadyInitialized`] on a second call.
    pub fn init(&self, page_table: T, first: T::Descriptor, count: usize) -> AllocResult<bool> {
        let mut guard = self.allocator.lock();
        if guard.is_some() {
            error!("global allocator: Allocator already initialized");
            return Err(AllocError::AlreadyInitialized);
        }

        let mut allocator = BuddyPageAllocator::new(page_table);
        let placed = allocator.init(first, count);
        *guard = Some(allocator);

        self.initialized.store(true, Ordering::SeqCst);
        Ok(placed)
    }

    /// Whether init() has completed
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Allocate `2^order` contiguous pages
    pub fn alloc_pages(&self, order: usize) -> AllocResult<T::Descriptor> {
        if !self.is_initialized() {
            return Err(AllocError::NoMemory);
        }

        self.with_allocator(|allocator| allocator.allocate(order))
            .unwrap_or(Err(AllocError::NoMemory))
    }

    /// Free `2^order` contiguous pages starting at `first`
    pub fn free_pages(&self, first: T::Descriptor, order: usize) -> AllocResult {
        if !self.is_initialized() {
            error!("global allocator: Freeing pages before initializing");
            return Err(AllocError::InvalidParam);
        }

        self.with_allocator(|allocator| allocator.release(first, order))
            .unwrap_or(Err(AllocError::InvalidParam))
    }

    /// Take one page out of circulation
    pub fn reserve_page(&self, page: T::Descriptor) -> AllocResult<bool> {
        if !self.is_initialized() {
            warn!("global allocator: Reserving a page before initializing");
            return Ok(false);
        }

        self.with_allocator(|allocator| allocator.reserve(page))
            .unwrap_or(Ok(false))
    }

    /// Snapshot of the free lists, empty before init()
    pub fn dump_state(&self) -> String {
        self.with_allocator(|allocator| allocator.dump_state())
            .unwrap_or_default()
    }

    /// Get buddy allocator statistics
    pub fn stats(&self) -> Option<BuddyStats> {
        self.with_allocator(|allocator| allocator.stats())
    }

    /// Number of free pages
    pub fn available_pages(&self) -> usize {
        self.with_allocator(|allocator| allocator.available_pages())
            .unwrap_or(0)
    }

    /// Run `f` on the allocator with the lock held for the whole closure
    ///
    /// Returns `None` before init().
    pub fn with_allocator<R>(
        &self,
        f: impl FnOnce(&mut BuddyPageAllocator<T, MAX_ORDER>) -> R,
    ) -> Option<R> {
        self.allocator.lock().as_mut().map(f)
    }
}

impl<T: PageTable, const MAX_ORDER: usize> Default for GlobalPageAllocator<T, MAX_ORDER> {
    fn default() -> Self {
        Self::new()
    }
}
