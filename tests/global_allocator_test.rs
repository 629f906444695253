//! Tests for the lock-protected global page allocator
//!
//! Every test uses its own static instance since the test harness runs them
//! in parallel.

#![no_std]

extern crate alloc;

use alloc::vec::Vec;
use buddy_page_allocator::{
    AllocError, FramePageTable, GlobalPageAllocator, PageDescriptor, DEFAULT_MAX_ORDER,
};

const TEST_PAGES: usize = 4096;

fn pd(pfn: usize) -> PageDescriptor {
    PageDescriptor::new(pfn)
}

#[test]
fn test_uninitialized_allocator() {
    static GLOBAL: GlobalPageAllocator<FramePageTable> = GlobalPageAllocator::new();

    assert!(!GLOBAL.is_initialized());
    assert_eq!(GLOBAL.alloc_pages(0), Err(AllocError::NoMemory));
    assert_eq!(GLOBAL.free_pages(pd(0), 0), Err(AllocError::InvalidParam));
    assert_eq!(GLOBAL.reserve_page(pd(0)), Ok(false));
    assert!(GLOBAL.dump_state().is_empty());
    assert!(GLOBAL.stats().is_none());
    assert_eq!(GLOBAL.available_pages(), 0);
}

#[test]
fn test_double_init() {
    static GLOBAL: GlobalPageAllocator<FramePageTable> = GlobalPageAllocator::new();

    assert_eq!(GLOBAL.init(FramePageTable, pd(0), TEST_PAGES), Ok(true));
    assert!(GLOBAL.is_initialized());
    assert_eq!(
        GLOBAL.init(FramePageTable, pd(0), TEST_PAGES),
        Err(AllocError::AlreadyInitialized)
    );
    // The first initialization is left untouched
    assert_eq!(GLOBAL.available_pages(), TEST_PAGES);
}

#[test]
fn test_alloc_and_free() {
    static GLOBAL: GlobalPageAllocator<FramePageTable> = GlobalPageAllocator::new();
    GLOBAL.init(FramePageTable, pd(0x100), TEST_PAGES).unwrap();

    let mut blocks = Vec::new();
    for order in 0..8 {
        let block = GLOBAL.alloc_pages(order).unwrap();
        assert_eq!(block.pfn() % (1 << order), 0, "order {} misaligned", order);
        blocks.push((block, order));
    }
    assert_eq!(GLOBAL.available_pages(), TEST_PAGES - 255);

    for (block, order) in blocks {
        GLOBAL.free_pages(block, order).unwrap();
    }
    assert_eq!(GLOBAL.available_pages(), TEST_PAGES);
    assert_eq!(
        GLOBAL.alloc_pages(DEFAULT_MAX_ORDER + 1),
        Err(AllocError::InvalidParam)
    );

    let verified = GLOBAL.with_allocator(|allocator| allocator.verify());
    assert_eq!(verified, Some(Ok(())));
}

#[test]
fn test_reserve_and_dump() {
    static GLOBAL: GlobalPageAllocator<FramePageTable, 3> = GlobalPageAllocator::new();
    GLOBAL.init(FramePageTable, pd(0), 16).unwrap();

    assert_eq!(GLOBAL.reserve_page(pd(5)), Ok(true));
    assert_eq!(GLOBAL.reserve_page(pd(5)), Ok(false));
    assert_eq!(GLOBAL.dump_state(), "[0] 4\n[1] 6\n[2] 0\n[3] 8\n");

    let stats = GLOBAL.stats().unwrap();
    assert_eq!(stats.free_pages, 15);
    assert_eq!(stats.used_pages, 1);

    GLOBAL.free_pages(pd(5), 0).unwrap();
    assert_eq!(GLOBAL.dump_state(), "[0]\n[1]\n[2]\n[3] 0 8\n");
}

#[test]
fn test_exhaustion() {
    static GLOBAL: GlobalPageAllocator<FramePageTable, 4> = GlobalPageAllocator::new();
    GLOBAL.init(FramePageTable, pd(0), 20).unwrap();

    assert!(GLOBAL.alloc_pages(4).is_ok());
    assert!(GLOBAL.alloc_pages(2).is_ok());
    assert_eq!(GLOBAL.alloc_pages(0), Err(AllocError::NoMemory));
}
