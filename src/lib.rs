//! Buddy Page Allocator
//!
//! This crate implements a page-frame allocator built on the buddy algorithm,
//! featuring:
//! - Order-indexed free lists kept sorted by page frame number
//! - Lazy splitting on allocation and greedy buddy merging on release
//! - Reservation of individual pages anywhere inside a free block
//! - Explicit invariant checking instead of panics
//! - An IRQ-safe global instance for kernels that need one

#![no_std]

extern crate alloc;

use core::fmt;

// Logging support - conditionally import log crate
#[cfg(feature = "log")]
extern crate log;

// Stub macros when log is disabled - these become no-ops
#[cfg(not(feature = "log"))]
macro_rules! error {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
macro_rules! warn {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
#[allow(unused_macros)]
macro_rules! info {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
macro_rules! debug {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
macro_rules! trace {
    ($($arg:tt)*) => {};
}

/// A broken free-list invariant, or a request that would break one.
///
/// These describe bugs in the caller or in the allocator's own bookkeeping. The
/// store must not be used further in a production kernel once one is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvariantViolation {
    /// A block expected in the free list of `order` is not there.
    MissingBlock { pfn: usize, order: usize },
    /// A block of order 0 cannot be halved.
    SplitOrderZero { pfn: usize },
    /// A block of the maximum order has no buddy to merge with.
    MergeAtMaxOrder { pfn: usize },
    /// `pfn` is not a multiple of the block size of `order`.
    Misaligned { pfn: usize, order: usize },
    /// The two halves produced by a split are not each other's buddies.
    NotBuddies { left: usize, right: usize, order: usize },
    /// The released block overlaps a block that is already free.
    DoubleFree { pfn: usize, order: usize, free_pfn: usize, free_order: usize },
    /// Two free blocks overlap.
    Overlap { pfn: usize, other: usize },
    /// A free list is not strictly ascending.
    Unsorted { order: usize, pfn: usize },
    /// Walking a free list visited more nodes than it holds.
    CycleDetected { order: usize },
    /// The recorded list length disagrees with the number of linked nodes.
    CountMismatch { order: usize, recorded: usize, linked: usize },
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::MissingBlock { pfn, order } => {
                write!(f, "block {:#x} is not in the order-{} free list", pfn, order)
            }
            Self::SplitOrderZero { pfn } => write!(f, "cannot split order-0 block {:#x}", pfn),
            Self::MergeAtMaxOrder { pfn } => {
                write!(f, "cannot merge block {:#x} above the maximum order", pfn)
            }
            Self::Misaligned { pfn, order } => {
                write!(f, "pfn {:#x} is not aligned for order {}", pfn, order)
            }
            Self::NotBuddies { left, right, order } => write!(
                f,
                "blocks {:#x} and {:#x} are not buddies at order {}",
                left, right, order
            ),
            Self::DoubleFree {
                pfn,
                order,
                free_pfn,
                free_order,
            } => write!(
                f,
                "double free of {:#x} (order {}): overlaps free block {:#x} (order {})",
                pfn, order, free_pfn, free_order
            ),
            Self::Overlap { pfn, other } => {
                write!(f, "free blocks {:#x} and {:#x} overlap", pfn, other)
            }
            Self::Unsorted { order, pfn } => {
                write!(f, "order-{} free list is unsorted at {:#x}", order, pfn)
            }
            Self::CycleDetected { order } => write!(f, "cycle in order-{} free list", order),
            Self::CountMismatch {
                order,
                recorded,
                linked,
            } => write!(
                f,
                "order-{} free list records {} blocks but links {}",
                order, recorded, linked
            ),
        }
    }
}

/// The error type used for allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// Invalid order (greater than the maximum order).
    InvalidParam,
    /// No enough memory to allocate.
    NoMemory,
    /// The global allocator was initialized twice.
    AlreadyInitialized,
    /// The free-list store is, or would become, inconsistent.
    Invariant(InvariantViolation),
}

impl From<InvariantViolation> for AllocError {
    fn from(violation: InvariantViolation) -> Self {
        Self::Invariant(violation)
    }
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidParam => write!(f, "invalid parameter"),
            Self::NoMemory => write!(f, "no memory available"),
            Self::AlreadyInitialized => write!(f, "allocator already initialized"),
            Self::Invariant(violation) => write!(f, "invariant violation: {}", violation),
        }
    }
}

/// A [`Result`] type with [`AllocError`] as the error type.
pub type AllocResult<T = ()> = Result<T, AllocError>;

/// The contract every page allocation algorithm offers to the memory manager.
pub trait PageAllocator {
    /// Handle identifying the first page of a block.
    type Descriptor: Copy;

    /// Seed the allocator with `count` contiguous pages starting at `first`.
    ///
    /// Returns `true` if every page was placed into the free lists.
    fn init(&mut self, first: Self::Descriptor, count: usize) -> bool;

    /// Allocate `2^order` contiguous pages.
    fn alloc_pages(&mut self, order: usize) -> AllocResult<Self::Descriptor>;

    /// Free `2^order` contiguous pages starting at `first`.
    fn free_pages(&mut self, first: Self::Descriptor, order: usize) -> AllocResult;

    /// Take one page out of circulation. Returns `false` if it is not free.
    fn reserve_page(&mut self, page: Self::Descriptor) -> AllocResult<bool>;

    /// Log and return a textual snapshot of the free lists.
    fn dump_state(&self) -> alloc::string::String;

    /// Friendly name of the algorithm.
    fn name(&self) -> &'static str;
}

/// Checks whether the frame number has the demanded alignment.
///
/// Equivalent to `pfn % align == 0`, but the alignment must be a power of two.
#[inline]
const fn is_aligned(pfn: usize, align: usize) -> bool {
    pfn & (align - 1) == 0
}

// Export our allocator implementations
pub mod buddy;
pub use buddy::{
    BuddyPageAllocator, BuddySet, BuddyStats, FreeList, NodePool, DEFAULT_MAX_ORDER,
};

pub mod page_table;
pub use page_table::{FramePageTable, PageDescriptor, PageTable};

pub mod global_allocator;
pub use global_allocator::GlobalPageAllocator;
