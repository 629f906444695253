//! Property tests driving the allocator with random operation sequences
//!
//! After every operation the free lists must pass `verify()`, the free page
//! count must match the outstanding allocations and no two live blocks may
//! overlap.

use buddy_page_allocator::buddy::{block_size, buddy_of};
use buddy_page_allocator::{AllocError, BuddyPageAllocator, FramePageTable, PageDescriptor};
use quickcheck::{Arbitrary, Gen, QuickCheck};

const MAX_ORDER: usize = 6;
const MAX_TESTS: u64 = 500;

type Allocator = BuddyPageAllocator<FramePageTable, MAX_ORDER>;

#[derive(Clone, Debug)]
struct InitParams {
    first: usize,
    count: usize,
}

impl Arbitrary for InitParams {
    fn arbitrary(g: &mut Gen) -> Self {
        InitParams {
            first: usize::arbitrary(g) % 512,
            count: 1 + usize::arbitrary(g) % (4 * block_size(MAX_ORDER)),
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum OpTag {
    Allocate,
    Release,
    Reserve,
}

#[derive(Clone, Debug)]
enum Op {
    /// Allocate a block of `order`.
    Allocate { order: usize },
    /// Release the live block at `index` modulo the number of live blocks.
    Release { index: usize },
    /// Reserve the page at `offset` modulo the managed range.
    Reserve { offset: usize },
}

impl Arbitrary for Op {
    fn arbitrary(g: &mut Gen) -> Self {
        match g
            .choose(&[OpTag::Allocate, OpTag::Release, OpTag::Reserve])
            .unwrap()
        {
            OpTag::Allocate => Op::Allocate {
                order: usize::arbitrary(g) % (MAX_ORDER + 1),
            },
            OpTag::Release => Op::Release {
                index: usize::arbitrary(g),
            },
            OpTag::Reserve => Op::Reserve {
                offset: usize::arbitrary(g),
            },
        }
    }
}

fn pd(pfn: usize) -> PageDescriptor {
    PageDescriptor::new(pfn)
}

fn no_overlap(live: &[(usize, usize)]) -> bool {
    let mut ranges: Vec<_> = live
        .iter()
        .map(|&(pfn, order)| (pfn, pfn + block_size(order)))
        .collect();
    ranges.sort_unstable();
    ranges.windows(2).all(|pair| pair[0].1 <= pair[1].0)
}

fn run_ops(params: InitParams, ops: Vec<Op>) -> bool {
    let mut allocator = Allocator::new(FramePageTable);
    if !allocator.init(pd(params.first), params.count) {
        return false;
    }

    // (pfn, order) of every block handed out, reserved pages as order 0
    let mut live: Vec<(usize, usize)> = Vec::new();

    for op in ops {
        match op {
            Op::Allocate { order } => match allocator.allocate(order) {
                Ok(block) => {
                    if block.pfn() % block_size(order) != 0 {
                        return false;
                    }
                    live.push((block.pfn(), order));
                }
                Err(AllocError::NoMemory) => {
                    let largest = allocator.stats().largest_free_order();
                    if largest.map_or(false, |largest| largest >= order) {
                        return false;
                    }
                }
                Err(_) => return false,
            },
            Op::Release { index } => {
                if live.is_empty() {
                    continue;
                }
                let (pfn, order) = live.swap_remove(index % live.len());
                if allocator.release(pd(pfn), order).is_err() {
                    return false;
                }
            }
            Op::Reserve { offset } => {
                let pfn = params.first + offset % params.count;
                let was_free = allocator.is_free(pd(pfn));
                match allocator.reserve(pd(pfn)) {
                    Ok(true) if was_free => {
                        live.push((pfn, 0));
                    }
                    Ok(false) if !was_free => {}
                    _ => return false,
                }
            }
        }

        if allocator.verify().is_err() || !no_overlap(&live) {
            return false;
        }
        let used: usize = live.iter().map(|&(_, order)| block_size(order)).sum();
        if allocator.available_pages() + used != params.count {
            return false;
        }
    }

    // Handing everything back restores the full range
    for (pfn, order) in live.drain(..) {
        if allocator.release(pd(pfn), order).is_err() {
            return false;
        }
    }
    allocator.verify().is_ok() && allocator.available_pages() == params.count
}

#[test]
fn random_operations_keep_invariants() {
    let mut qc = QuickCheck::new().max_tests(MAX_TESTS);
    qc.quickcheck(run_ops as fn(_, _) -> bool);
}

fn buddy_is_involution(pfn: usize, order: usize) -> bool {
    let order = order % MAX_ORDER;
    let pfn = (pfn % (1 << 20)) & !(block_size(order) - 1);
    match buddy_of(pfn, order, MAX_ORDER) {
        Some(buddy) => {
            buddy != pfn
                && buddy_of(buddy, order, MAX_ORDER) == Some(pfn)
                && (pfn ^ buddy) == block_size(order)
        }
        None => false,
    }
}

#[test]
fn buddy_of_buddy_is_self() {
    let mut qc = QuickCheck::new().max_tests(MAX_TESTS);
    qc.quickcheck(buddy_is_involution as fn(_, _) -> bool);
}

fn exhaustion_then_restore(count: usize) -> bool {
    let count = 1 + count % (2 * block_size(MAX_ORDER));
    let mut allocator = Allocator::new(FramePageTable);
    allocator.init(pd(0), count);
    let before = allocator.dump_state();

    let mut pages = Vec::new();
    while let Ok(page) = allocator.allocate(0) {
        pages.push(page);
    }
    if pages.len() != count || allocator.available_pages() != 0 {
        return false;
    }

    for page in pages.into_iter().rev() {
        if allocator.release(page, 0).is_err() {
            return false;
        }
    }
    allocator.dump_state() == before
}

#[test]
fn exhaustion_releases_back_to_initial_layout() {
    let mut qc = QuickCheck::new().max_tests(100);
    qc.quickcheck(exhaustion_then_restore as fn(_) -> bool);
}
