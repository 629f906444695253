//! Page descriptor table boundary
//!
//! The allocator never owns page descriptors. It works on page frame numbers
//! internally and converts to and from descriptors through a [`PageTable`]
//! supplied by the memory manager.

use core::fmt;

/// Bijective mapping between page descriptors and page frame numbers.
///
/// Both directions must be total over the frames handed to the allocator and
/// must be inverse to each other.
pub trait PageTable {
    /// Opaque handle for a single page.
    type Descriptor: Copy + Eq + fmt::Debug;

    /// Resolve the descriptor of frame `pfn`.
    fn descriptor_of(&self, pfn: usize) -> Self::Descriptor;

    /// Resolve the frame number of `descriptor`.
    fn pfn_of(&self, descriptor: Self::Descriptor) -> usize;
}

impl<T: PageTable + ?Sized> PageTable for &T {
    type Descriptor = T::Descriptor;

    fn descriptor_of(&self, pfn: usize) -> Self::Descriptor {
        (**self).descriptor_of(pfn)
    }

    fn pfn_of(&self, descriptor: Self::Descriptor) -> usize {
        (**self).pfn_of(descriptor)
    }
}

/// Descriptor of a page, identified by its frame number.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct PageDescriptor(usize);

impl PageDescriptor {
    pub const fn new(pfn: usize) -> Self {
        Self(pfn)
    }

    pub const fn pfn(self) -> usize {
        self.0
    }

    /// The descriptor `count` pages after this one.
    pub const fn add(self, count: usize) -> Self {
        Self(self.0 + count)
    }
}

impl fmt::Debug for PageDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PageDescriptor({:#x})", self.0)
    }
}

/// Page table whose descriptors carry the frame number directly.
#[derive(Debug, Default, Clone, Copy)]
pub struct FramePageTable;

impl PageTable for FramePageTable {
    type Descriptor = PageDescriptor;

    fn descriptor_of(&self, pfn: usize) -> PageDescriptor {
        PageDescriptor::new(pfn)
    }

    fn pfn_of(&self, descriptor: PageDescriptor) -> usize {
        descriptor.pfn()
    }
}
