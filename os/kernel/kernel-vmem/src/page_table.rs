//! # Leaf Page-Table Entry (Sv39 level 0)
//!
//! [`PageTableEntry`] wraps [`PageEntryBits`] and implements [`LeafEntry`] so
//! the frame allocator can resolve COW faults on it.
//!
//! After modifying active mappings, the caller must perform any required TLB
//! maintenance (`sfence.vma`).

use crate::{LeafEntry, PageEntryBits};
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K};

/// A single leaf page-table entry.
#[doc(alias = "PTE")]
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Default)]
pub struct PageTableEntry(PageEntryBits);

impl PageTableEntry {
    /// Create a valid 4 KiB leaf mapping `page` with `flags`.
    #[inline]
    #[must_use]
    pub const fn make_4k(page: PhysicalPage<Size4K>, mut flags: PageEntryBits) -> Self {
        flags.set_valid(true);
        flags.set_physical_address(page.base());
        Self(flags)
    }

    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0.into_bits()
    }
}

impl LeafEntry for PageTableEntry {
    fn is_valid(&self) -> bool {
        self.0.valid()
    }

    fn is_readable(&self) -> bool {
        self.0.readable()
    }

    fn is_writable(&self) -> bool {
        self.0.writable()
    }

    fn is_user(&self) -> bool {
        self.0.user_access()
    }

    fn is_cow(&self) -> bool {
        self.0.cow()
    }

    fn set_valid(&mut self, on: bool) {
        self.0.set_valid(on);
    }

    fn set_readable(&mut self, on: bool) {
        self.0.set_readable(on);
    }

    fn set_writable(&mut self, on: bool) {
        self.0.set_writable(on);
    }

    fn set_user(&mut self, on: bool) {
        self.0.set_user_access(on);
    }

    fn set_cow(&mut self, on: bool) {
        self.0.set_cow(on);
    }

    fn physical_address(&self) -> PhysicalAddress {
        self.0.physical_address()
    }

    fn retarget(&mut self, pa: PhysicalAddress) {
        self.0.set_physical_address(pa);
    }
}
