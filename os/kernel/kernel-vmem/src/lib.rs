//! # Virtual Memory Support
//!
//! Minimal Sv39 page-table helpers for the kernel's physical-memory core.
//!
//! ## What you get
//! - [`PageEntryBits`]: the raw 64-bit Sv39 entry as a bitfield, including
//!   the software **COW** bit in `RSW`.
//! - [`PageTableEntry`]: a typed leaf entry.
//! - [`LeafEntry`]: the page-table-entry abstraction consumed by the frame
//!   allocator's copy-on-write fault resolver.
//! - [`PhysMapper`]: turns a physical address into a pointer the kernel can
//!   dereference (identity map, HHDM, or a host-side test arena).
//!
//! ## Sv39 Virtual Address → Physical Address Walk
//!
//! ```text
//! | 38‒30 | 29‒21 | 20‒12 | 11‒0   |
//! |  VPN2 |  VPN1 |  VPN0 | Offset |
//! ```
//!
//! Three levels of 512-entry tables; a leaf at level 1 maps a 2 MiB
//! megapage (a *superframe*), a leaf at level 0 maps a 4 KiB frame.
//!
//! ## Copy-on-write encoding
//!
//! Fork maps a shared frame into both address spaces with `W=0, COW=1`. The
//! first store through either mapping raises a store page fault; the trap
//! dispatcher checks [`LeafEntry::is_cow_fault`] and hands the entry to the
//! frame allocator, which either upgrades the entry in place (sole owner) or
//! points it at a private copy. In both cases the entry leaves with `W=1,
//! COW=0`.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code, clippy::inline_always)]

mod leaf_entry;
mod page_entry_bits;
mod page_table;

pub use crate::leaf_entry::LeafEntry;
pub use crate::page_entry_bits::PageEntryBits;
pub use crate::page_table::PageTableEntry;

use kernel_memory_addresses::{PageSize, PhysicalAddress, PhysicalPage};

/// Converts physical addresses to usable pointers in the current virtual
/// address space (e.g., via identity map or a higher-half direct map, HHDM).
///
/// Typical patterns:
/// - **Kernel**: uses HHDM; adds a constant offset before returning a pointer.
/// - **Host tests**: the same offset trick, aimed at a heap-allocated arena
///   standing in for RAM.
pub trait PhysMapper {
    /// Translate `pa` to a raw pointer. Pure address arithmetic; nothing is
    /// dereferenced.
    fn phys_to_ptr(&self, pa: PhysicalAddress) -> *mut u8;

    /// Convert a *physical* address to a usable mutable reference.
    ///
    /// # Safety
    /// - `pa` must be mapped as writable through this mapper.
    /// - Lifetime `'a` is purely borrow-checked; the mapping must remain valid
    ///   for `'a`, and no other reference may alias the same bytes.
    /// - Type `T` must match the bytes at `pa` and be suitably aligned.
    #[inline]
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        unsafe { &mut *self.phys_to_ptr(pa).cast::<T>() }
    }

    /// View a whole physical page as bytes.
    ///
    /// # Safety
    /// Same contract as [`phys_to_mut`](Self::phys_to_mut), for all
    /// `S::SIZE` bytes of `page`.
    #[inline]
    unsafe fn page_bytes<'a, S: PageSize>(&self, page: PhysicalPage<S>) -> &'a mut [u8] {
        #[allow(clippy::cast_possible_truncation)]
        let len = S::SIZE as usize;
        unsafe { core::slice::from_raw_parts_mut(self.phys_to_ptr(page.base()), len) }
    }
}
