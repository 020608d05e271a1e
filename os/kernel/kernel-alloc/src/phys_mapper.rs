//! # HHDM-based `PhysMapper` for Kernel Virtual Memory
//!
//! This module provides a [`PhysMapper`] implementation for kernels that use a
//! higher-half direct map (HHDM): every physical address is reachable at
//! `offset + pa`.
//!
//! The allocator needs it to touch frame contents: the intrusive free-list
//! link, the alloc/free fill patterns, and the copy-on-write duplication.
//!
//! The offset is a runtime value so the very same mapper serves host tests,
//! where "physical memory" is a heap arena and the offset is
//! `arena_ptr - fake_phys_base` (wrapping). Pointers are rebuilt with
//! exposed provenance, so such an arena must have its address exposed.
//!
//! ## Example
//! ```rust
//! use kernel_memory_addresses::PhysicalAddress;
//! use kernel_vmem::PhysMapper;
//! use kernel_alloc::phys_mapper::HhdmPhysMapper;
//!
//! let mapper = HhdmPhysMapper::kernel();
//! let p = mapper.phys_to_ptr(PhysicalAddress::new(0x8000_0000));
//! assert_eq!(p as u64, 0xffff_8880_8000_0000);
//! ```

use kernel_info::memory::HHDM_BASE;
use kernel_memory_addresses::PhysicalAddress;
use kernel_vmem::PhysMapper;

/// [`PhysMapper`] for a higher-half (or any constant-offset) direct map.
///
/// # Safety
/// Translation itself is safe; dereferencing the result (through
/// [`PhysMapper::phys_to_mut`] or [`PhysMapper::page_bytes`]) requires that
/// the direct map is present and covers the referenced range.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct HhdmPhysMapper {
    offset: u64,
}

impl HhdmPhysMapper {
    /// The kernel's direct map at [`HHDM_BASE`].
    #[must_use]
    pub const fn kernel() -> Self {
        Self::new(HHDM_BASE)
    }

    /// A direct map at an arbitrary (wrapping) offset.
    #[must_use]
    pub const fn new(offset: u64) -> Self {
        Self { offset }
    }

    #[must_use]
    pub const fn offset(self) -> u64 {
        self.offset
    }
}

impl Default for HhdmPhysMapper {
    fn default() -> Self {
        Self::kernel()
    }
}

impl PhysMapper for HhdmPhysMapper {
    #[inline]
    fn phys_to_ptr(&self, pa: PhysicalAddress) -> *mut u8 {
        let va = self.offset.wrapping_add(pa.as_u64());
        #[allow(clippy::cast_possible_truncation)]
        let va = va as usize;
        core::ptr::with_exposed_provenance_mut(va)
    }
}
