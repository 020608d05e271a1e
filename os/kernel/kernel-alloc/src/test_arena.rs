//! Heap-backed stand-in for RAM.
//!
//! Shared by the unit tests and, through `tests/common`, the integration
//! tests. The parent module must have [`FrameAllocatorConfig`],
//! [`HhdmPhysMapper`] and [`PhysicalMemory`] in scope.
#![allow(dead_code)]

use super::{FrameAllocatorConfig, HhdmPhysMapper, PhysicalMemory};
use kernel_info::memory::{FRAME_SIZE, SUPERFRAME_SIZE};
use kernel_memory_addresses::{PageSize, PhysicalAddress, PhysicalPage, PhysicalRange};
use kernel_vmem::PhysMapper;
use std::alloc::{Layout, alloc_zeroed, dealloc};

/// Where every arena pretends to live.
pub const FAKE_BASE: u64 = 0x8000_0000;

pub const MIB: u64 = 1024 * 1024;

/// A 2 MiB-aligned heap allocation standing in for `[FAKE_BASE, FAKE_BASE + len)`.
pub struct Arena {
    ptr: *mut u8,
    layout: Layout,
}

// The arena is only ever touched through frames the allocator hands out.
unsafe impl Send for Arena {}
unsafe impl Sync for Arena {}

impl Arena {
    pub fn new(bytes: u64) -> Self {
        let size = usize::try_from(bytes).expect("arena size");
        let align = usize::try_from(SUPERFRAME_SIZE).expect("alignment");
        let layout = Layout::from_size_align(size, align).expect("layout");
        let ptr = unsafe { alloc_zeroed(layout) };
        assert!(!ptr.is_null(), "arena allocation failed");
        Self { ptr, layout }
    }

    /// Room for exactly `n` 4 KiB frames.
    pub fn frames(n: u64) -> Self {
        Self::new(n * FRAME_SIZE)
    }

    /// Room for exactly `n` 2 MiB superframes.
    pub fn superframes(n: u64) -> Self {
        Self::new(n * SUPERFRAME_SIZE)
    }

    pub fn mapper(&self) -> HhdmPhysMapper {
        HhdmPhysMapper::new((self.ptr.expose_provenance() as u64).wrapping_sub(FAKE_BASE))
    }

    pub fn range(&self) -> PhysicalRange {
        let start = PhysicalAddress::new(FAKE_BASE);
        PhysicalRange::new(start, start + self.layout.size() as u64)
    }

    /// Build a context over the whole arena.
    pub fn memory(&self, config: FrameAllocatorConfig) -> PhysicalMemory<HhdmPhysMapper> {
        unsafe { PhysicalMemory::new(self.range(), self.mapper(), config) }.expect("arena fits")
    }

    /// A context with only normal frames.
    pub fn frames_only(&self) -> PhysicalMemory<HhdmPhysMapper> {
        self.memory(FrameAllocatorConfig::default().with_superframes(0))
    }

    pub fn bytes<S: PageSize>(&self, page: PhysicalPage<S>) -> &[u8] {
        assert!(self.range().contains(page.base()));
        unsafe { self.mapper().page_bytes(page) }
    }

    /// Copy `data` to the start of `page`.
    pub fn write<S: PageSize>(&self, page: PhysicalPage<S>, data: &[u8]) {
        assert!(self.range().contains(page.base()));
        let bytes: &mut [u8] = unsafe { self.mapper().page_bytes(page) };
        bytes[..data.len()].copy_from_slice(data);
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        unsafe { dealloc(self.ptr, self.layout) }
    }
}
