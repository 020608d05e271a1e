//! # Kernel-wide Physical Memory
//!
//! The kernel owns exactly one [`PhysicalMemory`], created by [`init`] on
//! the boot CPU before any other CPU is started. Everything else reaches it
//! through the free functions in this module.
//!
//! ```rust,no_run
//! use kernel_alloc::global;
//! use kernel_info::memory::{PHYS_TOP, PHYS_BASE};
//! use kernel_memory_addresses::PhysicalRange;
//!
//! // `end` of the kernel image, as reported by the linker.
//! # let kernel_end = PHYS_BASE;
//! unsafe { global::init(PhysicalRange::new(kernel_end, PHYS_TOP)) }.expect("usable RAM");
//! let page = global::alloc_frame().expect("memory");
//! global::free_frame(page);
//! ```

use crate::config::FrameAllocatorConfig;
use crate::error::{InitError, OutOfMemory};
use crate::memory::{MemoryStats, PhysicalMemory};
use crate::phys_mapper::HhdmPhysMapper;
use crate::{Frame, Superframe};
use kernel_memory_addresses::{PhysicalAddress, PhysicalRange};
use kernel_sync::SyncOnceCell;
use kernel_vmem::LeafEntry;
use log::error;

static PHYSICAL_MEMORY: SyncOnceCell<PhysicalMemory<HhdmPhysMapper>> = SyncOnceCell::new();

/// Bring up the kernel's frame allocators over `range`, reached through the
/// higher-half direct map.
///
/// # Errors
/// - [`InitError::AlreadyInitialized`] on any call after the first
///   successful one.
/// - Range errors from [`PhysicalMemory::new`].
///
/// # Safety
/// Same contract as [`PhysicalMemory::new`] with [`HhdmPhysMapper::kernel`].
/// Must run on one CPU only.
pub unsafe fn init(range: PhysicalRange) -> Result<(), InitError> {
    unsafe { init_with(range, HhdmPhysMapper::kernel(), FrameAllocatorConfig::default()) }
}

/// [`init`] with an explicit mapper and configuration.
///
/// # Errors
/// As for [`init`].
///
/// # Safety
/// Same contract as [`PhysicalMemory::new`]. Must run on one CPU only.
pub unsafe fn init_with(
    range: PhysicalRange,
    mapper: HhdmPhysMapper,
    config: FrameAllocatorConfig,
) -> Result<(), InitError> {
    // Checked before construction: seeding the pools writes to every frame.
    if PHYSICAL_MEMORY.get().is_some() {
        return Err(InitError::AlreadyInitialized);
    }
    let memory = unsafe { PhysicalMemory::new(range, mapper, config)? };
    PHYSICAL_MEMORY
        .set(memory)
        .map(|_| ())
        .map_err(|_| InitError::AlreadyInitialized)
}

/// Whether [`init`] has completed.
#[must_use]
pub fn is_initialized() -> bool {
    PHYSICAL_MEMORY.get().is_some()
}

/// The kernel's physical memory.
///
/// # Panics
/// If [`init`] has not run yet.
#[must_use]
pub fn physical_memory() -> &'static PhysicalMemory<HhdmPhysMapper> {
    match PHYSICAL_MEMORY.get() {
        Some(memory) => memory,
        None => {
            error!("physical memory used before init");
            panic!("physical memory used before init");
        }
    }
}

/// See [`PhysicalMemory::alloc_frame`].
#[must_use]
pub fn alloc_frame() -> Option<Frame> {
    physical_memory().alloc_frame()
}

/// See [`PhysicalMemory::free_frame`].
pub fn free_frame(pa: impl Into<PhysicalAddress>) {
    physical_memory().free_frame(pa);
}

/// See [`PhysicalMemory::alloc_superframe`].
#[must_use]
pub fn alloc_superframe() -> Option<Superframe> {
    physical_memory().alloc_superframe()
}

/// See [`PhysicalMemory::free_superframe`].
pub fn free_superframe(pa: impl Into<PhysicalAddress>) {
    physical_memory().free_superframe(pa);
}

/// See [`PhysicalMemory::mark_shared_index`].
pub fn mark_shared(frame_index: u64) {
    physical_memory().mark_shared_index(frame_index);
}

/// See [`PhysicalMemory::share_cow`].
pub fn share_cow<E: LeafEntry + ?Sized>(entry: &mut E) -> Frame {
    physical_memory().share_cow(entry)
}

/// See [`PhysicalMemory::resolve_cow_fault`].
///
/// # Errors
/// [`OutOfMemory`] when a private copy was needed and no frame was free.
pub fn resolve_cow_fault<E: LeafEntry + ?Sized>(entry: &mut E) -> Result<(), OutOfMemory> {
    physical_memory().resolve_cow_fault(entry)
}

/// See [`PhysicalMemory::stats`].
#[must_use]
pub fn stats() -> MemoryStats {
    physical_memory().stats()
}
