//! # Memory Layout

use kernel_memory_addresses::{PageSize, PhysicalAddress, Size2M, Size4K};

/// A simple Higher Half Direct Map (HHDM) base.
/// Anything you map at [`HHDM_BASE`] + `pa` lets the kernel
/// access physical memory via a fixed offset.
pub const HHDM_BASE: u64 = 0xffff_8880_0000_0000;

/// First byte of RAM; the kernel image is loaded here.
pub const PHYS_BASE: PhysicalAddress = PhysicalAddress::new(0x8000_0000);

/// One past the last byte of RAM handed to the frame allocators (128 MiB).
pub const PHYS_TOP: PhysicalAddress = PhysicalAddress::new(0x8000_0000 + 128 * 1024 * 1024);

/// Size of a normal frame in bytes.
pub const FRAME_SIZE: u64 = Size4K::SIZE;

/// Size of a superframe in bytes.
pub const SUPERFRAME_SIZE: u64 = Size2M::SIZE;

/// Number of superframes reserved at the top of physical memory.
pub const SUPERFRAME_COUNT: usize = 16;

/// Number of lock stripes in the frame reference-count table.
///
/// Prime, so that runs of consecutive frame indices spread over all stripes.
pub const REFCOUNT_BUCKETS: usize = 61;

/// Pattern written over a frame when it is handed out.
///
/// Reading it back means the caller used memory it never initialized.
pub const ALLOC_FILL_BYTE: u8 = 0x05;

/// Pattern written over a frame when it is returned.
///
/// Reading it back through a stale mapping means a dangling reference.
pub const FREE_FILL_BYTE: u8 = 0x01;

const _: () = {
    assert!(PHYS_BASE.is_aligned::<Size4K>());
    assert!(PHYS_TOP.is_aligned::<Size2M>());
    assert!(PHYS_TOP.as_u64() > PHYS_BASE.as_u64());
    assert!(
        (SUPERFRAME_COUNT as u64) * SUPERFRAME_SIZE < PHYS_TOP.as_u64() - PHYS_BASE.as_u64(),
        "superframe reservation must leave room for normal frames"
    );
    assert!(ALLOC_FILL_BYTE != FREE_FILL_BYTE);
    assert!(is_prime(REFCOUNT_BUCKETS));
    assert!(HHDM_BASE.is_multiple_of(SUPERFRAME_SIZE));
};

const fn is_prime(n: usize) -> bool {
    if n < 2 {
        return false;
    }
    let mut d = 2;
    while d * d <= n {
        if n % d == 0 {
            return false;
        }
        d += 1;
    }
    true
}
