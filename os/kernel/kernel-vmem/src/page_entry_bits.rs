use bitfield_struct::bitfield;
use kernel_memory_addresses::{PageSize, PhysicalAddress, Size4K};

/// A single 64-bit Sv39 leaf page-table entry in its raw bitfield form.
///
/// The type allows read/write access to individual bits without manual masking
/// or shifting, using the [`bitfield_struct`](https://docs.rs/bitfield-struct/)
/// derive.
///
/// ### Bit layout
///
/// | Bits    | Name  | Meaning |
/// |---------|-------|---------|
/// | 0       | `V`   | Valid entry if set |
/// | 1       | `R`   | Readable |
/// | 2       | `W`   | Writable |
/// | 3       | `X`   | Executable |
/// | 4       | `U`   | User-mode accessible |
/// | 5       | `G`   | Global mapping |
/// | 6       | `A`   | Accessed |
/// | 7       | `D`   | Dirty |
/// | 8       | `RSW` | **COW**: software copy-on-write marker |
/// | 9       | `RSW` | Spare, reserved for software |
/// | 10–53   | `PPN` | Physical page number (address bits 55:12) |
/// | 54–63   | –     | Reserved (Svpbmt/Svnapot), kept zero |
///
/// ### Notes
/// - An entry with any of `R`/`W`/`X` set is a leaf. `W` without `R` is
///   reserved by the ISA.
/// - The hardware ignores both `RSW` bits, so the kernel is free to use bit 8
///   as the COW marker: a COW entry is always mapped with `W` clear so the
///   first write traps.
///
/// ### Example
/// ```rust
/// # use kernel_memory_addresses::PhysicalAddress;
/// # use kernel_vmem::PageEntryBits;
/// let mut e = PageEntryBits::new_user_rw();
/// e.set_physical_address(PhysicalAddress::new(0x8020_3000));
/// assert!(e.valid() && e.writable() && !e.cow());
/// assert_eq!(e.physical_address().as_u64(), 0x8020_3000);
/// ```
#[bitfield(u64)]
pub struct PageEntryBits {
    /// Valid (V, bit 0).
    pub valid: bool,

    /// Readable (R, bit 1).
    pub readable: bool,

    /// Writable (W, bit 2).
    ///
    /// Clear on every COW-shared mapping.
    pub writable: bool,

    /// Executable (X, bit 3).
    pub executable: bool,

    /// User-mode accessible (U, bit 4).
    pub user_access: bool,

    /// Global mapping (G, bit 5).
    pub global: bool,

    /// Accessed (A, bit 6).
    pub accessed: bool,

    /// Dirty (D, bit 7).
    pub dirty: bool,

    /// Copy-on-write (RSW bit 8).
    ///
    /// Set by fork on entries whose frame is shared; cleared by the COW fault
    /// resolver once the faulting side owns a private (or sole) copy.
    pub cow: bool,

    /// Second RSW bit; unused by the kernel.
    pub rsw_spare: bool,

    /// Physical page number.
    #[bits(44)]
    ppn: u64,

    #[bits(10)]
    __: u16,
}

impl PageEntryBits {
    #[inline]
    pub const fn set_physical_address(&mut self, phys: PhysicalAddress) {
        self.set_ppn(phys.as_u64() >> Size4K::SHIFT);
    }

    #[inline]
    #[must_use]
    pub const fn physical_address(&self) -> PhysicalAddress {
        PhysicalAddress::new(self.ppn() << Size4K::SHIFT)
    }

    /// Valid, user-accessible, read/write data mapping.
    #[inline]
    #[must_use]
    pub const fn new_user_rw() -> Self {
        Self::new()
            .with_valid(true)
            .with_readable(true)
            .with_writable(true)
            .with_user_access(true)
    }

    /// Valid, user-accessible, read/execute text mapping.
    #[inline]
    #[must_use]
    pub const fn new_user_rx() -> Self {
        Self::new()
            .with_valid(true)
            .with_readable(true)
            .with_executable(true)
            .with_user_access(true)
    }
}
