use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K};

/// The view of a leaf page-table entry that the frame allocator needs.
///
/// The physical-memory core never walks page tables itself. The page-table
/// layer locates the faulting entry and hands it over through this trait, so
/// the COW machinery works with any entry encoding that can express these
/// bits.
pub trait LeafEntry {
    fn is_valid(&self) -> bool;
    fn is_readable(&self) -> bool;
    fn is_writable(&self) -> bool;
    fn is_user(&self) -> bool;
    /// Software copy-on-write marker.
    fn is_cow(&self) -> bool;

    fn set_valid(&mut self, on: bool);
    fn set_readable(&mut self, on: bool);
    fn set_writable(&mut self, on: bool);
    fn set_user(&mut self, on: bool);
    fn set_cow(&mut self, on: bool);

    /// Base address of the mapped frame.
    fn physical_address(&self) -> PhysicalAddress;

    /// Point the entry at `pa`, leaving every flag bit untouched.
    fn retarget(&mut self, pa: PhysicalAddress);

    /// The mapped 4 KiB frame.
    #[inline]
    fn frame(&self) -> PhysicalPage<Size4K> {
        PhysicalPage::from_addr(self.physical_address())
    }

    /// Whether a write fault on this entry is a COW fault (as opposed to a
    /// genuine protection violation).
    #[inline]
    fn is_cow_fault(&self) -> bool {
        self.is_valid() && self.is_cow()
    }
}
