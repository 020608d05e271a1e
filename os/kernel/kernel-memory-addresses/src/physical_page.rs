use crate::{PageSize, PhysicalAddress};
use core::fmt;
use core::marker::PhantomData;

/// Physical page base for size `S`.
///
/// A `PhysicalPage<S>` is the **page-aligned base** of a physical page of
/// `S::SIZE` bytes. Frame allocators hand these out; a `PhysicalPage<Size4K>`
/// is a frame, a `PhysicalPage<Size2M>` a superframe.
///
/// ### Invariants
/// - The low `S::SHIFT` bits of the base are always zero.
///
/// ### Examples
/// ```rust
/// # use kernel_memory_addresses::*;
/// let first = PhysicalPage::<Size4K>::from_addr(PhysicalAddress::new(0x8000_0000));
/// let third = first.checked_nth(2).unwrap();
/// assert_eq!(third.base().as_u64(), 0x8000_2000);
/// assert_eq!(third.index_from(first), Some(2));
/// assert_eq!(first.index_from(third), None);
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalPage<S: PageSize> {
    base: u64,
    _phantom: PhantomData<S>,
}

impl<S: PageSize> PhysicalPage<S> {
    /// The page that contains `pa` (aligns down).
    #[inline]
    #[must_use]
    pub const fn from_addr(pa: PhysicalAddress) -> Self {
        Self {
            base: pa.align_down::<S>().as_u64(),
            _phantom: PhantomData,
        }
    }

    #[inline]
    #[must_use]
    pub const fn base(self) -> PhysicalAddress {
        PhysicalAddress::new(self.base)
    }

    /// The page `n` pages above this one; `None` on overflow.
    #[inline]
    #[must_use]
    pub const fn checked_nth(self, n: u64) -> Option<Self> {
        let Some(delta) = n.checked_mul(S::SIZE) else {
            return None;
        };
        match self.base.checked_add(delta) {
            Some(base) => Some(Self {
                base,
                _phantom: PhantomData,
            }),
            None => None,
        }
    }

    /// How many `S` pages this page lies above `first`; `None` if below.
    #[inline]
    #[must_use]
    pub const fn index_from(self, first: Self) -> Option<u64> {
        match self.base.checked_sub(first.base) {
            Some(bytes) => Some(bytes >> S::SHIFT),
            None => None,
        }
    }
}

impl<S> fmt::Display for PhysicalPage<S>
where
    S: PageSize,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}/{}", self.base, S::as_str())
    }
}

impl<S: PageSize> fmt::Debug for PhysicalPage<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PhysicalPage<{}>({:#018X})", S::as_str(), self.base)
    }
}
