use crate::{PageSize, PhysicalAddress, PhysicalPage};
use core::fmt;
use core::marker::PhantomData;

/// A half-open physical range `[start, end)`.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct PhysicalRange {
    start: PhysicalAddress,
    end: PhysicalAddress,
}

impl PhysicalRange {
    /// Build `[start, end)`. An `end` below `start` yields an empty range at `start`.
    #[inline]
    #[must_use]
    pub const fn new(start: PhysicalAddress, end: PhysicalAddress) -> Self {
        let end = if end.as_u64() < start.as_u64() {
            start
        } else {
            end
        };
        Self { start, end }
    }

    #[inline]
    #[must_use]
    pub const fn start(&self) -> PhysicalAddress {
        self.start
    }

    #[inline]
    #[must_use]
    pub const fn end(&self) -> PhysicalAddress {
        self.end
    }

    #[inline]
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.end.as_u64() - self.start.as_u64()
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    #[must_use]
    pub const fn contains(&self, pa: PhysicalAddress) -> bool {
        pa.as_u64() >= self.start.as_u64() && pa.as_u64() < self.end.as_u64()
    }

    /// Number of whole, `S`-aligned pages inside the range.
    #[must_use]
    pub fn page_count<S: PageSize>(&self) -> u64 {
        self.pages::<S>().len() as u64
    }

    /// Iterate the whole, `S`-aligned pages inside the range in ascending order.
    ///
    /// Partial pages at either end are skipped.
    #[must_use]
    pub fn pages<S: PageSize>(&self) -> Pages<S> {
        let first = self.start.align_up::<S>().unwrap_or(self.end);
        let last = self.end.align_down::<S>();
        let count = last
            .checked_offset_from(first)
            .map_or(0, |bytes| bytes >> S::SHIFT);
        Pages {
            next: first.as_u64(),
            remaining: count,
            _phantom: PhantomData,
        }
    }
}

impl fmt::Debug for PhysicalRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}..{})", self.start, self.end)
    }
}

/// Iterator returned by [`PhysicalRange::pages`].
pub struct Pages<S: PageSize> {
    next: u64,
    remaining: u64,
    _phantom: PhantomData<S>,
}

impl<S: PageSize> Iterator for Pages<S> {
    type Item = PhysicalPage<S>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let page = PhysicalPage::from_addr(PhysicalAddress::new(self.next));
        self.remaining -= 1;
        self.next += S::SIZE;
        Some(page)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = usize::try_from(self.remaining).unwrap_or(usize::MAX);
        (n, Some(n))
    }
}

impl<S: PageSize> ExactSizeIterator for Pages<S> {}
