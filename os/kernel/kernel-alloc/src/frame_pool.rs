//! # Fixed-size Physical Frame Pool
//!
//! A [`FramePool`] hands out `S`-sized, `S`-aligned physical units from one
//! contiguous range. Free units form an intrusive LIFO list threaded through
//! the units themselves (see [`FreeList`]). Next to the list head the pool
//! keeps one bit per unit, set while the unit is handed out, so a unit
//! released twice is caught instead of being linked into the list again.
//! Both live under one spin lock.
//!
//! The same type backs both the 4 KiB [`Frame`](crate::Frame) pool and the
//! 2 MiB [`Superframe`](crate::Superframe) pool.
//!
//! ## Fill patterns
//!
//! Every unit handed out is overwritten with the *alloc fill* byte, every unit
//! returned with the *free fill* byte (the link word then lands in its first
//! eight bytes). Both fills run outside the lock: the unit being filled
//! belongs to nobody else at that point.
//!
//! ## Validation
//!
//! [`release`](FramePool::release) refuses addresses that are not
//! `S`-aligned, not inside the pool, or not currently allocated. Such a call
//! means the kernel's bookkeeping is already corrupt, so it panics.

use crate::config::FrameAllocatorConfig;
use crate::free_list::FreeList;
use alloc::boxed::Box;
use alloc::vec;
use kernel_memory_addresses::{PageSize, PhysicalAddress, PhysicalPage, PhysicalRange};
use kernel_sync::SpinLock;
use kernel_vmem::PhysMapper;
use log::{error, trace};

/// A pool of `S`-sized physical units.
pub struct FramePool<S: PageSize, M: PhysMapper> {
    /// Lowest unit; index 0.
    first: PhysicalPage<S>,
    /// Number of units covered, free or not.
    capacity: u64,
    units: SpinLock<Units>,
    mapper: M,
    alloc_fill: u8,
    free_fill: u8,
}

impl<S: PageSize, M: PhysMapper> FramePool<S, M> {
    /// Create a pool over every whole `S`-aligned unit inside `range` and
    /// release all of them into it, lowest address first.
    ///
    /// # Safety
    /// - `range` must be RAM, mapped writable through `mapper`.
    /// - The pool takes exclusive ownership of those bytes: nothing else may
    ///   read or write them except through units the pool hands out.
    pub unsafe fn new(
        name: &'static str,
        range: PhysicalRange,
        mapper: M,
        config: &FrameAllocatorConfig,
    ) -> Self {
        let mut units = range.pages::<S>();
        let capacity = units.len() as u64;
        let first = units
            .next()
            .unwrap_or_else(|| PhysicalPage::from_addr(range.start()));

        let pool = Self {
            first,
            capacity,
            units: SpinLock::new(name, Units::new(capacity)),
            mapper,
            alloc_fill: config.alloc_fill,
            free_fill: config.free_fill,
        };
        for index in 0..capacity {
            pool.release_index(index);
        }
        pool
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.units.name()
    }

    /// The bytes covered by this pool, `[first, first + capacity * S)`.
    #[must_use]
    pub fn range(&self) -> PhysicalRange {
        let start = self.first.base();
        let end = start
            .checked_add(self.capacity << S::SHIFT)
            .unwrap_or(start);
        PhysicalRange::new(start, end)
    }

    /// Number of units covered by the pool, free or not.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Number of units currently on the free-list.
    #[must_use]
    pub fn free_count(&self) -> u64 {
        self.units.with_lock(|units| units.free.len())
    }

    /// Whether `pa` lies inside the pool (alignment not checked).
    #[must_use]
    pub fn contains(&self, pa: PhysicalAddress) -> bool {
        self.range().contains(pa)
    }

    /// Pool-relative index of `unit`, or `None` if it belongs elsewhere.
    #[must_use]
    pub fn index_of(&self, unit: PhysicalPage<S>) -> Option<u64> {
        unit.index_from(self.first)
            .filter(|&index| index < self.capacity)
    }

    /// The unit with pool-relative `index`, or `None` if out of range.
    #[must_use]
    pub fn frame_at(&self, index: u64) -> Option<PhysicalPage<S>> {
        if index < self.capacity {
            self.first.checked_nth(index)
        } else {
            None
        }
    }

    /// Take one unit off the free-list.
    ///
    /// Returns `None` when the pool is exhausted; never blocks or retries.
    /// The unit comes back filled with the alloc fill byte.
    #[must_use]
    pub fn allocate(&self) -> Option<PhysicalPage<S>> {
        let index = self.units.with_lock(|units| {
            let index = unsafe { units.free.pop(&self.mapper, self.first) }?;
            units.mark_used(index);
            Some(index)
        })?;
        let unit = self.unit(index);

        // SAFETY: `unit` just left the free-list; this caller owns it exclusively.
        unsafe { self.mapper.page_bytes(unit) }.fill(self.alloc_fill);
        trace!("{}: allocated {unit}", self.name());
        Some(unit)
    }

    /// Return the unit starting at `pa` to the free-list.
    ///
    /// # Panics
    /// If `pa` is not `S`-aligned, lies outside the pool, or is not
    /// currently allocated (double release).
    pub fn release(&self, pa: impl Into<PhysicalAddress>) {
        let pa = pa.into();
        let index = self.checked_index(pa, "release");
        if !self.units.with_lock(|units| units.mark_free(index)) {
            error!("{}: release of {pa}: unit is already free", self.name());
            panic!("{}: release: {pa} is not allocated", self.name());
        }
        self.release_index(index);
        trace!("{}: released {}", self.name(), self.unit(index));
    }

    /// Map `pa` to its pool-relative index, treating anything that is not the
    /// base of one of our units as fatal.
    ///
    /// # Panics
    /// If `pa` is not `S`-aligned or lies outside the pool.
    #[must_use]
    pub fn checked_index(&self, pa: PhysicalAddress, op: &str) -> u64 {
        if !pa.is_aligned::<S>() {
            error!("{}: {op} of {pa}: not {}-aligned", self.name(), S::as_str());
            panic!("{}: {op}: {pa} is not {}-aligned", self.name(), S::as_str());
        }
        match self.index_of(PhysicalPage::from_addr(pa)) {
            Some(index) => index,
            None => {
                error!("{}: {op} of {pa}: outside {:?}", self.name(), self.range());
                panic!("{}: {op}: {pa} is outside {:?}", self.name(), self.range());
            }
        }
    }

    fn release_index(&self, index: u64) {
        let unit = self.unit(index);

        // SAFETY: `unit` is inside the pool and, by the caller's ownership of
        // it, referenced by nobody else.
        unsafe { self.mapper.page_bytes(unit) }.fill(self.free_fill);
        self.units
            .with_lock(|units| unsafe { units.free.push(&self.mapper, self.first, index) });
    }

    fn unit(&self, index: u64) -> PhysicalPage<S> {
        match self.frame_at(index) {
            Some(unit) => unit,
            None => unreachable!("{}: index {index} out of range", self.name()),
        }
    }
}

/// Lock-protected pool state.
struct Units {
    free: FreeList,
    /// One bit per unit, set while it is handed out.
    used: Box<[u64]>,
}

impl Units {
    #[allow(clippy::cast_possible_truncation)]
    fn new(capacity: u64) -> Self {
        Self {
            free: FreeList::new(),
            used: vec![0; capacity.div_ceil(64) as usize].into_boxed_slice(),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    const fn locate(index: u64) -> (usize, u64) {
        ((index / 64) as usize, 1 << (index % 64))
    }

    fn mark_used(&mut self, index: u64) {
        let (word, bit) = Self::locate(index);
        debug_assert_eq!(self.used[word] & bit, 0, "unit {index} was on the free-list twice");
        self.used[word] |= bit;
    }

    /// Clear the bit of `index`; `false` if it was already clear.
    fn mark_free(&mut self, index: u64) -> bool {
        let (word, bit) = Self::locate(index);
        let was_used = self.used[word] & bit != 0;
        self.used[word] &= !bit;
        was_used
    }
}

impl<S: PageSize, M: PhysMapper> core::fmt::Debug for FramePool<S, M> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FramePool")
            .field("name", &self.name())
            .field("size", &S::as_str())
            .field("range", &self.range())
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::phys_mapper::HhdmPhysMapper;
    use crate::test_arena::{Arena, FAKE_BASE};
    use kernel_memory_addresses::{Size2M, Size4K};

    fn pool<S: PageSize>(arena: &Arena) -> FramePool<S, HhdmPhysMapper> {
        unsafe {
            FramePool::new(
                "test-pool",
                arena.range(),
                arena.mapper(),
                &FrameAllocatorConfig::default(),
            )
        }
    }

    #[test]
    fn starts_full_and_drains() {
        let arena = Arena::frames(4);
        let pool = pool::<Size4K>(&arena);
        assert_eq!(pool.capacity(), 4);
        assert_eq!(pool.free_count(), 4);

        let frames: Vec<_> = core::iter::from_fn(|| pool.allocate()).collect();
        assert_eq!(frames.len(), 4);
        assert_eq!(pool.free_count(), 0);
        assert!(pool.allocate().is_none());

        for f in &frames {
            assert!(pool.contains(f.base()));
        }
        let mut sorted = frames.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), 4, "no frame handed out twice");

        for f in frames {
            pool.release(f);
        }
        assert_eq!(pool.free_count(), 4);
    }

    #[test]
    fn lifo_reuse() {
        let arena = Arena::frames(4);
        let pool = pool::<Size4K>(&arena);
        let a = pool.allocate().expect("frame");
        pool.release(a);
        assert_eq!(pool.allocate(), Some(a));
    }

    #[test]
    fn fill_patterns() {
        let arena = Arena::frames(2);
        let pool = pool::<Size4K>(&arena);

        let a = pool.allocate().expect("frame");
        assert!(arena.bytes(a).iter().all(|&b| b == 0x05));

        pool.release(a);
        assert!(arena.bytes(a)[8..].iter().all(|&b| b == 0x01));
    }

    #[test]
    fn index_conversions() {
        let arena = Arena::frames(4);
        let pool = pool::<Size4K>(&arena);
        let third = pool.frame_at(2).expect("in range");
        assert_eq!(third.base().as_u64(), FAKE_BASE + 2 * 4096);
        assert_eq!(pool.index_of(third), Some(2));
        assert_eq!(pool.frame_at(4), None);
        assert_eq!(
            pool.index_of(PhysicalPage::from_addr(PhysicalAddress::new(FAKE_BASE + 4 * 4096))),
            None
        );
    }

    #[test]
    fn superframe_units() {
        let arena = Arena::superframes(2);
        let pool = pool::<Size2M>(&arena);
        assert_eq!(pool.capacity(), 2);
        let s = pool.allocate().expect("superframe");
        assert!(s.base().is_aligned::<Size2M>());
        assert!(arena.bytes(s).iter().all(|&b| b == 0x05));
    }

    #[test]
    #[should_panic(expected = "is not allocated")]
    fn double_release_panics() {
        let arena = Arena::superframes(2);
        let pool = pool::<Size2M>(&arena);
        let s = pool.allocate().expect("superframe");
        pool.release(s);
        pool.release(s);
    }

    #[test]
    #[should_panic(expected = "is not allocated")]
    fn release_of_never_allocated_unit_panics() {
        let arena = Arena::frames(2);
        let pool = pool::<Size4K>(&arena);
        pool.release(PhysicalAddress::new(FAKE_BASE));
    }

    #[test]
    fn rejected_release_leaves_pool_intact() {
        let arena = Arena::frames(2);
        let pool = pool::<Size4K>(&arena);
        let a = pool.allocate().expect("frame");
        pool.release(a);
        let again = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| pool.release(a)));
        assert!(again.is_err());
        assert_eq!(pool.free_count(), 2);
        let x = pool.allocate().expect("frame");
        let y = pool.allocate().expect("frame");
        assert_ne!(x, y);
    }

    #[test]
    #[should_panic(expected = "not 4K-aligned")]
    fn release_misaligned_panics() {
        let arena = Arena::frames(2);
        let pool = pool::<Size4K>(&arena);
        pool.release(PhysicalAddress::new(FAKE_BASE + 8));
    }

    #[test]
    #[should_panic(expected = "is outside")]
    fn release_out_of_range_panics() {
        let arena = Arena::frames(2);
        let pool = pool::<Size4K>(&arena);
        pool.release(PhysicalAddress::new(FAKE_BASE + 2 * 4096));
    }
}
