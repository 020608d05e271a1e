//! # Physical Memory Context
//!
//! [`PhysicalMemory`] owns everything the kernel knows about RAM:
//!
//! - the normal [`FramePool`] of 4 KiB frames,
//! - the [`SuperframePool`] of 2 MiB superframes carved off the top,
//! - the [`RefCountTable`] covering every normal frame.
//!
//! Normal frames are refcounted: [`alloc_frame`](PhysicalMemory::alloc_frame)
//! hands one out at count 1, [`mark_shared`](PhysicalMemory::mark_shared)
//! adds an owner, and [`free_frame`](PhysicalMemory::free_frame) drops one,
//! returning the frame to the pool when the last owner is gone. Superframes
//! are plain allocate/release.
//!
//! The copy-on-write side lives in [`crate::cow`].

use crate::config::FrameAllocatorConfig;
use crate::error::InitError;
use crate::frame_pool::FramePool;
use crate::layout::MemoryLayout;
use crate::refcount::RefCountTable;
use crate::{Frame, Superframe};
use kernel_info::memory::{FRAME_SIZE, SUPERFRAME_SIZE};
use kernel_memory_addresses::{PhysicalAddress, PhysicalRange, Size2M, Size4K};
use kernel_vmem::PhysMapper;
use log::{error, info, trace};

/// The pool of normal 4 KiB frames.
pub type NormalPool<M> = FramePool<Size4K, M>;

/// The pool of 2 MiB superframes.
pub type SuperframePool<M> = FramePool<Size2M, M>;

/// Frame pools plus reference counts for one physical range.
///
/// `Sync` whenever `M` is, so a single instance can serve every CPU.
#[derive(Debug)]
pub struct PhysicalMemory<M: PhysMapper> {
    pub(crate) frames: NormalPool<M>,
    pub(crate) superframes: SuperframePool<M>,
    pub(crate) refcounts: RefCountTable,
    pub(crate) mapper: M,
}

/// Snapshot of the pools' occupancy.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct MemoryStats {
    pub free_frames: u64,
    pub total_frames: u64,
    pub free_superframes: u64,
    pub total_superframes: u64,
}

impl MemoryStats {
    /// Free bytes across both pools.
    #[must_use]
    pub const fn free_bytes(&self) -> u64 {
        self.free_frames * FRAME_SIZE + self.free_superframes * SUPERFRAME_SIZE
    }
}

impl<M: PhysMapper + Clone> PhysicalMemory<M> {
    /// Carve `range` into the two pools and seed them with every unit.
    ///
    /// Every frame is written once (free fill plus list link) before this
    /// returns.
    ///
    /// # Errors
    /// [`InitError::EmptyRange`] / [`InitError::RangeTooSmall`] when `range`
    /// cannot hold the configured superframes plus at least one frame.
    ///
    /// # Safety
    /// - `range` must be RAM that is mapped writable through `mapper`.
    /// - Nothing else may use those bytes for as long as this value lives,
    ///   except through frames it hands out.
    pub unsafe fn new(
        range: PhysicalRange,
        mapper: M,
        config: FrameAllocatorConfig,
    ) -> Result<Self, InitError> {
        let layout = MemoryLayout::carve(range, config.superframes)?;

        let frames =
            unsafe { FramePool::new("kmem", layout.frames, mapper.clone(), &config) };
        let superframes =
            unsafe { FramePool::new("superframes", layout.superframes, mapper.clone(), &config) };
        let refcounts = RefCountTable::new(frames.capacity());

        info!(
            "physical memory: {} frames in {:?}, {} superframes in {:?}",
            frames.capacity(),
            frames.range(),
            superframes.capacity(),
            superframes.range()
        );

        Ok(Self {
            frames,
            superframes,
            refcounts,
            mapper,
        })
    }
}

impl<M: PhysMapper> PhysicalMemory<M> {
    /// Allocate a normal frame with reference count 1.
    ///
    /// Returns `None` when the frame pool is exhausted.
    #[must_use]
    pub fn alloc_frame(&self) -> Option<Frame> {
        let frame = self.frames.allocate()?;
        self.refcounts.increment(self.index(frame));
        debug_assert_eq!(self.refcount(frame), 1, "fresh frame {frame} was still referenced");
        Some(frame)
    }

    /// Drop one reference to the frame at `pa`; the last one returns it to
    /// the pool.
    ///
    /// # Panics
    /// - If `pa` is not the base of a normal frame (misaligned, outside the
    ///   pool, or a superframe).
    /// - If the frame had no references left (double free).
    pub fn free_frame(&self, pa: impl Into<PhysicalAddress>) {
        let pa = pa.into();
        let index = self.frames.checked_index(pa, "free_frame");
        match self.refcounts.decrement(index) {
            0 => self.frames.release(pa),
            remaining if remaining > 0 => {
                trace!("free_frame: {pa} still has {remaining} owners");
            }
            remaining => {
                error!("free_frame: {pa} reference count dropped to {remaining}");
                panic!("free_frame: {pa} freed more often than referenced ({remaining})");
            }
        }
    }

    /// Allocate a 2 MiB superframe. Superframes are not refcounted.
    #[must_use]
    pub fn alloc_superframe(&self) -> Option<Superframe> {
        self.superframes.allocate()
    }

    /// Return a superframe.
    ///
    /// # Panics
    /// If `pa` is not the base of one of our superframes.
    pub fn free_superframe(&self, pa: impl Into<PhysicalAddress>) {
        self.superframes.release(pa);
    }

    /// Add an owner to `frame`, typically a forked child's mapping.
    ///
    /// # Panics
    /// If `frame` is not a normal frame or is not currently allocated.
    pub fn mark_shared(&self, frame: Frame) {
        self.refcounts.share(self.index(frame));
    }

    /// [`mark_shared`](Self::mark_shared) by frame index.
    ///
    /// # Panics
    /// If `index` is out of range or its frame is not currently allocated.
    pub fn mark_shared_index(&self, index: u64) {
        self.refcounts.share(index);
    }

    /// Current number of owners of `frame`.
    ///
    /// # Panics
    /// If `frame` is not a normal frame.
    #[must_use]
    pub fn refcount(&self, frame: Frame) -> i32 {
        self.refcounts.get(self.index(frame))
    }

    /// Index of `frame` in the normal pool, `None` for foreign addresses.
    #[must_use]
    pub fn frame_index(&self, frame: Frame) -> Option<u64> {
        self.frames.index_of(frame)
    }

    /// The normal frame with the given index.
    #[must_use]
    pub fn frame_at(&self, index: u64) -> Option<Frame> {
        self.frames.frame_at(index)
    }

    /// The normal frame pool.
    #[must_use]
    pub const fn frames(&self) -> &NormalPool<M> {
        &self.frames
    }

    /// The superframe pool.
    #[must_use]
    pub const fn superframes(&self) -> &SuperframePool<M> {
        &self.superframes
    }

    /// Occupancy of both pools. Each pool is read under its own lock, so the
    /// two halves may come from slightly different instants.
    #[must_use]
    pub fn stats(&self) -> MemoryStats {
        MemoryStats {
            free_frames: self.frames.free_count(),
            total_frames: self.frames.capacity(),
            free_superframes: self.superframes.free_count(),
            total_superframes: self.superframes.capacity(),
        }
    }

    pub(crate) fn index(&self, frame: Frame) -> u64 {
        self.frames.checked_index(frame.base(), "frame lookup")
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_arena::Arena;

    #[test]
    fn alloc_starts_at_one() {
        let arena = Arena::frames(4);
        let mem = arena.frames_only();
        let a = mem.alloc_frame().expect("frame");
        assert_eq!(mem.refcount(a), 1);
        assert_eq!(mem.stats().free_frames, 3);
    }

    #[test]
    fn shared_frame_survives_one_free() {
        let arena = Arena::frames(4);
        let mem = arena.frames_only();
        let a = mem.alloc_frame().expect("frame");
        mem.mark_shared(a);
        mem.free_frame(a);
        assert_eq!(mem.refcount(a), 1);
        assert_eq!(mem.stats().free_frames, 3);
        mem.free_frame(a);
        assert_eq!(mem.refcount(a), 0);
        assert_eq!(mem.stats().free_frames, 4);
    }

    #[test]
    fn free_then_realloc_is_count_one() {
        let arena = Arena::frames(1);
        let mem = arena.frames_only();
        let a = mem.alloc_frame().expect("frame");
        mem.mark_shared_index(mem.frame_index(a).expect("ours"));
        mem.free_frame(a);
        mem.free_frame(a);
        let b = mem.alloc_frame().expect("frame");
        assert_eq!(a, b);
        assert_eq!(mem.refcount(b), 1);
    }

    #[test]
    fn stats_count_both_pools() {
        let arena = Arena::superframes(2);
        let mem = arena.memory(FrameAllocatorConfig::default().with_superframes(1));
        let stats = mem.stats();
        assert_eq!(stats.total_superframes, 1);
        assert_eq!(stats.total_frames, 512);
        assert_eq!(stats.free_bytes(), 512 * 4096 + 2 * 1024 * 1024);

        let s = mem.alloc_superframe().expect("superframe");
        assert_eq!(mem.stats().free_superframes, 0);
        assert!(mem.alloc_superframe().is_none());
        mem.free_superframe(s);
        assert_eq!(mem.stats().free_superframes, 1);
    }

    #[test]
    #[should_panic(expected = "is not in use")]
    fn sharing_a_free_frame_panics() {
        let arena = Arena::frames(2);
        let mem = arena.frames_only();
        let a = mem.alloc_frame().expect("frame");
        mem.free_frame(a);
        mem.mark_shared(a);
    }

    #[test]
    #[should_panic(expected = "freed more often than referenced")]
    fn double_free_panics() {
        let arena = Arena::frames(2);
        let mem = arena.frames_only();
        let a = mem.alloc_frame().expect("frame");
        mem.free_frame(a);
        mem.free_frame(a);
    }
}
