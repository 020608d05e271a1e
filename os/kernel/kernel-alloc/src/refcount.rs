//! # Striped Frame Reference Counts
//!
//! One signed counter per normal frame, split across [`REFCOUNT_BUCKETS`]
//! spin-locked stripes. Frame index `i` lives in bucket `i % BUCKETS` at slot
//! `i / BUCKETS`, so each lock guards exactly the counters it owns and
//! neighbouring frames (a freshly forked address space touches them in runs)
//! land on different locks.
//!
//! ```text
//!  index:   0   1   2  ..  60  61  62 ..
//!  bucket:  0   1   2  ..  60   0   1 ..
//!  slot:    0   0   0  ..   0   1   1 ..
//! ```
//!
//! Each operation takes one bucket lock for O(1) work and drops it before
//! returning; no caller ever holds two.

use alloc::boxed::Box;
use alloc::vec;
use kernel_info::memory::REFCOUNT_BUCKETS;
use kernel_sync::SpinLock;
use log::error;

/// Per-frame reference counts for the normal frame pool.
pub struct RefCountTable {
    buckets: [SpinLock<Box<[i32]>>; REFCOUNT_BUCKETS],
    frames: u64,
}

impl RefCountTable {
    /// A zeroed table for frame indices `0..frames`.
    #[must_use]
    pub fn new(frames: u64) -> Self {
        let buckets = core::array::from_fn(|bucket| {
            let slots = slots_in_bucket(frames, bucket as u64);
            SpinLock::new("refcount", vec![0i32; slots].into_boxed_slice())
        });
        Self { buckets, frames }
    }

    /// Number of frame indices covered.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.frames
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.frames == 0
    }

    /// Add one reference to frame `index`.
    ///
    /// # Panics
    /// If `index` is out of range or the count would overflow.
    pub fn increment(&self, index: u64) {
        self.update(index, "increment", |count| {
            *count = match count.checked_add(1) {
                Some(next) => next,
                None => overflow(index),
            };
            *count
        });
    }

    /// Add an owner to frame `index`, which must already have one.
    ///
    /// This is the fork path: a frame sitting on the free-list has no owner
    /// to share it with, and counting it anyway would let the next free push
    /// it onto the list a second time.
    ///
    /// # Panics
    /// If `index` is out of range, the frame is not in use, or the count
    /// would overflow.
    pub fn share(&self, index: u64) {
        let previous = self.update(index, "share", |count| {
            let previous = *count;
            if previous > 0 {
                *count = match count.checked_add(1) {
                    Some(next) => next,
                    None => overflow(index),
                };
            }
            previous
        });
        if previous <= 0 {
            error!("refcount share: frame index {index} has {previous} owners");
            panic!("refcount share: frame index {index} is not in use");
        }
    }

    /// Drop one reference to frame `index` and return the new count.
    ///
    /// `0` means the caller just released the last reference; a negative
    /// result is a bookkeeping bug the caller must treat as fatal.
    ///
    /// # Panics
    /// If `index` is out of range.
    #[must_use]
    pub fn decrement(&self, index: u64) -> i32 {
        self.update(index, "decrement", |count| {
            *count -= 1;
            *count
        })
    }

    /// Read the count of frame `index` under its bucket lock.
    ///
    /// # Panics
    /// If `index` is out of range.
    #[must_use]
    pub fn get(&self, index: u64) -> i32 {
        self.update(index, "get", |count| *count)
    }

    fn update(&self, index: u64, op: &str, f: impl FnOnce(&mut i32) -> i32) -> i32 {
        if index >= self.frames {
            error!("refcount {op}: frame index {index} >= {}", self.frames);
            panic!("refcount {op}: frame index {index} out of range");
        }
        let (bucket, slot) = locate(index);
        self.buckets[bucket].with_lock(|counts| f(&mut counts[slot]))
    }
}

impl core::fmt::Debug for RefCountTable {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RefCountTable")
            .field("frames", &self.frames)
            .field("buckets", &REFCOUNT_BUCKETS)
            .finish_non_exhaustive()
    }
}

#[allow(clippy::cast_possible_truncation)]
const fn locate(index: u64) -> (usize, usize) {
    let buckets = REFCOUNT_BUCKETS as u64;
    ((index % buckets) as usize, (index / buckets) as usize)
}

/// How many of the indices `0..frames` fall into `bucket`.
#[allow(clippy::cast_possible_truncation)]
const fn slots_in_bucket(frames: u64, bucket: u64) -> usize {
    if bucket >= frames {
        0
    } else {
        ((frames - 1 - bucket) / REFCOUNT_BUCKETS as u64 + 1) as usize
    }
}

#[cold]
fn overflow(index: u64) -> ! {
    error!("refcount: frame index {index} overflows");
    panic!("refcount: frame index {index} overflows");
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn bucket_slots_cover_every_index_once() {
        for frames in [0u64, 1, 60, 61, 62, 122, 1000] {
            let total: usize = (0..REFCOUNT_BUCKETS as u64)
                .map(|b| slots_in_bucket(frames, b))
                .sum();
            assert_eq!(total as u64, frames, "frames = {frames}");
        }
    }

    #[test]
    fn locate_strides_buckets() {
        assert_eq!(locate(0), (0, 0));
        assert_eq!(locate(60), (60, 0));
        assert_eq!(locate(61), (0, 1));
        assert_eq!(locate(125), (3, 2));
    }

    #[test]
    fn starts_at_zero() {
        let table = RefCountTable::new(200);
        assert_eq!(table.len(), 200);
        assert!((0..200).all(|i| table.get(i) == 0));
    }

    #[test]
    fn increment_decrement_pair() {
        let table = RefCountTable::new(200);
        table.increment(199);
        table.increment(199);
        assert_eq!(table.get(199), 2);
        assert_eq!(table.decrement(199), 1);
        assert_eq!(table.decrement(199), 0);
        // neighbours sharing the bucket are untouched
        assert_eq!(table.get(199 - 61), 0);
    }

    #[test]
    fn share_adds_to_a_live_frame() {
        let table = RefCountTable::new(4);
        table.increment(2);
        table.share(2);
        table.share(2);
        assert_eq!(table.get(2), 3);
    }

    #[test]
    #[should_panic(expected = "is not in use")]
    fn share_of_unowned_frame_panics() {
        let table = RefCountTable::new(4);
        table.share(1);
    }

    #[test]
    fn failed_share_leaves_count_alone() {
        let table = RefCountTable::new(4);
        let shared = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| table.share(3)));
        assert!(shared.is_err());
        assert_eq!(table.get(3), 0);
    }

    #[test]
    fn decrement_below_zero_is_reported() {
        let table = RefCountTable::new(4);
        assert_eq!(table.decrement(3), -1);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn out_of_range_index_panics() {
        let table = RefCountTable::new(4);
        table.increment(4);
    }

    #[test]
    fn concurrent_increments_on_one_bucket() {
        let table = RefCountTable::new(1000);
        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..1000 {
                        table.increment(7);
                        table.increment(7 + 61);
                    }
                });
            }
        });
        assert_eq!(table.get(7), 4000);
        assert_eq!(table.get(7 + 61), 4000);
    }
}
