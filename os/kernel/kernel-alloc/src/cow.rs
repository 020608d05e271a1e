//! # Copy-on-Write
//!
//! Fork does not copy user memory. Instead [`share_cow`](PhysicalMemory::share_cow)
//! write-protects each writable leaf, tags it COW and adds the child as an
//! owner of the frame. The first store through either mapping then faults
//! into [`resolve_cow_fault`](PhysicalMemory::resolve_cow_fault):
//!
//! ```text
//!             owners of the faulting frame
//!                 │
//!        ┌────────┴─────────┐
//!      == 1               >  1
//!   sole owner          shared
//!   upgrade entry       alloc + copy + retarget,
//!   in place            then drop our old reference
//!        └────────┬─────────┘
//!          COW=0, W=1
//! ```
//!
//! The owner count is read under the frame's bucket lock while the faulting
//! entry still holds its reference, so the frame cannot be released or
//! written by a co-owner before the copy has completed. The old reference is
//! dropped through [`free_frame`](PhysicalMemory::free_frame) afterwards,
//! which releases the frame if every other owner let go in the meantime.
//!
//! No bucket lock is held while a pool lock is taken, and vice versa.

use crate::error::OutOfMemory;
use crate::memory::PhysicalMemory;
use crate::Frame;
use core::cmp::Ordering;
use kernel_vmem::{LeafEntry, PhysMapper};
use log::{debug, error, warn};

impl<M: PhysMapper> PhysicalMemory<M> {
    /// Fork-time sharing of one leaf mapping.
    ///
    /// A writable (or already COW) entry loses `W` and gains `COW`; a
    /// read-only entry is shared as-is. Either way the frame gains an owner.
    /// The caller installs a copy of the updated `entry` in the child.
    ///
    /// # Panics
    /// If the entry does not point at a normal frame that is currently
    /// allocated.
    pub fn share_cow<E: LeafEntry + ?Sized>(&self, entry: &mut E) -> Frame {
        let frame = entry.frame();
        if entry.is_writable() || entry.is_cow() {
            entry.set_writable(false);
            entry.set_cow(true);
        }
        self.mark_shared(frame);
        frame
    }

    /// Resolve a store fault on a copy-on-write `entry`.
    ///
    /// On success the entry is writable, no longer COW, and maps a frame the
    /// faulting address space owns alone. Flags other than `W`/`COW` are kept.
    ///
    /// # Errors
    /// [`OutOfMemory`] if a private copy was needed and no frame was free.
    /// The entry and every reference count are left as they were.
    ///
    /// # Panics
    /// - If `entry` is not marked COW.
    /// - If it does not point at a normal frame.
    /// - If that frame has no owners (the entry outlived its frame).
    pub fn resolve_cow_fault<E: LeafEntry + ?Sized>(
        &self,
        entry: &mut E,
    ) -> Result<(), OutOfMemory> {
        let old = entry.frame();
        if !entry.is_cow() {
            error!("cow fault on {old}: entry is not copy-on-write");
            panic!("resolve_cow_fault: entry for {old} is not copy-on-write");
        }

        let owners = self.refcounts.get(self.index(old));
        match owners.cmp(&1) {
            Ordering::Greater => {
                let Some(new) = self.alloc_frame() else {
                    warn!("cow fault on {old}: out of memory, {owners} owners remain");
                    return Err(OutOfMemory);
                };
                self.copy_frame(old, new);
                entry.retarget(new.base());
                self.free_frame(old);
                debug!("cow fault: copied {old} -> {new}");
            }
            Ordering::Equal => {
                debug!("cow fault: {old} has a single owner, upgrading in place");
            }
            Ordering::Less => {
                error!("cow fault on {old}: reference count is {owners}");
                panic!("resolve_cow_fault: {old} is mapped but has {owners} owners");
            }
        }

        entry.set_cow(false);
        entry.set_writable(true);
        Ok(())
    }

    fn copy_frame(&self, from: Frame, to: Frame) {
        debug_assert_ne!(from, to);
        // SAFETY: both frames belong to the normal pool and are distinct;
        // `from` is pinned by the caller's reference, `to` was just allocated.
        let (src, dst) = unsafe { (self.mapper.page_bytes(from), self.mapper.page_bytes(to)) };
        dst.copy_from_slice(src);
    }
}
