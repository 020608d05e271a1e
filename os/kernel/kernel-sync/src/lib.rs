//! # Kernel synchronization primitives
//!
//! Short-held, non-sleeping locks for kernel bookkeeping. Every lock carries a
//! static name so that lock-related panics and logs can say *which* lock
//! misbehaved (`"kmem"`, `"superframes"`, `"refcount"` ...).

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod raw_spin;
mod spin_lock;
mod sync_once_cell;

pub use raw_spin::RawSpin;
pub use spin_lock::{SpinLock, SpinLockGuard};
pub use sync_once_cell::SyncOnceCell;
