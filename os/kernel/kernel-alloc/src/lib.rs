//! # Kernel Physical Memory Allocation
//!
//! This crate owns the kernel's physical RAM: it hands out 4 KiB frames and
//! 2 MiB superframes, counts how many address spaces map each frame, and
//! resolves copy-on-write faults after `fork`.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │            Copy-on-Write Fault Resolver             │
//! │    • share_cow at fork: W→0, COW→1, owner+1         │
//! │    • resolve_cow_fault: upgrade or private copy     │
//! └──────────────┬───────────────────────┬──────────────┘
//!                │                       │
//! ┌──────────────▼────────────┐ ┌────────▼──────────────┐
//! │   Reference-Count Table   │ │   Physical Mapper     │
//! │  • one i32 per frame      │ │  • HHDM: offset + pa  │
//! │  • 61 striped spin locks  │ │  • fills, links, copy │
//! └──────────────┬────────────┘ └───────────────────────┘
//!                │
//! ┌──────────────▼──────────────────────────────────────┐
//! │        Frame Pool (4K)      │  Superframe Pool (2M) │
//! │  • intrusive LIFO free-list │  • top N × 2 MiB      │
//! │  • refcount-gated release   │  • not refcounted     │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Core Components
//!
//! ### Frame pools ([`frame_pool`])
//!
//! A [`FramePool`] manages one contiguous run of equally sized units:
//! * **Intrusive list**: a free unit stores the index of the next free unit
//!   in its own first eight bytes
//! * **In-use bits**: one bit per unit catches a unit released twice
//! * **One lock per pool**: list head and in-use bits, nothing else
//! * **Fill patterns**: `0x05` over every unit handed out, `0x01` over every
//!   unit returned, so stale reads are recognisable in a dump
//!
//! ### Reference counts ([`refcount`])
//!
//! [`RefCountTable`] keeps one signed counter per normal frame, striped over
//! a prime number of spin locks so concurrent forks rarely contend.
//!
//! ### Copy-on-write ([`cow`])
//!
//! [`PhysicalMemory::share_cow`] and [`PhysicalMemory::resolve_cow_fault`]
//! implement the fork/fault protocol on top of any
//! [`LeafEntry`](kernel_vmem::LeafEntry).
//!
//! ### Context and global access ([`memory`], [`global`])
//!
//! [`PhysicalMemory`] bundles the pools and the table for one physical
//! range. The kernel keeps a single instance in [`global`]; tests build
//! private ones over a heap arena.
//!
//! ## Usage Patterns
//!
//! ```rust,no_run
//! use kernel_alloc::{FrameAllocatorConfig, HhdmPhysMapper, PhysicalMemory};
//! use kernel_info::memory::{PHYS_BASE, PHYS_TOP};
//! use kernel_memory_addresses::PhysicalRange;
//! use kernel_vmem::{LeafEntry, PageEntryBits, PageTableEntry};
//!
//! let memory = unsafe {
//!     PhysicalMemory::new(
//!         PhysicalRange::new(PHYS_BASE, PHYS_TOP),
//!         HhdmPhysMapper::kernel(),
//!         FrameAllocatorConfig::default(),
//!     )
//! }
//! .expect("usable RAM");
//!
//! // fork: share the parent's page with the child
//! let frame = memory.alloc_frame().expect("memory");
//! let mut parent = PageTableEntry::make_4k(frame, PageEntryBits::new_user_rw());
//! memory.share_cow(&mut parent);
//! let mut child = parent;
//!
//! // child writes: store fault
//! if child.is_cow_fault() {
//!     memory.resolve_cow_fault(&mut child).expect("memory");
//! }
//! ```
//!
//! ## Concurrency
//!
//! Every lock is a short spin lock around O(1) work; frame fills and copies
//! happen outside all locks. No path holds a pool lock and a refcount lock at
//! the same time, and none holds two refcount locks.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

extern crate alloc;

pub mod config;
pub mod cow;
pub mod error;
pub mod frame_pool;
mod free_list;
pub mod global;
pub mod layout;
pub mod memory;
pub mod phys_mapper;
pub mod refcount;

#[cfg(test)]
mod test_arena;

use kernel_memory_addresses::{PhysicalPage, Size2M, Size4K};

pub use crate::config::FrameAllocatorConfig;
pub use crate::error::{InitError, OutOfMemory};
pub use crate::frame_pool::FramePool;
pub use crate::layout::MemoryLayout;
pub use crate::memory::{MemoryStats, NormalPool, PhysicalMemory, SuperframePool};
pub use crate::phys_mapper::HhdmPhysMapper;
pub use crate::refcount::RefCountTable;

/// A 4 KiB normal frame.
pub type Frame = PhysicalPage<Size4K>;

/// A 2 MiB superframe.
pub type Superframe = PhysicalPage<Size2M>;
