//! # Kernel Memory Configuration
//!
//! Compile-time layout constants and allocator defaults shared by the memory
//! management crates. This is the single source of truth for frame sizes,
//! the superframe reservation, fill patterns, and the refcount striping.
//!
//! ## Physical Memory Layout
//!
//! ```text
//! PHYS_BASE   ┌─────────────────────────────────┐ 0x8000_0000
//!             │       Kernel Image              │
//!             │   (Text, Data, BSS)             │
//! kernel end  ├─────────────────────────────────┤
//!             │    Normal frame pool (4 KiB)    │
//!             │  (refcounted, COW-shareable)    │
//! super base  ├─────────────────────────────────┤ PHYS_TOP - SUPERFRAME_COUNT * 2 MiB
//!             │    Superframe pool (2 MiB)      │
//!             │  (exclusively owned)            │
//! PHYS_TOP    └─────────────────────────────────┘ 0x8800_0000
//! ```
//!
//! Every byte below the superframe boundary belongs to the normal pool; the
//! two pools never exchange memory.
//!
//! ## Configuration Management
//!
//! All values are `const` and validated by compile-time assertions. Runtime
//! overrides (for tests or alternative boards) are expressed through the
//! allocator's own configuration type, which defaults to these constants.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod memory;
