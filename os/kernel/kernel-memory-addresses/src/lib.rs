//! # Physical Memory Address Types
//!
//! Strongly typed wrappers for physical addresses, page-aligned physical page
//! bases and half-open physical ranges, as used by the frame allocators.
//!
//! | Type | Generic | Description |
//! |------|---------|-------------|
//! | [`PhysicalAddress`] | – | A raw 64-bit physical address (RAM or MMIO). |
//! | [`PhysicalPage<S>`] | [`S: PageSize`](PageSize) | The aligned base of a physical page of size `S`. |
//! | [`PhysicalRange`] | – | A half-open range `[start, end)` of physical memory. |
//!
//! ## Page Sizes
//!
//! - [`Size4K`]: 4 KiB frames, the allocation unit of the normal pool.
//! - [`Size2M`]: 2 MiB superframes (Sv39 megapages / x86-64 large pages).
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let pa = PhysicalAddress::new(0x8020_1234);
//! let page = pa.page::<Size4K>();
//! assert_eq!(page.base().as_u64(), 0x8020_1000);
//! assert_eq!(pa.offset::<Size4K>(), 0x234);
//! assert!(!pa.is_aligned::<Size4K>());
//! ```
//!
//! All types are `#[repr(transparent)]` where they wrap a single `u64`, and all
//! alignment helpers are `const fn`.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(clippy::inline_always)]

mod page_size;
mod physical_address;
mod physical_page;
mod physical_range;

pub use page_size::{PageSize, Size2M, Size4K};
pub use physical_address::PhysicalAddress;
pub use physical_page::PhysicalPage;
pub use physical_range::{Pages, PhysicalRange};
