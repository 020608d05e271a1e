//! Boot-time split of the physical range into normal frames and superframes.
//!
//! ```text
//! start                                     super_base              end
//!   │  ░ │ 4K │ 4K │ ... │ 4K │ 4K │ ░░░░░ │   2M   │ ... │   2M   │ ░ │
//!   └─┬──┘                       └───┬───┘ └─────────┬─────────────┘ └┬┘
//!  align-up                     slack below    N superframes    align-down
//!  to 4K                        super_base                         to 2M
//! ```
//!
//! `super_base = align_down(end, 2M) - N * 2M`. Everything from
//! `align_up(start, 4K)` up to `super_base` becomes normal frames. With no
//! superframes configured the normal pool runs all the way to `end`.

use crate::error::InitError;
use kernel_info::memory::SUPERFRAME_SIZE;
use kernel_memory_addresses::{PhysicalAddress, PhysicalRange, Size2M, Size4K};

/// Where the two pools live inside the boot range.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct MemoryLayout {
    /// 4 KiB frames (refcounted).
    pub frames: PhysicalRange,
    /// 2 MiB superframes (not refcounted).
    pub superframes: PhysicalRange,
}

impl MemoryLayout {
    /// Carve `superframes` 2 MiB units off the top of `range`.
    ///
    /// # Errors
    /// - [`InitError::EmptyRange`] if `range` is empty.
    /// - [`InitError::RangeTooSmall`] if the reservation does not fit, or
    ///   leaves no room for a single normal frame.
    pub fn carve(range: PhysicalRange, superframes: usize) -> Result<Self, InitError> {
        let (start, end) = (range.start(), range.end());
        if range.is_empty() {
            return Err(InitError::EmptyRange { start, end });
        }
        let too_small = InitError::RangeTooSmall {
            start,
            end,
            superframes,
        };

        let super_base = if superframes == 0 {
            end
        } else {
            let reserve = (superframes as u64)
                .checked_mul(SUPERFRAME_SIZE)
                .ok_or(too_small)?;
            end.align_down::<Size2M>()
                .as_u64()
                .checked_sub(reserve)
                .map(PhysicalAddress::new)
                .ok_or(too_small)?
        };
        let normal_base = start.align_up::<Size4K>().ok_or(too_small)?;
        if super_base.as_u64() < normal_base.as_u64() {
            return Err(too_small);
        }

        let layout = Self {
            frames: PhysicalRange::new(normal_base, super_base),
            superframes: PhysicalRange::new(
                super_base,
                super_base + (superframes as u64) * SUPERFRAME_SIZE,
            ),
        };
        if layout.frames.page_count::<Size4K>() == 0 {
            return Err(too_small);
        }
        Ok(layout)
    }
}
