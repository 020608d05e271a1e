//! Runtime allocator configuration.

use kernel_info::memory::{ALLOC_FILL_BYTE, FREE_FILL_BYTE, SUPERFRAME_COUNT};

/// Tunables of a [`PhysicalMemory`](crate::PhysicalMemory) instance.
///
/// Defaults come from [`kernel_info::memory`]; tests and unusual boards
/// override individual fields with the `with_*` builders.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct FrameAllocatorConfig {
    /// Number of 2 MiB superframes carved off the top of the range.
    pub superframes: usize,
    /// Byte written over every frame handed out.
    pub alloc_fill: u8,
    /// Byte written over every frame returned.
    pub free_fill: u8,
}

impl FrameAllocatorConfig {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            superframes: SUPERFRAME_COUNT,
            alloc_fill: ALLOC_FILL_BYTE,
            free_fill: FREE_FILL_BYTE,
        }
    }

    #[must_use]
    pub const fn with_superframes(mut self, superframes: usize) -> Self {
        self.superframes = superframes;
        self
    }

    #[must_use]
    pub const fn with_fill_bytes(mut self, alloc_fill: u8, free_fill: u8) -> Self {
        self.alloc_fill = alloc_fill;
        self.free_fill = free_fill;
        self
    }
}

impl Default for FrameAllocatorConfig {
    fn default() -> Self {
        Self::new()
    }
}
