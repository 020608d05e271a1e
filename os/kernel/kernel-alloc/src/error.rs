use kernel_memory_addresses::PhysicalAddress;

/// No free frame was available.
///
/// The only recoverable failure of the physical-memory core. Callers decide
/// what to do about it (typically: kill the faulting process); retrying
/// cannot manufacture memory.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
#[error("out of physical memory")]
pub struct OutOfMemory;

/// The physical range handed to the allocator at boot cannot be used.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum InitError {
    #[error("physical range [{start}..{end}) is empty")]
    EmptyRange {
        start: PhysicalAddress,
        end: PhysicalAddress,
    },
    #[error(
        "physical range [{start}..{end}) cannot hold {superframes} superframes and at least one frame"
    )]
    RangeTooSmall {
        start: PhysicalAddress,
        end: PhysicalAddress,
        superframes: usize,
    },
    #[error("physical memory is already initialized")]
    AlreadyInitialized,
}
