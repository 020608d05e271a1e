//! Host-side RAM for integration tests.
#![allow(dead_code)]

use kernel_alloc::{FrameAllocatorConfig, HhdmPhysMapper, PhysicalMemory};

#[path = "../../src/test_arena.rs"]
mod test_arena;

pub use test_arena::{Arena, FAKE_BASE, MIB};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
