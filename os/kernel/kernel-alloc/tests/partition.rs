//! Random fork/fault/teardown sequences never lose or duplicate a frame.

mod common;

use common::Arena;
use kernel_alloc::{HhdmPhysMapper, OutOfMemory, PhysicalMemory};
use kernel_vmem::{LeafEntry, PageEntryBits, PageTableEntry};
use proptest::prelude::*;

const FRAMES: u64 = 16;

#[derive(Debug, Clone)]
enum Op {
    Alloc,
    Share(usize),
    Fault(usize),
    Drop(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        2 => Just(Op::Alloc),
        2 => any::<usize>().prop_map(Op::Share),
        3 => any::<usize>().prop_map(Op::Fault),
        2 => any::<usize>().prop_map(Op::Drop),
    ]
}

/// Every frame's count equals the number of live mappings of it, and the
/// unmapped frames are exactly the free ones.
fn check_partition(mem: &PhysicalMemory<HhdmPhysMapper>, mappings: &[PageTableEntry]) {
    let mut in_use = 0;
    for index in 0..FRAMES {
        let frame = mem.frame_at(index).expect("in range");
        let mapped = mappings.iter().filter(|e| e.frame() == frame).count();
        let count = mem.refcount(frame);
        let count = usize::try_from(count).expect("non-negative count");
        assert_eq!(count, mapped, "{frame}");
        if count > 0 {
            in_use += 1;
        }
    }
    assert_eq!(mem.stats().free_frames, FRAMES - in_use);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn every_frame_is_free_or_owned(ops in prop::collection::vec(op(), 1..120)) {
        let arena = Arena::frames(FRAMES);
        let mem = arena.frames_only();
        let mut mappings: Vec<PageTableEntry> = Vec::new();

        for op in ops {
            match op {
                Op::Alloc => {
                    if let Some(f) = mem.alloc_frame() {
                        mappings.push(PageTableEntry::make_4k(f, PageEntryBits::new_user_rw()));
                    }
                }
                Op::Share(i) if !mappings.is_empty() => {
                    let i = i % mappings.len();
                    mem.share_cow(&mut mappings[i]);
                    let child = mappings[i];
                    mappings.push(child);
                }
                Op::Fault(i) if !mappings.is_empty() => {
                    let i = i % mappings.len();
                    let entry = &mut mappings[i];
                    if entry.is_cow_fault() {
                        let before = *entry;
                        match mem.resolve_cow_fault(entry) {
                            Ok(()) => prop_assert!(entry.is_writable() && !entry.is_cow()),
                            Err(OutOfMemory) => prop_assert_eq!(entry.raw(), before.raw()),
                        }
                    }
                }
                Op::Drop(i) if !mappings.is_empty() => {
                    let i = i % mappings.len();
                    let entry = mappings.swap_remove(i);
                    mem.free_frame(entry.frame());
                }
                _ => {}
            }
            check_partition(&mem, &mappings);
        }

        for entry in mappings.drain(..) {
            mem.free_frame(entry.frame());
        }
        prop_assert_eq!(mem.stats().free_frames, FRAMES);
    }
}
