mod common;

use common::{Arena, init_logging};
use kernel_alloc::Frame;
use kernel_vmem::{LeafEntry, PageEntryBits, PageTableEntry};
use std::sync::Barrier;
use std::thread;

const THREADS: usize = 8;

#[test]
fn concurrent_faults_each_get_a_private_copy() {
    init_logging();
    let arena = Arena::frames(THREADS as u64 + 4);
    let mem = arena.frames_only();

    let a = mem.alloc_frame().expect("frame");
    arena.write(a, b"shared by everyone");
    let mut original = PageTableEntry::make_4k(a, PageEntryBits::new_user_rw());
    let children: Vec<_> = (0..THREADS)
        .map(|_| {
            mem.share_cow(&mut original);
            original
        })
        .collect();
    assert_eq!(mem.refcount(a), i32::try_from(THREADS).expect("small") + 1);

    let barrier = Barrier::new(THREADS);
    let copies: Vec<Frame> = thread::scope(|s| {
        let handles: Vec<_> = children
            .into_iter()
            .map(|mut child| {
                let mem = &mem;
                let barrier = &barrier;
                s.spawn(move || {
                    barrier.wait();
                    mem.resolve_cow_fault(&mut child).expect("enough frames");
                    assert!(child.is_writable() && !child.is_cow());
                    child.frame()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("fault thread"))
            .collect()
    });

    let mut distinct = copies.clone();
    distinct.sort();
    distinct.dedup();
    assert_eq!(distinct.len(), THREADS);
    assert!(!copies.contains(&a));

    assert_eq!(mem.refcount(a), 1);
    for c in copies {
        assert_eq!(mem.refcount(c), 1);
        assert_eq!(&arena.bytes(c)[..18], b"shared by everyone");
    }
}

#[test]
fn concurrent_alloc_free_keeps_the_pool_whole() {
    init_logging();
    let arena = Arena::frames(64);
    let mem = arena.frames_only();

    thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                for _ in 0..500 {
                    let mut held = Vec::new();
                    while held.len() < 8 {
                        match mem.alloc_frame() {
                            Some(f) => held.push(f),
                            None => break,
                        }
                    }
                    for f in &held {
                        assert_eq!(mem.refcount(*f), 1);
                    }
                    for f in held {
                        mem.free_frame(f);
                    }
                }
            });
        }
    });

    assert_eq!(mem.stats().free_frames, 64);
}

#[test]
fn racing_sharers_and_droppers_balance_out() {
    let arena = Arena::frames(4);
    let mem = arena.frames_only();
    let a = mem.alloc_frame().expect("frame");

    thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                for _ in 0..1000 {
                    mem.mark_shared(a);
                    mem.free_frame(a);
                }
            });
        }
    });

    assert_eq!(mem.refcount(a), 1);
    assert_eq!(mem.stats().free_frames, 3);
}
