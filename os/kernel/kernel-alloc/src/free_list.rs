use kernel_memory_addresses::{PageSize, PhysicalPage};
use kernel_vmem::PhysMapper;

/// Terminator stored in the link word of the last free unit.
const END: u64 = u64::MAX;

/// Link word stored in the first eight bytes of every **free** unit.
///
/// ```text
/// +-----------+---------------------------------------------+
/// | next: u64 |     rest of the unit (free-fill pattern)     |
/// +-----------+---------------------------------------------+
/// ^ unit base
/// ```
///
/// `next` is the pool-relative index of the following free unit, or
/// [`END`]. Storing an index instead of a pointer keeps the link valid
/// no matter how the pool's memory is mapped.
#[repr(transparent)]
struct Link {
    next: u64,
}

/// LIFO stack of free units threaded through the units themselves.
///
/// The list owns no memory: every node *is* a free frame (or superframe).
/// Bookkeeping outside the frames is just the head index and a length.
///
/// # Invariants
/// - Every index on the list is `< capacity` of the owning pool.
/// - No index appears twice.
/// - `len` equals the number of nodes reachable from `head`.
pub(crate) struct FreeList {
    head: u64,
    len: u64,
}

impl FreeList {
    pub(crate) const fn new() -> Self {
        Self { head: END, len: 0 }
    }

    pub(crate) const fn len(&self) -> u64 {
        self.len
    }

    pub(crate) const fn is_empty(&self) -> bool {
        self.head == END
    }

    /// Push unit `index` (relative to `first`) onto the list.
    ///
    /// # Safety
    /// - `first.checked_nth(index)` must be a unit of the owning pool that is
    ///   mapped writable through `mapper`.
    /// - The unit must not be on the list already and nobody else may be
    ///   touching its first eight bytes.
    /// - Must only be called while holding the pool's lock.
    pub(crate) unsafe fn push<S: PageSize, M: PhysMapper>(
        &mut self,
        mapper: &M,
        first: PhysicalPage<S>,
        index: u64,
    ) {
        debug_assert_ne!(index, END);
        let page = unit(first, index);
        let link: &mut Link = unsafe { mapper.phys_to_mut(page.base()) };
        link.next = self.head;
        self.head = index;
        self.len += 1;
    }

    /// Pop the most recently pushed unit, returning its index.
    ///
    /// # Safety
    /// Same mapping contract as [`push`](Self::push) for every unit on the
    /// list; must only be called while holding the pool's lock.
    pub(crate) unsafe fn pop<S: PageSize, M: PhysMapper>(
        &mut self,
        mapper: &M,
        first: PhysicalPage<S>,
    ) -> Option<u64> {
        if self.is_empty() {
            return None;
        }
        let index = self.head;
        let link: &mut Link = unsafe { mapper.phys_to_mut(unit(first, index).base()) };
        self.head = link.next;
        self.len -= 1;
        Some(index)
    }
}

fn unit<S: PageSize>(first: PhysicalPage<S>, index: u64) -> PhysicalPage<S> {
    // Indices on the list were validated by the pool when they were pushed.
    match first.checked_nth(index) {
        Some(page) => page,
        None => unreachable!("free-list index {index} overflows the address space"),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use kernel_memory_addresses::{PhysicalAddress, Size4K};

    /// Identity-ish mapper over a small heap buffer.
    struct Arena {
        buf: Vec<u64>,
        base: u64,
    }

    impl Arena {
        fn new(frames: usize) -> Self {
            Self {
                buf: vec![0; frames * 512],
                base: 0x1000_0000,
            }
        }
    }

    impl PhysMapper for Arena {
        fn phys_to_ptr(&self, pa: PhysicalAddress) -> *mut u8 {
            let offset = usize::try_from(pa.as_u64() - self.base).expect("offset");
            self.buf.as_ptr().cast::<u8>().cast_mut().wrapping_add(offset)
        }
    }

    #[test]
    fn empty_list_pops_none() {
        let arena = Arena::new(1);
        let first = PhysicalPage::<Size4K>::from_addr(PhysicalAddress::new(arena.base));
        let mut list = FreeList::new();
        assert!(list.is_empty());
        assert_eq!(unsafe { list.pop(&arena, first) }, None);
    }

    #[test]
    fn lifo_order_and_len() {
        let arena = Arena::new(4);
        let first = PhysicalPage::<Size4K>::from_addr(PhysicalAddress::new(arena.base));
        let mut list = FreeList::new();
        unsafe {
            list.push(&arena, first, 0);
            list.push(&arena, first, 2);
            list.push(&arena, first, 1);
        }
        assert_eq!(list.len(), 3);

        // link words live inside the frames themselves
        assert_eq!(arena.buf[512], 2);
        assert_eq!(arena.buf[2 * 512], 0);
        assert_eq!(arena.buf[0], END);

        let popped: Vec<_> = core::iter::from_fn(|| unsafe { list.pop(&arena, first) }).collect();
        assert_eq!(popped, [1, 2, 0]);
        assert_eq!(list.len(), 0);
        assert!(list.is_empty());
    }
}
