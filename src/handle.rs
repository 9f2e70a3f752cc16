// hostgl/src/handle.rs
//
//! Opaque handles shared by every resource kind.
//!
//! Handles come out of a single arena of slots. Each handle packs a slot index with the slot's
//! generation, so a handle that outlives its resource is detected instead of aliasing whatever
//! is allocated into the slot next. Slots whose generation is exhausted are retired, which keeps
//! every handle value unique for the lifetime of the process.

use crate::Error;

use std::fmt::{self, Display, Formatter};

const INDEX_BITS: u32 = 20;
const INDEX_MASK: u32 = (1 << INDEX_BITS) - 1;
const MAX_SLOTS: usize = 1 << INDEX_BITS;
const MAX_GENERATION: u32 = (1 << (32 - INDEX_BITS)) - 1;

/// An opaque identifier for a render context, window surface, or color buffer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(pub u32);

impl Handle {
    /// The null handle. It never names a resource.
    pub const NONE: Handle = Handle(0);

    #[inline]
    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    #[inline]
    fn new(index: usize, generation: u32) -> Handle {
        Handle((generation << INDEX_BITS) | index as u32)
    }

    #[inline]
    fn index(self) -> usize {
        (self.0 & INDEX_MASK) as usize
    }

    #[inline]
    fn generation(self) -> u32 {
        self.0 >> INDEX_BITS
    }
}

impl Display for Handle {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

#[derive(Clone, Copy, Debug)]
struct Slot {
    generation: u32,
    live: bool,
}

/// Issues handles from an arena of generation-tagged slots.
#[derive(Debug, Default)]
pub(crate) struct HandleAllocator {
    slots: Vec<Slot>,
    free: Vec<usize>,
    live: usize,
}

impl HandleAllocator {
    pub(crate) fn new() -> HandleAllocator {
        HandleAllocator::default()
    }

    /// Returns a handle that no live or previously freed resource has used.
    pub(crate) fn allocate(&mut self) -> Result<Handle, Error> {
        let index = match self.free.pop() {
            Some(index) => index,
            None if self.slots.len() < MAX_SLOTS => {
                self.slots.push(Slot { generation: 1, live: false });
                self.slots.len() - 1
            }
            None => return Err(Error::HandlesExhausted),
        };

        let slot = &mut self.slots[index];
        debug_assert!(!slot.live);
        slot.live = true;
        self.live += 1;
        Ok(Handle::new(index, slot.generation))
    }

    /// Releases a handle. Returns `false` if the handle was not live.
    pub(crate) fn free(&mut self, handle: Handle) -> bool {
        if !self.is_live(handle) {
            return false;
        }

        let index = handle.index();
        let slot = &mut self.slots[index];
        slot.live = false;
        self.live -= 1;
        if slot.generation < MAX_GENERATION {
            slot.generation += 1;
            self.free.push(index);
        }
        true
    }

    #[inline]
    pub(crate) fn is_live(&self, handle: Handle) -> bool {
        match self.slots.get(handle.index()) {
            Some(slot) => slot.live && slot.generation == handle.generation(),
            None => false,
        }
    }

    #[inline]
    pub(crate) fn live_count(&self) -> usize {
        self.live
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use std::collections::HashSet;

    #[test]
    fn test_null_handle_is_never_issued() {
        let mut allocator = HandleAllocator::new();
        for _ in 0..64 {
            assert!(!allocator.allocate().unwrap().is_none());
        }
        assert!(!allocator.is_live(Handle::NONE));
    }

    #[test]
    fn test_freed_slot_gets_new_generation() {
        let mut allocator = HandleAllocator::new();
        let first = allocator.allocate().unwrap();
        assert!(allocator.free(first));
        let second = allocator.allocate().unwrap();

        assert_eq!(first.index(), second.index());
        assert_ne!(first, second);
        assert!(!allocator.is_live(first));
        assert!(allocator.is_live(second));
        assert!(!allocator.free(first));
    }

    #[test]
    fn test_exhausted_slot_is_retired() {
        let mut allocator = HandleAllocator::new();
        let mut seen = Vec::new();
        for _ in 0..MAX_GENERATION {
            let handle = allocator.allocate().unwrap();
            assert_eq!(handle.index(), 0);
            seen.push(handle);
            allocator.free(handle);
        }

        let next = allocator.allocate().unwrap();
        assert_eq!(next.index(), 1);
        assert!(!seen.contains(&next));
        assert_eq!(allocator.live_count(), 1);
    }

    #[test]
    fn test_random_allocation_never_reissues() {
        let mut rng = rand::thread_rng();
        let mut allocator = HandleAllocator::new();
        let mut issued = HashSet::new();
        let mut live = Vec::new();
        for _ in 0..10_000 {
            if live.is_empty() || rng.gen_bool(0.6) {
                let handle = allocator.allocate().unwrap();
                assert!(issued.insert(handle), "{} issued twice", handle);
                live.push(handle);
            } else {
                let handle = live.swap_remove(rng.gen_range(0..live.len()));
                assert!(allocator.free(handle));
                assert!(!allocator.is_live(handle));
            }
            assert_eq!(allocator.live_count(), live.len());
        }
    }
}
