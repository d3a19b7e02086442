use std::{collections::VecDeque, iter};

/// A typed slot allocator.
///
/// Slots are built up front in one batch and handed out one at a time, in the
/// order they were built. Each slot is still its own value, so reserving moves
/// the allocations ahead of time rather than packing them into one block.
/// Once the arena is exhausted `alloc` returns `None` and the caller falls
/// back to the heap; those fallbacks are counted.
#[derive(Debug)]
pub(crate) struct Arena<T> {
    slots: VecDeque<T>,
    handed_out: usize,
    misses: usize,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self {
            slots: VecDeque::new(),
            handed_out: 0,
            misses: 0,
        }
    }
}

impl<T> Arena<T> {
    /// Add `n` slots built by `f`
    pub fn reserve_with(&mut self, n: usize, f: impl FnMut() -> T) {
        self.slots.reserve(n);
        self.slots.extend(iter::repeat_with(f).take(n));
    }

    pub fn alloc(&mut self) -> Option<T> {
        match self.slots.pop_front() {
            Some(slot) => {
                self.handed_out += 1;
                Some(slot)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn remaining(&self) -> usize {
        self.slots.len()
    }

    pub fn handed_out(&self) -> usize {
        self.handed_out
    }

    pub fn misses(&self) -> usize {
        self.misses
    }

    /// Drop all unused slots, keeping the counters
    pub fn release(&mut self) -> usize {
        let unused = self.slots.len();
        self.slots = VecDeque::new();
        unused
    }
}
