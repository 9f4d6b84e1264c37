//! Sequence id allocation
//!
//! Every published event carries a sequence id that the client echoes back in
//! its finished signal. Zero is reserved as "no sequence" on the wire, so the
//! allocator skips it when the counter wraps.

/// Cycling, never-zero 32-bit sequence id generator
///
/// Not synchronized on its own: the [`TransferTable`](super::sender) owns it
/// and only calls [`next`](Self::next) with the table lock held.
#[derive(Debug, Default)]
pub struct SequenceAllocator {
    last: u32,
}

impl SequenceAllocator {
    /// Create an allocator whose first id is 1
    pub fn new() -> Self {
        Self { last: 0 }
    }

    /// Create an allocator that continues after `last`
    pub fn starting_after(last: u32) -> Self {
        Self { last }
    }

    /// Next sequence id, never 0
    pub fn next(&mut self) -> u32 {
        self.last = self.last.wrapping_add(1);
        if self.last == 0 {
            self.last = 1;
        }
        self.last
    }

    /// Most recently issued id, or 0 if none has been issued
    pub fn last(&self) -> u32 {
        self.last
    }
}
