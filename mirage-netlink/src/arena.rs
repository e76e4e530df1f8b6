//! The byte region a session stages its in-flight message in.

/// A growable, zero-initialised byte buffer with an explicit reserve/commit discipline.
///
/// Space is reserved before it is written and committed afterwards. The committed length never
/// exceeds the capacity. Capacity grows to twice the required size and never shrinks, so one
/// arena can be reused for every message of a session without reallocating.
#[derive(Debug, Default)]
pub struct Arena {
    /// Backing storage. Its length is the capacity of the arena.
    buf: Vec<u8>,
    /// Committed bytes.
    len: usize,
}

impl Arena {
    pub fn with_capacity(capacity: usize) -> Self {
        Self { buf: vec![0; capacity], len: 0 }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Makes sure `amount` more bytes fit after the committed region.
    pub fn reserve(&mut self, amount: usize) {
        let required = self.len + amount;
        if self.buf.len() < required {
            let capacity = required * 2;
            tracing::trace!(from = self.buf.len(), to = capacity, "growing message arena");
            self.buf.resize(capacity, 0);
        }
    }

    /// Marks `amount` reserved bytes as used.
    pub fn commit(&mut self, amount: usize) {
        debug_assert!(self.len + amount <= self.buf.len(), "commit past the reserved region");
        self.len += amount;
    }

    /// Discards the committed bytes and reserves `initial` bytes.
    pub fn reset(&mut self, initial: usize) {
        self.len = 0;
        self.reserve(initial);
    }

    /// The reserved, uncommitted bytes.
    pub fn tail_mut(&mut self) -> &mut [u8] {
        &mut self.buf[self.len..]
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.buf[..self.len]
    }

    /// The whole storage, committed or not. Used as the target of socket reads.
    pub(crate) fn storage_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        self.reserve(bytes.len());
        self.tail_mut()[..bytes.len()].copy_from_slice(bytes);
        self.commit(bytes.len());
    }

    /// Appends `amount` zero bytes. Storage is reused between messages, so this writes explicitly.
    pub fn extend_zeroed(&mut self, amount: usize) {
        self.reserve(amount);
        self.tail_mut()[..amount].fill(0);
        self.commit(amount);
    }
}
