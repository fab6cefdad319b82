// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fixed-capacity staging buffer used while copying a core image.

/// Number of bytes the staging buffer holds.
pub const STAGING_CAPACITY: usize = 4096;

/// A byte buffer with a fixed capacity and a fill cursor.
///
/// Bytes are appended by writing into [`StagingBuffer::tail_mut`] and then
/// calling [`StagingBuffer::feed`]; they are drained by reading
/// [`StagingBuffer::data`] and then calling [`StagingBuffer::consume`].
/// Occupancy never exceeds [`STAGING_CAPACITY`]; asking for more is a bug in
/// the caller and panics rather than truncating.
pub struct StagingBuffer {
    len: usize,
    buf: [u8; STAGING_CAPACITY],
}

impl StagingBuffer {
    pub fn new() -> Self {
        Self { len: 0, buf: [0; STAGING_CAPACITY] }
    }

    pub const fn capacity(&self) -> usize {
        STAGING_CAPACITY
    }

    /// Number of bytes currently held.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == STAGING_CAPACITY
    }

    /// Free space remaining at the tail.
    pub fn space(&self) -> usize {
        STAGING_CAPACITY - self.len
    }

    /// The writable free region. Follow a write into it with `feed`.
    pub fn tail_mut(&mut self) -> &mut [u8] {
        &mut self.buf[self.len..]
    }

    /// The buffered bytes, oldest first.
    pub fn data(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Record that `n` bytes were written into the tail.
    pub fn feed(&mut self, n: usize) {
        assert!(
            n <= self.space(),
            "staging buffer overflow: fed {n} bytes with only {} free",
            self.space()
        );
        self.len += n;
    }

    /// Drop `n` bytes from the head, moving what remains to the front.
    pub fn consume(&mut self, n: usize) {
        assert!(
            n <= self.len,
            "staging buffer underflow: consumed {n} bytes of {}",
            self.len
        );
        self.buf.copy_within(n..self.len, 0);
        self.len -= n;
    }
}

impl Default for StagingBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StagingBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagingBuffer")
            .field("len", &self.len)
            .field("capacity", &STAGING_CAPACITY)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use test_strategy::{proptest, Arbitrary};

    #[derive(Clone, Debug, Arbitrary)]
    enum Op {
        Fill(u16),
        Drain(u16),
    }

    #[test]
    fn fill_then_drain_preserves_order() {
        let mut buf = StagingBuffer::new();
        buf.tail_mut()[..5].copy_from_slice(b"hello");
        buf.feed(5);
        assert_eq!(buf.data(), b"hello");

        buf.consume(2);
        assert_eq!(buf.data(), b"llo");
        assert_eq!(buf.space(), STAGING_CAPACITY - 3);

        buf.tail_mut()[..3].copy_from_slice(b"!!!");
        buf.feed(3);
        assert_eq!(buf.data(), b"llo!!!");
    }

    #[test]
    fn feed_to_exact_capacity() {
        let mut buf = StagingBuffer::new();
        buf.feed(STAGING_CAPACITY);
        assert!(buf.is_full());
        assert_eq!(buf.space(), 0);
        assert!(buf.tail_mut().is_empty());
        buf.consume(STAGING_CAPACITY);
        assert!(buf.is_empty());
    }

    #[test]
    #[should_panic(expected = "staging buffer overflow")]
    fn feed_past_capacity_panics() {
        let mut buf = StagingBuffer::new();
        buf.feed(STAGING_CAPACITY - 1);
        buf.feed(2);
    }

    #[test]
    #[should_panic(expected = "staging buffer underflow")]
    fn consume_more_than_held_panics() {
        let mut buf = StagingBuffer::new();
        buf.feed(10);
        buf.consume(11);
    }

    // Mirror every operation against a Vec and check the buffer agrees and
    // never holds more than its capacity.
    #[proptest]
    fn proptest_fill_drain_matches_model(ops: Vec<Op>) {
        let mut buf = StagingBuffer::new();
        let mut model: Vec<u8> = Vec::new();
        let mut next: u8 = 0;

        for op in ops {
            match op {
                Op::Fill(n) => {
                    let n = usize::from(n).min(buf.space());
                    for b in &mut buf.tail_mut()[..n] {
                        *b = next;
                        model.push(next);
                        next = next.wrapping_add(1);
                    }
                    buf.feed(n);
                }
                Op::Drain(n) => {
                    let n = usize::from(n).min(buf.len());
                    buf.consume(n);
                    model.drain(..n);
                }
            }
            assert!(buf.len() <= buf.capacity());
            assert_eq!(buf.data(), model.as_slice());
        }
    }
}
