//! Bounded ingestion ring: a fixed-capacity byte buffer that the ingestion
//! thread appends to, with a monotonic write cursor so independent readers
//! (the quiescence collector, any future consumer) can each keep their own
//! read position without serializing on each other.
//!
//! Not modeled directly on any single teacher file — `SPEC_FULL.md` section
//! 4.3 asks for bounded memory independent of the emulator's own scrollback
//! cap, so output survives even if the classifier falls behind. Grounded in
//! the same "oldest-first discard" rule `emulator::Screen` uses for its own
//! scrollback, applied here to raw bytes instead of rendered rows.

use std::collections::VecDeque;

/// A byte ring with a monotonically increasing logical write offset. Bytes
/// older than `capacity` are dropped from the front; `Cursor`s track how
/// much of the *current* contents they've already consumed and report how
/// much was silently skipped if they fall behind the eviction horizon.
pub struct Ring {
    buf: VecDeque<u8>,
    capacity: usize,
    /// Logical offset of `buf[0]`; increases every time bytes are evicted.
    base_offset: u64,
    /// Logical offset one past the last byte written.
    write_offset: u64,
}

impl Ring {
    pub fn new(capacity: usize) -> Self {
        Ring {
            buf: VecDeque::with_capacity(capacity.min(64 * 1024)),
            capacity,
            base_offset: 0,
            write_offset: 0,
        }
    }

    pub fn push(&mut self, data: &[u8]) {
        self.buf.extend(data.iter().copied());
        self.write_offset += data.len() as u64;
        while self.buf.len() > self.capacity {
            self.buf.pop_front();
            self.base_offset += 1;
        }
    }

    pub fn write_offset(&self) -> u64 {
        self.write_offset
    }

    pub fn cursor(&self) -> Cursor {
        Cursor { offset: self.write_offset }
    }

    /// Bytes written since `cursor`, advancing it to the ring's current
    /// write offset. If the cursor fell behind the eviction horizon, it
    /// silently jumps forward to `base_offset` — the caller only ever sees
    /// "what's still available", matching how a quiescence read treats
    /// truncated history as acceptable (it only cares about recent output).
    pub fn read_since(&self, cursor: &mut Cursor) -> Vec<u8> {
        let start = cursor.offset.max(self.base_offset);
        let skip = (start - self.base_offset) as usize;
        let bytes: Vec<u8> = self.buf.iter().skip(skip).copied().collect();
        cursor.offset = self.write_offset;
        bytes
    }
}

/// An independent read position into a `Ring`.
#[derive(Debug, Clone, Copy)]
pub struct Cursor {
    offset: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_since_returns_new_bytes_only() {
        let mut ring = Ring::new(1024);
        let mut cursor = ring.cursor();
        ring.push(b"hello");
        assert_eq!(ring.read_since(&mut cursor), b"hello");
        assert!(ring.read_since(&mut cursor).is_empty());
        ring.push(b" world");
        assert_eq!(ring.read_since(&mut cursor), b" world");
    }

    #[test]
    fn overflow_discards_oldest_bytes() {
        let mut ring = Ring::new(5);
        ring.push(b"abcdefgh");
        let mut cursor = Cursor { offset: 0 };
        let seen = ring.read_since(&mut cursor);
        assert_eq!(seen, b"defgh");
    }

    #[test]
    fn independent_cursors_track_separately() {
        let mut ring = Ring::new(1024);
        let mut c1 = ring.cursor();
        ring.push(b"first");
        let mut c2 = ring.cursor();
        ring.push(b"second");
        assert_eq!(ring.read_since(&mut c1), b"firstsecond");
        assert_eq!(ring.read_since(&mut c2), b"second");
    }
}
