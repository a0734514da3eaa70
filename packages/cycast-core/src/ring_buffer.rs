//! Fixed-capacity circular byte buffer decoupling producer from consumer.
//!
//! Single writer (the source ingester or the playlist feeder, never both at
//! once), single reader (the broadcaster worker). `write` is all-or-nothing
//! and never blocks; `read` never blocks and returns whatever is available.

use parking_lot::Mutex;

struct Inner {
    data: Vec<u8>,
    capacity: usize,
    write_pos: usize,
    read_pos: usize,
    available: usize,
}

impl Inner {
    fn space(&self) -> usize {
        self.capacity - self.available
    }
}

/// Bounded byte FIFO with wrap-around storage.
pub struct RingBuffer {
    inner: Mutex<Inner>,
}

impl RingBuffer {
    /// Creates a new ring buffer with the given byte capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                data: vec![0u8; capacity],
                capacity,
                write_pos: 0,
                read_pos: 0,
                available: 0,
            }),
        }
    }

    /// Writes `data` into the buffer. Returns `false` and writes nothing if
    /// `data.len()` exceeds the current free space (all-or-nothing).
    pub fn write(&self, data: &[u8]) -> bool {
        let mut inner = self.inner.lock();
        if data.len() > inner.space() {
            return false;
        }
        if data.is_empty() {
            return true;
        }

        let capacity = inner.capacity;
        let write_pos = inner.write_pos;
        let first_len = (capacity - write_pos).min(data.len());
        inner.data[write_pos..write_pos + first_len].copy_from_slice(&data[..first_len]);

        let remaining = &data[first_len..];
        if !remaining.is_empty() {
            inner.data[..remaining.len()].copy_from_slice(remaining);
        }

        inner.write_pos = (write_pos + data.len()) % capacity;
        inner.available += data.len();
        true
    }

    /// Reads up to `n` bytes, returning fewer if the buffer holds less.
    /// Returns an empty vector if the buffer is empty. Never blocks.
    pub fn read(&self, n: usize) -> Vec<u8> {
        let mut inner = self.inner.lock();
        let to_read = n.min(inner.available);
        if to_read == 0 {
            return Vec::new();
        }

        let capacity = inner.capacity;
        let read_pos = inner.read_pos;
        let mut out = Vec::with_capacity(to_read);
        let first_len = (capacity - read_pos).min(to_read);
        out.extend_from_slice(&inner.data[read_pos..read_pos + first_len]);

        let remaining = to_read - first_len;
        if remaining > 0 {
            out.extend_from_slice(&inner.data[..remaining]);
        }

        inner.read_pos = (read_pos + to_read) % capacity;
        inner.available -= to_read;
        out
    }

    /// Number of bytes currently available to read.
    #[must_use]
    pub fn available(&self) -> usize {
        self.inner.lock().available
    }

    /// Number of bytes currently available to write.
    #[must_use]
    pub fn space(&self) -> usize {
        self.inner.lock().space()
    }

    /// Fraction of the buffer currently filled, in `[0.0, 1.0]`.
    #[must_use]
    pub fn fill_fraction(&self) -> f64 {
        let inner = self.inner.lock();
        inner.available as f64 / inner.capacity as f64
    }

    /// Discards all buffered data.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.write_pos = 0;
        inner.read_pos = 0;
        inner.available = 0;
    }

    /// Total byte capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let rb = RingBuffer::new(16);
        assert!(rb.write(b"hello"));
        assert_eq!(rb.read(5), b"hello");
    }

    #[test]
    fn write_rejects_when_too_large() {
        let rb = RingBuffer::new(4);
        assert!(!rb.write(b"hello"));
        assert_eq!(rb.available(), 0);
        assert_eq!(rb.space(), 4);
    }

    #[test]
    fn partial_write_is_fully_rejected() {
        let rb = RingBuffer::new(4);
        assert!(rb.write(b"ab"));
        assert!(!rb.write(b"xyz")); // would need 3, only 2 free
        assert_eq!(rb.available(), 2);
        assert_eq!(rb.read(4), b"ab");
    }

    #[test]
    fn wrap_around_preserves_order() {
        let rb = RingBuffer::new(8);
        assert!(rb.write(b"123456"));
        assert_eq!(rb.read(4), b"1234");
        assert!(rb.write(b"7890")); // wraps past the end
        assert_eq!(rb.read(6), b"567890");
    }

    #[test]
    fn read_never_returns_more_than_available() {
        let rb = RingBuffer::new(8);
        assert!(rb.write(b"ab"));
        assert_eq!(rb.read(100), b"ab");
        assert_eq!(rb.read(100), Vec::<u8>::new());
    }

    #[test]
    fn available_and_space_are_complementary() {
        let rb = RingBuffer::new(10);
        rb.write(b"abcd");
        assert_eq!(rb.available() + rb.space(), rb.capacity());
    }

    #[test]
    fn clear_resets_state() {
        let rb = RingBuffer::new(8);
        rb.write(b"abcd");
        rb.clear();
        assert_eq!(rb.available(), 0);
        assert_eq!(rb.space(), 8);
    }

    #[test]
    fn fill_fraction_reflects_occupancy() {
        let rb = RingBuffer::new(100);
        rb.write(&vec![0u8; 50]);
        assert!((rb.fill_fraction() - 0.5).abs() < 1e-9);
    }
}
