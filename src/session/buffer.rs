//! Growable receive buffer with read/write cursors.

/// Plaintext staging area between the engine and the application.
///
/// Bytes in `[read, write)` are unconsumed. Both cursors return to zero
/// whenever the buffer is fully drained.
#[derive(Debug, Clone)]
pub struct RecvBuffer {
    data: Vec<u8>,
    read: usize,
    write: usize,
}

impl RecvBuffer {
    /// Create a buffer with `capacity` bytes of backing storage.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity],
            read: 0,
            write: 0,
        }
    }

    /// Size of the backing storage.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Unconsumed bytes.
    pub fn readable(&self) -> &[u8] {
        &self.data[self.read..self.write]
    }

    /// Free space after the write cursor.
    pub fn writable(&self) -> usize {
        self.data.len() - self.write
    }

    /// Free region after the write cursor.
    pub fn writable_mut(&mut self) -> &mut [u8] {
        &mut self.data[self.write..]
    }

    /// No unconsumed bytes.
    pub fn is_empty(&self) -> bool {
        self.read == self.write
    }

    /// Number of unconsumed bytes.
    pub fn len(&self) -> usize {
        self.write - self.read
    }

    /// Commit `n` bytes written into [`writable_mut`](Self::writable_mut).
    pub fn advance_write(&mut self, n: usize) {
        self.write = (self.write + n).min(self.data.len());
    }

    /// Guarantee at least `n` bytes of free space after the write cursor.
    ///
    /// Grows by copying the unconsumed bytes into a larger allocation.
    /// Never shrinks.
    pub fn ensure_writable(&mut self, n: usize) {
        if self.writable() >= n {
            return;
        }
        let pending = self.len();
        let capacity = (pending + n).max(self.data.len() * 2);
        let mut grown = vec![0u8; capacity];
        grown[..pending].copy_from_slice(&self.data[self.read..self.write]);
        self.data = grown;
        self.read = 0;
        self.write = pending;
    }

    /// Reset both cursors if everything has been consumed.
    pub fn compact(&mut self) {
        if self.read == self.write {
            self.read = 0;
            self.write = 0;
        }
    }

    /// Discard all unconsumed bytes.
    pub fn clear(&mut self) {
        self.read = 0;
        self.write = 0;
    }

    /// Copy up to `dst.len()` unconsumed bytes into `dst` and consume them.
    pub fn read_into(&mut self, dst: &mut [u8]) -> usize {
        let n = dst.len().min(self.len());
        dst[..n].copy_from_slice(&self.data[self.read..self.read + n]);
        self.read += n;
        self.compact();
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(bytes: &[u8]) -> RecvBuffer {
        let mut buf = RecvBuffer::with_capacity(16);
        buf.ensure_writable(bytes.len());
        buf.writable_mut()[..bytes.len()].copy_from_slice(bytes);
        buf.advance_write(bytes.len());
        buf
    }

    #[test]
    fn test_new_is_empty() {
        let buf = RecvBuffer::with_capacity(32 * 1024);
        assert!(buf.is_empty());
        assert_eq!(buf.capacity(), 32 * 1024);
        assert_eq!(buf.writable(), 32 * 1024);
    }

    #[test]
    fn test_partial_reads_then_compact() {
        let mut buf = filled(b"abcdefgh");

        let mut dst = [0u8; 3];
        assert_eq!(buf.read_into(&mut dst), 3);
        assert_eq!(&dst, b"abc");
        assert_eq!(buf.readable(), b"defgh");

        let mut rest = [0u8; 16];
        assert_eq!(buf.read_into(&mut rest), 5);
        assert_eq!(&rest[..5], b"defgh");

        assert!(buf.is_empty());
        assert_eq!(buf.writable(), buf.capacity());
    }

    #[test]
    fn test_ensure_writable_grows_and_keeps_data() {
        let mut buf = filled(b"0123456789");
        let mut dst = [0u8; 4];
        buf.read_into(&mut dst);

        buf.ensure_writable(100);
        assert!(buf.capacity() >= 106);
        assert!(buf.writable() >= 100);
        assert_eq!(buf.readable(), b"456789");
    }

    #[test]
    fn test_ensure_writable_never_shrinks() {
        let mut buf = RecvBuffer::with_capacity(64);
        buf.ensure_writable(8);
        assert_eq!(buf.capacity(), 64);

        for request in [100, 10, 500, 1] {
            buf.ensure_writable(request);
            assert!(buf.capacity() >= request);
        }
        assert!(buf.capacity() >= 500);
    }

    #[test]
    fn test_zero_read() {
        let mut buf = filled(b"xy");
        assert_eq!(buf.read_into(&mut []), 0);
        assert_eq!(buf.readable(), b"xy");
    }

    #[test]
    fn test_clear() {
        let mut buf = filled(b"pending");
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.len(), 0);
    }

    #[test]
    fn test_advance_write_clamped() {
        let mut buf = RecvBuffer::with_capacity(4);
        buf.advance_write(10);
        assert_eq!(buf.len(), 4);
        assert_eq!(buf.writable(), 0);
    }
}
