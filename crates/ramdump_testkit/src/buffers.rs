//! Destination buffers for fault injection.

use ramdump_core::{BufferFault, UserBuffer};

/// A buffer that rejects any write reaching past `fault_at`.
///
/// Models a user buffer whose tail lies in an unmapped page.
#[derive(Debug, Clone)]
pub struct FaultyBuffer {
    data: Vec<u8>,
    fault_at: usize,
}

impl FaultyBuffer {
    /// Creates a buffer of `len` bytes that faults from byte `fault_at` on.
    pub fn new(len: usize, fault_at: usize) -> Self {
        Self {
            data: vec![0; len],
            fault_at,
        }
    }

    /// Creates a buffer that faults on every write.
    pub fn always(len: usize) -> Self {
        Self::new(len, 0)
    }

    /// Returns the bytes written so far.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }
}

impl UserBuffer for FaultyBuffer {
    fn capacity(&self) -> usize {
        self.data.len()
    }

    fn write_at(&mut self, pos: usize, data: &[u8]) -> Result<(), BufferFault> {
        if pos + data.len() > self.fault_at {
            return Err(BufferFault {
                at: pos.max(self.fault_at),
            });
        }
        self.data.write_at(pos, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_before_fault_point_succeed() {
        let mut buf = FaultyBuffer::new(16, 8);
        buf.write_at(0, b"abcd").unwrap();
        assert_eq!(&buf.bytes()[..4], b"abcd");
    }

    #[test]
    fn write_crossing_fault_point_fails() {
        let mut buf = FaultyBuffer::new(16, 8);
        assert_eq!(buf.write_at(6, b"abcd"), Err(BufferFault { at: 8 }));
    }

    #[test]
    fn always_faults() {
        let mut buf = FaultyBuffer::always(4);
        assert!(buf.write_at(0, b"a").is_err());
        assert_eq!(buf.capacity(), 4);
    }
}
