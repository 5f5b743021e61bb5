//! Destination buffers for stream reads.

use thiserror::Error;

/// A destination write that could not be completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot write destination buffer at byte {at}")]
pub struct BufferFault {
    /// Offset into the destination where the write failed.
    pub at: usize,
}

/// A consumer-supplied destination for stream bytes.
///
/// Reads stage each chunk internally and then hand it to the buffer, so a
/// buffer that rejects a write (an unmapped user page, a closed pipe)
/// surfaces as [`crate::ReadError::Fault`] without touching segment memory
/// again.
pub trait UserBuffer {
    /// Returns the number of bytes the buffer can accept.
    fn capacity(&self) -> usize;

    /// Writes `data` starting at byte `pos` of the buffer.
    ///
    /// # Errors
    ///
    /// Returns a [`BufferFault`] if the bytes cannot be stored.
    fn write_at(&mut self, pos: usize, data: &[u8]) -> Result<(), BufferFault>;
}

impl UserBuffer for [u8] {
    fn capacity(&self) -> usize {
        self.len()
    }

    fn write_at(&mut self, pos: usize, data: &[u8]) -> Result<(), BufferFault> {
        let end = pos.checked_add(data.len()).ok_or(BufferFault { at: pos })?;
        self.get_mut(pos..end)
            .ok_or(BufferFault { at: pos })?
            .copy_from_slice(data);
        Ok(())
    }
}

impl UserBuffer for Vec<u8> {
    fn capacity(&self) -> usize {
        self.len()
    }

    fn write_at(&mut self, pos: usize, data: &[u8]) -> Result<(), BufferFault> {
        self.as_mut_slice().write_at(pos, data)
    }
}
