//! Memory region and physical memory backend traits.

use crate::error::{MemoryError, MemoryResult};
use std::fmt;
use std::sync::Arc;

/// A mapped window over physical memory.
///
/// Regions are **opaque byte windows**. The capture engine decides what to
/// read and when; a region only knows how to hand out its bytes.
///
/// # Invariants
///
/// - `base()` is the physical address of byte 0 of the window
/// - Reads never extend beyond `len()`
/// - `read_narrow` only performs byte-wide accesses and is safe at any
///   alignment
/// - `read_bulk` may perform word-wide accesses; callers keep the range
///   aligned to [`crate::WORD_SIZE`] when the region requires it
pub trait MemoryRegion: Send + Sync + fmt::Debug {
    /// Returns the physical address of the first byte of the region.
    fn base(&self) -> u64;

    /// Returns the size of the region in bytes.
    fn len(&self) -> u64;

    /// Returns true if the region has no bytes.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads `dst.len()` bytes at `offset` using narrow accesses.
    ///
    /// # Errors
    ///
    /// Returns an error if the range extends beyond the region or the
    /// underlying memory cannot be read.
    fn read_narrow(&self, offset: u64, dst: &mut [u8]) -> MemoryResult<()>;

    /// Reads `dst.len()` bytes at `offset` using bulk accesses.
    ///
    /// The default implementation falls back to [`MemoryRegion::read_narrow`].
    ///
    /// # Errors
    ///
    /// Returns an error if the range extends beyond the region, the
    /// underlying memory cannot be read, or the access violates the
    /// region's width restriction.
    fn read_bulk(&self, offset: u64, dst: &mut [u8]) -> MemoryResult<()> {
        self.read_narrow(offset, dst)
    }
}

/// A backend that maps physical address ranges on demand.
///
/// This is used for segments that carry no pre-mapped view: each read chunk
/// maps exactly the range it needs and drops the mapping afterwards.
pub trait PhysicalMemory: Send + Sync + fmt::Debug {
    /// Maps `len` bytes starting at physical `address`.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Unmapped`] if no memory backs the range.
    fn map(&self, address: u64, len: u64) -> MemoryResult<Arc<dyn MemoryRegion>>;
}

/// Validates `offset..offset + len` against a region of `size` bytes.
///
/// Returns the start offset as `usize` on success.
pub(crate) fn check_range(offset: u64, len: usize, size: u64) -> MemoryResult<usize> {
    let end = offset.checked_add(len as u64);
    match end {
        Some(end) if end <= size => Ok(offset as usize),
        _ => Err(MemoryError::OutOfRange { offset, len, size }),
    }
}
