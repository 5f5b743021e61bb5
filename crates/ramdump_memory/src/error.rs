//! Error types for physical memory access.

use std::io;
use thiserror::Error;

/// Result type for memory access operations.
pub type MemoryResult<T> = Result<T, MemoryError>;

/// Errors that can occur while mapping or reading physical memory.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// An I/O error occurred while reading a file-backed image.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Attempted to read beyond the end of a mapped region.
    #[error("read beyond end of region: offset {offset}, len {len}, size {size}")]
    OutOfRange {
        /// The requested offset within the region.
        offset: u64,
        /// The requested read length.
        len: usize,
        /// The size of the region.
        size: u64,
    },

    /// No backing memory exists for the requested physical range.
    #[error("unable to map address {address:#x}, size {len}")]
    Unmapped {
        /// Physical start address.
        address: u64,
        /// Requested length in bytes.
        len: u64,
    },

    /// A bulk access violated the region's access-width restriction.
    #[error("misaligned {width}-byte access at address {address:#x}, len {len}")]
    MisalignedAccess {
        /// Physical address of the access.
        address: u64,
        /// Length of the access in bytes.
        len: usize,
        /// Required access width.
        width: usize,
    },
}
