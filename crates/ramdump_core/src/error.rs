//! Error types for ramdump capture.

use crate::buffer::BufferFault;
use ramdump_memory::MemoryError;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result type for producer-side dump operations.
pub type DumpResult<T> = Result<T, DumpError>;

/// Result type for consumer-side read operations.
pub type ReadResult<T> = Result<T, ReadError>;

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors returned to the producer from a dump request.
///
/// Every variant leaves the device idle and ready for the next request.
#[derive(Debug, Error)]
pub enum DumpError {
    /// No consumer had the device open.
    #[error("no consumers registered on {device}")]
    NoConsumers {
        /// Device node name.
        device: String,
    },

    /// The core header could not be allocated.
    #[error("out of memory allocating {requested} header bytes")]
    OutOfMemory {
        /// Requested allocation size.
        requested: usize,
    },

    /// Consumers did not finish within the wait bound.
    #[error("timed out after {timeout:?} waiting for consumers")]
    Timeout {
        /// The bound that elapsed.
        timeout: Duration,
    },

    /// Every consumer finished, but the last one did not reach a clean end
    /// of stream.
    #[error("ramdump session failed")]
    SessionFailed,

    /// Another dump is already running on this device.
    #[error("a dump session is already in progress")]
    SessionInProgress,

    /// More segments than the header format can describe.
    #[error("{count} segments exceed the header limit of {max}")]
    TooManySegments {
        /// Number of segments requested.
        count: usize,
        /// Maximum the format supports.
        max: usize,
    },

    /// The device has been destroyed.
    #[error("device has been destroyed")]
    DeviceDestroyed,
}

/// Errors returned to a consumer from a read.
///
/// A consumer-side error never affects other consumers' reads.
#[derive(Debug, Error)]
pub enum ReadError {
    /// Non-blocking read with no session data ready.
    #[error("no dump data ready")]
    WouldBlock,

    /// The producer timed out and aborted the session.
    #[error("ramdump aborted")]
    Aborted,

    /// The destination buffer could not be written.
    #[error("destination fault: {0}")]
    Fault(#[from] BufferFault),

    /// Segment memory could not be mapped or read.
    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),

    /// The staging buffer for a chunk could not be allocated.
    #[error("out of memory allocating {requested} byte chunk")]
    OutOfMemory {
        /// Requested allocation size.
        requested: usize,
    },

    /// The device was destroyed while the consumer waited.
    #[error("device closed")]
    Closed,
}

impl From<ReadError> for io::Error {
    fn from(err: ReadError) -> Self {
        let kind = match &err {
            ReadError::WouldBlock => io::ErrorKind::WouldBlock,
            ReadError::Aborted => io::ErrorKind::TimedOut,
            ReadError::Fault(_) => io::ErrorKind::InvalidInput,
            ReadError::Memory(_) | ReadError::OutOfMemory { .. } => io::ErrorKind::OutOfMemory,
            ReadError::Closed => io::ErrorKind::BrokenPipe,
        };
        io::Error::new(kind, err)
    }
}

/// Errors from device creation.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The device name is empty.
    #[error("invalid device name")]
    InvalidName,

    /// Every minor number is in use.
    #[error("no more minor numbers left (max {max})")]
    NoMinorsLeft {
        /// The registry's device limit.
        max: usize,
    },

    /// A device with this name already exists.
    #[error("device already exists: {name}")]
    AlreadyExists {
        /// The full device node name.
        name: String,
    },
}

/// Errors from parsing a core header.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    /// The buffer ends before the structure it should contain.
    #[error("truncated header: need {needed} bytes, have {available}")]
    Truncated {
        /// Bytes required.
        needed: usize,
        /// Bytes available.
        available: usize,
    },

    /// The buffer does not start with the ELF magic.
    #[error("not an ELF core header")]
    BadMagic,

    /// The header is ELF but not a layout this crate produces.
    #[error("unsupported core header: {message}")]
    Unsupported {
        /// Description of the unsupported feature.
        message: String,
    },
}

impl ParseError {
    /// Creates an unsupported header error.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_errors_map_to_io_kinds() {
        let io_err: io::Error = ReadError::WouldBlock.into();
        assert_eq!(io_err.kind(), io::ErrorKind::WouldBlock);

        let io_err: io::Error = ReadError::Aborted.into();
        assert_eq!(io_err.kind(), io::ErrorKind::TimedOut);

        let io_err: io::Error = ReadError::Fault(BufferFault { at: 3 }).into();
        assert_eq!(io_err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn dump_error_messages() {
        let err = DumpError::NoConsumers {
            device: "ramdump_modem".into(),
        };
        assert_eq!(err.to_string(), "no consumers registered on ramdump_modem");

        let err = DumpError::TooManySegments {
            count: 70_000,
            max: 65_535,
        };
        assert!(err.to_string().contains("70000"));
    }
}
