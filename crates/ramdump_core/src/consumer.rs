//! Consumer handles.

use crate::buffer::UserBuffer;
use crate::device::{ConsumerEntry, RamdumpDevice};
use crate::error::ReadResult;
use crate::types::ConsumerId;
use std::io;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

/// Whether a read may block waiting for a dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadMode {
    /// Wait until a dump is ready.
    #[default]
    Blocking,
    /// Fail with [`crate::ReadError::WouldBlock`] if no dump is ready.
    NonBlocking,
}

/// Result of a readiness query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Dump data is ready to read.
    Readable,
    /// No dump is ready for this consumer.
    NotReadable,
}

impl Readiness {
    /// Returns true for [`Readiness::Readable`].
    #[must_use]
    pub const fn is_readable(self) -> bool {
        matches!(self, Self::Readable)
    }
}

/// An open reader of a ramdump device.
///
/// Every consumer registered when a dump starts receives the full stream:
/// the core header followed by every segment in order. A read returning
/// `Ok(0)` marks the end of one dump and rewinds the cursor for the next.
///
/// Dropping the consumer unregisters it. If it was part of a running dump,
/// its slot is released so the producer does not wait for it.
#[derive(Debug)]
pub struct Consumer {
    device: RamdumpDevice,
    entry: Arc<ConsumerEntry>,
    position: u64,
    generation: u64,
    mode: ReadMode,
}

impl Consumer {
    pub(crate) fn new(device: RamdumpDevice, entry: Arc<ConsumerEntry>) -> Self {
        Self {
            device,
            entry,
            position: 0,
            generation: 0,
            mode: ReadMode::Blocking,
        }
    }

    /// Returns the consumer id.
    #[must_use]
    pub fn id(&self) -> ConsumerId {
        self.entry.id
    }

    /// Returns the device this consumer reads from.
    #[must_use]
    pub fn device(&self) -> &RamdumpDevice {
        &self.device
    }

    /// Returns the current stream offset.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Returns the read mode.
    #[must_use]
    pub fn mode(&self) -> ReadMode {
        self.mode
    }

    /// Sets the read mode.
    pub fn set_mode(&mut self, mode: ReadMode) {
        self.mode = mode;
    }

    pub(crate) fn entry(&self) -> &ConsumerEntry {
        &self.entry
    }

    /// Reads the next bytes of the stream into `buf`.
    ///
    /// # Errors
    ///
    /// See [`RamdumpDevice::read_at`].
    pub fn read(&mut self, buf: &mut [u8]) -> ReadResult<usize> {
        let len = buf.len();
        self.read_into(buf, len)
    }

    /// Reads up to `max_len` bytes of the stream into a user buffer.
    ///
    /// # Errors
    ///
    /// See [`RamdumpDevice::read_at`].
    pub fn read_into<B: UserBuffer + ?Sized>(
        &mut self,
        buf: &mut B,
        max_len: usize,
    ) -> ReadResult<usize> {
        self.sync_generation();
        let mut position = self.position;
        let result = self
            .device
            .read_at(self, buf, max_len, &mut position, self.mode);
        self.position = position;
        result
    }

    /// Reports whether a dump is ready for this consumer. Level-triggered:
    /// stays readable until this consumer finishes the dump.
    #[must_use]
    pub fn poll(&self) -> Readiness {
        if self.entry.is_ready() {
            Readiness::Readable
        } else {
            Readiness::NotReadable
        }
    }

    /// Waits up to `timeout` for a dump to become ready.
    #[must_use]
    pub fn wait_readable(&self, timeout: Duration) -> Readiness {
        self.device.shared.wait_ready(&self.entry, Some(timeout));
        self.poll()
    }

    /// Closes the consumer.
    pub fn close(self) {
        drop(self);
    }

    /// A cursor left over from an aborted dump must not carry into the next.
    fn sync_generation(&mut self) {
        let generation = self.entry.generation.load(Ordering::Acquire);
        if generation != self.generation {
            self.generation = generation;
            self.position = 0;
        }
    }
}

impl Drop for Consumer {
    fn drop(&mut self) {
        self.device.shared.unregister(&self.entry);
    }
}

impl io::Read for Consumer {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Consumer::read(self, buf).map_err(io::Error::from)
    }
}
