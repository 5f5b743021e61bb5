//! Stream reads: the consumer side of a device.
//!
//! A consumer's stream is the session header followed by every segment in
//! table order. Each read copies from the header first, then at most one
//! chunk of one segment, so a single call never crosses a segment boundary.

use crate::buffer::UserBuffer;
use crate::consumer::{Consumer, ReadMode};
use crate::device::{ConsumerEntry, DeviceShared, RamdumpDevice, SessionStatus};
use crate::error::{ReadError, ReadResult};
use crate::segment::{Segment, SegmentPosition};
use ramdump_memory::{copy_from_region, MemoryError, MemoryResult};
use std::sync::atomic::Ordering;
use tracing::{debug, error};

impl RamdumpDevice {
    /// Reads up to `max_len` bytes of the current dump stream at `offset`.
    ///
    /// On success `offset` is advanced by the bytes returned. `Ok(0)` means
    /// the consumer reached the end of the stream: `offset` is reset to 0
    /// and the consumer's part in the dump is done.
    ///
    /// In [`ReadMode::Blocking`] mode the call waits until a dump is ready
    /// for this consumer.
    ///
    /// # Errors
    ///
    /// - [`ReadError::WouldBlock`] in non-blocking mode with no dump ready
    /// - [`ReadError::Aborted`] if the producer gave up waiting
    /// - [`ReadError::Closed`] if the device was destroyed, or the consumer
    ///   belongs to another device
    /// - [`ReadError::Fault`] if the destination could not be written
    /// - [`ReadError::Memory`] if segment memory could not be mapped or read
    /// - [`ReadError::OutOfMemory`] if the chunk buffer could not be
    ///   allocated
    ///
    /// Every error except `WouldBlock` ends this consumer's part in the
    /// dump, marks the session failed and resets `offset` to 0.
    pub fn read_at<B: UserBuffer + ?Sized>(
        &self,
        consumer: &Consumer,
        buf: &mut B,
        max_len: usize,
        offset: &mut u64,
        mode: ReadMode,
    ) -> ReadResult<usize> {
        if !self.same_device(consumer.device()) {
            return Err(ReadError::Closed);
        }

        let max_len = max_len.min(buf.capacity());
        if max_len == 0 {
            return Ok(0);
        }

        let shared = &self.shared;
        let entry = consumer.entry();

        let _token = loop {
            if !entry.is_ready() {
                if shared.destroyed.load(Ordering::Acquire) {
                    return Err(ReadError::Closed);
                }
                if mode == ReadMode::NonBlocking {
                    return Err(ReadError::WouldBlock);
                }
                shared.wait_ready(entry, None);
            }
            let token = shared.quiescence.read();
            if entry.is_ready() {
                break token;
            }
        };

        let mut reader = StreamRead {
            shared,
            entry,
            offset,
        };

        if shared.destroyed.load(Ordering::Acquire) {
            return Err(reader.fail(ReadError::Closed));
        }

        let session = shared.session.read().clone();
        let session = match session {
            Some(session) if !shared.abort.load(Ordering::Acquire) => session,
            _ => {
                shared.stats.record_abort();
                error!(device = %shared.name, consumer = %entry.id, "ramdump aborted");
                return Err(reader.fail(ReadError::Aborted));
            }
        };

        let header = session.header.as_bytes();
        let header_len = header.len() as u64;
        let mut copied = 0usize;

        if *reader.offset < header_len {
            let start = *reader.offset as usize;
            let count = (header.len() - start).min(max_len);
            if let Err(fault) = buf.write_at(0, &header[start..start + count]) {
                return Err(reader.fail(fault.into()));
            }
            copied = count;
            *reader.offset += count as u64;
            if copied == max_len {
                shared.stats.record_read(copied as u64);
                return Ok(copied);
            }
        }

        let Some(position) = session.segments.translate(*reader.offset - header_len) else {
            if copied > 0 {
                shared.stats.record_read(copied as u64);
                return Ok(copied);
            }
            return Ok(reader.finish());
        };

        let segment = &session.segments[position.index];
        let chunk = position
            .remaining
            .min(shared.config.max_chunk_size as u64)
            .min((max_len - copied) as u64) as usize;

        debug!(
            device = %shared.name,
            consumer = %entry.id,
            segment = position.index,
            address = format_args!("{:#x}", segment.address),
            intra_offset = position.offset,
            chunk,
            "copying segment chunk"
        );

        let mut staging = Vec::new();
        if staging.try_reserve_exact(chunk).is_err() {
            return Err(reader.fail(ReadError::OutOfMemory { requested: chunk }));
        }
        staging.resize(chunk, 0);

        if let Err(e) = copy_segment(shared, segment, position, &mut staging) {
            return Err(reader.fail(e.into()));
        }
        if let Err(fault) = buf.write_at(copied, &staging) {
            return Err(reader.fail(fault.into()));
        }

        copied += chunk;
        *reader.offset += chunk as u64;
        shared.stats.record_read(copied as u64);
        Ok(copied)
    }
}

/// Copies one chunk of `segment` starting at `position` into `dst`.
fn copy_segment(
    shared: &DeviceShared,
    segment: &Segment,
    position: SegmentPosition,
    dst: &mut [u8],
) -> MemoryResult<()> {
    let strategy = shared.config.copy_strategy;
    if let Some(region) = &segment.mapping {
        return copy_from_region(dst, region.as_ref(), position.offset, strategy);
    }

    let address = segment.address.wrapping_add(position.offset);
    let len = dst.len() as u64;
    let physical = shared
        .config
        .physical
        .as_ref()
        .ok_or(MemoryError::Unmapped { address, len })?;
    let window = physical.map(address, len)?;
    copy_from_region(dst, window.as_ref(), 0, strategy)
}

/// Per-call state for ending a consumer's part in the session.
struct StreamRead<'a> {
    shared: &'a DeviceShared,
    entry: &'a ConsumerEntry,
    offset: &'a mut u64,
}

impl StreamRead<'_> {
    /// Clean end of stream.
    fn finish(self) -> usize {
        debug!(device = %self.shared.name, consumer = %self.entry.id, "end of stream");
        *self.offset = 0;
        self.shared.set_status(SessionStatus::Clean);
        self.shared.release(self.entry);
        0
    }

    fn fail(self, err: ReadError) -> ReadError {
        match &err {
            ReadError::Aborted => {}
            _ => {
                self.shared.stats.record_read_error();
                error!(
                    device = %self.shared.name,
                    consumer = %self.entry.id,
                    error = %err,
                    "ramdump read failed"
                );
            }
        }
        *self.offset = 0;
        self.shared.set_status(SessionStatus::Failed);
        self.shared.release(self.entry);
        err
    }
}
