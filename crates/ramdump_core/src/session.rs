//! Dump sessions: the producer side of a device.

use crate::device::{RamdumpDevice, SessionStatus};
use crate::error::{DumpError, DumpResult};
use crate::header::{CoreFormat, CoreHeader, HeaderOptions};
use crate::segment::{compact, Segment, SegmentTable};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{error, info};

/// Header and segments served to consumers during one dump.
#[derive(Debug)]
pub(crate) struct ActiveSession {
    pub(crate) header: CoreHeader,
    pub(crate) segments: SegmentTable,
}

/// Clears the session and the active flag on every exit path.
struct SessionGuard<'a> {
    device: &'a RamdumpDevice,
}

impl<'a> SessionGuard<'a> {
    fn claim(device: &'a RamdumpDevice) -> DumpResult<Self> {
        device
            .shared
            .session_active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| DumpError::SessionInProgress)?;
        Ok(Self { device })
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        self.device.shared.session.write().take();
        self.device
            .shared
            .session_active
            .store(false, Ordering::Release);
    }
}

impl RamdumpDevice {
    /// Runs one dump session.
    ///
    /// Every consumer open at the start of the call receives the stream
    /// `[header][segment 0]..[segment N-1]`. The call returns when all of
    /// them have finished, or when the configured wait timeout elapses.
    ///
    /// If `complete` is set, segment sizes are first rewritten in place to
    /// the distance to the next segment's address (see [`compact`]).
    ///
    /// # Errors
    ///
    /// - [`DumpError::SessionInProgress`] if another dump is running
    /// - [`DumpError::DeviceDestroyed`] if the device was destroyed
    /// - [`DumpError::NoConsumers`] if no consumer is open
    /// - [`DumpError::OutOfMemory`] or [`DumpError::TooManySegments`] if the
    ///   header cannot be built
    /// - [`DumpError::Timeout`] if consumers did not finish in time
    /// - [`DumpError::SessionFailed`] if the last consumer to finish did not
    ///   reach a clean end of stream
    pub fn dump(
        &self,
        segments: &mut [Segment],
        format: CoreFormat,
        complete: bool,
    ) -> DumpResult<()> {
        let shared = &self.shared;
        shared.stats.record_dump_request();

        let result = self.run_session(segments, format, complete);
        match &result {
            Ok(()) => shared.stats.record_dump_completed(),
            Err(DumpError::Timeout { .. }) => shared.stats.record_dump_timeout(),
            Err(_) => shared.stats.record_dump_failed(),
        }
        result
    }

    fn run_session(
        &self,
        segments: &mut [Segment],
        format: CoreFormat,
        complete: bool,
    ) -> DumpResult<()> {
        let shared = &self.shared;
        let _guard = SessionGuard::claim(self)?;

        if shared.destroyed.load(Ordering::Acquire) {
            return Err(DumpError::DeviceDestroyed);
        }

        let participants = {
            // Lock order: quiescence, then consumers. A late release from an
            // aborted session cannot touch the new session's count.
            let _barrier = shared.quiescence.write();
            let consumers = shared.consumers.lock();
            if consumers.is_empty() {
                error!(device = %shared.name, "no consumers, aborting ramdump");
                return Err(DumpError::NoConsumers {
                    device: shared.name.clone(),
                });
            }

            if complete {
                compact(segments);
            }

            let table = SegmentTable::new(segments.to_vec());
            let options = HeaderOptions {
                machine: shared.config.machine,
            };
            let header = CoreHeader::build(&table, format, &options).inspect_err(|e| {
                error!(device = %shared.name, error = %e, "failed to build core header");
            })?;

            info!(
                device = %shared.name,
                %format,
                segments = table.len(),
                header_bytes = header.len(),
                total_bytes = table.total_size(),
                consumers = consumers.len(),
                "starting ramdump"
            );

            *shared.session.write() = Some(Arc::new(ActiveSession {
                header,
                segments: table,
            }));

            let generation = shared.generation.fetch_add(1, Ordering::AcqRel) + 1;
            shared.abort.store(false, Ordering::Release);
            shared.set_status(SessionStatus::Pending);
            shared.readers_left.store(consumers.len(), Ordering::Release);
            shared.completion.reinit();
            for entry in consumers.values() {
                entry.generation.store(generation, Ordering::Release);
            }
            for entry in consumers.values() {
                entry.data_ready.store(true, Ordering::Release);
            }
            shared.wake_readers();
            consumers.len()
        };

        let timeout = shared.config.wait_timeout;
        if !shared.completion.wait_timeout(timeout) {
            error!(
                device = %shared.name,
                ?timeout,
                consumers = participants,
                "timed out waiting for consumers"
            );
            shared.abort.store(true, Ordering::Release);
            shared.wake_readers();
            // Wait out every read still copying from this session.
            drop(shared.quiescence.write());
            return Err(DumpError::Timeout { timeout });
        }

        if shared.status() == SessionStatus::Clean {
            info!(device = %shared.name, "ramdump complete");
            Ok(())
        } else {
            error!(device = %shared.name, "ramdump failed");
            Err(DumpError::SessionFailed)
        }
    }

    /// Dumps segments as a bare byte stream.
    ///
    /// Sizes are compacted when the device is configured for complete
    /// ramdumps.
    ///
    /// # Errors
    ///
    /// See [`RamdumpDevice::dump`].
    pub fn dump_raw(&self, segments: &mut [Segment]) -> DumpResult<()> {
        self.dump(segments, CoreFormat::Raw, self.shared.config.complete_ramdump)
    }

    /// Dumps segments behind an ELF32 core header.
    ///
    /// Sizes are compacted when the device is configured for complete
    /// ramdumps.
    ///
    /// # Errors
    ///
    /// See [`RamdumpDevice::dump`].
    pub fn dump_elf(&self, segments: &mut [Segment]) -> DumpResult<()> {
        self.dump(
            segments,
            CoreFormat::Elf32Core,
            self.shared.config.complete_ramdump,
        )
    }

    /// Dumps named segments behind a section-style header.
    ///
    /// # Errors
    ///
    /// See [`RamdumpDevice::dump`].
    pub fn dump_minidump(&self, segments: &mut [Segment]) -> DumpResult<()> {
        self.dump(segments, CoreFormat::SectionCore, false)
    }

    /// Dumps segments behind an ELF32 core header, never compacting.
    ///
    /// # Errors
    ///
    /// See [`RamdumpDevice::dump`].
    pub fn dump_minidump_elf32(&self, segments: &mut [Segment]) -> DumpResult<()> {
        self.dump(segments, CoreFormat::Elf32Core, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceConfig;
    use crate::types::DeviceId;
    use ramdump_memory::InMemoryRegion;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    fn device() -> RamdumpDevice {
        RamdumpDevice::new(
            DeviceId::new(0),
            "ramdump_test".into(),
            DeviceConfig::new().wait_timeout(Duration::from_secs(10)),
        )
    }

    fn read_all(consumer: &mut crate::Consumer) -> Vec<u8> {
        let mut out = Vec::new();
        let mut buf = [0u8; 16];
        loop {
            let n = consumer.read(&mut buf).unwrap();
            if n == 0 {
                return out;
            }
            out.extend_from_slice(&buf[..n]);
        }
    }

    #[test]
    fn open_is_not_blocked_by_install_barrier() {
        let device = device();
        let mut first = device.open();
        let token = device.shared.quiescence.read();

        let producer = thread::spawn({
            let device = device.clone();
            move || {
                let region = InMemoryRegion::new(0x1000, vec![7; 32]);
                let mut segments = vec![Segment::mapped(Arc::new(region))];
                device.dump(&mut segments, CoreFormat::Raw, false)
            }
        });

        while !device.is_session_active() {
            thread::yield_now();
        }
        thread::sleep(Duration::from_millis(50));

        let (tx, rx) = mpsc::channel();
        thread::spawn({
            let device = device.clone();
            move || tx.send(device.open()).unwrap()
        });
        let mut second = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("open blocked behind the quiescence barrier");
        drop(token);

        // Registered before installation, so it takes part in the dump.
        assert_eq!(read_all(&mut first), vec![7; 32]);
        assert_eq!(read_all(&mut second), vec![7; 32]);
        producer.join().unwrap().unwrap();
    }

    #[test]
    fn session_is_cleared_after_dump() {
        let device = device();
        let mut consumer = device.open();

        let producer = thread::spawn({
            let device = device.clone();
            move || {
                let region = InMemoryRegion::new(0x2000, vec![1; 8]);
                let mut segments = vec![Segment::mapped(Arc::new(region))];
                device.dump(&mut segments, CoreFormat::Raw, false)
            }
        });

        assert_eq!(read_all(&mut consumer), vec![1; 8]);
        producer.join().unwrap().unwrap();
        assert!(device.shared.session.read().is_none());
        assert!(!device.is_session_active());
    }
}
