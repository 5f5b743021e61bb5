//! Ramdump device state shared by the producer and its consumers.

use crate::completion::Completion;
use crate::config::DeviceConfig;
use crate::consumer::Consumer;
use crate::session::ActiveSession;
use crate::stats::DeviceStats;
use crate::types::{ConsumerId, DeviceId};
use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Outcome recorded by the last consumer to finish a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum SessionStatus {
    Pending = 0,
    Clean = 1,
    Failed = 2,
}

impl SessionStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Clean,
            2 => Self::Failed,
            _ => Self::Pending,
        }
    }
}

/// Registration record of one open consumer.
#[derive(Debug)]
pub(crate) struct ConsumerEntry {
    pub(crate) id: ConsumerId,
    /// Set when a session starts, cleared when this consumer finishes it.
    pub(crate) data_ready: AtomicBool,
    /// Session number the ready flag belongs to.
    pub(crate) generation: AtomicU64,
}

impl ConsumerEntry {
    fn new(id: ConsumerId) -> Self {
        Self {
            id,
            data_ready: AtomicBool::new(false),
            generation: AtomicU64::new(0),
        }
    }

    pub(crate) fn is_ready(&self) -> bool {
        self.data_ready.load(Ordering::Acquire)
    }
}

pub(crate) struct DeviceShared {
    pub(crate) id: DeviceId,
    pub(crate) name: String,
    pub(crate) config: DeviceConfig,

    /// The consumer-set lock. Never held across a wait.
    pub(crate) consumers: Mutex<HashMap<ConsumerId, Arc<ConsumerEntry>>>,
    pub(crate) readers_left: AtomicUsize,
    status: AtomicU8,

    pub(crate) session: RwLock<Option<Arc<ActiveSession>>>,
    pub(crate) session_active: AtomicBool,
    pub(crate) generation: AtomicU64,
    pub(crate) abort: AtomicBool,
    pub(crate) destroyed: AtomicBool,

    pub(crate) completion: Completion,
    wait_lock: Mutex<()>,
    ready: Condvar,

    /// Readers hold it shared for the whole read; the abort path takes it
    /// exclusively to wait out in-flight copies.
    pub(crate) quiescence: RwLock<()>,

    pub(crate) stats: DeviceStats,
    next_consumer: AtomicU64,
}

impl DeviceShared {
    pub(crate) fn status(&self) -> SessionStatus {
        SessionStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    pub(crate) fn set_status(&self, status: SessionStatus) {
        self.status.store(status as u8, Ordering::Release);
    }

    /// Releases the consumer's slot in the current session.
    ///
    /// Only the caller that clears the ready flag decrements the
    /// outstanding count, so a consumer is counted out at most once. The
    /// last one out signals the producer.
    pub(crate) fn release(&self, entry: &ConsumerEntry) {
        if !entry.data_ready.swap(false, Ordering::AcqRel) {
            return;
        }

        let previous = self
            .readers_left
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        if previous == Ok(1) {
            debug!(device = %self.name, consumer = %entry.id, "last consumer finished");
            self.completion.complete();
        }
    }

    /// Wakes every thread blocked on readiness.
    pub(crate) fn wake_readers(&self) {
        let _guard = self.wait_lock.lock();
        self.ready.notify_all();
    }

    /// Blocks until the consumer is ready or the device is destroyed.
    ///
    /// Returns false if `timeout` elapsed first.
    pub(crate) fn wait_ready(&self, entry: &ConsumerEntry, timeout: Option<Duration>) -> bool {
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        let mut guard = self.wait_lock.lock();
        loop {
            if entry.is_ready() || self.destroyed.load(Ordering::Acquire) {
                return true;
            }
            match deadline {
                Some(deadline) => {
                    if self.ready.wait_until(&mut guard, deadline).timed_out() {
                        return entry.is_ready() || self.destroyed.load(Ordering::Acquire);
                    }
                }
                None => self.ready.wait(&mut guard),
            }
        }
    }

    fn register(self: &Arc<Self>) -> Arc<ConsumerEntry> {
        let id = ConsumerId::new(self.next_consumer.fetch_add(1, Ordering::Relaxed));
        let entry = Arc::new(ConsumerEntry::new(id));
        self.consumers.lock().insert(id, Arc::clone(&entry));
        debug!(device = %self.name, consumer = %id, "consumer registered");
        entry
    }

    pub(crate) fn unregister(&self, entry: &ConsumerEntry) {
        let mut consumers = self.consumers.lock();
        self.release(entry);
        consumers.remove(&entry.id);
        debug!(device = %self.name, consumer = %entry.id, "consumer unregistered");
    }
}

impl fmt::Debug for DeviceShared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RamdumpDevice")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("consumers", &self.consumers.lock().len())
            .field("session_active", &self.session_active.load(Ordering::Relaxed))
            .field("destroyed", &self.destroyed.load(Ordering::Relaxed))
            .finish()
    }
}

/// A named ramdump device.
///
/// Cloning is cheap: all clones refer to the same device. Producers call
/// [`RamdumpDevice::dump`] and consumers are created with
/// [`RamdumpDevice::open`].
#[derive(Clone, Debug)]
pub struct RamdumpDevice {
    pub(crate) shared: Arc<DeviceShared>,
}

impl RamdumpDevice {
    pub(crate) fn new(id: DeviceId, name: String, config: DeviceConfig) -> Self {
        let shared = DeviceShared {
            id,
            name,
            config,
            consumers: Mutex::new(HashMap::new()),
            readers_left: AtomicUsize::new(0),
            status: AtomicU8::new(SessionStatus::Pending as u8),
            session: RwLock::new(None),
            session_active: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            abort: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
            completion: Completion::default(),
            wait_lock: Mutex::new(()),
            ready: Condvar::new(),
            quiescence: RwLock::new(()),
            stats: DeviceStats::new(),
            next_consumer: AtomicU64::new(1),
        };
        Self {
            shared: Arc::new(shared),
        }
    }

    /// Returns the device node name, `ramdump_<name>`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Returns the device minor.
    #[must_use]
    pub fn id(&self) -> DeviceId {
        self.shared.id
    }

    /// Returns the device configuration.
    #[must_use]
    pub fn config(&self) -> &DeviceConfig {
        &self.shared.config
    }

    /// Returns the device statistics.
    #[must_use]
    pub fn stats(&self) -> &DeviceStats {
        &self.shared.stats
    }

    /// Returns the number of open consumers.
    #[must_use]
    pub fn consumer_count(&self) -> usize {
        self.shared.consumers.lock().len()
    }

    /// Returns true while a dump is running.
    #[must_use]
    pub fn is_session_active(&self) -> bool {
        self.shared.session_active.load(Ordering::Acquire)
    }

    /// Returns true once the device has been destroyed.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.shared.destroyed.load(Ordering::Acquire)
    }

    /// Opens a new consumer on this device.
    ///
    /// A consumer opened while a dump is running does not take part in it;
    /// it becomes ready with the next dump.
    #[must_use]
    pub fn open(&self) -> Consumer {
        let entry = self.shared.register();
        Consumer::new(self.clone(), entry)
    }

    /// Marks the device destroyed and wakes every blocked reader.
    pub(crate) fn mark_destroyed(&self) {
        self.shared.destroyed.store(true, Ordering::Release);
        self.shared.wake_readers();
    }

    pub(crate) fn same_device(&self, other: &RamdumpDevice) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device() -> RamdumpDevice {
        RamdumpDevice::new(DeviceId::new(0), "ramdump_test".into(), DeviceConfig::default())
    }

    #[test]
    fn open_and_drop_registers_consumers() {
        let device = device();
        let first = device.open();
        let second = device.open();
        assert_eq!(device.consumer_count(), 2);
        assert_ne!(first.id(), second.id());

        drop(first);
        assert_eq!(device.consumer_count(), 1);
        second.close();
        assert_eq!(device.consumer_count(), 0);
    }

    #[test]
    fn release_counts_each_consumer_once() {
        let device = device();
        let shared = &device.shared;
        let entry = ConsumerEntry::new(ConsumerId::new(9));

        entry.data_ready.store(true, Ordering::Release);
        shared.readers_left.store(2, Ordering::Release);

        shared.release(&entry);
        shared.release(&entry);
        assert_eq!(shared.readers_left.load(Ordering::Acquire), 1);
    }

    #[test]
    fn last_release_completes() {
        let device = device();
        let shared = &device.shared;
        let entry = ConsumerEntry::new(ConsumerId::new(1));

        shared.completion.reinit();
        entry.data_ready.store(true, Ordering::Release);
        shared.readers_left.store(1, Ordering::Release);
        shared.release(&entry);

        assert!(shared.completion.wait_timeout(Duration::ZERO));
    }

    #[test]
    fn status_roundtrip() {
        let device = device();
        assert_eq!(device.shared.status(), SessionStatus::Pending);
        device.shared.set_status(SessionStatus::Failed);
        assert_eq!(device.shared.status(), SessionStatus::Failed);
    }

    #[test]
    fn wait_ready_times_out() {
        let device = device();
        let consumer = device.open();
        assert!(!device
            .shared
            .wait_ready(consumer.entry(), Some(Duration::from_millis(10))));
    }

    #[test]
    fn destroy_wakes_waiters() {
        let device = device();
        let consumer = device.open();
        device.mark_destroyed();
        assert!(device.shared.wait_ready(consumer.entry(), None));
        assert!(device.is_destroyed());
    }
}
