//! Device statistics.
//!
//! Counters for monitoring dump sessions and consumer reads.
//!
//! # Usage
//!
//! ```rust
//! use ramdump_core::{DeviceConfig, DeviceRegistry};
//!
//! let registry = DeviceRegistry::default();
//! let device = registry.create("adsp", DeviceConfig::default()).unwrap();
//!
//! let stats = device.stats().snapshot();
//! assert_eq!(stats.dumps_requested, 0);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Per-device counters.
///
/// All counters are atomic and can be read while a session is running.
#[derive(Debug, Default)]
pub struct DeviceStats {
    // Producer side
    dumps_requested: AtomicU64,
    dumps_completed: AtomicU64,
    dumps_failed: AtomicU64,
    dumps_timed_out: AtomicU64,

    // Consumer side
    reads: AtomicU64,
    bytes_read: AtomicU64,
    read_errors: AtomicU64,
    aborts: AtomicU64,
}

impl DeviceStats {
    /// Creates a new stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_dump_request(&self) {
        self.dumps_requested.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dump_completed(&self) {
        self.dumps_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dump_failed(&self) {
        self.dumps_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dump_timeout(&self) {
        self.dumps_timed_out.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_read(&self, bytes: u64) {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.bytes_read.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_read_error(&self) {
        self.read_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_abort(&self) {
        self.aborts.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of dump requests.
    pub fn dumps_requested(&self) -> u64 {
        self.dumps_requested.load(Ordering::Relaxed)
    }

    /// Returns the number of dumps every consumer finished cleanly.
    pub fn dumps_completed(&self) -> u64 {
        self.dumps_completed.load(Ordering::Relaxed)
    }

    /// Returns the number of dumps rejected or failed, excluding timeouts.
    pub fn dumps_failed(&self) -> u64 {
        self.dumps_failed.load(Ordering::Relaxed)
    }

    /// Returns the number of dumps that timed out.
    pub fn dumps_timed_out(&self) -> u64 {
        self.dumps_timed_out.load(Ordering::Relaxed)
    }

    /// Returns the number of successful read calls.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Returns the total bytes handed to consumers.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read.load(Ordering::Relaxed)
    }

    /// Returns the number of reads that failed with a fault or memory error.
    pub fn read_errors(&self) -> u64 {
        self.read_errors.load(Ordering::Relaxed)
    }

    /// Returns the number of reads that observed an aborted session.
    pub fn aborts(&self) -> u64 {
        self.aborts.load(Ordering::Relaxed)
    }

    /// Returns a snapshot of all stats.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            dumps_requested: self.dumps_requested(),
            dumps_completed: self.dumps_completed(),
            dumps_failed: self.dumps_failed(),
            dumps_timed_out: self.dumps_timed_out(),
            reads: self.reads(),
            bytes_read: self.bytes_read(),
            read_errors: self.read_errors(),
            aborts: self.aborts(),
        }
    }
}

/// A point-in-time snapshot of device statistics.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Number of dump requests.
    pub dumps_requested: u64,
    /// Number of clean dumps.
    pub dumps_completed: u64,
    /// Number of failed dumps, excluding timeouts.
    pub dumps_failed: u64,
    /// Number of timed out dumps.
    pub dumps_timed_out: u64,
    /// Number of successful read calls.
    pub reads: u64,
    /// Total bytes handed to consumers.
    pub bytes_read: u64,
    /// Number of faulted reads.
    pub read_errors: u64,
    /// Number of aborted reads.
    pub aborts: u64,
}
