//! # Ramdump Core
//!
//! Capture engine for crash ramdumps.
//!
//! A producer (a crash handler) hands a list of physical memory segments to
//! a [`RamdumpDevice`]. Every consumer that has the device open when the
//! dump starts reads the memory out as one byte stream, optionally prefixed
//! by a synthesized ELF core header. The producer waits, with a bound, for
//! all of them to finish.
//!
//! This crate provides:
//! - [`SegmentTable`] - the ordered segments that make up the stream
//! - [`CoreHeader`] - ELF32 core and section-style (minidump) header synthesis
//! - [`CoreLayout`] - parsing a synthesized header back into segments
//! - [`RamdumpDevice::dump`] - the session coordinator
//! - [`Consumer`] - the per-reader stream cursor
//! - [`DeviceRegistry`] - named device instances and minor allocation
//!
//! ## Example
//!
//! ```rust
//! use ramdump_core::{CoreFormat, DeviceConfig, DeviceRegistry, Segment};
//! use ramdump_memory::InMemoryRegion;
//! use std::sync::Arc;
//! use std::thread;
//!
//! let registry = DeviceRegistry::default();
//! let device = registry.create("modem", DeviceConfig::default()).unwrap();
//! let mut consumer = device.open();
//!
//! let producer = thread::spawn({
//!     let device = device.clone();
//!     move || {
//!         let region = InMemoryRegion::new(0x1000, vec![0xAB; 64]);
//!         let mut segments = vec![Segment::mapped(Arc::new(region))];
//!         device.dump(&mut segments, CoreFormat::Elf32Core, false)
//!     }
//! });
//!
//! let mut stream = Vec::new();
//! let mut buf = [0u8; 4096];
//! loop {
//!     let n = consumer.read(&mut buf).unwrap();
//!     if n == 0 {
//!         break;
//!     }
//!     stream.extend_from_slice(&buf[..n]);
//! }
//!
//! assert!(producer.join().unwrap().is_ok());
//! assert_eq!(stream.len(), 52 + 32 + 64);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod buffer;
mod completion;
mod config;
mod consumer;
mod device;
mod error;
mod header;
mod reader;
mod registry;
mod segment;
mod session;
mod stats;
mod types;

pub use buffer::{BufferFault, UserBuffer};
pub use config::{
    DeviceConfig, RegistryConfig, DEFAULT_WAIT_TIMEOUT, DEVICE_NAME_PREFIX, MAX_CHUNK_SIZE,
    MAX_DEVICES,
};
pub use consumer::{Consumer, ReadMode, Readiness};
pub use device::RamdumpDevice;
pub use error::{
    DumpError, DumpResult, ParseError, ReadError, ReadResult, RegistryError, RegistryResult,
};
pub use header::{
    elf, CoreEntry, CoreFormat, CoreHeader, CoreLayout, HeaderOptions, MAX_NAME_LENGTH,
    STRING_TABLE_NAME, STRING_TABLE_SIZE,
};
pub use registry::DeviceRegistry;
pub use segment::{compact, Segment, SegmentPosition, SegmentTable};
pub use stats::{DeviceStats, StatsSnapshot};
pub use types::{ConsumerId, DeviceId};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
