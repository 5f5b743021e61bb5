//! # Ramdump Memory
//!
//! Physical memory access layer for ramdump capture.
//!
//! This crate provides the lowest-level abstraction the capture engine reads
//! from. Regions are **opaque byte windows** over physical memory - they do
//! not know about segments, core headers or sessions.
//!
//! ## Design Principles
//!
//! - A [`MemoryRegion`] is a mapped window with a physical base address
//! - A [`PhysicalMemory`] backend maps `(address, len)` ranges on demand
//! - Narrow (byte) and bulk (word) reads are separate operations, because
//!   device memory may reject wide accesses that are not naturally aligned
//! - Everything is `Send + Sync` so concurrent readers can share a region
//!
//! ## Available Implementations
//!
//! - [`InMemoryRegion`] / [`InMemoryPhysical`] - Heap-backed memory for tests and simulation
//! - [`FilePhysical`] - A raw memory image file addressed from a base address
//! - [`StrictAccessRegion`] - Device memory that faults on misaligned bulk accesses
//!
//! ## Example
//!
//! ```rust
//! use ramdump_memory::{copy_possibly_unaligned, InMemoryRegion, MemoryRegion};
//!
//! let region = InMemoryRegion::new(0x1003, b"hello world".to_vec());
//! let mut out = [0u8; 5];
//! copy_possibly_unaligned(&mut out, &region, 6).unwrap();
//! assert_eq!(&out, b"world");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod copy;
mod error;
mod file;
mod memory;
mod region;
mod strict;

pub use copy::{copy_from_region, copy_possibly_unaligned, CopyStrategy, WORD_SIZE};
pub use error::{MemoryError, MemoryResult};
pub use file::{FilePhysical, FileWindow};
pub use memory::{InMemoryPhysical, InMemoryRegion};
pub use region::{MemoryRegion, PhysicalMemory};
pub use strict::StrictAccessRegion;
