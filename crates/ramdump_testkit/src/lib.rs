//! # Ramdump Testkit
//!
//! Test utilities for ramdump capture.
//!
//! This crate provides:
//! - Device and memory fixtures
//! - Destination buffers that fault on demand
//! - Property-based test generators using proptest
//! - Stress testing utilities
//!
//! ## Usage
//!
//! ```rust
//! use ramdump_testkit::prelude::*;
//! use ramdump_core::CoreFormat;
//!
//! let device = TestDevice::new();
//! let (segments, data) = patterned_segments(&[(0x1000, 64), (0x2000, 32)]);
//! let streams = run_dump(&device, segments, CoreFormat::Raw, 1, 16).unwrap();
//! assert_eq!(streams[0], data.concat());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod buffers;
pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::buffers::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use buffers::*;
pub use fixtures::*;
pub use generators::*;
pub use stress::*;
