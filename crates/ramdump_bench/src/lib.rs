//! Shared setup for ramdump benchmarks.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod utils;
