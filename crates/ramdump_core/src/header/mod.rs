//! Core header synthesis.
//!
//! A dump stream is `[header][segment 0][segment 1]...`. The header
//! describes where each segment's bytes start in that stream, so any ELF
//! tool can open a captured stream as a core file.
//!
//! Two header layouts are produced:
//!
//! - **ELF32 core**: ELF32 file header followed by one `PT_LOAD` program
//!   header per segment.
//! - **Section core** (minidump): native-width ELF file header, a null
//!   section, a string table section, one `SHT_PROGBITS` section per
//!   segment, and a fixed-size string table holding the segment names.

pub mod elf;
mod elf32;
mod parse;
mod section;

pub use parse::{CoreEntry, CoreLayout};
pub use section::{MAX_NAME_LENGTH, STRING_TABLE_NAME, STRING_TABLE_SIZE};

use crate::error::{DumpError, DumpResult};
use crate::segment::SegmentTable;
use std::fmt;

/// Header layout placed in front of the segment bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CoreFormat {
    /// No header; the stream is the bare segment bytes.
    #[default]
    Raw,
    /// ELF32 core file with one `PT_LOAD` per segment.
    Elf32Core,
    /// Native-width ELF with one named section per segment.
    SectionCore,
}

impl fmt::Display for CoreFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Raw => "raw",
            Self::Elf32Core => "elf32",
            Self::SectionCore => "section",
        };
        f.write_str(name)
    }
}

/// Knobs for header synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderOptions {
    /// `e_machine` of section-format headers.
    pub machine: u16,
}

impl Default for HeaderOptions {
    fn default() -> Self {
        Self {
            machine: elf::native_machine(),
        }
    }
}

/// A synthesized core header.
///
/// The buffer size is fixed once built and every byte not explicitly
/// populated is zero.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CoreHeader {
    format: CoreFormat,
    bytes: Vec<u8>,
}

impl CoreHeader {
    /// Builds the header describing `segments` in the given format.
    ///
    /// # Errors
    ///
    /// - [`DumpError::OutOfMemory`] if the buffer cannot be allocated
    /// - [`DumpError::TooManySegments`] if the header count overflows
    ///
    /// ELF32 program header values above `u32::MAX` keep their low 32 bits
    /// and are logged; the segment is still described and streamed.
    pub fn build(
        segments: &SegmentTable,
        format: CoreFormat,
        options: &HeaderOptions,
    ) -> DumpResult<Self> {
        let bytes = match format {
            CoreFormat::Raw => Vec::new(),
            CoreFormat::Elf32Core => elf32::build(segments)?,
            CoreFormat::SectionCore => section::build(segments, options.machine)?,
        };
        Ok(Self { format, bytes })
    }

    /// Returns the exact header size for `count` segments.
    #[must_use]
    pub fn size_for(format: CoreFormat, count: usize) -> usize {
        match format {
            CoreFormat::Raw => 0,
            CoreFormat::Elf32Core => elf32::header_size(count),
            CoreFormat::SectionCore => section::header_size(count),
        }
    }

    /// Returns the header format.
    #[must_use]
    pub const fn format(&self) -> CoreFormat {
        self.format
    }

    /// Returns the header size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true for a raw (empty) header.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Returns the header bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Allocates a zero-filled header buffer, reporting allocation failure.
pub(crate) fn zeroed(len: usize) -> DumpResult<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| DumpError::OutOfMemory { requested: len })?;
    buf.resize(len, 0);
    Ok(buf)
}
