//! Segments and the logical stream layout.

use ramdump_memory::MemoryRegion;
use std::fmt;
use std::ops::Index;
use std::sync::Arc;

/// A contiguous physical memory range exported by a dump.
///
/// The backing memory belongs to the producer. A dump clones the descriptor
/// into its session; the optional `mapping` is shared by reference count and
/// is never freed by the capture engine.
#[derive(Clone)]
pub struct Segment {
    /// Physical start address.
    pub address: u64,
    /// Size in bytes.
    pub size: u64,
    /// Optional section name, used by section-format headers.
    pub name: Option<String>,
    /// Pre-mapped view of the segment. When absent, reads go through the
    /// device's physical memory backend.
    pub mapping: Option<Arc<dyn MemoryRegion>>,
}

impl Segment {
    /// Creates an unnamed, unmapped segment.
    #[must_use]
    pub const fn new(address: u64, size: u64) -> Self {
        Self {
            address,
            size,
            name: None,
            mapping: None,
        }
    }

    /// Creates a segment covering a whole mapped region.
    #[must_use]
    pub fn mapped(region: Arc<dyn MemoryRegion>) -> Self {
        Self {
            address: region.base(),
            size: region.len(),
            name: None,
            mapping: Some(region),
        }
    }

    /// Sets the section name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the pre-mapped view.
    #[must_use]
    pub fn with_mapping(mut self, mapping: Arc<dyn MemoryRegion>) -> Self {
        self.mapping = Some(mapping);
        self
    }

    /// Returns the section name, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl fmt::Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Segment")
            .field("address", &format_args!("{:#x}", self.address))
            .field("size", &self.size)
            .field("name", &self.name)
            .field("mapped", &self.mapping.is_some())
            .finish()
    }
}

/// Where a stream offset lands inside the segment table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentPosition {
    /// Index of the segment.
    pub index: usize,
    /// Offset inside the segment.
    pub offset: u64,
    /// Bytes left in the segment from `offset`.
    pub remaining: u64,
}

/// The ordered segments of one dump.
///
/// Order defines the stream: segment bytes are concatenated in table order
/// after the core header.
#[derive(Debug, Clone, Default)]
pub struct SegmentTable {
    segments: Vec<Segment>,
}

impl SegmentTable {
    /// Creates a table from segments in stream order.
    #[must_use]
    pub fn new(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    /// Returns the number of segments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Returns true if the table has no segments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns the segments.
    #[must_use]
    pub fn as_slice(&self) -> &[Segment] {
        &self.segments
    }

    /// Iterates over the segments in stream order.
    pub fn iter(&self) -> std::slice::Iter<'_, Segment> {
        self.segments.iter()
    }

    /// Returns the sum of all segment sizes.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.segments
            .iter()
            .fold(0u64, |acc, s| acc.saturating_add(s.size))
    }

    /// Translates an offset into the segment byte stream.
    ///
    /// Walks the table subtracting each segment's size until the offset
    /// falls inside one. Returns `None` at or past the end of the stream.
    #[must_use]
    pub fn translate(&self, offset: u64) -> Option<SegmentPosition> {
        let mut offset = offset;
        for (index, segment) in self.segments.iter().enumerate() {
            if offset < segment.size {
                return Some(SegmentPosition {
                    index,
                    offset,
                    remaining: segment.size - offset,
                });
            }
            offset -= segment.size;
        }
        None
    }
}

impl From<Vec<Segment>> for SegmentTable {
    fn from(segments: Vec<Segment>) -> Self {
        Self::new(segments)
    }
}

impl Index<usize> for SegmentTable {
    type Output = Segment;

    fn index(&self, index: usize) -> &Self::Output {
        &self.segments[index]
    }
}

impl<'a> IntoIterator for &'a SegmentTable {
    type Item = &'a Segment;
    type IntoIter = std::slice::Iter<'a, Segment>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.iter()
    }
}

/// Rewrites segment sizes for a complete ramdump.
///
/// Each segment's size becomes the distance to the next segment's address,
/// so the stream covers the whole range including gaps. The last segment
/// keeps its size.
///
/// Segments must be sorted by ascending address. This is not checked:
/// unsorted input produces wrapped, meaningless sizes.
pub fn compact(segments: &mut [Segment]) {
    for i in 1..segments.len() {
        let next = segments[i].address;
        let current = &mut segments[i - 1];
        current.size = next.wrapping_sub(current.address);
    }
}
