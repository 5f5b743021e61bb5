//! Heap-backed memory for tests and simulation.

use crate::error::{MemoryError, MemoryResult};
use crate::region::{check_range, MemoryRegion, PhysicalMemory};
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A memory region backed by a shared heap buffer.
///
/// Cloning a region is cheap: the underlying bytes are reference counted,
/// so a producer can hand the same memory to a capture session without
/// copying it.
///
/// # Example
///
/// ```rust
/// use ramdump_memory::{InMemoryRegion, MemoryRegion};
///
/// let region = InMemoryRegion::new(0x8000_0000, vec![0xAA; 64]);
/// assert_eq!(region.base(), 0x8000_0000);
/// assert_eq!(region.len(), 64);
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryRegion {
    base: u64,
    data: Bytes,
}

impl InMemoryRegion {
    /// Creates a region at physical address `base` holding `data`.
    #[must_use]
    pub fn new(base: u64, data: impl Into<Bytes>) -> Self {
        Self {
            base,
            data: data.into(),
        }
    }

    /// Returns a sub-window of this region without copying.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::OutOfRange`] if the window does not fit.
    pub fn window(&self, offset: u64, len: u64) -> MemoryResult<Self> {
        let start = check_range(offset, len as usize, self.len())?;
        Ok(Self {
            base: self.base + offset,
            data: self.data.slice(start..start + len as usize),
        })
    }

    /// Returns the bytes of the region.
    #[must_use]
    pub fn bytes(&self) -> &Bytes {
        &self.data
    }
}

impl MemoryRegion for InMemoryRegion {
    fn base(&self) -> u64 {
        self.base
    }

    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_narrow(&self, offset: u64, dst: &mut [u8]) -> MemoryResult<()> {
        let start = check_range(offset, dst.len(), self.len())?;
        dst.copy_from_slice(&self.data[start..start + dst.len()]);
        Ok(())
    }
}

/// A sparse physical address space made of heap-backed regions.
///
/// Regions must not overlap. A mapping request is satisfied only when a
/// single region covers the whole requested range.
///
/// # Thread Safety
///
/// The region table is guarded by a read-write lock, so regions can be
/// added while other threads map existing ones.
#[derive(Debug, Default)]
pub struct InMemoryPhysical {
    regions: RwLock<BTreeMap<u64, InMemoryRegion>>,
}

impl InMemoryPhysical {
    /// Creates an empty address space.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Places `data` at physical address `base`.
    ///
    /// Returns the region so callers can also use it as a pre-mapped view.
    pub fn insert(&self, base: u64, data: impl Into<Bytes>) -> InMemoryRegion {
        let region = InMemoryRegion::new(base, data);
        self.regions.write().insert(base, region.clone());
        region
    }

    /// Returns the number of regions in the address space.
    #[must_use]
    pub fn region_count(&self) -> usize {
        self.regions.read().len()
    }
}

impl PhysicalMemory for InMemoryPhysical {
    fn map(&self, address: u64, len: u64) -> MemoryResult<Arc<dyn MemoryRegion>> {
        let regions = self.regions.read();
        let unmapped = MemoryError::Unmapped { address, len };

        let (base, region) = regions.range(..=address).next_back().ok_or(unmapped)?;
        let offset = address - base;
        let window = region
            .window(offset, len)
            .map_err(|_| MemoryError::Unmapped { address, len })?;

        Ok(Arc::new(window))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_reads_at_offset() {
        let region = InMemoryRegion::new(0x1000, b"hello world".to_vec());
        let mut out = [0u8; 5];
        region.read_narrow(6, &mut out).unwrap();
        assert_eq!(&out, b"world");
    }

    #[test]
    fn region_read_past_end_fails() {
        let region = InMemoryRegion::new(0x1000, b"hello".to_vec());
        let mut out = [0u8; 4];
        let result = region.read_narrow(3, &mut out);
        assert!(matches!(result, Err(MemoryError::OutOfRange { .. })));
    }

    #[test]
    fn region_window_shares_bytes() {
        let region = InMemoryRegion::new(0x1000, b"0123456789".to_vec());
        let window = region.window(4, 3).unwrap();
        assert_eq!(window.base(), 0x1004);
        assert_eq!(window.len(), 3);
        assert_eq!(window.bytes().as_ref(), b"456");
    }

    #[test]
    fn region_empty_read() {
        let region = InMemoryRegion::new(0, b"abc".to_vec());
        let mut out = [0u8; 0];
        assert!(region.read_narrow(3, &mut out).is_ok());
    }

    #[test]
    fn physical_maps_inside_region() {
        let phys = InMemoryPhysical::new();
        phys.insert(0x1000, vec![1u8; 0x100]);
        phys.insert(0x2000, (0..=255u8).collect::<Vec<_>>());

        let mapped = phys.map(0x2010, 4).unwrap();
        assert_eq!(mapped.base(), 0x2010);
        let mut out = [0u8; 4];
        mapped.read_narrow(0, &mut out).unwrap();
        assert_eq!(out, [0x10, 0x11, 0x12, 0x13]);
        assert_eq!(phys.region_count(), 2);
    }

    #[test]
    fn physical_rejects_gap() {
        let phys = InMemoryPhysical::new();
        phys.insert(0x1000, vec![0u8; 0x100]);

        assert!(matches!(
            phys.map(0x0800, 4),
            Err(MemoryError::Unmapped { .. })
        ));
        assert!(matches!(
            phys.map(0x10F0, 0x20),
            Err(MemoryError::Unmapped { .. })
        ));
    }
}
