//! Device memory with access-width restrictions.

use crate::copy::WORD_SIZE;
use crate::error::{MemoryError, MemoryResult};
use crate::memory::InMemoryRegion;
use crate::region::MemoryRegion;
use std::sync::atomic::{AtomicU64, Ordering};

/// A region that models device (MMIO-like) memory.
///
/// Narrow reads are accepted at any address. Bulk reads must start on a
/// [`WORD_SIZE`] boundary of the *physical* address and cover a whole
/// number of words; anything else fails with
/// [`MemoryError::MisalignedAccess`], the way a bus would fault.
///
/// The region counts how many bytes were moved by each access kind.
#[derive(Debug)]
pub struct StrictAccessRegion {
    inner: InMemoryRegion,
    narrow_bytes: AtomicU64,
    bulk_bytes: AtomicU64,
}

impl StrictAccessRegion {
    /// Wraps a heap region with device access rules.
    #[must_use]
    pub fn new(inner: InMemoryRegion) -> Self {
        Self {
            inner,
            narrow_bytes: AtomicU64::new(0),
            bulk_bytes: AtomicU64::new(0),
        }
    }

    /// Returns the number of bytes read with narrow accesses.
    pub fn narrow_bytes(&self) -> u64 {
        self.narrow_bytes.load(Ordering::Relaxed)
    }

    /// Returns the number of bytes read with bulk accesses.
    pub fn bulk_bytes(&self) -> u64 {
        self.bulk_bytes.load(Ordering::Relaxed)
    }
}

impl MemoryRegion for StrictAccessRegion {
    fn base(&self) -> u64 {
        self.inner.base()
    }

    fn len(&self) -> u64 {
        self.inner.len()
    }

    fn read_narrow(&self, offset: u64, dst: &mut [u8]) -> MemoryResult<()> {
        self.inner.read_narrow(offset, dst)?;
        self.narrow_bytes
            .fetch_add(dst.len() as u64, Ordering::Relaxed);
        Ok(())
    }

    fn read_bulk(&self, offset: u64, dst: &mut [u8]) -> MemoryResult<()> {
        let address = self.base().wrapping_add(offset);
        let width = WORD_SIZE as u64;
        if address % width != 0 || dst.len() % WORD_SIZE != 0 {
            return Err(MemoryError::MisalignedAccess {
                address,
                len: dst.len(),
                width: WORD_SIZE,
            });
        }

        self.inner.read_narrow(offset, dst)?;
        self.bulk_bytes.fetch_add(dst.len() as u64, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aligned_bulk_is_accepted() {
        let region = StrictAccessRegion::new(InMemoryRegion::new(0x1000, vec![7u8; 32]));
        let mut out = [0u8; 16];
        region.read_bulk(8, &mut out).unwrap();
        assert_eq!(out, [7u8; 16]);
        assert_eq!(region.bulk_bytes(), 16);
    }

    #[test]
    fn misaligned_bulk_faults() {
        let region = StrictAccessRegion::new(InMemoryRegion::new(0x1001, vec![0u8; 32]));
        let mut out = [0u8; 8];
        assert!(matches!(
            region.read_bulk(0, &mut out),
            Err(MemoryError::MisalignedAccess { address: 0x1001, .. })
        ));

        let mut odd = [0u8; 5];
        assert!(region.read_bulk(7, &mut odd).is_err());
    }

    #[test]
    fn narrow_reads_anywhere() {
        let region = StrictAccessRegion::new(InMemoryRegion::new(0x1003, vec![1u8; 8]));
        let mut out = [0u8; 3];
        region.read_narrow(1, &mut out).unwrap();
        assert_eq!(region.narrow_bytes(), 3);
        assert_eq!(region.bulk_bytes(), 0);
    }
}
