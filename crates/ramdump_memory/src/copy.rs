//! Alignment-safe copy out of device memory.

use crate::error::MemoryResult;
use crate::region::MemoryRegion;

/// Natural access width of bulk copies, in bytes.
pub const WORD_SIZE: usize = 8;

/// How chunk copies touch the source memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CopyStrategy {
    /// Split every copy into an unaligned head, an aligned bulk middle and
    /// an unaligned tail. Required for device memory with access-width
    /// restrictions.
    #[default]
    SplitUnaligned,
    /// One bulk read per copy. Only valid for ordinary memory.
    Bulk,
}

/// Copies `dst.len()` bytes from `src` at `offset` into `dst`.
///
/// Alignment is computed on the physical address `src.base() + offset`.
/// The leading bytes up to the first [`WORD_SIZE`] boundary and the
/// trailing bytes after the last whole word are read with narrow accesses;
/// the aligned middle is read in one bulk access.
///
/// # Errors
///
/// Propagates any error from the region reads.
pub fn copy_possibly_unaligned(
    dst: &mut [u8],
    src: &dyn MemoryRegion,
    offset: u64,
) -> MemoryResult<()> {
    let len = dst.len();
    if len == 0 {
        return Ok(());
    }

    let address = src.base().wrapping_add(offset);
    let misalign = (address % WORD_SIZE as u64) as usize;
    let head = if misalign == 0 {
        0
    } else {
        (WORD_SIZE - misalign).min(len)
    };
    let tail = (len - head) % WORD_SIZE;
    let bulk = len - head - tail;

    let (head_dst, rest) = dst.split_at_mut(head);
    let (bulk_dst, tail_dst) = rest.split_at_mut(bulk);

    if head > 0 {
        src.read_narrow(offset, head_dst)?;
    }
    if bulk > 0 {
        src.read_bulk(offset + head as u64, bulk_dst)?;
    }
    if tail > 0 {
        src.read_narrow(offset + (head + bulk) as u64, tail_dst)?;
    }

    Ok(())
}

/// Copies out of `src` using the given strategy.
///
/// # Errors
///
/// Propagates any error from the region reads.
pub fn copy_from_region(
    dst: &mut [u8],
    src: &dyn MemoryRegion,
    offset: u64,
    strategy: CopyStrategy,
) -> MemoryResult<()> {
    match strategy {
        CopyStrategy::SplitUnaligned => copy_possibly_unaligned(dst, src, offset),
        CopyStrategy::Bulk => src.read_bulk(offset, dst),
    }
}
