//! ELF32 core header with one `PT_LOAD` per segment.

use super::elf::{self, put_u16, put_u32};
use super::zeroed;
use crate::error::{DumpError, DumpResult};
use crate::segment::SegmentTable;
use tracing::warn;

/// Size of `Elf32_Ehdr`.
pub(crate) const EHDR_SIZE: usize = 52;
/// Size of `Elf32_Phdr`.
pub(crate) const PHDR_SIZE: usize = 32;

// Elf32_Ehdr field offsets.
const E_TYPE: usize = 16;
const E_VERSION: usize = 20;
const E_PHOFF: usize = 28;
const E_EHSIZE: usize = 40;
const E_PHENTSIZE: usize = 42;
const E_PHNUM: usize = 44;

// Elf32_Phdr field offsets.
const P_TYPE: usize = 0;
const P_OFFSET: usize = 4;
const P_VADDR: usize = 8;
const P_PADDR: usize = 12;
const P_FILESZ: usize = 16;
const P_MEMSZ: usize = 20;
const P_FLAGS: usize = 24;

pub(crate) fn header_size(count: usize) -> usize {
    EHDR_SIZE + PHDR_SIZE * count
}

/// Keeps the low 32 bits of a program header value.
///
/// The segment bytes are streamed in full either way; only the header
/// field loses the high bits.
fn narrow(field: &'static str, segment: usize, value: u64) -> u32 {
    if value > u64::from(u32::MAX) {
        warn!(
            field,
            segment,
            value = format_args!("{value:#x}"),
            "value truncated in ELF32 program header"
        );
    }
    value as u32
}

pub(crate) fn build(segments: &SegmentTable) -> DumpResult<Vec<u8>> {
    let count = segments.len();
    let phnum = u16::try_from(count).map_err(|_| DumpError::TooManySegments {
        count,
        max: u16::MAX as usize,
    })?;

    let size = header_size(count);
    let mut buf = zeroed(size)?;

    elf::write_ident(&mut buf, elf::ELFCLASS32);
    put_u16(&mut buf, E_TYPE, elf::ET_CORE);
    put_u32(&mut buf, E_VERSION, u32::from(elf::EV_CURRENT));
    put_u32(&mut buf, E_PHOFF, EHDR_SIZE as u32);
    put_u16(&mut buf, E_EHSIZE, EHDR_SIZE as u16);
    put_u16(&mut buf, E_PHENTSIZE, PHDR_SIZE as u16);
    put_u16(&mut buf, E_PHNUM, phnum);

    let mut offset = size as u64;
    for (i, segment) in segments.iter().enumerate() {
        let at = EHDR_SIZE + i * PHDR_SIZE;
        let address = narrow("p_vaddr", i, segment.address);
        let filesz = narrow("p_filesz", i, segment.size);

        put_u32(&mut buf, at + P_TYPE, elf::PT_LOAD);
        put_u32(&mut buf, at + P_OFFSET, narrow("p_offset", i, offset));
        put_u32(&mut buf, at + P_VADDR, address);
        put_u32(&mut buf, at + P_PADDR, address);
        put_u32(&mut buf, at + P_FILESZ, filesz);
        put_u32(&mut buf, at + P_MEMSZ, filesz);
        put_u32(&mut buf, at + P_FLAGS, elf::PF_R | elf::PF_W | elf::PF_X);

        offset = offset.saturating_add(segment.size);
    }

    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::elf::{get_u16, get_u32};
    use crate::segment::Segment;

    #[test]
    fn two_segment_layout() {
        let table = SegmentTable::new(vec![
            Segment::new(0x1000, 0x100),
            Segment::new(0x2000, 0x200),
        ]);
        let buf = build(&table).unwrap();

        assert_eq!(buf.len(), 52 + 64);
        assert_eq!(&buf[..4], b"\x7fELF");
        assert_eq!(buf[4], elf::ELFCLASS32);
        assert_eq!(get_u16(&buf, E_TYPE), elf::ET_CORE);
        assert_eq!(get_u32(&buf, E_PHOFF), 52);
        assert_eq!(get_u16(&buf, E_PHNUM), 2);

        let ph0 = EHDR_SIZE;
        let ph1 = EHDR_SIZE + PHDR_SIZE;
        assert_eq!(get_u32(&buf, ph0 + P_TYPE), elf::PT_LOAD);
        assert_eq!(get_u32(&buf, ph0 + P_OFFSET), 116);
        assert_eq!(get_u32(&buf, ph0 + P_VADDR), 0x1000);
        assert_eq!(get_u32(&buf, ph0 + P_PADDR), 0x1000);
        assert_eq!(get_u32(&buf, ph0 + P_FILESZ), 0x100);
        assert_eq!(get_u32(&buf, ph0 + P_MEMSZ), 0x100);
        assert_eq!(get_u32(&buf, ph0 + P_FLAGS), 0x7);

        assert_eq!(get_u32(&buf, ph1 + P_OFFSET), 116 + 0x100);
        assert_eq!(get_u32(&buf, ph1 + P_FILESZ), 0x200);
        // p_align stays zero.
        assert_eq!(get_u32(&buf, ph1 + 28), 0);
    }

    #[test]
    fn empty_table_is_bare_ehdr() {
        let buf = build(&SegmentTable::default()).unwrap();
        assert_eq!(buf.len(), EHDR_SIZE);
        assert_eq!(get_u16(&buf, E_PHNUM), 0);
        // e_machine, e_entry, e_shoff and e_flags are left zero.
        assert!(buf[18..20].iter().all(|&b| b == 0));
        assert!(buf[24..28].iter().all(|&b| b == 0));
        assert!(buf[32..40].iter().all(|&b| b == 0));
    }

    #[test]
    fn wide_address_keeps_low_bits() {
        let table = SegmentTable::new(vec![Segment::new(0x1_8000_0000, 0x10)]);
        let buf = build(&table).unwrap();

        let ph0 = EHDR_SIZE;
        assert_eq!(get_u32(&buf, ph0 + P_VADDR), 0x8000_0000);
        assert_eq!(get_u32(&buf, ph0 + P_PADDR), 0x8000_0000);
        assert_eq!(get_u32(&buf, ph0 + P_FILESZ), 0x10);
    }

    #[test]
    fn wide_offset_keeps_low_bits() {
        let table = SegmentTable::new(vec![
            Segment::new(0x0, 0xFFFF_FFF0),
            Segment::new(0x1000, 0x10),
        ]);
        let buf = build(&table).unwrap();

        // 116 + 0xFFFF_FFF0 = 0x1_0000_0064
        let ph1 = EHDR_SIZE + PHDR_SIZE;
        assert_eq!(get_u32(&buf, ph1 + P_OFFSET), 0x64);
        assert_eq!(get_u32(&buf, ph1 + P_VADDR), 0x1000);
    }
}
