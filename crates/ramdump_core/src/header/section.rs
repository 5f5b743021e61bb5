//! Section-format (minidump) core header.
//!
//! Layout: `Elf64_Ehdr`, then `N + 2` section headers (null, string table,
//! one per segment), then a fixed-size string table.

use super::elf::{self, put_u16, put_u32, put_u64};
use super::zeroed;
use crate::error::{DumpError, DumpResult};
use crate::segment::SegmentTable;
use tracing::warn;

/// Size of the string table appended to the header.
pub const STRING_TABLE_SIZE: usize = 512;

/// Longest stored section name, including the terminating NUL.
pub const MAX_NAME_LENGTH: usize = 16;

/// Name of the string table section.
pub const STRING_TABLE_NAME: &str = "STR_TBL";

/// Size of `Elf64_Ehdr`.
pub(crate) const EHDR_SIZE: usize = 64;
/// Size of `Elf64_Shdr`.
pub(crate) const SHDR_SIZE: usize = 64;

// Elf64_Ehdr field offsets.
const E_TYPE: usize = 16;
const E_MACHINE: usize = 18;
const E_VERSION: usize = 20;
const E_SHOFF: usize = 40;
const E_EHSIZE: usize = 52;
const E_SHENTSIZE: usize = 58;
const E_SHNUM: usize = 60;
const E_SHSTRNDX: usize = 62;

// Elf64_Shdr field offsets.
const SH_NAME: usize = 0;
const SH_TYPE: usize = 4;
const SH_FLAGS: usize = 8;
const SH_ADDR: usize = 16;
const SH_OFFSET: usize = 24;
const SH_SIZE: usize = 32;

/// Index of the string table section.
const STRTAB_INDEX: u16 = 1;

pub(crate) fn header_size(count: usize) -> usize {
    EHDR_SIZE + SHDR_SIZE * (count + 2) + STRING_TABLE_SIZE
}

/// Packs names into the string table region of the header.
struct StringTable<'a> {
    table: &'a mut [u8],
    next: usize,
}

impl<'a> StringTable<'a> {
    fn new(table: &'a mut [u8]) -> Self {
        // Offset 0 is the empty name.
        Self { table, next: 1 }
    }

    /// Stores `name` truncated to `MAX_NAME_LENGTH - 1` bytes and returns
    /// its offset. Unnamed sections and names that no longer fit get 0.
    fn push(&mut self, name: Option<&str>) -> u32 {
        let Some(name) = name else {
            return 0;
        };

        let bytes = name.as_bytes();
        let bytes = &bytes[..bytes.len().min(MAX_NAME_LENGTH - 1)];
        let end = self.next + bytes.len();
        if end >= self.table.len() {
            warn!(name, "string table full, section left unnamed");
            return 0;
        }

        let offset = self.next;
        self.table[offset..end].copy_from_slice(bytes);
        self.next = end + 1;
        offset as u32
    }
}

pub(crate) fn build(segments: &SegmentTable, machine: u16) -> DumpResult<Vec<u8>> {
    let count = segments.len();
    let shnum = count
        .checked_add(2)
        .and_then(|n| u16::try_from(n).ok())
        .ok_or(DumpError::TooManySegments {
            count,
            max: u16::MAX as usize - 2,
        })?;

    let size = header_size(count);
    let strtab_offset = size - STRING_TABLE_SIZE;
    let mut buf = zeroed(size)?;

    elf::write_ident(&mut buf, elf::ELFCLASS64);
    put_u16(&mut buf, E_TYPE, elf::ET_CORE);
    put_u16(&mut buf, E_MACHINE, machine);
    put_u32(&mut buf, E_VERSION, u32::from(elf::EV_CURRENT));
    put_u64(&mut buf, E_SHOFF, EHDR_SIZE as u64);
    put_u16(&mut buf, E_EHSIZE, EHDR_SIZE as u16);
    put_u16(&mut buf, E_SHENTSIZE, SHDR_SIZE as u16);
    put_u16(&mut buf, E_SHNUM, shnum);
    put_u16(&mut buf, E_SHSTRNDX, STRTAB_INDEX);

    let (headers, strtab) = buf.split_at_mut(strtab_offset);
    let mut names = StringTable::new(strtab);

    // Section 0 stays all zero.
    let at = EHDR_SIZE + SHDR_SIZE;
    put_u32(headers, at + SH_NAME, names.push(Some(STRING_TABLE_NAME)));
    put_u32(headers, at + SH_TYPE, elf::SHT_STRTAB);
    put_u64(headers, at + SH_OFFSET, strtab_offset as u64);
    put_u64(headers, at + SH_SIZE, STRING_TABLE_SIZE as u64);

    let mut offset = size as u64;
    for (i, segment) in segments.iter().enumerate() {
        let at = EHDR_SIZE + SHDR_SIZE * (i + 2);
        put_u32(headers, at + SH_NAME, names.push(segment.name()));
        put_u32(headers, at + SH_TYPE, elf::SHT_PROGBITS);
        put_u64(headers, at + SH_FLAGS, elf::SHF_WRITE);
        put_u64(headers, at + SH_ADDR, segment.address);
        put_u64(headers, at + SH_OFFSET, offset);
        put_u64(headers, at + SH_SIZE, segment.size);
        offset = offset.saturating_add(segment.size);
    }

    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::elf::{get_u16, get_u32, get_u64};
    use crate::segment::Segment;

    fn section(index: usize) -> usize {
        EHDR_SIZE + SHDR_SIZE * index
    }

    fn name_at(buf: &[u8], strtab: usize, offset: u32) -> String {
        let start = strtab + offset as usize;
        let end = buf[start..].iter().position(|&b| b == 0).unwrap() + start;
        String::from_utf8(buf[start..end].to_vec()).unwrap()
    }

    #[test]
    fn header_fields() {
        let table = SegmentTable::new(vec![Segment::new(0x8000, 0x40).with_name("ipa")]);
        let buf = build(&table, elf::EM_AARCH64).unwrap();

        assert_eq!(buf.len(), 64 + 3 * 64 + 512);
        assert_eq!(buf[elf::EI_CLASS], elf::ELFCLASS64);
        assert_eq!(get_u16(&buf, E_TYPE), elf::ET_CORE);
        assert_eq!(get_u16(&buf, E_MACHINE), elf::EM_AARCH64);
        assert_eq!(get_u64(&buf, E_SHOFF), 64);
        assert_eq!(get_u16(&buf, E_SHENTSIZE), 64);
        assert_eq!(get_u16(&buf, E_SHNUM), 3);
        assert_eq!(get_u16(&buf, E_SHSTRNDX), 1);
    }

    #[test]
    fn null_and_string_table_sections() {
        let table = SegmentTable::new(vec![Segment::new(0x8000, 0x40).with_name("ipa")]);
        let buf = build(&table, elf::EM_NONE).unwrap();
        let strtab = 64 + 3 * 64;

        let null = section(0);
        assert!(buf[null..null + SHDR_SIZE].iter().all(|&b| b == 0));

        let st = section(1);
        assert_eq!(get_u32(&buf, st + SH_TYPE), elf::SHT_STRTAB);
        assert_eq!(get_u64(&buf, st + SH_OFFSET), strtab as u64);
        assert_eq!(get_u64(&buf, st + SH_SIZE), 512);
        assert_eq!(get_u64(&buf, st + SH_FLAGS), 0);
        assert_eq!(get_u32(&buf, st + SH_NAME), 1);
        assert_eq!(name_at(&buf, strtab, 1), "STR_TBL");
        assert_eq!(buf[strtab], 0);
    }

    #[test]
    fn segment_sections() {
        let table = SegmentTable::new(vec![
            Segment::new(0x8000, 0x40).with_name("ipa"),
            Segment::new(0x9000, 0x80).with_name("modem"),
        ]);
        let buf = build(&table, elf::EM_NONE).unwrap();
        let size = header_size(2) as u64;
        let strtab = 64 + 4 * 64;

        let s2 = section(2);
        assert_eq!(get_u32(&buf, s2 + SH_TYPE), elf::SHT_PROGBITS);
        assert_eq!(get_u64(&buf, s2 + SH_FLAGS), elf::SHF_WRITE);
        assert_eq!(get_u64(&buf, s2 + SH_ADDR), 0x8000);
        assert_eq!(get_u64(&buf, s2 + SH_OFFSET), size);
        assert_eq!(get_u64(&buf, s2 + SH_SIZE), 0x40);
        assert_eq!(name_at(&buf, strtab, get_u32(&buf, s2 + SH_NAME)), "ipa");

        let s3 = section(3);
        assert_eq!(get_u64(&buf, s3 + SH_OFFSET), size + 0x40);
        // "STR_TBL\0" at 1, "ipa\0" at 9, "modem" at 13.
        assert_eq!(get_u32(&buf, s3 + SH_NAME), 13);
        assert_eq!(name_at(&buf, strtab, 13), "modem");
    }

    #[test]
    fn long_names_are_truncated() {
        let long = "abcdefghijklmnopqrst";
        assert_eq!(long.len(), 20);
        let table = SegmentTable::new(vec![Segment::new(0x0, 0x10).with_name(long)]);
        let buf = build(&table, elf::EM_NONE).unwrap();
        let strtab = 64 + 3 * 64;

        let offset = get_u32(&buf, section(2) + SH_NAME);
        assert_eq!(name_at(&buf, strtab, offset), "abcdefghijklmno");
        assert_eq!(buf[strtab + offset as usize + 15], 0);
    }

    #[test]
    fn unnamed_segment_gets_empty_name() {
        let table = SegmentTable::new(vec![
            Segment::new(0x0, 0x10),
            Segment::new(0x10, 0x10).with_name("b"),
        ]);
        let buf = build(&table, elf::EM_NONE).unwrap();
        assert_eq!(get_u32(&buf, section(2) + SH_NAME), 0);
        assert_eq!(get_u32(&buf, section(3) + SH_NAME), 9);
    }

    #[test]
    fn full_string_table_leaves_names_empty() {
        let segments = (0..40)
            .map(|i| Segment::new(i * 0x100, 0x100).with_name(format!("segment_name_{i:03}")))
            .collect();
        let table = SegmentTable::new(segments);
        let buf = build(&table, elf::EM_NONE).unwrap();

        // 1 + 8 bytes for STR_TBL, then 16 bytes per truncated name.
        let fitting = (STRING_TABLE_SIZE - 9 - 1) / MAX_NAME_LENGTH;
        let named = (0..40)
            .filter(|&i| get_u32(&buf, section(i + 2) + SH_NAME) != 0)
            .count();
        assert_eq!(named, fitting);
        assert_eq!(buf.len(), header_size(40));
    }
}
