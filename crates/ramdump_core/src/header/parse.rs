//! Parsing synthesized core headers back into segment descriptions.

use super::elf::{self, get_u16, get_u32, get_u64};
use super::{elf32, section, CoreFormat};
use crate::error::ParseError;

/// One segment as described by a core header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreEntry {
    /// Section name, for section-format headers.
    pub name: Option<String>,
    /// Physical address.
    pub address: u64,
    /// Size in bytes.
    pub size: u64,
    /// Offset of the segment's bytes in the stream.
    pub offset: u64,
}

/// The segment layout declared by a core header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreLayout {
    /// Detected header format.
    pub format: CoreFormat,
    /// Number of header bytes before the first segment.
    pub header_size: u64,
    /// Machine field of the ELF header.
    pub machine: u16,
    /// Segments in header order.
    pub entries: Vec<CoreEntry>,
}

fn need(buf: &[u8], needed: usize) -> Result<(), ParseError> {
    if buf.len() < needed {
        return Err(ParseError::Truncated {
            needed,
            available: buf.len(),
        });
    }
    Ok(())
}

impl CoreLayout {
    /// Parses the header at the start of a dump stream.
    ///
    /// Only the header bytes are needed; segment data may be absent.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::BadMagic`] for raw streams,
    /// [`ParseError::Truncated`] if the buffer ends inside the header, and
    /// [`ParseError::Unsupported`] for ELF files that are not core headers
    /// in one of the two synthesized layouts.
    pub fn parse(buf: &[u8]) -> Result<Self, ParseError> {
        need(buf, 16)?;
        if &buf[..4] != elf::ELFMAG {
            return Err(ParseError::BadMagic);
        }
        if buf[elf::EI_DATA] != elf::ELFDATA2LSB {
            return Err(ParseError::unsupported("big-endian header"));
        }

        match buf[elf::EI_CLASS] {
            elf::ELFCLASS32 => Self::parse_elf32(buf),
            elf::ELFCLASS64 => Self::parse_sections(buf),
            class => Err(ParseError::unsupported(format!("ELF class {class}"))),
        }
    }

    /// Returns the stream length the header declares.
    #[must_use]
    pub fn stream_size(&self) -> u64 {
        self.entries
            .iter()
            .fold(self.header_size, |acc, e| acc.saturating_add(e.size))
    }

    fn parse_elf32(buf: &[u8]) -> Result<Self, ParseError> {
        need(buf, elf32::EHDR_SIZE)?;
        if get_u16(buf, 16) != elf::ET_CORE {
            return Err(ParseError::unsupported("not a core file"));
        }

        let phoff = get_u32(buf, 28) as usize;
        let phentsize = get_u16(buf, 42) as usize;
        let phnum = get_u16(buf, 44) as usize;
        if phnum > 0 && phentsize != elf32::PHDR_SIZE {
            return Err(ParseError::unsupported(format!(
                "program header size {phentsize}"
            )));
        }

        let end = phoff.saturating_add(phnum * elf32::PHDR_SIZE);
        need(buf, end)?;

        let entries = (0..phnum)
            .map(|i| phoff + i * elf32::PHDR_SIZE)
            .filter(|&at| get_u32(buf, at) == elf::PT_LOAD)
            .map(|at| CoreEntry {
                name: None,
                offset: u64::from(get_u32(buf, at + 4)),
                address: u64::from(get_u32(buf, at + 12)),
                size: u64::from(get_u32(buf, at + 16)),
            })
            .collect();

        Ok(Self {
            format: CoreFormat::Elf32Core,
            header_size: end.max(elf32::EHDR_SIZE) as u64,
            machine: get_u16(buf, 18),
            entries,
        })
    }

    fn parse_sections(buf: &[u8]) -> Result<Self, ParseError> {
        need(buf, section::EHDR_SIZE)?;
        if get_u16(buf, 16) != elf::ET_CORE {
            return Err(ParseError::unsupported("not a core file"));
        }

        let shoff = get_u64(buf, 40) as usize;
        let shentsize = get_u16(buf, 58) as usize;
        let shnum = get_u16(buf, 60) as usize;
        let shstrndx = get_u16(buf, 62) as usize;
        if shentsize != section::SHDR_SIZE {
            return Err(ParseError::unsupported(format!(
                "section header size {shentsize}"
            )));
        }
        if shstrndx == 0 || shstrndx >= shnum {
            return Err(ParseError::unsupported("missing string table"));
        }

        let headers_end = shoff.saturating_add(shnum * section::SHDR_SIZE);
        need(buf, headers_end)?;

        let strtab_header = shoff + shstrndx * section::SHDR_SIZE;
        let strtab_offset = get_u64(buf, strtab_header + 24) as usize;
        let strtab_size = get_u64(buf, strtab_header + 32) as usize;
        let strtab_end = strtab_offset.saturating_add(strtab_size);
        need(buf, strtab_end)?;
        let strtab = &buf[strtab_offset..strtab_end];

        let entries = (0..shnum)
            .map(|i| shoff + i * section::SHDR_SIZE)
            .filter(|&at| get_u32(buf, at + 4) == elf::SHT_PROGBITS)
            .map(|at| CoreEntry {
                name: name_at(strtab, get_u32(buf, at) as usize),
                address: get_u64(buf, at + 16),
                offset: get_u64(buf, at + 24),
                size: get_u64(buf, at + 32),
            })
            .collect();

        Ok(Self {
            format: CoreFormat::SectionCore,
            header_size: headers_end.max(strtab_end) as u64,
            machine: get_u16(buf, 18),
            entries,
        })
    }
}

fn name_at(strtab: &[u8], offset: usize) -> Option<String> {
    if offset == 0 || offset >= strtab.len() {
        return None;
    }
    let bytes = &strtab[offset..];
    let len = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    Some(String::from_utf8_lossy(&bytes[..len]).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{CoreHeader, HeaderOptions};
    use crate::segment::{Segment, SegmentTable};

    fn table() -> SegmentTable {
        SegmentTable::new(vec![
            Segment::new(0x1000, 0x100).with_name("tz"),
            Segment::new(0x2000, 0x200).with_name("a_very_long_segment_name"),
        ])
    }

    #[test]
    fn elf32_roundtrip() {
        let header =
            CoreHeader::build(&table(), CoreFormat::Elf32Core, &HeaderOptions::default()).unwrap();
        let layout = CoreLayout::parse(header.as_bytes()).unwrap();

        assert_eq!(layout.format, CoreFormat::Elf32Core);
        assert_eq!(layout.header_size, 116);
        let pairs: Vec<_> = layout.entries.iter().map(|e| (e.address, e.size)).collect();
        assert_eq!(pairs, vec![(0x1000, 0x100), (0x2000, 0x200)]);
        assert_eq!(layout.entries[0].offset, 116);
        assert_eq!(layout.entries[1].offset, 116 + 0x100);
        assert_eq!(layout.stream_size(), 116 + 0x300);
    }

    #[test]
    fn section_roundtrip() {
        let options = HeaderOptions { machine: elf::EM_ARM };
        let header = CoreHeader::build(&table(), CoreFormat::SectionCore, &options).unwrap();
        let layout = CoreLayout::parse(header.as_bytes()).unwrap();

        assert_eq!(layout.format, CoreFormat::SectionCore);
        assert_eq!(layout.machine, elf::EM_ARM);
        assert_eq!(layout.header_size, header.len() as u64);
        assert_eq!(layout.entries.len(), 2);
        assert_eq!(layout.entries[0].name.as_deref(), Some("tz"));
        assert_eq!(layout.entries[1].name.as_deref(), Some("a_very_long_seg"));
        assert_eq!(layout.entries[1].offset, header.len() as u64 + 0x100);
    }

    #[test]
    fn raw_stream_is_rejected() {
        assert_eq!(CoreLayout::parse(&[0u8; 64]), Err(ParseError::BadMagic));
    }

    #[test]
    fn truncated_header_is_rejected() {
        let header =
            CoreHeader::build(&table(), CoreFormat::Elf32Core, &HeaderOptions::default()).unwrap();
        let result = CoreLayout::parse(&header.as_bytes()[..80]);
        assert_eq!(
            result,
            Err(ParseError::Truncated {
                needed: 116,
                available: 80
            })
        );
        assert!(CoreLayout::parse(b"\x7fELF").is_err());
    }
}
