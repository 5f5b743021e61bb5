//! Inspect command implementation.

use ramdump_core::{CoreLayout, ParseError};
use serde::Serialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Bytes read before the header says how much more it needs.
const INITIAL_READ: u64 = 4096;

/// Stream inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Stream file path.
    pub path: String,
    /// Header layout.
    pub format: String,
    /// Header size in bytes.
    pub header_size: u64,
    /// ELF machine.
    pub machine: u16,
    /// File size in bytes.
    pub file_size: u64,
    /// Stream size the header declares.
    pub stream_size: u64,
    /// Segments described by the header.
    pub segments: Vec<SegmentInfo>,
    /// Whether the file holds exactly the declared stream (if requested).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complete: Option<bool>,
}

/// One segment of an inspected stream.
#[derive(Debug, Serialize)]
pub struct SegmentInfo {
    /// Position in the header.
    pub index: usize,
    /// Section name, for section-format headers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Physical address.
    pub address: u64,
    /// Size in bytes.
    pub size: u64,
    /// Offset of the segment bytes in the stream.
    pub offset: u64,
}

/// Runs the inspect command.
pub fn run(path: &Path, verify: bool, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = inspect(path, verify)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    if result.complete == Some(false) {
        return Err(format!(
            "stream is incomplete: header declares {} bytes, file has {}",
            result.stream_size, result.file_size
        )
        .into());
    }

    Ok(())
}

/// Parses the header of a captured stream.
pub fn inspect(path: &Path, verify: bool) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let mut file = File::open(path)?;
    let file_size = file.metadata()?.len();
    let layout = read_layout(&mut file, file_size)?;

    let segments = layout
        .entries
        .iter()
        .enumerate()
        .map(|(index, entry)| SegmentInfo {
            index,
            name: entry.name.clone(),
            address: entry.address,
            size: entry.size,
            offset: entry.offset,
        })
        .collect();

    Ok(InspectResult {
        path: path.display().to_string(),
        format: layout.format.to_string(),
        header_size: layout.header_size,
        machine: layout.machine,
        file_size,
        stream_size: layout.stream_size(),
        segments,
        complete: verify.then(|| file_size == layout.stream_size()),
    })
}

/// Reads just enough of the file to parse its header.
fn read_layout(file: &mut File, file_size: u64) -> Result<CoreLayout, Box<dyn std::error::Error>> {
    let mut buf = Vec::new();
    let mut want = INITIAL_READ.min(file_size);

    loop {
        let missing = want.saturating_sub(buf.len() as u64);
        file.by_ref().take(missing).read_to_end(&mut buf)?;

        match CoreLayout::parse(&buf) {
            Ok(layout) => return Ok(layout),
            Err(ParseError::Truncated { needed, .. })
                if needed > buf.len() && (needed as u64) <= file_size =>
            {
                want = needed as u64;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

fn print_text_output(result: &InspectResult) {
    println!("Ramdump Stream Inspection");
    println!("=========================");
    println!();
    println!("Path:         {}", result.path);
    println!("Format:       {}", result.format);
    println!("Machine:      {}", result.machine);
    println!("Header size:  {} bytes", result.header_size);
    println!("Stream size:  {} bytes", result.stream_size);
    println!("File size:    {} bytes", result.file_size);
    if let Some(complete) = result.complete {
        println!("Complete:     {}", if complete { "yes" } else { "NO" });
    }
    println!();
    println!(
        "{:>5}  {:<16} {:>18} {:>12} {:>12}",
        "#", "name", "address", "size", "offset"
    );
    for segment in &result.segments {
        println!(
            "{:>5}  {:<16} {:>#18x} {:>12} {:>12}",
            segment.index,
            segment.name.as_deref().unwrap_or("-"),
            segment.address,
            segment.size,
            segment.offset
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ramdump_core::{CoreFormat, CoreHeader, HeaderOptions, Segment, SegmentTable};
    use std::io::Write;
    use tempfile::TempDir;

    fn write_stream(dir: &TempDir, format: CoreFormat, pad: usize) -> std::path::PathBuf {
        let table = SegmentTable::new(vec![
            Segment::new(0x1000, 16).with_name("boot"),
            Segment::new(0x2000, 32).with_name("tz"),
        ]);
        let header = CoreHeader::build(&table, format, &HeaderOptions::default()).unwrap();

        let path = dir.path().join("dump.elf");
        let mut file = File::create(&path).unwrap();
        file.write_all(header.as_bytes()).unwrap();
        file.write_all(&vec![0xEE; pad]).unwrap();
        path
    }

    #[test]
    fn inspects_elf32_stream() {
        let dir = TempDir::new().unwrap();
        let path = write_stream(&dir, CoreFormat::Elf32Core, 48);

        let result = inspect(&path, true).unwrap();
        assert_eq!(result.format, "elf32");
        assert_eq!(result.header_size, 52 + 2 * 32);
        assert_eq!(result.segments.len(), 2);
        assert_eq!(result.segments[1].address, 0x2000);
        assert_eq!(result.complete, Some(true));
    }

    #[test]
    fn inspects_section_stream() {
        let dir = TempDir::new().unwrap();
        let path = write_stream(&dir, CoreFormat::SectionCore, 48);

        let result = inspect(&path, false).unwrap();
        assert_eq!(result.format, "section");
        assert_eq!(result.segments[0].name.as_deref(), Some("boot"));
        assert_eq!(result.complete, None);
    }

    #[test]
    fn header_larger_than_first_read() {
        let dir = TempDir::new().unwrap();
        let segments = (0..200u64)
            .map(|i| Segment::new(0x1000 * (i + 1), 8))
            .collect::<Vec<_>>();
        let table = SegmentTable::new(segments);
        let header = CoreHeader::build(&table, CoreFormat::Elf32Core, &HeaderOptions::default())
            .unwrap();
        assert!(header.len() as u64 > INITIAL_READ);

        let path = dir.path().join("big.elf");
        let mut stream = header.as_bytes().to_vec();
        stream.extend(std::iter::repeat(0u8).take(200 * 8));
        std::fs::write(&path, stream).unwrap();

        let result = inspect(&path, true).unwrap();
        assert_eq!(result.segments.len(), 200);
        assert_eq!(result.complete, Some(true));
    }

    #[test]
    fn short_stream_is_incomplete() {
        let dir = TempDir::new().unwrap();
        let path = write_stream(&dir, CoreFormat::Elf32Core, 10);

        let result = inspect(&path, true).unwrap();
        assert_eq!(result.complete, Some(false));
    }

    #[test]
    fn raw_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("raw.bin");
        std::fs::write(&path, vec![0u8; 128]).unwrap();

        assert!(inspect(&path, false).is_err());
    }

    #[test]
    fn json_output_skips_missing_fields() {
        let dir = TempDir::new().unwrap();
        let path = write_stream(&dir, CoreFormat::Elf32Core, 48);

        let result = inspect(&path, false).unwrap();
        let json = serde_json::to_string(&result).unwrap();
        assert!(!json.contains("complete"));
        assert!(!json.contains("\"name\""));
    }
}
