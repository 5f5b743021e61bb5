//! Simulate command implementation.
//!
//! Replays a raw memory image through a device: the main thread acts as
//! the crash handler and every consumer runs on its own thread.

use super::{parse_u64, ArgError};
use ramdump_core::{Consumer, DeviceConfig, DeviceRegistry, RamdumpDevice, Segment};
use ramdump_memory::FilePhysical;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::info;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A segment given on the command line as `ADDRESS:SIZE[:NAME]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentSpec {
    /// Physical address.
    pub address: u64,
    /// Size in bytes.
    pub size: u64,
    /// Optional section name.
    pub name: Option<String>,
}

impl FromStr for SegmentSpec {
    type Err = ArgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ArgError::InvalidSegment(s.to_string());
        let mut parts = s.splitn(3, ':');
        let address = parts.next().ok_or_else(invalid)?;
        let size = parts.next().ok_or_else(invalid)?;
        let name = parts.next().filter(|n| !n.is_empty()).map(str::to_string);

        Ok(Self {
            address: parse_u64(address).map_err(|_| invalid())?,
            size: parse_u64(size).map_err(|_| invalid())?,
            name,
        })
    }
}

impl From<&SegmentSpec> for Segment {
    fn from(spec: &SegmentSpec) -> Self {
        let segment = Segment::new(spec.address, spec.size);
        match &spec.name {
            Some(name) => segment.with_name(name.clone()),
            None => segment,
        }
    }
}

/// Which producer entry point to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpMode {
    /// Bare segment bytes.
    Raw,
    /// ELF32 core header.
    Elf,
    /// Section-style header with named segments.
    Minidump,
    /// ELF32 core header without compaction.
    MinidumpElf32,
}

impl FromStr for DumpMode {
    type Err = ArgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "raw" => Ok(Self::Raw),
            "elf" => Ok(Self::Elf),
            "minidump" => Ok(Self::Minidump),
            "minidump-elf32" => Ok(Self::MinidumpElf32),
            other => Err(ArgError::UnknownMode(other.to_string())),
        }
    }
}

impl fmt::Display for DumpMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Raw => "raw",
            Self::Elf => "elf",
            Self::Minidump => "minidump",
            Self::MinidumpElf32 => "minidump-elf32",
        };
        f.write_str(name)
    }
}

/// Options of one simulated capture.
#[derive(Debug, Clone)]
pub struct SimulateOptions {
    /// Raw memory image.
    pub image: PathBuf,
    /// Physical address of the first image byte.
    pub base: u64,
    /// Segments to dump.
    pub segments: Vec<SegmentSpec>,
    /// Producer entry point.
    pub mode: DumpMode,
    /// Compact segment sizes (raw and elf modes only).
    pub complete: bool,
    /// Number of consumers.
    pub consumers: usize,
    /// Bytes requested per read.
    pub read_size: usize,
    /// Producer wait bound.
    pub timeout: Duration,
    /// Where to write the first consumer's stream.
    pub output: Option<PathBuf>,
}

/// What one consumer received.
#[derive(Debug, Serialize)]
pub struct ConsumerReport {
    /// Consumer index.
    pub index: usize,
    /// Stream length in bytes.
    pub bytes: u64,
    /// SHA-256 of the stream.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    /// Read error, if the consumer failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Simulation result.
#[derive(Debug, Serialize)]
pub struct SimulateReport {
    /// Device node name.
    pub device: String,
    /// Producer entry point.
    pub mode: String,
    /// Number of segments dumped.
    pub segments: usize,
    /// Producer outcome.
    pub outcome: String,
    /// Whether every consumer received the same stream.
    pub consistent: bool,
    /// Per-consumer results.
    pub consumers: Vec<ConsumerReport>,
    /// Wall time of the dump in milliseconds.
    pub elapsed_ms: u128,
}

/// Runs the simulate command.
pub fn run(options: &SimulateOptions) -> Result<SimulateReport, Box<dyn std::error::Error>> {
    if options.consumers == 0 {
        return Err("at least one consumer is required".into());
    }

    let physical = FilePhysical::open(&options.image, options.base)?;
    let config = DeviceConfig::new()
        .wait_timeout(options.timeout)
        .complete_ramdump(options.complete)
        .physical(Arc::new(physical));

    let registry = DeviceRegistry::default();
    let device = registry.create("sim", config)?;
    let mut segments: Vec<Segment> = options.segments.iter().map(Segment::from).collect();

    let readers: Vec<_> = (0..options.consumers)
        .map(|index| {
            let consumer = device.open();
            let output = if index == 0 {
                options.output.clone()
            } else {
                None
            };
            let read_size = options.read_size;
            thread::spawn(move || consume(consumer, read_size, output.as_deref()))
        })
        .collect();

    let start = Instant::now();
    let outcome = dump(&device, &mut segments, options.mode);
    let elapsed = start.elapsed();

    let consumers: Vec<_> = readers
        .into_iter()
        .enumerate()
        .map(|(index, handle)| {
            let result = handle
                .join()
                .unwrap_or_else(|_| Err("consumer thread panicked".into()));
            match result {
                Ok((bytes, digest)) => ConsumerReport {
                    index,
                    bytes,
                    sha256: Some(digest),
                    error: None,
                },
                Err(e) => ConsumerReport {
                    index,
                    bytes: 0,
                    sha256: None,
                    error: Some(e.to_string()),
                },
            }
        })
        .collect();

    let consistent = consumers.iter().all(|c| c.error.is_none())
        && consumers.windows(2).all(|w| w[0].sha256 == w[1].sha256);

    info!(device = %device.name(), ?elapsed, consistent, "simulation finished");
    registry.shutdown();

    Ok(SimulateReport {
        device: device.name().to_string(),
        mode: options.mode.to_string(),
        segments: segments.len(),
        outcome: match outcome {
            Ok(()) => "ok".to_string(),
            Err(e) => e.to_string(),
        },
        consistent,
        consumers,
        elapsed_ms: elapsed.as_millis(),
    })
}

fn dump(
    device: &RamdumpDevice,
    segments: &mut [Segment],
    mode: DumpMode,
) -> ramdump_core::DumpResult<()> {
    match mode {
        DumpMode::Raw => device.dump_raw(segments),
        DumpMode::Elf => device.dump_elf(segments),
        DumpMode::Minidump => device.dump_minidump(segments),
        DumpMode::MinidumpElf32 => device.dump_minidump_elf32(segments),
    }
}

/// Reads one stream, hashing it and optionally saving it.
fn consume(
    mut consumer: Consumer,
    read_size: usize,
    output: Option<&Path>,
) -> Result<(u64, String), BoxError> {
    let mut writer = output
        .map(File::create)
        .transpose()?
        .map(BufWriter::new);
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; read_size.max(1)];
    let mut total = 0u64;

    loop {
        let n = consumer.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        if let Some(writer) = writer.as_mut() {
            writer.write_all(&buf[..n])?;
        }
        total += n as u64;
    }

    if let Some(mut writer) = writer {
        writer.flush()?;
    }

    let digest = hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect();
    Ok((total, digest))
}

/// Prints a report as text or JSON.
pub fn print_report(report: &SimulateReport, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        _ => {
            println!("Ramdump Simulation");
            println!("==================");
            println!();
            println!("Device:     {}", report.device);
            println!("Mode:       {}", report.mode);
            println!("Segments:   {}", report.segments);
            println!("Outcome:    {}", report.outcome);
            println!("Elapsed:    {} ms", report.elapsed_ms);
            println!("Consistent: {}", if report.consistent { "yes" } else { "NO" });
            println!();
            for consumer in &report.consumers {
                match (&consumer.sha256, &consumer.error) {
                    (Some(digest), _) => println!(
                        "  consumer {}: {} bytes, sha256 {}",
                        consumer.index, consumer.bytes, digest
                    ),
                    (None, Some(error)) => println!("  consumer {}: {}", consumer.index, error),
                    (None, None) => println!("  consumer {}: no data", consumer.index),
                }
            }
        }
    }

    if report.outcome != "ok" {
        return Err(format!("dump failed: {}", report.outcome).into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ramdump_core::CoreLayout;
    use tempfile::TempDir;

    fn image(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("ddr.bin");
        let data: Vec<u8> = (0..8192u32).map(|i| (i % 253) as u8).collect();
        std::fs::write(&path, data).unwrap();
        path
    }

    fn options(dir: &TempDir, mode: DumpMode) -> SimulateOptions {
        SimulateOptions {
            image: image(dir),
            base: 0x8000_0000,
            segments: vec![
                "0x80000000:1024:sbl".parse().unwrap(),
                "0x80001003:333:tz".parse().unwrap(),
            ],
            mode,
            complete: false,
            consumers: 3,
            read_size: 100,
            timeout: Duration::from_secs(10),
            output: Some(dir.path().join("out.elf")),
        }
    }

    #[test]
    fn parses_segment_specs() {
        let spec: SegmentSpec = "0x1000:64:modem".parse().unwrap();
        assert_eq!(spec.address, 0x1000);
        assert_eq!(spec.size, 64);
        assert_eq!(spec.name.as_deref(), Some("modem"));

        let spec: SegmentSpec = "4096:0x10".parse().unwrap();
        assert_eq!(spec.size, 16);
        assert!(spec.name.is_none());

        assert!("0x1000".parse::<SegmentSpec>().is_err());
        assert!("zz:10".parse::<SegmentSpec>().is_err());
    }

    #[test]
    fn parses_modes() {
        assert_eq!("minidump-elf32".parse::<DumpMode>(), Ok(DumpMode::MinidumpElf32));
        assert_eq!(DumpMode::Minidump.to_string(), "minidump");
        assert!("core".parse::<DumpMode>().is_err());
    }

    #[test]
    fn consumers_agree_and_output_parses() {
        let dir = TempDir::new().unwrap();
        let options = options(&dir, DumpMode::Minidump);

        let report = run(&options).unwrap();
        assert_eq!(report.outcome, "ok");
        assert!(report.consistent);
        assert_eq!(report.consumers.len(), 3);

        let stream = std::fs::read(options.output.unwrap()).unwrap();
        assert_eq!(stream.len() as u64, report.consumers[0].bytes);

        let layout = CoreLayout::parse(&stream).unwrap();
        assert_eq!(layout.entries.len(), 2);
        assert_eq!(layout.entries[1].name.as_deref(), Some("tz"));
        assert_eq!(layout.stream_size(), stream.len() as u64);
    }

    #[test]
    fn segment_outside_image_fails() {
        let dir = TempDir::new().unwrap();
        let mut options = options(&dir, DumpMode::Raw);
        options.segments = vec!["0x90000000:16".parse().unwrap()];
        options.consumers = 1;
        options.output = None;

        let report = run(&options).unwrap();
        assert_ne!(report.outcome, "ok");
        assert!(!report.consistent);
        assert!(report.consumers[0].error.is_some());
    }
}
