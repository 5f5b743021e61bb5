//! Test fixtures and device helpers.
//!
//! Provides convenience functions for setting up devices, patterned
//! memory and consumer threads.

use ramdump_core::{
    Consumer, CoreFormat, CoreHeader, DeviceConfig, DeviceRegistry, DumpResult, HeaderOptions,
    RamdumpDevice, ReadResult, Segment, SegmentTable,
};
use ramdump_memory::{FilePhysical, InMemoryRegion};
use std::io::Write;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

/// Wait bound used by [`TestDevice::new`].
pub const TEST_WAIT_TIMEOUT: Duration = Duration::from_secs(10);

/// A device registered in its own registry.
pub struct TestDevice {
    /// The device instance.
    pub device: RamdumpDevice,
    /// The registry that owns the device's minor.
    pub registry: DeviceRegistry,
}

impl TestDevice {
    /// Creates a device with a generous wait bound.
    pub fn new() -> Self {
        Self::with_config(DeviceConfig::new().wait_timeout(TEST_WAIT_TIMEOUT))
    }

    /// Creates a device that gives up on its consumers quickly.
    pub fn short_timeout(timeout: Duration) -> Self {
        Self::with_config(DeviceConfig::new().wait_timeout(timeout))
    }

    /// Creates a device with the given configuration.
    pub fn with_config(config: DeviceConfig) -> Self {
        let registry = DeviceRegistry::default();
        let device = registry
            .create("test", config)
            .expect("Failed to create test device");
        Self { device, registry }
    }
}

impl Default for TestDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestDevice {
    type Target = RamdumpDevice;

    fn deref(&self) -> &Self::Target {
        &self.device
    }
}

/// Deterministic, non-repeating-looking test bytes.
pub fn pattern(seed: u8, len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| seed.wrapping_add((i * 31 % 251) as u8))
        .collect()
}

/// Builds mapped segments filled with [`pattern`] bytes.
///
/// Returns the segments and the bytes each one holds.
pub fn patterned_segments(layout: &[(u64, usize)]) -> (Vec<Segment>, Vec<Vec<u8>>) {
    layout
        .iter()
        .enumerate()
        .map(|(i, &(address, len))| {
            let data = pattern(i as u8, len);
            let region = InMemoryRegion::new(address, data.clone());
            (Segment::mapped(Arc::new(region)), data)
        })
        .unzip()
}

/// Returns the stream a consumer should receive.
pub fn expected_stream(
    segments: &[Segment],
    data: &[Vec<u8>],
    format: CoreFormat,
    options: &HeaderOptions,
) -> Vec<u8> {
    let table = SegmentTable::new(segments.to_vec());
    let header = CoreHeader::build(&table, format, options).expect("Failed to build header");
    let mut stream = header.as_bytes().to_vec();
    for bytes in data {
        stream.extend_from_slice(bytes);
    }
    stream
}

/// Reads one whole dump stream in reads of at most `chunk` bytes.
pub fn read_to_end(consumer: &mut Consumer, chunk: usize) -> ReadResult<Vec<u8>> {
    let mut out = Vec::new();
    let mut buf = vec![0u8; chunk.max(1)];
    loop {
        let n = consumer.read(&mut buf)?;
        if n == 0 {
            return Ok(out);
        }
        out.extend_from_slice(&buf[..n]);
    }
}

/// Runs one dump with `consumers` reader threads and collects their streams.
///
/// # Panics
///
/// Panics if a reader fails while the dump succeeds.
pub fn run_dump(
    device: &RamdumpDevice,
    mut segments: Vec<Segment>,
    format: CoreFormat,
    consumers: usize,
    chunk: usize,
) -> DumpResult<Vec<Vec<u8>>> {
    let readers: Vec<_> = (0..consumers)
        .map(|_| {
            let mut consumer = device.open();
            thread::spawn(move || read_to_end(&mut consumer, chunk))
        })
        .collect();

    let result = device.dump(&mut segments, format, false);
    let streams: Vec<_> = readers
        .into_iter()
        .map(|r| r.join().expect("Reader thread panicked"))
        .collect();

    result.map(|()| {
        streams
            .into_iter()
            .map(|s| s.expect("Reader failed in a clean dump"))
            .collect()
    })
}

/// A memory image file in a temporary directory.
pub struct MemoryImage {
    /// The file-backed physical memory.
    pub physical: Arc<FilePhysical>,
    /// The image contents.
    pub data: Vec<u8>,
    _temp_dir: TempDir,
}

impl MemoryImage {
    /// Writes `len` patterned bytes to a file mapped at `base`.
    pub fn new(base: u64, len: usize) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("ddr.bin");
        let data = pattern(0x5A, len);

        let mut file = std::fs::File::create(&path).expect("Failed to create image");
        file.write_all(&data).expect("Failed to write image");
        drop(file);

        let physical = FilePhysical::open(&path, base).expect("Failed to open image");
        Self {
            physical: Arc::new(physical),
            data,
            _temp_dir: temp_dir,
        }
    }

    /// Returns the image bytes backing `address..address + len`.
    pub fn slice(&self, address: u64, len: usize) -> &[u8] {
        let start = (address - self.physical.base()) as usize;
        &self.data[start..start + len]
    }
}
