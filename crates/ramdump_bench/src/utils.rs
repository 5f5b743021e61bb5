//! Benchmark utilities.

use ramdump_core::{CoreFormat, DeviceConfig, DeviceRegistry, RamdumpDevice, Segment};
use ramdump_memory::InMemoryRegion;
use rand::Rng;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Generate random memory contents of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Generate mapped segments of `size` random bytes at unaligned addresses.
pub fn random_segments(count: usize, size: usize) -> Vec<Segment> {
    let mut rng = rand::thread_rng();
    let mut address = 0x8000_0000u64;
    (0..count)
        .map(|i| {
            address += rng.gen_range(1..8u64);
            let region = InMemoryRegion::new(address, random_data(size));
            address += size as u64 + 0x1000;
            Segment::mapped(Arc::new(region)).with_name(format!("seg{i}"))
        })
        .collect()
}

/// Generate unmapped segment descriptors for header synthesis.
pub fn descriptors(count: usize) -> Vec<Segment> {
    (0..count as u64)
        .map(|i| Segment::new(0x8000_0000 + i * 0x10_0000, 0x1000).with_name(format!("seg{i}")))
        .collect()
}

/// Create a device in its own registry.
pub fn bench_device() -> (DeviceRegistry, RamdumpDevice) {
    let registry = DeviceRegistry::default();
    let config = DeviceConfig::new().wait_timeout(Duration::from_secs(60));
    let device = registry
        .create("bench", config)
        .expect("Failed to create bench device");
    (registry, device)
}

/// Run one dump read by `consumers` threads; returns bytes read per consumer.
pub fn dump_once(
    device: &RamdumpDevice,
    segments: &[Segment],
    format: CoreFormat,
    consumers: usize,
    read_size: usize,
) -> u64 {
    let readers: Vec<_> = (0..consumers)
        .map(|_| {
            let mut consumer = device.open();
            thread::spawn(move || {
                let mut buf = vec![0u8; read_size];
                let mut total = 0u64;
                loop {
                    let n = consumer.read(&mut buf).expect("Read failed");
                    if n == 0 {
                        return total;
                    }
                    total += n as u64;
                }
            })
        })
        .collect();

    let mut segments = segments.to_vec();
    device
        .dump(&mut segments, format, false)
        .expect("Dump failed");

    readers
        .into_iter()
        .map(|r| r.join().expect("Reader panicked"))
        .max()
        .unwrap_or(0)
}
