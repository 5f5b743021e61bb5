//! Concurrency tests across the capture engine.

use ramdump_core::{CoreFormat, DumpError, ReadError};
use ramdump_testkit::prelude::*;
use std::thread;
use std::time::Duration;

#[test]
fn many_consumers_many_dumps() {
    let device = TestDevice::new();
    let config = StressConfig {
        dumps: 20,
        consumers: 8,
        segments: 5,
        segment_size: 32 * 1024,
        read_size: 3000,
        format: CoreFormat::Elf32Core,
    };

    let result = stress_repeated_dumps(&device, &config);
    result.print_summary("many_consumers_many_dumps");
    assert_eq!(result.failed_dumps, 0);
    assert_eq!(
        result.bytes_read,
        20 * 8 * (52 + 5 * 32 + 5 * 32 * 1024) as u64
    );
}

#[test]
fn faulting_consumer_fails_session_without_disturbing_others() {
    let device = TestDevice::new();
    let (mut segments, data) = patterned_segments(&[(0x1000, 2048), (0x5000, 512)]);

    let mut good = device.open();
    let mut bad = device.open();
    let good_reader = thread::spawn(move || read_to_end(&mut good, 256));

    let producer = thread::spawn({
        let device = device.device.clone();
        move || device.dump(&mut segments, CoreFormat::Raw, false)
    });

    assert!(bad.wait_readable(Duration::from_secs(10)).is_readable());
    let mut faulty = FaultyBuffer::new(1024, 100);
    assert!(matches!(
        bad.read_into(&mut faulty, 1024),
        Err(ReadError::Fault(_))
    ));

    assert_eq!(good_reader.join().unwrap().unwrap(), data.concat());
    // The last consumer to finish decides the outcome.
    let result = producer.join().unwrap();
    assert!(result.is_ok() || matches!(result, Err(DumpError::SessionFailed)));
    assert_eq!(device.stats().read_errors(), 1);
}

#[test]
fn file_backed_memory_streams_through_backend() {
    let image = MemoryImage::new(0x8000_0000, 64 * 1024);
    let device = TestDevice::with_config(
        ramdump_core::DeviceConfig::new()
            .wait_timeout(TEST_WAIT_TIMEOUT)
            .physical(image.physical.clone()),
    );
    let segments = vec![
        ramdump_core::Segment::new(0x8000_0001, 1000),
        ramdump_core::Segment::new(0x8000_4000, 4096),
    ];

    let streams = run_dump(&device, segments, CoreFormat::Raw, 2, 777).unwrap();
    let expected = [image.slice(0x8000_0001, 1000), image.slice(0x8000_4000, 4096)].concat();
    assert!(streams.iter().all(|s| *s == expected));
}

#[test]
fn timed_out_dump_leaves_device_reusable() {
    let device = TestDevice::short_timeout(Duration::from_millis(500));
    let idle = device.open();
    let (segments, data) = patterned_segments(&[(0x1000, 64)]);

    let mut first = segments.clone();
    assert!(matches!(
        device.dump(&mut first, CoreFormat::Raw, false),
        Err(DumpError::Timeout { .. })
    ));
    assert!(!device.is_session_active());
    drop(idle);

    let streams = run_dump(&device, segments, CoreFormat::Raw, 2, 16).unwrap();
    assert!(streams.iter().all(|s| *s == data[0]));
}
