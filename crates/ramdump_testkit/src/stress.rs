//! Stress tests for ramdump sessions.
//!
//! These helpers run many back-to-back dumps against many concurrent
//! consumers and check every stream.

use crate::fixtures::{expected_stream, patterned_segments, run_dump};
use ramdump_core::{CoreFormat, HeaderOptions, RamdumpDevice};
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Dumps attempted.
    pub total_dumps: usize,
    /// Dumps where every consumer read the expected stream.
    pub successful_dumps: usize,
    /// Dumps that failed or delivered a wrong stream.
    pub failed_dumps: usize,
    /// Bytes delivered to consumers.
    pub bytes_read: u64,
    /// Total duration.
    pub duration: Duration,
    /// Consumer throughput in bytes per second.
    pub bytes_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, bytes_read: u64, duration: Duration) -> Self {
        let bytes_per_second = if duration.as_secs_f64() > 0.0 {
            bytes_read as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_dumps: successful + failed,
            successful_dumps: successful,
            failed_dumps: failed,
            bytes_read,
            duration,
            bytes_per_second,
        }
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Total dumps: {}", self.total_dumps);
        println!("Successful: {}", self.successful_dumps);
        println!("Failed: {}", self.failed_dumps);
        println!("Bytes read: {}", self.bytes_read);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} MiB/sec", self.bytes_per_second / (1024.0 * 1024.0));
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of back-to-back dumps.
    pub dumps: usize,
    /// Number of consumers reading each dump.
    pub consumers: usize,
    /// Number of segments per dump.
    pub segments: usize,
    /// Size of each segment in bytes.
    pub segment_size: usize,
    /// Destination buffer size of each read.
    pub read_size: usize,
    /// Header format of each dump.
    pub format: CoreFormat,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            dumps: 50,
            consumers: 4,
            segments: 4,
            segment_size: 64 * 1024,
            read_size: 4096,
            format: CoreFormat::Elf32Core,
        }
    }
}

/// Runs `config.dumps` sequential dumps, each read by every consumer.
pub fn stress_repeated_dumps(device: &RamdumpDevice, config: &StressConfig) -> StressTestResult {
    // Odd offsets keep every segment misaligned.
    let layout: Vec<_> = (0..config.segments)
        .map(|i| (0x8000_0003 + (i as u64) * 0x10_0000, config.segment_size))
        .collect();
    let (segments, data) = patterned_segments(&layout);
    let options = HeaderOptions {
        machine: device.config().machine,
    };
    let expected = expected_stream(&segments, &data, config.format, &options);

    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;
    let mut bytes_read = 0u64;

    for _ in 0..config.dumps {
        match run_dump(
            device,
            segments.clone(),
            config.format,
            config.consumers,
            config.read_size,
        ) {
            Ok(streams) if streams.iter().all(|s| *s == expected) => {
                bytes_read += streams.iter().map(|s| s.len() as u64).sum::<u64>();
                successful += 1;
            }
            _ => failed += 1,
        }
    }

    StressTestResult::new(successful, failed, bytes_read, start.elapsed())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::TestDevice;

    #[test]
    fn repeated_dumps_all_succeed() {
        let device = TestDevice::new();
        let config = StressConfig {
            dumps: 10,
            consumers: 3,
            segments: 3,
            segment_size: 4096,
            read_size: 1000,
            format: CoreFormat::SectionCore,
        };

        let result = stress_repeated_dumps(&device, &config);
        assert_eq!(result.successful_dumps, 10);
        assert_eq!(result.failed_dumps, 0);
        assert!(result.bytes_read > 0);
    }
}
