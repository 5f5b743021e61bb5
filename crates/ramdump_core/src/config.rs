//! Device and registry configuration.

use crate::header::elf;
use ramdump_memory::{CopyStrategy, PhysicalMemory};
use std::sync::Arc;
use std::time::Duration;

/// How long a dump waits for its consumers before aborting.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_millis(120_000);

/// Upper bound on segment bytes copied by a single read call.
pub const MAX_CHUNK_SIZE: usize = 1024 * 1024;

/// Number of device minors a registry can hand out.
pub const MAX_DEVICES: usize = 256;

/// Prefix of every device node name.
pub const DEVICE_NAME_PREFIX: &str = "ramdump";

/// Configuration for a single ramdump device.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Whether the raw and ELF entry points capture the complete address
    /// range, deriving each segment's size from the next segment's address.
    pub complete_ramdump: bool,

    /// How long a dump waits for all consumers to finish.
    pub wait_timeout: Duration,

    /// Maximum number of segment bytes copied per read call.
    pub max_chunk_size: usize,

    /// How chunk copies access segment memory.
    pub copy_strategy: CopyStrategy,

    /// `e_machine` written into section-format headers.
    pub machine: u16,

    /// Backend used to map segments that carry no pre-mapped view.
    pub physical: Option<Arc<dyn PhysicalMemory>>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            complete_ramdump: false,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            max_chunk_size: MAX_CHUNK_SIZE,
            copy_strategy: CopyStrategy::SplitUnaligned,
            machine: elf::native_machine(),
            physical: None,
        }
    }
}

impl DeviceConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether the raw and ELF entry points compact segment sizes.
    #[must_use]
    pub const fn complete_ramdump(mut self, value: bool) -> Self {
        self.complete_ramdump = value;
        self
    }

    /// Sets how long a dump waits for its consumers.
    #[must_use]
    pub const fn wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    /// Sets the per-read chunk limit. Zero is raised to one byte.
    #[must_use]
    pub const fn max_chunk_size(mut self, size: usize) -> Self {
        self.max_chunk_size = if size == 0 { 1 } else { size };
        self
    }

    /// Sets the copy strategy.
    #[must_use]
    pub const fn copy_strategy(mut self, strategy: CopyStrategy) -> Self {
        self.copy_strategy = strategy;
        self
    }

    /// Sets the `e_machine` of section-format headers.
    #[must_use]
    pub const fn machine(mut self, machine: u16) -> Self {
        self.machine = machine;
        self
    }

    /// Sets the physical memory backend.
    #[must_use]
    pub fn physical(mut self, physical: Arc<dyn PhysicalMemory>) -> Self {
        self.physical = Some(physical);
        self
    }
}

/// Configuration for a [`crate::DeviceRegistry`].
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Maximum number of live devices.
    pub max_devices: usize,

    /// Prefix joined to each device name with an underscore.
    pub name_prefix: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_devices: MAX_DEVICES,
            name_prefix: DEVICE_NAME_PREFIX.to_string(),
        }
    }
}

impl RegistryConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of live devices.
    #[must_use]
    pub fn max_devices(mut self, count: usize) -> Self {
        self.max_devices = count;
        self
    }

    /// Sets the device name prefix.
    #[must_use]
    pub fn name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }
}
