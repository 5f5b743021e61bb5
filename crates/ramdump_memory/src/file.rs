//! File-backed physical memory.

use crate::error::{MemoryError, MemoryResult};
use crate::region::{check_range, MemoryRegion, PhysicalMemory};
use parking_lot::Mutex;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A raw memory image file mapped at a physical base address.
///
/// Byte `n` of the file holds physical address `base + n`. This is how a
/// memory image captured by an external agent (a JTAG probe, a firmware
/// dump partition) is replayed through the capture engine.
///
/// # Thread Safety
///
/// The file handle is shared by all windows mapped from this backend and
/// guarded by a mutex; each read seeks and reads under the lock.
///
/// # Example
///
/// ```no_run
/// use ramdump_memory::{FilePhysical, PhysicalMemory};
/// use std::path::Path;
///
/// let phys = FilePhysical::open(Path::new("ddr.bin"), 0x8000_0000).unwrap();
/// let window = phys.map(0x8000_1000, 4096).unwrap();
/// ```
#[derive(Debug)]
pub struct FilePhysical {
    path: PathBuf,
    base: u64,
    size: u64,
    file: Arc<Mutex<File>>,
}

impl FilePhysical {
    /// Opens a memory image whose first byte is physical address `base`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or its size read.
    pub fn open(path: &Path, base: u64) -> MemoryResult<Self> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            base,
            size,
            file: Arc::new(Mutex::new(file)),
        })
    }

    /// Returns the path to the image file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the physical address of the first byte of the image.
    #[must_use]
    pub const fn base(&self) -> u64 {
        self.base
    }

    /// Returns the image size in bytes.
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }
}

impl PhysicalMemory for FilePhysical {
    fn map(&self, address: u64, len: u64) -> MemoryResult<Arc<dyn MemoryRegion>> {
        let unmapped = || MemoryError::Unmapped { address, len };

        let offset = address.checked_sub(self.base).ok_or_else(unmapped)?;
        let end = offset.checked_add(len).ok_or_else(unmapped)?;
        if end > self.size {
            return Err(unmapped());
        }

        Ok(Arc::new(FileWindow {
            file: Arc::clone(&self.file),
            base: address,
            file_offset: offset,
            len,
        }))
    }
}

/// A window into a [`FilePhysical`] image.
#[derive(Debug)]
pub struct FileWindow {
    file: Arc<Mutex<File>>,
    base: u64,
    file_offset: u64,
    len: u64,
}

impl MemoryRegion for FileWindow {
    fn base(&self) -> u64 {
        self.base
    }

    fn len(&self) -> u64 {
        self.len
    }

    fn read_narrow(&self, offset: u64, dst: &mut [u8]) -> MemoryResult<()> {
        check_range(offset, dst.len(), self.len)?;
        if dst.is_empty() {
            return Ok(());
        }

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(self.file_offset + offset))?;
        file.read_exact(dst)?;
        Ok(())
    }
}
