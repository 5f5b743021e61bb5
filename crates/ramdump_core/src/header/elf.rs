//! ELF constants and little-endian field writers.

/// ELF magic bytes.
pub const ELFMAG: &[u8; 4] = b"\x7fELF";
/// Index of the class byte in `e_ident`.
pub const EI_CLASS: usize = 4;
/// Index of the data encoding byte in `e_ident`.
pub const EI_DATA: usize = 5;
/// Index of the version byte in `e_ident`.
pub const EI_VERSION: usize = 6;
/// Index of the OS ABI byte in `e_ident`.
pub const EI_OSABI: usize = 7;

/// 32-bit objects.
pub const ELFCLASS32: u8 = 1;
/// 64-bit objects.
pub const ELFCLASS64: u8 = 2;
/// Two's complement, little-endian.
pub const ELFDATA2LSB: u8 = 1;
/// Current ELF version.
pub const EV_CURRENT: u8 = 1;
/// System V ABI.
pub const ELFOSABI_NONE: u8 = 0;

/// Core file.
pub const ET_CORE: u16 = 4;

/// No machine.
pub const EM_NONE: u16 = 0;
/// Intel 80386.
pub const EM_386: u16 = 3;
/// ARM.
pub const EM_ARM: u16 = 40;
/// AMD x86-64.
pub const EM_X86_64: u16 = 62;
/// ARM 64-bit.
pub const EM_AARCH64: u16 = 183;
/// RISC-V.
pub const EM_RISCV: u16 = 243;

/// Loadable program segment.
pub const PT_LOAD: u32 = 1;
/// Execute permission.
pub const PF_X: u32 = 0x1;
/// Write permission.
pub const PF_W: u32 = 0x2;
/// Read permission.
pub const PF_R: u32 = 0x4;

/// Program data section.
pub const SHT_PROGBITS: u32 = 1;
/// String table section.
pub const SHT_STRTAB: u32 = 3;
/// Writable section.
pub const SHF_WRITE: u64 = 0x1;

/// Returns the `e_machine` value of the build target.
#[must_use]
pub const fn native_machine() -> u16 {
    if cfg!(target_arch = "aarch64") {
        EM_AARCH64
    } else if cfg!(target_arch = "x86_64") {
        EM_X86_64
    } else if cfg!(target_arch = "arm") {
        EM_ARM
    } else if cfg!(target_arch = "x86") {
        EM_386
    } else if cfg!(any(target_arch = "riscv32", target_arch = "riscv64")) {
        EM_RISCV
    } else {
        EM_NONE
    }
}

pub(crate) fn put_u16(buf: &mut [u8], at: usize, value: u16) {
    buf[at..at + 2].copy_from_slice(&value.to_le_bytes());
}

pub(crate) fn put_u32(buf: &mut [u8], at: usize, value: u32) {
    buf[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

pub(crate) fn put_u64(buf: &mut [u8], at: usize, value: u64) {
    buf[at..at + 8].copy_from_slice(&value.to_le_bytes());
}

pub(crate) fn get_u16(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([buf[at], buf[at + 1]])
}

pub(crate) fn get_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

pub(crate) fn get_u64(buf: &[u8], at: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[at..at + 8]);
    u64::from_le_bytes(bytes)
}

/// Writes the identification bytes shared by both header layouts.
pub(crate) fn write_ident(buf: &mut [u8], class: u8) {
    buf[..4].copy_from_slice(ELFMAG);
    buf[EI_CLASS] = class;
    buf[EI_DATA] = ELFDATA2LSB;
    buf[EI_VERSION] = EV_CURRENT;
    buf[EI_OSABI] = ELFOSABI_NONE;
}
