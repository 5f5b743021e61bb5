//! CLI command implementations.

pub mod inspect;
pub mod simulate;

use thiserror::Error;

/// Errors from parsing command-line values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArgError {
    /// A number could not be parsed.
    #[error("invalid number: {0}")]
    InvalidNumber(String),

    /// A segment spec is not `ADDRESS:SIZE[:NAME]`.
    #[error("invalid segment '{0}', expected ADDRESS:SIZE[:NAME]")]
    InvalidSegment(String),

    /// Unknown dump entry point.
    #[error("unknown mode '{0}', expected raw, elf, minidump or minidump-elf32")]
    UnknownMode(String),
}

/// Parses a decimal or `0x`-prefixed hexadecimal number.
pub fn parse_u64(s: &str) -> Result<u64, ArgError> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|_| ArgError::InvalidNumber(s.to_string()))
}
