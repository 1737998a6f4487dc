//! The `dump` module defines [`DumpLine`], one 4-byte group of the dump output.
//!
//! A line reads `aaaaaa:b3b2b1b0`: the group base address as at least six lowercase hex
//! digits, a colon, then the bytes at offsets `+3` down to `+0`. Unknown bytes are
//! written as `xx`. Lines can be parsed back, which is what a memory loader consuming
//! the dump does: it writes [`DumpLine::word`] at `address >> 2` with the byte enable
//! mask from [`DumpLine::strobe`].

use crate::error::{HexDumpError, HexDumpErrorKind};
use crate::hexdump::{GROUP_MASK, GROUP_SIZE};
use crate::record::parse_hex;
use std::error::Error;
use std::fmt;
use std::path::Path;

const UNKNOWN_BYTE: &str = "xx";
const VALUE_CHAR_LEN: usize = GROUP_SIZE * 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DumpLine {
    /// Group base address, always a multiple of 4
    pub address: usize,
    /// Bytes at `address + 0` through `address + 3`
    pub bytes: [Option<u8>; GROUP_SIZE],
}

impl DumpLine {
    /// Creates a line with all four bytes unknown.
    #[must_use]
    pub const fn new(address: usize) -> Self {
        Self {
            address,
            bytes: [None; GROUP_SIZE],
        }
    }

    /// `true` if no byte of the group is known. Such lines are never emitted.
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.bytes.iter().all(Option::is_none)
    }

    /// Word value with byte `+0` least significant. Unknown bytes read as zero.
    ///
    /// # Example
    /// ```
    /// use ihexdump::DumpLine;
    ///
    /// let line = DumpLine::parse("000030:xx0a3302").unwrap();
    /// assert_eq!(line.word(), 0x000a_3302);
    /// ```
    #[must_use]
    pub fn word(&self) -> u32 {
        u32::from_le_bytes(self.bytes.map(|byte| byte.unwrap_or(0)))
    }

    /// Byte enable mask, bit `j` set when byte `+j` is known.
    #[must_use]
    pub fn strobe(&self) -> u8 {
        self.bytes
            .iter()
            .enumerate()
            .filter(|(_, byte)| byte.is_some())
            .fold(0, |mask, (j, _)| mask | (1 << j))
    }

    /// Parse one dump line.
    ///
    /// # Errors
    /// - `MissingSeparator` if there is no ':'
    /// - `ContainsInvalidCharacters` if the address or a byte is not hexadecimal
    /// - `InvalidValueLength` if the value part is not 8 characters
    /// - `MisalignedAddress` if the address is not a multiple of 4
    #[allow(clippy::cast_possible_truncation)]
    pub fn parse(line: &str) -> Result<Self, HexDumpErrorKind> {
        let (address, value) = line
            .trim()
            .split_once(':')
            .ok_or(HexDumpErrorKind::MissingSeparator)?;

        let address = parse_hex(address.as_bytes(), "address")?;
        if address & GROUP_MASK != 0 {
            return Err(HexDumpErrorKind::MisalignedAddress(address));
        }

        let value = value.as_bytes();
        if value.len() != VALUE_CHAR_LEN {
            return Err(HexDumpErrorKind::InvalidValueLength(value.len()));
        }

        let mut line = Self::new(address);
        // Value is written most significant byte first
        for (pair, slot) in value.chunks_exact(2).zip(line.bytes.iter_mut().rev()) {
            if !pair.eq_ignore_ascii_case(UNKNOWN_BYTE.as_bytes()) {
                *slot = Some(parse_hex(pair, "value")? as u8);
            }
        }

        Ok(line)
    }
}

impl fmt::Display for DumpLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06x}:", self.address)?;
        for byte in self.bytes.iter().rev() {
            match byte {
                Some(b) => write!(f, "{b:02x}")?,
                None => f.write_str(UNKNOWN_BYTE)?,
            }
        }
        Ok(())
    }
}

/// Reads every line of a dump file. Blank lines are skipped.
///
/// # Errors
/// Returns an error if the file cannot be read, or [`HexDumpError::ReadDumpError`] with
/// the 1-based line number if a line is malformed.
///
/// # Example
/// ```
/// use ihexdump::read_dump;
///
/// let lines = read_dump("tests/fixtures/example.dhex").unwrap();
/// assert_eq!(lines.len(), 1);
/// assert_eq!(lines[0].strobe(), 0b0111);
/// ```
pub fn read_dump<P: AsRef<Path>>(
    filepath: P,
) -> Result<Vec<DumpLine>, Box<dyn Error + Send + Sync>> {
    let contents = std::fs::read_to_string(filepath)?;

    let lines = contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            DumpLine::parse(line).map_err(|err| HexDumpError::ReadDumpError(err, idx + 1))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(lines)
}
