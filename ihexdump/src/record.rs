//! The `record` module defines the [`Record`] and [`RecordType`] which are used for parsing
//! Intel HEX records.
//!
//! A record is split into its fields purely by character position. The start code is not
//! checked, and neither is the checksum value. Only the fields that a record type actually
//! needs are decoded, so unknown record types pass through without touching their payload.

use crate::error::HexDumpErrorKind;

mod ranges {
    use std::ops::Range;
    pub const RECORD_LEN_RANGE: Range<usize> = 1..3;
    pub const RECORD_ADDR_RANGE: Range<usize> = 3..7;
    pub const RECORD_TYPE_RANGE: Range<usize> = 7..9;
}
mod sizes {
    pub const BYTE_CHAR_LEN: usize = 2;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RecordType {
    Data,
    EndOfFile,
    ExtendedSegmentAddress,
    ExtendedLinearAddress,
    /// Any other type, including start address records; carries no behavior
    Other(u8),
}

impl From<u8> for RecordType {
    fn from(value: u8) -> Self {
        match value {
            0x00 => Self::Data,
            0x01 => Self::EndOfFile,
            0x02 => Self::ExtendedSegmentAddress,
            0x04 => Self::ExtendedLinearAddress,
            other => Self::Other(other),
        }
    }
}

/// One Intel HEX record, borrowing its payload from the source line.
#[derive(Debug, PartialEq, Eq)]
pub struct Record<'a> {
    pub length: u8,
    pub address: u16,
    pub rtype: RecordType,
    /// Payload as undecoded hex characters (`2 * length` of them)
    pub payload: &'a [u8],
    pub checksum: u8,
}

impl<'a> Record<'a> {
    /// Split the trimmed record line into its fields.
    ///
    /// # Errors
    /// - `RecordTooShort` if the line ends before a field is complete
    /// - `ContainsInvalidCharacters` if a header field or the checksum is not hexadecimal
    #[allow(clippy::cast_possible_truncation)]
    pub fn parse(line: &'a [u8]) -> Result<Self, HexDumpErrorKind> {
        let length = hex_field(line, ranges::RECORD_LEN_RANGE, "byte count")?;
        let address = hex_field(line, ranges::RECORD_ADDR_RANGE, "address")?;
        let rtype = hex_field(line, ranges::RECORD_TYPE_RANGE, "record type")?;

        let data_start = ranges::RECORD_TYPE_RANGE.end;
        let data_end = data_start + sizes::BYTE_CHAR_LEN * length;
        let payload = slice_field(line, data_start..data_end, "data")?;

        let checksum = hex_field(line, data_end..data_end + sizes::BYTE_CHAR_LEN, "checksum")?;

        // Field widths bound the values, so the casts are lossless
        Ok(Self {
            length: length as u8,
            address: address as u16,
            rtype: RecordType::from(rtype as u8),
            payload,
            checksum: checksum as u8,
        })
    }

    /// Decode the payload into data bytes.
    ///
    /// # Errors
    /// Returns `ContainsInvalidCharacters` if a payload byte is not hexadecimal.
    #[allow(clippy::cast_possible_truncation)]
    pub fn data(&self) -> Result<Vec<u8>, HexDumpErrorKind> {
        self.payload
            .chunks_exact(sizes::BYTE_CHAR_LEN)
            .map(|pair| parse_hex(pair, "data").map(|byte| byte as u8))
            .collect()
    }

    /// Decode the whole payload as a single big-endian integer, as used by the
    /// extended address records.
    ///
    /// # Errors
    /// - `ContainsInvalidCharacters` if the payload is empty or not hexadecimal
    /// - `AddressOverflow` if the value does not fit into `usize`
    pub fn value(&self) -> Result<usize, HexDumpErrorKind> {
        parse_hex(self.payload, "data")
    }
}

fn slice_field<'a>(
    line: &'a [u8],
    range: std::ops::Range<usize>,
    name: &'static str,
) -> Result<&'a [u8], HexDumpErrorKind> {
    line.get(range).ok_or(HexDumpErrorKind::RecordTooShort(name))
}

fn hex_field(
    line: &[u8],
    range: std::ops::Range<usize>,
    name: &'static str,
) -> Result<usize, HexDumpErrorKind> {
    parse_hex(slice_field(line, range, name)?, name)
}

/// Parse a non-empty run of hex digits. Signs, prefixes and whitespace are rejected.
pub(crate) fn parse_hex(digits: &[u8], name: &'static str) -> Result<usize, HexDumpErrorKind> {
    if digits.is_empty() {
        return Err(HexDumpErrorKind::ContainsInvalidCharacters(name));
    }

    digits.iter().try_fold(0usize, |acc, &ch| {
        let nibble = char::from(ch)
            .to_digit(16)
            .ok_or(HexDumpErrorKind::ContainsInvalidCharacters(name))?;
        acc.checked_mul(16)
            .and_then(|v| v.checked_add(nibble as usize))
            .ok_or(HexDumpErrorKind::AddressOverflow)
    })
}
