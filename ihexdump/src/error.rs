//! The `error` module defines the [`HexDumpError`] enum that describes the errors that
//! can occur when interpreting Intel HEX records via [`HexDump`](crate::HexDump) or reading
//! back a dump via [`DumpLine`](crate::DumpLine).
//! It contains the three pieces of information:
//! 1. When the error occurs, i.e., while parsing a hex record or reading a dump line.
//! 2. What kind of error was encountered (via [`HexDumpErrorKind`] enum).
//! 3. At which line of the input file the error was encountered.

use std::error::Error;
use std::fmt;

#[derive(Debug, PartialEq, Eq)]
pub enum HexDumpError {
    ParseRecordError(HexDumpErrorKind, usize),
    ReadDumpError(HexDumpErrorKind, usize),
}

impl HexDumpError {
    /// Kind of the underlying error.
    #[must_use]
    pub const fn kind(&self) -> &HexDumpErrorKind {
        match self {
            Self::ParseRecordError(kind, _) | Self::ReadDumpError(kind, _) => kind,
        }
    }

    /// Line number (1-based) at which the error was encountered.
    #[must_use]
    pub const fn line(&self) -> usize {
        match self {
            Self::ParseRecordError(_, line) | Self::ReadDumpError(_, line) => *line,
        }
    }
}

impl fmt::Display for HexDumpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ParseRecordError(_, line) => {
                write!(
                    f,
                    "Error encountered during record parsing at line #{line} of the hex file",
                )
            }
            Self::ReadDumpError(_, line) => {
                write!(f, "Error encountered during reading of dump line #{line}")
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum HexDumpErrorKind {
    /// Line ends before the named field is complete
    RecordTooShort(&'static str),
    /// Field expected to be hexadecimal contains other characters
    ContainsInvalidCharacters(&'static str),
    /// Absolute address does not fit into the machine word
    AddressOverflow,
    /// Dump line has no ':' between address and value
    MissingSeparator,
    /// Dump value is not exactly 8 characters long
    InvalidValueLength(usize),
    /// Dump address is not a multiple of 4
    MisalignedAddress(usize),
}

impl fmt::Display for HexDumpErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RecordTooShort(field) => {
                write!(f, "Record too short to contain the {field} field")
            }
            Self::ContainsInvalidCharacters(field) => {
                write!(f, "Field {field} contains invalid character(s)")
            }
            Self::AddressOverflow => {
                write!(f, "Absolute address overflows the address space")
            }
            Self::MissingSeparator => {
                write!(f, "Missing separator ':' between address and value")
            }
            Self::InvalidValueLength(actual) => {
                write!(f, "Expected 8 value characters, found {actual}")
            }
            Self::MisalignedAddress(address) => {
                write!(f, "Address 0x{address:X} is not aligned to 4 bytes")
            }
        }
    }
}

impl Error for HexDumpError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.kind())
    }
}

impl Error for HexDumpErrorKind {}
