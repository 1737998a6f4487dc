//! # `ihexdump`
//!
//! `ihexdump` is a Rust library for turning Intel HEX firmware images into a flat,
//! 4-byte-aligned word dump suitable for loading into a memory model.
//!
//! The library provides:
//! - Record interpreter building a sparse memory image (via [`HexDump`] struct).
//! - Dump emitter and reader for the `aaaaaa:b3b2b1b0` line format (via [`DumpLine`]).
//! - Error handling with [`HexDumpError`].
//!
//! ## Example
//!
//! ```
//! use ihexdump::HexDump;
//!
//! let hd = HexDump::from_hex("tests/fixtures/example.hex").unwrap();
//! hd.write_dump("build/ex0/example.dhex").unwrap();
//! ```

mod dump;
mod error;
mod hexdump;
mod record;

// Public APIs
pub use dump::{DumpLine, read_dump};
pub use error::{HexDumpError, HexDumpErrorKind};
pub use hexdump::{AddressRange, DumpSummary, HexDump, Lines, convert};
pub use record::{Record, RecordType};
