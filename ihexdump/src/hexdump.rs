//! The `hexdump` module provides the [`HexDump`] struct, which interprets Intel HEX
//! records into a sparse memory image and emits it as 4-byte-aligned dump lines.
//!
//! Data bytes are kept in a `BTreeMap` keyed by absolute address, so the dump can be
//! produced by walking the populated groups in order instead of scanning the whole
//! address range. Groups in which no byte is known never appear in the output.

use crate::dump::DumpLine;
use crate::error::{HexDumpError, HexDumpErrorKind};
use crate::record::{Record, RecordType};
use log::{debug, info, trace};
use std::collections::BTreeMap;
use std::collections::btree_map;
use std::error::Error;
use std::io::Write;
use std::iter::Peekable;
use std::path::{Path, PathBuf};

/// Low address bits cleared to get the base of a dump group.
pub(crate) const GROUP_MASK: usize = 0x3;
/// Number of bytes per dump group.
pub(crate) const GROUP_SIZE: usize = GROUP_MASK + 1;

/// Lowest and highest absolute address ever written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressRange {
    pub min: usize,
    pub max: usize,
}

impl AddressRange {
    const fn new(address: usize) -> Self {
        Self {
            min: address,
            max: address,
        }
    }

    const fn extend(&mut self, address: usize) {
        if address < self.min {
            self.min = address;
        }
        if address > self.max {
            self.max = address;
        }
    }

    /// Base of the first group to emit (`min` rounded down to a multiple of 4).
    #[must_use]
    pub const fn aligned_start(&self) -> usize {
        self.min & !GROUP_MASK
    }

    /// Base of the last group to emit, i.e. the group holding `max`.
    ///
    /// Rounding `max` up to a multiple of 4 and scanning to it only adds groups past
    /// the last known byte, which are always suppressed, so the group holding `max`
    /// is the last one that can produce output.
    #[must_use]
    pub const fn aligned_end(&self) -> usize {
        self.max & !GROUP_MASK
    }
}

/// Counters reported after a conversion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DumpSummary {
    /// Records interpreted (blank lines and anything after End Of File excluded)
    pub records: usize,
    /// Distinct addresses holding data
    pub data_bytes: usize,
    /// Dump lines written
    pub lines: usize,
}

#[derive(Debug, Clone, Default)]
pub struct HexDump {
    /// Intel HEX file path
    pub filepath: PathBuf,
    /// Number of records interpreted so far
    pub records: usize,
    /// Base added to the address of data records
    offset: usize,
    /// Extremes of written addresses, `None` until the first data byte
    range: Option<AddressRange>,
    /// Sparse memory image
    buffer: BTreeMap<usize, u8>,
}

impl<'a> IntoIterator for &'a HexDump {
    type Item = (&'a usize, &'a u8);
    type IntoIter = btree_map::Iter<'a, usize, u8>;
    fn into_iter(self) -> Self::IntoIter {
        self.buffer.iter()
    }
}

impl HexDump {
    /// Creates an empty `HexDump` instance.
    ///
    /// # Examples
    /// ```
    /// use ihexdump::HexDump;
    ///
    /// let hd = HexDump::new();
    /// assert!(hd.is_empty());
    /// ```
    #[must_use]
    pub const fn new() -> Self {
        Self {
            filepath: PathBuf::new(),
            records: 0,
            offset: 0,
            range: None,
            buffer: BTreeMap::new(),
        }
    }

    /// Clears loaded data and resets the address offset.
    pub fn clear(&mut self) {
        self.filepath.clear();
        self.records = 0;
        self.offset = 0;
        self.range = None;
        self.buffer.clear();
    }

    /// Interpret the raw contents of a hex file, record by record.
    ///
    /// Lines may end in `\n`, `\r\n` or a lone `\r`. Blank lines are skipped. An End Of File record stops interpretation, and
    /// whatever follows it is never looked at. Record types other than data and the
    /// two extended address types are ignored.
    ///
    /// # Errors
    /// Returns [`HexDumpError::ParseRecordError`] with the 1-based line number if a record
    /// is malformed or an absolute address overflows.
    ///
    /// # Example
    /// ```
    /// use ihexdump::HexDump;
    ///
    /// let mut hd = HexDump::new();
    /// hd.parse(b":0300300002330A1E\n:00000001FF\n").unwrap();
    ///
    /// assert_eq!(hd.get_byte(0x32), Some(0x0A));
    /// ```
    pub fn parse(&mut self, raw_bytes: &[u8]) -> Result<(), HexDumpError> {
        for (idx, line) in split_lines(raw_bytes).enumerate() {
            let line = line.trim_ascii();

            if line.is_empty() {
                continue;
            }

            let line_no = idx + 1;
            let record =
                Record::parse(line).map_err(|err| HexDumpError::ParseRecordError(err, line_no))?;
            self.records += 1;

            let keep_going = self
                .interpret(&record)
                .map_err(|err| HexDumpError::ParseRecordError(err, line_no))?;
            if !keep_going {
                debug!("End of file record at line #{line_no}");
                break;
            }
        }
        Ok(())
    }

    /// Apply a single record. Returns `false` once the End Of File record is seen.
    fn interpret(&mut self, record: &Record<'_>) -> Result<bool, HexDumpErrorKind> {
        match record.rtype {
            RecordType::Data => {
                let base = usize::from(record.address)
                    .checked_add(self.offset)
                    .ok_or(HexDumpErrorKind::AddressOverflow)?;
                for (i, byte) in record.data()?.into_iter().enumerate() {
                    let addr = base
                        .checked_add(i)
                        .ok_or(HexDumpErrorKind::AddressOverflow)?;
                    self.store(addr, byte);
                }
            }
            RecordType::EndOfFile => return Ok(false),
            RecordType::ExtendedSegmentAddress => {
                self.offset = record
                    .value()?
                    .checked_mul(16)
                    .ok_or(HexDumpErrorKind::AddressOverflow)?;
                debug!("Segment offset set to 0x{:X}", self.offset);
            }
            RecordType::ExtendedLinearAddress => {
                self.offset = record
                    .value()?
                    .checked_mul(1 << 16)
                    .ok_or(HexDumpErrorKind::AddressOverflow)?;
                debug!("Linear offset set to 0x{:X}", self.offset);
            }
            RecordType::Other(rtype) => {
                debug!("Ignoring record of type 0x{rtype:02X}");
            }
        }
        Ok(true)
    }

    /// Store a byte, replacing any earlier value at the same address.
    fn store(&mut self, address: usize, value: u8) {
        self.buffer.insert(address, value);
        match &mut self.range {
            Some(range) => range.extend(address),
            None => self.range = Some(AddressRange::new(address)),
        }
    }

    /// Creates a `HexDump` instance and fills it with data from the provided hex file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    ///
    /// # Example
    /// ```
    /// use ihexdump::HexDump;
    ///
    /// let hd = HexDump::from_hex("tests/fixtures/example.hex").unwrap();
    /// assert_eq!(hd.len(), 3);
    /// ```
    pub fn from_hex<P: AsRef<Path>>(filepath: P) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let mut hd = Self::new();
        hd.load_hex(filepath)?;
        Ok(hd)
    }

    /// Fills a `HexDump` instance with data from the provided hex file.
    /// Previously loaded data is discarded.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_hex<P: AsRef<Path>>(
        &mut self,
        filepath: P,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let raw_bytes = std::fs::read(&filepath)?;

        self.clear();
        self.filepath = filepath.as_ref().to_path_buf();
        self.parse(&raw_bytes)?;

        Ok(())
    }

    /// Iterator over the dump lines, in ascending address order.
    ///
    /// # Example
    /// ```
    /// use ihexdump::HexDump;
    ///
    /// let mut hd = HexDump::new();
    /// hd.parse(b":0300300002330A1E").unwrap();
    ///
    /// let lines: Vec<String> = hd.lines().map(|line| line.to_string()).collect();
    /// assert_eq!(lines, ["000030:xx0a3302"]);
    /// ```
    #[must_use]
    pub fn lines(&self) -> Lines<'_> {
        Lines {
            iter: self.buffer.iter().peekable(),
        }
    }

    /// Writes the dump into the provided writer. Returns the number of lines written.
    ///
    /// # Errors
    /// Returns an error if writing fails.
    pub fn write_dump_to<W: Write>(&self, mut writer: W) -> std::io::Result<usize> {
        let mut count = 0;
        for line in self.lines() {
            trace!("{line}");
            writeln!(writer, "{line}")?;
            count += 1;
        }
        writer.flush()?;
        Ok(count)
    }

    /// Generates a dump file at the specified path. Returns the number of lines written.
    /// Nothing but an empty file is produced when no data was loaded.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    ///
    /// # Example
    /// ```
    /// use ihexdump::HexDump;
    ///
    /// let hd = HexDump::from_hex("tests/fixtures/example.hex").unwrap();
    /// let lines = hd.write_dump("build/ex1/example.dhex").unwrap();
    ///
    /// assert_eq!(lines, 1);
    /// ```
    pub fn write_dump<P: AsRef<Path>>(
        &self,
        filepath: P,
    ) -> Result<usize, Box<dyn Error + Send + Sync>> {
        let writer = create_output(filepath.as_ref())?;
        Ok(self.write_dump_to(writer)?)
    }

    /// Get byte at the provided absolute address.
    #[must_use]
    pub fn get_byte(&self, address: usize) -> Option<u8> {
        self.buffer.get(&address).copied()
    }

    /// Get the smallest address that received data.
    #[must_use]
    pub fn get_min_addr(&self) -> Option<usize> {
        self.range.map(|range| range.min)
    }

    /// Get the highest address that received data.
    #[must_use]
    pub fn get_max_addr(&self) -> Option<usize> {
        self.range.map(|range| range.max)
    }

    /// Range of written addresses, `None` if no data record was seen.
    #[must_use]
    pub const fn range(&self) -> Option<AddressRange> {
        self.range
    }

    /// Current base applied to data record addresses.
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Number of addresses holding data.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Get an iterator over (address, byte) pairs in ascending address order.
    pub fn iter(&self) -> btree_map::Iter<'_, usize, u8> {
        self.into_iter()
    }
}

/// Iterator returned by [`HexDump::lines`].
///
/// Consecutive entries of the sparse buffer sharing a group base are folded into one
/// [`DumpLine`]; groups without entries are skipped.
pub struct Lines<'a> {
    iter: Peekable<btree_map::Iter<'a, usize, u8>>,
}

impl Iterator for Lines<'_> {
    type Item = DumpLine;

    fn next(&mut self) -> Option<Self::Item> {
        let (&first_addr, &first_byte) = self.iter.next()?;
        let base = first_addr & !GROUP_MASK;

        let mut line = DumpLine::new(base);
        line.bytes[first_addr - base] = Some(first_byte);

        while let Some((&addr, &byte)) = self.iter.next_if(|(addr, _)| **addr & !GROUP_MASK == base)
        {
            line.bytes[addr - base] = Some(byte);
        }

        Some(line)
    }
}

/// Split raw text into physical lines. `\r\n` counts as a single line end.
fn split_lines(raw_bytes: &[u8]) -> impl Iterator<Item = &[u8]> {
    let mut rest = Some(raw_bytes);
    std::iter::from_fn(move || {
        let bytes = rest?;
        match bytes.iter().position(|&b| b == b'\n' || b == b'\r') {
            Some(end) => {
                let next = match bytes[end..] {
                    [b'\r', b'\n', ..] => end + 2,
                    _ => end + 1,
                };
                rest = Some(&bytes[next..]);
                Some(&bytes[..end])
            }
            None => {
                rest = None;
                Some(bytes)
            }
        }
    })
}

/// Create (or truncate) an output file, making sure its parent directory exists.
fn create_output(filepath: &Path) -> std::io::Result<std::io::BufWriter<std::fs::File>> {
    if let Some(parent) = filepath.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(filepath)?;

    Ok(std::io::BufWriter::new(file))
}

/// Converts an Intel HEX file into a dump file.
///
/// Both files are opened before any record is interpreted. On a parse error the output
/// is left truncated.
///
/// # Errors
/// Returns an error if either file cannot be opened or a record is malformed.
///
/// # Example
/// ```
/// use ihexdump::convert;
///
/// let summary = convert("tests/fixtures/example.hex", "build/ex2/example.dhex").unwrap();
///
/// assert_eq!(summary.records, 2);
/// assert_eq!(summary.lines, 1);
/// ```
pub fn convert<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
) -> Result<DumpSummary, Box<dyn Error + Send + Sync>> {
    let raw_bytes = std::fs::read(&input)?;
    let writer = create_output(output.as_ref())?;

    let mut hd = HexDump::new();
    hd.filepath = input.as_ref().to_path_buf();
    hd.parse(&raw_bytes)?;

    match hd.range() {
        Some(range) => info!(
            "{} bytes of data between 0x{:X} and 0x{:X}",
            hd.len(),
            range.min,
            range.max
        ),
        None => info!("No data records found in {}", input.as_ref().display()),
    }

    let lines = hd.write_dump_to(writer)?;

    Ok(DumpSummary {
        records: hd.records,
        data_bytes: hd.len(),
        lines,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dump_of(hex: &str) -> Vec<String> {
        let mut hd = HexDump::new();
        hd.parse(hex.as_bytes()).unwrap();
        hd.lines().map(|line| line.to_string()).collect()
    }

    #[test]
    fn test_data_record_placement() {
        // Arrange
        let mut hd = HexDump::new();

        // Act
        let res = hd.parse(b":0300300002330A1E\n:00000001FF\n");

        // Assert
        assert!(res.is_ok());
        assert_eq!(hd.get_byte(0x30), Some(0x02));
        assert_eq!(hd.get_byte(0x31), Some(0x33));
        assert_eq!(hd.get_byte(0x32), Some(0x0A));
        assert_eq!(hd.get_byte(0x33), None);
        assert_eq!(hd.records, 2);
    }

    #[test]
    fn test_example_dump_line() {
        assert_eq!(
            dump_of(":0300300002330A1E\n:00000001FF\n"),
            ["000030:xx0a3302"]
        );
    }

    #[test]
    fn test_segment_offset() {
        // Arrange
        let mut hd = HexDump::new();

        // Act - segment 0x1200 -> offset 0x12000
        let res = hd.parse(b":020000021200EA\n:0100040055A6\n");

        // Assert
        assert!(res.is_ok());
        assert_eq!(hd.offset(), 0x12000);
        assert_eq!(hd.get_byte(0x12004), Some(0x55));
    }

    #[test]
    fn test_linear_offset() {
        // Arrange
        let mut hd = HexDump::new();

        // Act - linear 0x0800 -> offset 0x0800_0000
        let res = hd.parse(b":020000040800F2\n:02000000AABB99\n");

        // Assert
        assert!(res.is_ok());
        assert_eq!(hd.offset(), 0x0800_0000);
        assert_eq!(hd.get_byte(0x0800_0000), Some(0xAA));
        assert_eq!(hd.get_byte(0x0800_0001), Some(0xBB));
    }

    #[test]
    fn test_offset_is_prospective() {
        // Arrange
        let mut hd = HexDump::new();

        // Act - data, then offset change, then data at the same record address
        let res = hd.parse(b":0100100011DE\n:020000040001F9\n:0100100022CD\n");

        // Assert
        assert!(res.is_ok());
        assert_eq!(hd.get_byte(0x10), Some(0x11));
        assert_eq!(hd.get_byte(0x1_0010), Some(0x22));
    }

    #[test]
    fn test_end_of_file_stops_processing() {
        // Arrange
        let mut hd = HexDump::new();

        // Act - the malformed line after EOF must not be read
        let res = hd.parse(b":0100000011EE\n:00000001FF\n:0100040022D9\nnot a record\n");

        // Assert
        assert!(res.is_ok());
        assert_eq!(hd.len(), 1);
        assert_eq!(hd.get_byte(0x4), None);
        assert_eq!(hd.records, 2);
    }

    #[test]
    fn test_unknown_record_types_are_ignored() {
        // Arrange
        let mut hd = HexDump::new();

        // Act - start segment (03), start linear (05) and an undefined type (0A)
        let res = hd.parse(
            b":0400000300003800C1\n:04000005000000CD2A\n:0200000AZZZZFF\n:0100000011EE\n",
        );

        // Assert
        assert!(res.is_ok());
        assert_eq!(hd.offset(), 0);
        assert_eq!(hd.len(), 1);
        assert_eq!(hd.records, 4);
    }

    #[test]
    fn test_blank_lines_and_crlf() {
        assert_eq!(
            dump_of("\r\n   \n:0300300002330A1E\r\n\n\t\n:00000001FF\r\n"),
            ["000030:xx0a3302"]
        );
    }

    #[test]
    fn test_carriage_return_line_ends() {
        // Arrange
        let mut hd = HexDump::new();

        // Act
        let res = hd.parse(b":0100000011EE\r:0100010022CC\r:00000001FF\r:0100020033CA\r");

        // Assert - both data records before EOF are stored, the one after is not
        assert!(res.is_ok());
        assert_eq!(hd.get_byte(0), Some(0x11));
        assert_eq!(hd.get_byte(1), Some(0x22));
        assert_eq!(hd.get_byte(2), None);
        assert_eq!(hd.records, 3);
    }

    #[test]
    fn test_split_lines_counts_physical_lines() {
        let lines: Vec<&[u8]> = split_lines(b"a\r\nb\rc\n\r\nd").collect();

        assert_eq!(lines, [&b"a"[..], &b"b"[..], &b"c"[..], &b""[..], &b"d"[..]]);
    }

    #[test]
    fn test_error_line_number_with_mixed_line_ends() {
        // Arrange
        let mut hd = HexDump::new();

        // Act - CRLF, lone CR, then a bad record on the fourth physical line
        let res = hd.parse(b":0100000011EE\r\n\r:0100010022CC\n:02000000AAZZ00\r");

        // Assert
        assert_eq!(
            res,
            Err(HexDumpError::ParseRecordError(
                HexDumpErrorKind::ContainsInvalidCharacters("data"),
                4
            ))
        );
    }

    #[test]
    fn test_last_write_wins() {
        // Arrange
        let mut hd = HexDump::new();

        // Act
        let res = hd.parse(b":0100000011EE\n:0100000022DD\n");

        // Assert
        assert!(res.is_ok());
        assert_eq!(hd.get_byte(0), Some(0x22));
        assert_eq!(hd.len(), 1);
    }

    #[test]
    fn test_error_reports_line_number() {
        // Arrange
        let mut hd = HexDump::new();

        // Act - third physical line has a bad data byte
        let res = hd.parse(b":0100000011EE\n\n:02000000AAZZ00\n");

        // Assert
        assert_eq!(
            res,
            Err(HexDumpError::ParseRecordError(
                HexDumpErrorKind::ContainsInvalidCharacters("data"),
                3
            ))
        );
    }

    #[test]
    fn test_empty_address_payload_is_an_error() {
        let mut hd = HexDump::new();

        let res = hd.parse(b":00000004FC\n");

        assert_eq!(
            res,
            Err(HexDumpError::ParseRecordError(
                HexDumpErrorKind::ContainsInvalidCharacters("data"),
                1
            ))
        );
    }

    #[test]
    fn test_offset_overflow_is_an_error() {
        let mut hd = HexDump::new();

        // 16 hex digits of segment value cannot be multiplied by 16 on any target
        let res = hd.parse(b":08000002FFFFFFFFFFFFFFFF00\n");

        assert_eq!(
            res,
            Err(HexDumpError::ParseRecordError(
                HexDumpErrorKind::AddressOverflow,
                1
            ))
        );
    }

    #[test]
    fn test_no_data_gives_no_range_and_no_lines() {
        // Arrange
        let mut hd = HexDump::new();

        // Act
        let res = hd.parse(b"\n:020000040800F2\n:00000001FF\n");

        // Assert
        assert!(res.is_ok());
        assert!(hd.range().is_none());
        assert!(hd.get_min_addr().is_none());
        assert!(hd.get_max_addr().is_none());
        assert_eq!(hd.lines().count(), 0);
    }

    #[test]
    fn test_groups_are_split_and_suppressed() {
        // Bytes at 0x03, 0x04 and 0x11, nothing in between
        let hex = ":010003000AF2\n:010004000BF0\n:010011000CE2\n";

        assert_eq!(
            dump_of(hex),
            ["000000:0axxxxxx", "000004:xxxxxx0b", "000010:xxxx0cxx"]
        );
    }

    #[test]
    fn test_address_range_alignment() {
        // Arrange
        let mut range = AddressRange::new(0x31);
        range.extend(0x45);
        range.extend(0x33);

        // Assert
        assert_eq!(range.min, 0x31);
        assert_eq!(range.max, 0x45);
        assert_eq!(range.aligned_start(), 0x30);
        assert_eq!(range.aligned_end(), 0x44);
    }

    #[test]
    fn test_write_dump_to_counts_lines() {
        // Arrange
        let mut hd = HexDump::new();
        hd.parse(b":080000000102030405060708D4\n").unwrap();
        let mut out = Vec::new();

        // Act
        let res = hd.write_dump_to(&mut out);

        // Assert
        assert_eq!(res.ok(), Some(2));
        assert_eq!(
            String::from_utf8_lossy(&out),
            "000000:04030201\n000004:08070605\n"
        );
    }

    #[test]
    fn test_clear() {
        let mut hd = HexDump::new();
        hd.parse(b":020000040001F9\n:0100000011EE\n").unwrap();

        hd.clear();

        assert!(hd.is_empty());
        assert_eq!(hd.offset(), 0);
        assert_eq!(hd.records, 0);
        assert!(hd.range().is_none());
    }
}
