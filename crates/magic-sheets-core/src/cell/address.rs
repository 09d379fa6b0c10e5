//! Cell address codec and range types

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// A zero-based cell coordinate, written "B12" in A1 notation
///
/// Column letters are bijective base-26 (A=1..Z=26, AA=27, ...), rows are
/// 1-indexed on the wire and 0-indexed in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellAddress {
    /// Row index (0-based internally, 1-based in display)
    pub row: u32,
    /// Column index (0-based, A=0, B=1, ..., Z=25, AA=26)
    pub col: u32,
}

impl CellAddress {
    /// Create a new cell address
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// Decode a reference matching `^([A-Z]+)(\d+)$`
    ///
    /// # Examples
    /// ```
    /// use magic_sheets_core::CellAddress;
    ///
    /// assert_eq!(CellAddress::decode("A1").unwrap(), CellAddress::new(0, 0));
    /// assert_eq!(CellAddress::decode("Z1").unwrap(), CellAddress::new(0, 25));
    /// assert_eq!(CellAddress::decode("AA1").unwrap(), CellAddress::new(0, 26));
    /// assert!(CellAddress::decode("1A").is_err());
    /// ```
    pub fn decode(reference: &str) -> Result<Self> {
        let bytes = reference.as_bytes();
        let split = bytes
            .iter()
            .position(|b| !b.is_ascii_uppercase())
            .unwrap_or(bytes.len());

        let (letters, digits) = reference.split_at(split);
        if letters.is_empty() {
            return Err(Error::InvalidAddress(format!(
                "no column letters in '{}'",
                reference
            )));
        }
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidAddress(format!(
                "no row number in '{}'",
                reference
            )));
        }

        let col = Self::letters_to_column(letters)?;
        let row: u32 = digits
            .parse()
            .map_err(|_| Error::InvalidAddress(format!("row out of range in '{}'", reference)))?;

        if row == 0 {
            return Err(Error::InvalidAddress(format!(
                "row number must be >= 1 in '{}'",
                reference
            )));
        }

        Ok(Self { row: row - 1, col })
    }

    /// Encode as an A1-style reference
    pub fn encode(&self) -> String {
        let mut result = Self::column_to_letters(self.col);
        result.push_str(&(self.row as u64 + 1).to_string());
        result
    }

    /// Convert column index to letters (0 = A, 25 = Z, 26 = AA, etc.)
    pub fn column_to_letters(col: u32) -> String {
        let mut letters = Vec::new();
        let mut n = col as u64 + 1;

        while n > 0 {
            n -= 1;
            letters.push((n % 26) as u8 + b'A');
            n /= 26;
        }

        letters.iter().rev().map(|&b| b as char).collect()
    }

    /// Convert uppercase column letters to index (A = 0, Z = 25, AA = 26, etc.)
    pub fn letters_to_column(letters: &str) -> Result<u32> {
        if letters.is_empty() {
            return Err(Error::InvalidAddress("empty column letters".into()));
        }

        let mut col: u64 = 0;
        for c in letters.chars() {
            if !c.is_ascii_uppercase() {
                return Err(Error::InvalidAddress(format!(
                    "invalid column letter '{}'",
                    c
                )));
            }
            col = col * 26 + (c as u64 - 'A' as u64 + 1);
            if col > u32::MAX as u64 {
                return Err(Error::InvalidAddress(format!(
                    "column '{}' out of range",
                    letters
                )));
            }
        }

        Ok((col - 1) as u32)
    }

    /// The address `rows` down and `cols` to the right of this one
    pub fn offset(&self, rows: u32, cols: u32) -> Self {
        Self {
            row: self.row.saturating_add(rows),
            col: self.col.saturating_add(cols),
        }
    }

    /// Create a range from this address to another
    pub fn to(&self, other: CellAddress) -> CellRange {
        CellRange::new(*self, other)
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}

impl FromStr for CellAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::decode(s)
    }
}

/// A range of cells (e.g., "A1:B10")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellRange {
    /// Start address (top-left)
    pub start: CellAddress,
    /// End address (bottom-right)
    pub end: CellAddress,
}

impl CellRange {
    /// Create a new cell range, normalized so start is top-left
    pub fn new(start: CellAddress, end: CellAddress) -> Self {
        Self {
            start: CellAddress::new(start.row.min(end.row), start.col.min(end.col)),
            end: CellAddress::new(start.row.max(end.row), start.col.max(end.col)),
        }
    }

    /// Create a range from row/column indices
    pub fn from_indices(start_row: u32, start_col: u32, end_row: u32, end_col: u32) -> Self {
        Self::new(
            CellAddress::new(start_row, start_col),
            CellAddress::new(end_row, end_col),
        )
    }

    /// Create a single-cell range
    pub fn single(addr: CellAddress) -> Self {
        Self {
            start: addr,
            end: addr,
        }
    }

    /// Parse a range from A1:B10 notation
    pub fn parse(s: &str) -> Result<Self> {
        match s.split_once(':') {
            Some((start, end)) => {
                let start = CellAddress::decode(start)
                    .map_err(|_| Error::InvalidRange(s.to_string()))?;
                let end =
                    CellAddress::decode(end).map_err(|_| Error::InvalidRange(s.to_string()))?;
                Ok(Self::new(start, end))
            }
            None => Ok(Self::single(CellAddress::decode(s)?)),
        }
    }

    /// Check if a cell is within this range
    pub fn contains(&self, addr: &CellAddress) -> bool {
        addr.row >= self.start.row
            && addr.row <= self.end.row
            && addr.col >= self.start.col
            && addr.col <= self.end.col
    }

    /// Get the number of rows in the range
    pub fn row_count(&self) -> u32 {
        self.end.row - self.start.row + 1
    }

    /// Get the number of columns in the range
    pub fn col_count(&self) -> u32 {
        self.end.col - self.start.col + 1
    }

    /// Get the total number of cells in the range
    pub fn cell_count(&self) -> u64 {
        self.row_count() as u64 * self.col_count() as u64
    }

    /// Iterate over all cell addresses in the range (row by row)
    pub fn cells(&self) -> CellRangeIterator {
        CellRangeIterator {
            range: *self,
            current_row: self.start.row,
            current_col: self.start.col,
            remaining: self.cell_count(),
        }
    }

    /// Format as A1:B10 string
    pub fn to_a1_string(&self) -> String {
        if self.start == self.end {
            self.start.encode()
        } else {
            format!("{}:{}", self.start.encode(), self.end.encode())
        }
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_a1_string())
    }
}

impl FromStr for CellRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Iterator over cells in a range
pub struct CellRangeIterator {
    range: CellRange,
    current_row: u32,
    current_col: u32,
    remaining: u64,
}

impl Iterator for CellRangeIterator {
    type Item = CellAddress;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let addr = CellAddress::new(self.current_row, self.current_col);
        self.remaining -= 1;

        if self.current_col == self.range.end.col {
            self.current_col = self.range.start.col;
            self.current_row = self.current_row.saturating_add(1);
        } else {
            self.current_col += 1;
        }

        Some(addr)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for CellRangeIterator {}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_column_to_letters() {
        assert_eq!(CellAddress::column_to_letters(0), "A");
        assert_eq!(CellAddress::column_to_letters(1), "B");
        assert_eq!(CellAddress::column_to_letters(25), "Z");
        assert_eq!(CellAddress::column_to_letters(26), "AA");
        assert_eq!(CellAddress::column_to_letters(27), "AB");
        assert_eq!(CellAddress::column_to_letters(701), "ZZ");
        assert_eq!(CellAddress::column_to_letters(702), "AAA");
        assert_eq!(CellAddress::column_to_letters(16383), "XFD");
    }

    #[test]
    fn test_letters_to_column() {
        assert_eq!(CellAddress::letters_to_column("A").unwrap(), 0);
        assert_eq!(CellAddress::letters_to_column("Z").unwrap(), 25);
        assert_eq!(CellAddress::letters_to_column("AA").unwrap(), 26);
        assert_eq!(CellAddress::letters_to_column("ZZ").unwrap(), 701);
        assert_eq!(CellAddress::letters_to_column("XFD").unwrap(), 16383);

        assert!(CellAddress::letters_to_column("a").is_err());
        assert!(CellAddress::letters_to_column("").is_err());
    }

    #[test]
    fn test_decode_known_references() {
        assert_eq!(CellAddress::decode("A1").unwrap(), CellAddress::new(0, 0));
        assert_eq!(CellAddress::decode("Z1").unwrap(), CellAddress::new(0, 25));
        assert_eq!(CellAddress::decode("AA1").unwrap(), CellAddress::new(0, 26));
        assert_eq!(CellAddress::decode("B12").unwrap(), CellAddress::new(11, 1));
        assert_eq!(
            CellAddress::decode("XFD1048576").unwrap(),
            CellAddress::new(1_048_575, 16_383)
        );
    }

    #[test]
    fn test_decode_rejects_malformed() {
        for bad in ["", "A", "1", "1A", "a1", "A0", "A-1", "A1B", " A1", "$A$1", "A1.5"] {
            let err = CellAddress::decode(bad).unwrap_err();
            assert!(matches!(err, Error::InvalidAddress(_)), "{bad}");
        }
        assert!(CellAddress::decode("A99999999999").is_err());
    }

    #[test]
    fn test_display_and_from_str() {
        assert_eq!(CellAddress::new(99, 2).to_string(), "C100");
        let addr: CellAddress = "AB7".parse().unwrap();
        assert_eq!(addr, CellAddress::new(6, 27));
    }

    #[test]
    fn test_offset_rolls_over_columns() {
        let z = CellAddress::decode("Z3").unwrap();
        assert_eq!(z.offset(0, 1).encode(), "AA3");
        assert_eq!(z.offset(2, 2).encode(), "AB5");
    }

    #[test]
    fn test_cell_range_parse() {
        let range = CellRange::parse("B2:A1").unwrap();
        assert_eq!(range.start, CellAddress::new(0, 0));
        assert_eq!(range.end, CellAddress::new(1, 1));

        let range = CellRange::parse("C3").unwrap();
        assert_eq!(range.start, range.end);
        assert!(CellRange::parse("A1:").is_err());
    }

    #[test]
    fn test_cell_range_iterator() {
        let range = CellRange::parse("A1:B2").unwrap();
        let cells: Vec<_> = range.cells().map(|c| c.encode()).collect();
        assert_eq!(cells, vec!["A1", "B1", "A2", "B2"]);
        assert_eq!(range.cells().len(), 4);
    }

    proptest! {
        #[test]
        fn prop_encode_decode_roundtrip(row in 0u32..2_000_000, col in 0u32..100_000) {
            let addr = CellAddress::new(row, col);
            prop_assert_eq!(CellAddress::decode(&addr.encode()).unwrap(), addr);
        }

        #[test]
        fn prop_decode_encode_roundtrip(reference in "[A-Z]{1,3}[1-9][0-9]{0,6}") {
            let addr = CellAddress::decode(&reference).unwrap();
            prop_assert_eq!(addr.encode(), reference);
        }
    }
}
