//! Cell positions and rectangular ranges
//!
//! Positions are 0-based internally and printed in A1 notation. `$` markers
//! are accepted when parsing and dropped: `$A$1` and `A1` address the same
//! cell.

use crate::error::{Error, Result};
use crate::{MAX_COLS, MAX_ROWS};
use std::fmt;
use std::str::FromStr;

/// A single cell position (e.g., "A1", "$B$2")
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellAddress {
    /// Row index (0-based internally, 1-based in display)
    pub row: u32,
    /// Column index (0-based, A=0, B=1, ..., XFD=16383)
    pub col: u16,
}

impl CellAddress {
    pub fn new(row: u32, col: u16) -> Self {
        Self { row, col }
    }

    /// Parse A1-style notation, ignoring `$` markers
    ///
    /// # Examples
    /// ```
    /// use sheetcalc_core::CellAddress;
    ///
    /// assert_eq!(CellAddress::parse("$B$2").unwrap(), CellAddress::new(1, 1));
    /// assert!(CellAddress::parse("B0").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        let text = s.trim();
        let bad = || Error::InvalidAddress(format!("'{}'", text));

        let rest = text.strip_prefix('$').unwrap_or(text);
        let split = rest
            .find(|c: char| !c.is_ascii_alphabetic())
            .ok_or_else(bad)?;
        let (letters, rest) = rest.split_at(split);
        let digits = rest.strip_prefix('$').unwrap_or(rest);
        if letters.is_empty() || !is_all(digits, |c| c.is_ascii_digit()) {
            return Err(bad());
        }

        Ok(Self {
            row: row_index(digits)?,
            col: column_index(letters)?,
        })
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_letters(self.col), self.row + 1)
    }
}

impl FromStr for CellAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Column letters for a 0-based index (0 = A, 26 = AA)
pub(crate) fn column_letters(col: u16) -> String {
    let mut n = u32::from(col) + 1;
    let mut out = Vec::new();
    while n > 0 {
        n -= 1;
        out.push(char::from(b'A' + (n % 26) as u8));
        n /= 26;
    }
    out.iter().rev().collect()
}

/// 0-based index for column letters, case-insensitive
pub(crate) fn column_index(letters: &str) -> Result<u16> {
    if !is_all(letters, |c| c.is_ascii_alphabetic()) {
        return Err(Error::InvalidAddress(format!("column '{}'", letters)));
    }
    let n = letters.bytes().fold(0u32, |acc, b| {
        acc.saturating_mul(26)
            .saturating_add(u32::from(b.to_ascii_uppercase() - b'A') + 1)
    });
    if n > u32::from(MAX_COLS) {
        return Err(Error::ColumnOutOfBounds(letters.to_uppercase()));
    }
    Ok((n - 1) as u16)
}

/// 0-based index for a 1-based row number
fn row_index(digits: &str) -> Result<u32> {
    let row: u64 = digits
        .parse()
        .map_err(|_| Error::InvalidAddress(format!("row '{}'", digits)))?;
    if row == 0 || row > u64::from(MAX_ROWS) {
        return Err(Error::RowOutOfBounds(row));
    }
    Ok(row as u32 - 1)
}

fn is_all(s: &str, pred: impl Fn(char) -> bool) -> bool {
    !s.is_empty() && s.chars().all(pred)
}

/// A rectangle of cells (e.g., "A1:B10", "A:C", "4:7")
///
/// `start` is always the top-left corner and `end` the bottom-right. Whole
/// columns and rows are ordinary rectangles touching the sheet edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellRange {
    pub start: CellAddress,
    pub end: CellAddress,
}

impl CellRange {
    /// Rectangle spanned by two corners, in either order
    pub fn new(a: CellAddress, b: CellAddress) -> Self {
        Self {
            start: CellAddress::new(a.row.min(b.row), a.col.min(b.col)),
            end: CellAddress::new(a.row.max(b.row), a.col.max(b.col)),
        }
    }

    pub fn from_indices(start_row: u32, start_col: u16, end_row: u32, end_col: u16) -> Self {
        Self::new(
            CellAddress::new(start_row, start_col),
            CellAddress::new(end_row, end_col),
        )
    }

    pub fn single(addr: CellAddress) -> Self {
        Self {
            start: addr,
            end: addr,
        }
    }

    /// Whole columns `first..=last` (0-based)
    pub fn columns(first: u16, last: u16) -> Self {
        Self::from_indices(0, first, MAX_ROWS - 1, last)
    }

    /// Whole rows `first..=last` (0-based)
    pub fn rows(first: u32, last: u32) -> Self {
        Self::from_indices(first, 0, last, MAX_COLS - 1)
    }

    /// Parse `A1`, `A1:B10`, `A:C` or `4:7`, ignoring `$` markers
    pub fn parse(s: &str) -> Result<Self> {
        let text = s.trim();
        let Some((left, right)) = text.split_once(':') else {
            return CellAddress::parse(text).map(Self::single);
        };
        let bare = |part: &str| part.trim().trim_start_matches('$').to_string();
        let (l, r) = (bare(left), bare(right));

        let letters = |p: &str| is_all(p, |c| c.is_ascii_alphabetic());
        let digits = |p: &str| is_all(p, |c| c.is_ascii_digit());

        if letters(&l) && letters(&r) {
            Ok(Self::columns(column_index(&l)?, column_index(&r)?))
        } else if digits(&l) && digits(&r) {
            Ok(Self::rows(row_index(&l)?, row_index(&r)?))
        } else {
            let start = CellAddress::parse(left)
                .map_err(|e| Error::InvalidRange(format!("'{}': {}", text, e)))?;
            let end = CellAddress::parse(right)
                .map_err(|e| Error::InvalidRange(format!("'{}': {}", text, e)))?;
            Ok(Self::new(start, end))
        }
    }

    pub fn is_whole_column(&self) -> bool {
        self.start.row == 0 && self.end.row == MAX_ROWS - 1
    }

    pub fn is_whole_row(&self) -> bool {
        self.start.col == 0 && self.end.col == MAX_COLS - 1
    }

    pub fn contains(&self, addr: &CellAddress) -> bool {
        (self.start.row..=self.end.row).contains(&addr.row)
            && (self.start.col..=self.end.col).contains(&addr.col)
    }

    pub fn row_count(&self) -> u32 {
        self.end.row - self.start.row + 1
    }

    pub fn col_count(&self) -> u16 {
        self.end.col - self.start.col + 1
    }

    pub fn overlaps(&self, other: &CellRange) -> bool {
        self.intersect(other).is_some()
    }

    /// Shared cells of two rectangles
    pub fn intersect(&self, other: &CellRange) -> Option<CellRange> {
        let top = self.start.row.max(other.start.row);
        let left = self.start.col.max(other.start.col);
        let bottom = self.end.row.min(other.end.row);
        let right = self.end.col.min(other.end.col);
        (top <= bottom && left <= right).then(|| Self::from_indices(top, left, bottom, right))
    }

    /// Smallest rectangle covering both
    pub fn bounding(&self, other: &CellRange) -> CellRange {
        Self::new(
            CellAddress::new(self.start.row.min(other.start.row), self.start.col.min(other.start.col)),
            CellAddress::new(self.end.row.max(other.end.row), self.end.col.max(other.end.col)),
        )
    }

    /// Row-major walk over every position
    pub fn cells(&self) -> CellRangeIterator {
        CellRangeIterator {
            range: *self,
            next: Some(self.start),
        }
    }
}

/// A1 text, using `A:C` and `4:7` for whole columns and rows
impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_whole_column() {
            write!(f, "{}:{}", column_letters(self.start.col), column_letters(self.end.col))
        } else if self.is_whole_row() {
            write!(f, "{}:{}", self.start.row + 1, self.end.row + 1)
        } else if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}:{}", self.start, self.end)
        }
    }
}

impl FromStr for CellRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Iterator returned by [`CellRange::cells`]
pub struct CellRangeIterator {
    range: CellRange,
    next: Option<CellAddress>,
}

impl Iterator for CellRangeIterator {
    type Item = CellAddress;

    fn next(&mut self) -> Option<CellAddress> {
        let current = self.next?;
        self.next = if current.col < self.range.end.col {
            Some(CellAddress::new(current.row, current.col + 1))
        } else if current.row < self.range.end.row {
            Some(CellAddress::new(current.row + 1, self.range.start.col))
        } else {
            None
        };
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.next.map_or(0, |at| {
            let width = self.range.col_count() as usize;
            let below = (self.range.end.row - at.row) as usize * width;
            below + (self.range.end.col - at.col) as usize + 1
        });
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for CellRangeIterator {}
