//! Workbook and sheet qualified references

use crate::cell::CellRange;
use crate::error::{Error, Result};
use crate::MAX_SHEET_NAME_LEN;
use std::fmt;
use std::str::FromStr;

/// A rectangular reference, optionally qualified by workbook and sheet
///
/// Book and sheet names are stored upper-cased and ranges carry no `$`
/// markers, so two references to the same cells compare equal and render to
/// the same canonical string (`'[BOOK]SHEET'!A1:B2`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Reference {
    /// Workbook name
    pub book: Option<String>,
    /// Sheet name (first sheet of a 3-D span)
    pub sheet: Option<String>,
    /// Last sheet of a 3-D span (`Sheet1:Sheet3!A1`)
    pub last_sheet: Option<String>,
    /// Covered cells
    pub range: CellRange,
}

impl Reference {
    /// Create an unqualified reference
    pub fn new(range: CellRange) -> Self {
        Self {
            book: None,
            sheet: None,
            last_sheet: None,
            range,
        }
    }

    /// Create a fully qualified reference
    pub fn qualified(book: &str, sheet: &str, range: CellRange) -> Self {
        Self {
            book: Some(book.to_uppercase()),
            sheet: Some(sheet.to_uppercase()),
            last_sheet: None,
            range,
        }
    }

    /// Parse a reference such as `'[book.xlsx]My Sheet'!A1:B2`
    ///
    /// Accepted shapes: `A1`, `A1:B2`, `A:C`, `4:7`, `Sheet!A1`,
    /// `'Sheet name'!A1`, `[book]Sheet!A1`, `'[book]Sheet'!A1` and
    /// `Sheet1:Sheet3!A1`. Inside quotes `''` stands for one `'`.
    ///
    /// # Examples
    /// ```
    /// use sheetcalc_core::Reference;
    ///
    /// let r = Reference::parse("'It''s'!$B$2").unwrap();
    /// assert_eq!(r.sheet.as_deref(), Some("IT'S"));
    /// assert_eq!(r.to_string(), "'IT''S'!B2");
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::InvalidReference("empty reference".into()));
        }

        let (qualifier, range_text) = Qualifier::split(s)?;
        let range = CellRange::parse(range_text)
            .map_err(|e| Error::InvalidReference(format!("'{}': {}", s, e)))?;

        let mut reference = Self::new(range);
        reference.book = qualifier.book;
        reference.sheet = qualifier.sheet;
        reference.last_sheet = qualifier.last_sheet;
        Ok(reference)
    }

    /// Check if both book and sheet are known
    pub fn is_qualified(&self) -> bool {
        self.book.is_some() && self.sheet.is_some()
    }

    /// Check if the reference spans several sheets
    pub fn is_3d(&self) -> bool {
        self.last_sheet.is_some()
    }

    /// Fill in a missing book and sheet from the context the reference
    /// appears in
    pub fn qualify(&self, book: &str, sheet: &str) -> Self {
        let mut out = self.clone();
        if out.book.is_none() {
            out.book = Some(book.to_uppercase());
        }
        if out.sheet.is_none() {
            out.sheet = Some(sheet.to_uppercase());
        }
        out
    }

    /// Same sheet, different cells
    pub fn with_range(&self, range: CellRange) -> Self {
        Self {
            range,
            ..self.clone()
        }
    }

    /// Same cells on a single sheet of the span
    pub fn on_sheet(&self, sheet: &str) -> Self {
        Self {
            sheet: Some(sheet.to_uppercase()),
            last_sheet: None,
            ..self.clone()
        }
    }

    /// Check if both references address the same sheet(s)
    pub fn same_sheet(&self, other: &Reference) -> bool {
        self.book == other.book && self.sheet == other.sheet && self.last_sheet == other.last_sheet
    }

    /// Shared cells of two references on the same sheet
    pub fn intersect(&self, other: &Reference) -> Option<Reference> {
        if !self.same_sheet(other) {
            return None;
        }
        self.range
            .intersect(&other.range)
            .map(|range| self.with_range(range))
    }

    /// Smallest reference covering both, if they share a sheet
    pub fn bounding(&self, other: &Reference) -> Option<Reference> {
        if !self.same_sheet(other) {
            return None;
        }
        Some(self.with_range(self.range.bounding(&other.range)))
    }

    /// Check if the reference fully covers `other`
    pub fn contains(&self, other: &Reference) -> bool {
        self.same_sheet(other)
            && self.range.contains(&other.range.start)
            && self.range.contains(&other.range.end)
    }

    /// Number of rows covered
    pub fn rows(&self) -> usize {
        self.range.row_count() as usize
    }

    /// Number of columns covered
    pub fn cols(&self) -> usize {
        self.range.col_count() as usize
    }

    fn sheet_prefix(&self) -> Option<String> {
        let sheet = self.sheet.as_ref()?;
        let mut inner = String::new();
        if let Some(book) = &self.book {
            inner.push('[');
            inner.push_str(book);
            inner.push(']');
        }
        inner.push_str(sheet);
        if let Some(last) = &self.last_sheet {
            inner.push(':');
            inner.push_str(last);
        }

        let bare = self.book.is_none()
            && sheet.chars().all(is_bare_char)
            && self
                .last_sheet
                .as_deref()
                .map_or(true, |l| l.chars().all(is_bare_char));
        if bare {
            Some(inner)
        } else {
            Some(format!("'{}'", inner.replace('\'', "''")))
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sheet_prefix() {
            Some(prefix) => write!(f, "{}!{}", prefix, self.range),
            None => write!(f, "{}", self.range),
        }
    }
}

impl FromStr for Reference {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<CellRange> for Reference {
    fn from(range: CellRange) -> Self {
        Self::new(range)
    }
}

/// The `[book]sheet!` part of a qualified reference or name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Qualifier {
    /// Workbook name, upper-cased
    pub book: Option<String>,
    /// Sheet name, upper-cased
    pub sheet: Option<String>,
    /// Last sheet of a 3-D span, upper-cased
    pub last_sheet: Option<String>,
}

impl Qualifier {
    /// Split `prefix!rest` into the parsed prefix and the remainder
    ///
    /// Text without a `!` yields an empty qualifier and the whole input.
    /// A bare `[book]` prefix (no sheet) is accepted for book-scoped names.
    pub fn split(s: &str) -> Result<(Self, &str)> {
        let (prefix, rest) = split_prefix(s)?;
        let Some(prefix) = prefix else {
            return Ok((Self::default(), rest));
        };

        let (book, sheets) = split_book(&prefix, s)?;
        let mut qualifier = Self {
            book: book.map(|b| b.to_uppercase()),
            ..Self::default()
        };
        if sheets.is_empty() && qualifier.book.is_some() {
            return Ok((qualifier, rest));
        }

        let (first, last) = match sheets.find(':') {
            Some(pos) => (&sheets[..pos], Some(&sheets[pos + 1..])),
            None => (sheets, None),
        };
        qualifier.sheet = Some(validate_sheet_name(first)?.to_uppercase());
        qualifier.last_sheet = match last {
            Some(last) => Some(validate_sheet_name(last)?.to_uppercase()),
            None => None,
        };
        Ok((qualifier, rest))
    }
}

fn is_bare_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

/// Split `prefix!range`, unquoting the prefix
fn split_prefix(s: &str) -> Result<(Option<String>, &str)> {
    if let Some(rest) = s.strip_prefix('\'') {
        let mut name = String::new();
        let mut chars = rest.char_indices().peekable();
        while let Some((i, c)) = chars.next() {
            if c != '\'' {
                name.push(c);
                continue;
            }
            if let Some((_, '\'')) = chars.peek() {
                chars.next();
                name.push('\'');
                continue;
            }
            let after = &rest[i + 1..];
            return match after.strip_prefix('!') {
                Some(range) => Ok((Some(name), range)),
                None => Err(Error::InvalidReference(format!(
                    "expected '!' after quoted sheet in '{}'",
                    s
                ))),
            };
        }
        return Err(Error::InvalidReference(format!("unterminated quote in '{}'", s)));
    }

    match s.rfind('!') {
        Some(pos) => Ok((Some(s[..pos].to_string()), &s[pos + 1..])),
        None => Ok((None, s)),
    }
}

/// Split `[book]sheet` into its parts
fn split_book<'a>(prefix: &'a str, context: &str) -> Result<(Option<&'a str>, &'a str)> {
    let Some(rest) = prefix.strip_prefix('[') else {
        return Ok((None, prefix));
    };
    match rest.find(']') {
        Some(pos) if pos > 0 => Ok((Some(&rest[..pos]), &rest[pos + 1..])),
        _ => Err(Error::InvalidReference(format!(
            "malformed workbook name in '{}'",
            context
        ))),
    }
}

fn validate_sheet_name(name: &str) -> Result<&str> {
    if name.is_empty() {
        return Err(Error::InvalidSheetName("empty sheet name".into()));
    }
    if name.chars().count() > MAX_SHEET_NAME_LEN {
        return Err(Error::InvalidSheetName(format!(
            "'{}' is longer than {} characters",
            name, MAX_SHEET_NAME_LEN
        )));
    }
    if name.contains(['[', ']', '*', '?', '/', '\\']) {
        return Err(Error::InvalidSheetName(format!(
            "'{}' contains a reserved character",
            name
        )));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_plain_range() {
        let r = Reference::parse("$A$1:B2").unwrap();
        assert_eq!(r.book, None);
        assert_eq!(r.sheet, None);
        assert_eq!(r.to_string(), "A1:B2");
    }

    #[test]
    fn test_parse_book_and_sheet() {
        let r = Reference::parse("'[excel.xlsx]Data Sheet'!A1:B2").unwrap();
        assert_eq!(r.book.as_deref(), Some("EXCEL.XLSX"));
        assert_eq!(r.sheet.as_deref(), Some("DATA SHEET"));
        assert_eq!(r.to_string(), "'[EXCEL.XLSX]DATA SHEET'!A1:B2");

        let r = Reference::parse("[b.xlsx]s1!C3").unwrap();
        assert_eq!(r.to_string(), "'[B.XLSX]S1'!C3");
    }

    #[test]
    fn test_parse_sheet_only() {
        let r = Reference::parse("Sheet1!A:A").unwrap();
        assert_eq!(r.sheet.as_deref(), Some("SHEET1"));
        assert!(r.range.is_whole_column());
        assert_eq!(r.to_string(), "SHEET1!A:A");

        let r = Reference::parse("'my sheet'!3:4").unwrap();
        assert_eq!(r.to_string(), "'MY SHEET'!3:4");
    }

    #[test]
    fn test_parse_3d_span() {
        let r = Reference::parse("Sheet1:Sheet3!B2").unwrap();
        assert!(r.is_3d());
        assert_eq!(r.sheet.as_deref(), Some("SHEET1"));
        assert_eq!(r.last_sheet.as_deref(), Some("SHEET3"));
        assert_eq!(r.to_string(), "SHEET1:SHEET3!B2");
        assert_eq!(r.on_sheet("Sheet2").to_string(), "SHEET2!B2");
    }

    #[test]
    fn test_parse_errors() {
        assert!(Reference::parse("").is_err());
        assert!(Reference::parse("'unterminated!A1").is_err());
        assert!(Reference::parse("[]s!A1").is_err());
        assert!(Reference::parse("s!").is_err());
        assert!(Reference::parse("a/b!A1").is_err());
    }

    #[test]
    fn test_qualify_and_canonical_equality() {
        let r = Reference::parse("b$2").unwrap().qualify("Book.xlsx", "Sheet1");
        let q = Reference::parse("'[BOOK.XLSX]sheet1'!B2").unwrap();
        assert_eq!(r, q);
        assert_eq!(r.to_string(), q.to_string());

        let already = Reference::parse("other!A1").unwrap().qualify("b", "s");
        assert_eq!(already.sheet.as_deref(), Some("OTHER"));
        assert_eq!(already.book.as_deref(), Some("B"));
    }

    #[test]
    fn test_intersect_and_bounding() {
        let a = Reference::parse("S!B1:D1").unwrap();
        let b = Reference::parse("S!B1:C2").unwrap();
        assert_eq!(a.intersect(&b).unwrap().to_string(), "S!B1:C1");
        assert_eq!(a.bounding(&b).unwrap().to_string(), "S!B1:D2");

        let other = Reference::parse("T!B1").unwrap();
        assert_eq!(a.intersect(&other), None);
        assert_eq!(a.bounding(&other), None);
        assert!(a.contains(&Reference::parse("S!C1").unwrap()));
    }

    #[test]
    fn test_qualifier_split() {
        let (q, rest) = Qualifier::split("'[excel.xlsx]DATA'!INPUT_A").unwrap();
        assert_eq!(q.book.as_deref(), Some("EXCEL.XLSX"));
        assert_eq!(q.sheet.as_deref(), Some("DATA"));
        assert_eq!(rest, "INPUT_A");

        let (q, rest) = Qualifier::split("[b]!TOTAL").unwrap();
        assert_eq!(q.book.as_deref(), Some("B"));
        assert_eq!(q.sheet, None);
        assert_eq!(rest, "TOTAL");

        let (q, rest) = Qualifier::split("A1").unwrap();
        assert_eq!(q, Qualifier::default());
        assert_eq!(rest, "A1");
    }
}
