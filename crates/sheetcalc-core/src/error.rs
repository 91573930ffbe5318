//! Error types for sheetcalc-core

use thiserror::Error;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Failures while reading addresses, ranges and qualified references
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Text that is not an A1-style address
    #[error("Invalid cell address: {0}")]
    InvalidAddress(String),

    /// Text that is not a range (`A1:B2`, `A:C`, `4:7`)
    #[error("Invalid cell range: {0}")]
    InvalidRange(String),

    /// 1-based row number outside `1..=1048576`
    #[error("Row {0} is outside the sheet")]
    RowOutOfBounds(u64),

    /// Column letters past `XFD`
    #[error("Column {0} is outside the sheet")]
    ColumnOutOfBounds(String),

    /// Empty, overlong or otherwise unusable sheet name
    #[error("Invalid sheet name: {0}")]
    InvalidSheetName(String),

    /// Malformed workbook/sheet qualified reference
    #[error("Invalid reference: {0}")]
    InvalidReference(String),
}
