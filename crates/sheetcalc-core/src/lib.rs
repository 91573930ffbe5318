//! # sheetcalc-core
//!
//! Core data structures for the sheetcalc formula engine.
//!
//! This crate provides the fundamental types used throughout sheetcalc:
//! - [`CellValue`] and [`CellError`] - Scalar cell values and Excel error sentinels
//! - [`CellAddress`] and [`CellRange`] - Cell addressing and rectangular bounds
//! - [`Reference`] - A workbook/sheet qualified reference
//!
//! ## Example
//!
//! ```rust
//! use sheetcalc_core::{CellRange, Reference};
//!
//! let reference = Reference::parse("'[excel.xlsx]DATA'!A1:B2").unwrap();
//! assert_eq!(reference.book.as_deref(), Some("EXCEL.XLSX"));
//! assert_eq!(reference.sheet.as_deref(), Some("DATA"));
//! assert_eq!(reference.range, CellRange::parse("A1:B2").unwrap());
//! assert_eq!(reference.to_string(), "'[EXCEL.XLSX]DATA'!A1:B2");
//! ```

pub mod cell;
pub mod error;
pub mod reference;

// Re-exports for convenience
pub use cell::{format_number, CellAddress, CellError, CellRange, CellValue};
pub use error::{Error, Result};
pub use reference::{Qualifier, Reference};

/// Maximum number of rows in a worksheet (Excel limit)
pub const MAX_ROWS: u32 = 1_048_576;

/// Maximum number of columns in a worksheet (Excel limit)
pub const MAX_COLS: u16 = 16_384;

/// Maximum length of a sheet name
pub const MAX_SHEET_NAME_LEN: usize = 31;
