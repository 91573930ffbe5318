//! Cell-related types
//!
//! This module contains:
//! - [`CellValue`] - A scalar cell value
//! - [`CellError`] - Excel error sentinels
//! - [`CellAddress`] - A cell's location (e.g., "A1")
//! - [`CellRange`] - A rectangle of cells (e.g., "A1:B10", "A:C", "4:7")

mod address;
mod value;

pub use address::{CellAddress, CellRange, CellRangeIterator};
pub use value::{format_number, CellError, CellValue};
