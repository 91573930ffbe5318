//! # sheetcalc
//!
//! An Excel-compatible formula engine.
//!
//! Load workbooks into an [`ExcelModel`], finish it to link the cells
//! into one computation graph, then calculate, read values back, or
//! compile a set of input cells and output cells into a standalone
//! function.
//!
//! ## Features
//!
//! - Excel formula grammar, including array literals, range algebra
//!   (`:`, intersection, union) and cross-sheet/cross-workbook references
//! - Excel value model: error values as data, empty cells, broadcasting
//! - Circular references, as `#CIRCULAR!` or by fixed-point iteration
//! - Defined names and 3-D references
//! - Compiled functions that can be called from several threads
//! - JSON snapshots of whole models
//!
//! ## Example
//!
//! ```rust
//! use sheetcalc::prelude::*;
//!
//! let book = Workbook::new("excel.xlsx").with_sheet(
//!     Worksheet::new("DATA")
//!         .with("A1", 2.0)
//!         .with("A2", 3.0)
//!         .with("B1", "=SUM(A1:A2)*A1"),
//! );
//!
//! let mut model = ExcelModel::new();
//! model.load(&book).unwrap();
//! model.finish(CalculationOptions::default()).unwrap();
//!
//! let func = model
//!     .compile(&["'[excel.xlsx]DATA'!A1"], &["'[excel.xlsx]DATA'!B1"])
//!     .unwrap();
//! let out = func.call(&[Range::scalar(4.0)]).unwrap();
//! assert_eq!(out[0], Range::scalar(28.0));
//! ```

pub mod book;
pub mod calculation;
pub mod error;
pub mod model;
pub mod prelude;

pub use book::{BookSource, CellContent, Workbook, Worksheet};
pub use calculation::{CalculationOptions, CalculationStats};
pub use error::{ModelError, ModelResult};
pub use model::{BookValues, ExcelModel};

// Re-export core types
pub use sheetcalc_core::{CellAddress, CellError, CellRange, CellValue, Reference};

// Re-export formula types
pub use sheetcalc_formula::{
    global_registry, parse_formula, CallContext, CompiledFunction, FormulaError, FormulaExpr,
    FormulaResult, FunctionDef, FunctionRegistry, Range, Value,
};
