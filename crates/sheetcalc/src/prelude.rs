//! Prelude module - common imports for sheetcalc users
//!
//! ```rust
//! use sheetcalc::prelude::*;
//! ```

pub use crate::{
    // Book types
    BookSource,
    // Calculation types
    CalculationOptions,
    CalculationStats,
    CellContent,
    // Cell types
    CellError,
    CellValue,
    CompiledFunction,
    // Model
    ExcelModel,
    // Error types
    ModelError,
    ModelResult,
    // Values
    Range,
    Reference,
    Workbook,
    Worksheet,
};
