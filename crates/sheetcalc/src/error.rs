//! Error types for the model

use sheetcalc_formula::FormulaError;
use thiserror::Error;

/// Result type alias using [`ModelError`]
pub type ModelResult<T> = std::result::Result<T, ModelError>;

/// Errors raised by [`ExcelModel`](crate::ExcelModel) operations
#[derive(Debug, Error)]
pub enum ModelError {
    /// Formula engine fault
    #[error(transparent)]
    Formula(#[from] FormulaError),

    /// Malformed address or reference
    #[error(transparent)]
    Core(#[from] sheetcalc_core::Error),

    /// A cell formula failed to compile
    #[error("{cell}: {source}")]
    Cell {
        cell: String,
        #[source]
        source: FormulaError,
    },

    /// Snapshot (de)serialization failure
    #[error("Snapshot error: {0}")]
    Json(#[from] serde_json::Error),

    /// Operation needs a finished model
    #[error("Model is not finished; call finish() first")]
    NotFinished,

    /// Values are read before the first calculation
    #[error("Model has not been calculated yet")]
    NotCalculated,

    /// Books cannot be added after finishing
    #[error("Model is already finished")]
    AlreadyFinished,

    /// Book loaded twice
    #[error("Book already loaded: {0}")]
    DuplicateBook(String),

    /// Reference that names no cell, range or defined name of the model
    #[error("Unknown reference: {0}")]
    UnknownReference(String),

    /// Malformed book content
    #[error("Invalid book: {0}")]
    InvalidBook(String),
}
