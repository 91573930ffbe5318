//! Formula error types
//!
//! These are engine faults: they abort the evaluation request. Spreadsheet
//! errors such as `#DIV/0!` are ordinary [`CellError`](sheetcalc_core::CellError)
//! values and never appear here.

use thiserror::Error;

/// Result type for formula operations
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// Errors that can occur during formula parsing, compilation or evaluation
#[derive(Debug, Error)]
pub enum FormulaError {
    /// Formula parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Array shapes that cannot be broadcast together
    #[error("Broadcast error: cannot combine {left_rows}x{left_cols} with {right_rows}x{right_cols}")]
    Broadcast {
        left_rows: usize,
        left_cols: usize,
        right_rows: usize,
        right_cols: usize,
    },

    /// A required graph input was not supplied
    #[error("Missing input: {0}")]
    MissingInput(String),

    /// Node key already present in the graph
    #[error("Duplicate node: {0}")]
    DuplicateNode(String),

    /// Node key or id not present in the graph
    #[error("Unknown node: {0}")]
    UnknownNode(String),

    /// Wrong number of arguments
    #[error("Wrong number of arguments for {function}: expected {expected}, got {actual}")]
    ArgumentCount {
        function: String,
        expected: String,
        actual: usize,
    },

    /// Reference to invalid cell
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    /// Formula evaluation error
    #[error("Evaluation error: {0}")]
    Evaluation(String),
}

impl From<sheetcalc_core::Error> for FormulaError {
    fn from(e: sheetcalc_core::Error) -> Self {
        FormulaError::InvalidReference(e.to_string())
    }
}
