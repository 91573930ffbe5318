//! Cell value types

use std::fmt;

/// A scalar value held by one cell position
///
/// `Empty` is distinct from `0`, `""` and `FALSE`: it marks an unset cell and is
/// coerced contextually by the operators that read it.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CellValue {
    /// Unset cell
    #[default]
    Empty,

    /// Boolean value (TRUE/FALSE)
    Boolean(bool),

    /// Numeric value (all numbers stored as f64, including dates)
    Number(f64),

    /// String value
    String(String),

    /// Error sentinel (#VALUE!, #REF!, etc.)
    Error(CellError),
}

impl CellValue {
    /// Create a new string value
    pub fn string<S: Into<String>>(s: S) -> Self {
        CellValue::String(s.into())
    }

    /// Check if the value is the empty marker
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Check if the value is an error sentinel
    pub fn is_error(&self) -> bool {
        matches!(self, CellValue::Error(_))
    }

    /// Get the error sentinel, if this is one
    pub fn error(&self) -> Option<CellError> {
        match self {
            CellValue::Error(e) => Some(*e),
            _ => None,
        }
    }

    /// Get the number, if this is one (no coercion)
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Get the string slice, if this is text (no coercion)
    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Short type name, used in diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            CellValue::Empty => "empty",
            CellValue::Boolean(_) => "boolean",
            CellValue::Number(_) => "number",
            CellValue::String(_) => "string",
            CellValue::Error(_) => "error",
        }
    }
}

/// Format a number the way Excel renders it in text context
///
/// Integral values drop the fraction, everything else uses the shortest
/// representation that round-trips.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Boolean(true) => write!(f, "TRUE"),
            CellValue::Boolean(false) => write!(f, "FALSE"),
            CellValue::Number(n) => write!(f, "{}", format_number(*n)),
            CellValue::String(s) => write!(f, "{}", s),
            CellValue::Error(e) => write!(f, "{}", e),
        }
    }
}

macro_rules! cell_value_from {
    ($($ty:ty => |$v:ident| $body:expr),* $(,)?) => {
        $(impl From<$ty> for CellValue {
            fn from($v: $ty) -> Self {
                $body
            }
        })*
    };
}

cell_value_from! {
    f64 => |n| CellValue::Number(n),
    i32 => |n| CellValue::Number(f64::from(n)),
    bool => |b| CellValue::Boolean(b),
    &str => |s| CellValue::String(s.to_owned()),
    String => |s| CellValue::String(s),
    CellError => |e| CellValue::Error(e),
}

/// Excel error sentinels
///
/// Errors are data: they flow through formulas like any other value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CellError {
    /// Empty intersection
    Null,
    Div0,
    /// Wrong type of argument or operand
    Value,
    /// Reference to nothing
    Ref,
    /// Unknown function
    Name,
    Num,
    /// No value available
    Na,
    /// Member of an unresolved circular reference
    Circular,
}

impl CellError {
    const LITERALS: [(CellError, &'static str); 8] = [
        (CellError::Null, "#NULL!"),
        (CellError::Div0, "#DIV/0!"),
        (CellError::Value, "#VALUE!"),
        (CellError::Ref, "#REF!"),
        (CellError::Name, "#NAME?"),
        (CellError::Num, "#NUM!"),
        (CellError::Na, "#N/A"),
        (CellError::Circular, "#CIRCULAR!"),
    ];

    /// The literal as written in a formula
    pub fn as_str(&self) -> &'static str {
        Self::LITERALS
            .iter()
            .find(|(e, _)| e == self)
            .map_or("#VALUE!", |(_, text)| text)
    }

    /// Recognize an error literal, case-insensitively
    pub fn parse(text: &str) -> Option<Self> {
        Self::LITERALS
            .iter()
            .find(|(_, literal)| literal.eq_ignore_ascii_case(text))
            .map(|(e, _)| *e)
    }
}

impl fmt::Display for CellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
