//! Runtime values
//!
//! Every node of the graph evaluates to a [`Value`]: either a plain grid of
//! scalars ([`Range`]) or one or more referenced areas ([`Area`]). A 1x1
//! range doubles as a scalar.

use crate::ast::{BinaryOperator, UnaryOperator};
use crate::error::{FormulaError, FormulaResult};
use serde::{Deserialize, Serialize};
use sheetcalc_core::{format_number, CellError, CellValue, Reference};
use std::cmp::Ordering;

static EMPTY: CellValue = CellValue::Empty;
static NOT_AVAILABLE: CellValue = CellValue::Error(CellError::Na);

/// A 2-D grid of scalar values in row-major order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Range {
    rows: usize,
    cols: usize,
    cells: Vec<CellValue>,
}

impl Range {
    /// Create a range from row-major cells
    pub fn new(rows: usize, cols: usize, cells: Vec<CellValue>) -> FormulaResult<Self> {
        if rows == 0 || cols == 0 || cells.len() != rows * cols {
            return Err(FormulaError::Evaluation(format!(
                "{} values do not fill a {}x{} range",
                cells.len(),
                rows,
                cols
            )));
        }
        Ok(Self { rows, cols, cells })
    }

    /// Create a 1x1 range
    pub fn scalar(value: impl Into<CellValue>) -> Self {
        Self {
            rows: 1,
            cols: 1,
            cells: vec![value.into()],
        }
    }

    /// Create a range with every position set to `value`
    pub fn filled(rows: usize, cols: usize, value: CellValue) -> Self {
        let rows = rows.max(1);
        let cols = cols.max(1);
        Self {
            rows,
            cols,
            cells: vec![value; rows * cols],
        }
    }

    /// Create a range from rows of equal length
    pub fn from_rows(rows: Vec<Vec<CellValue>>) -> FormulaResult<Self> {
        let height = rows.len();
        let width = rows.first().map_or(0, |r| r.len());
        if rows.iter().any(|r| r.len() != width) {
            return Err(FormulaError::Evaluation("ragged rows".into()));
        }
        Self::new(height, width, rows.into_iter().flatten().collect())
    }

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// `(rows, cols)`
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Check if this is a 1x1 range
    pub fn is_scalar(&self) -> bool {
        self.rows == 1 && self.cols == 1
    }

    /// Value at a position, if inside the grid
    pub fn get(&self, row: usize, col: usize) -> Option<&CellValue> {
        if row < self.rows && col < self.cols {
            self.cells.get(row * self.cols + col)
        } else {
            None
        }
    }

    /// Value at a position of a broadcast result
    ///
    /// A dimension of length 1 repeats its only element; positions past a
    /// longer dimension are `#N/A`.
    pub fn at(&self, row: usize, col: usize) -> &CellValue {
        let row = if self.rows == 1 { 0 } else { row };
        let col = if self.cols == 1 { 0 } else { col };
        self.get(row, col).unwrap_or(&NOT_AVAILABLE)
    }

    /// Top-left value
    pub fn scalar_value(&self) -> &CellValue {
        &self.cells[0]
    }

    /// Iterate values row by row
    pub fn iter(&self) -> std::slice::Iter<'_, CellValue> {
        self.cells.iter()
    }

    /// Rows as nested vectors
    pub fn to_rows(&self) -> Vec<Vec<CellValue>> {
        self.cells.chunks(self.cols).map(|r| r.to_vec()).collect()
    }

    /// Apply `f` to every value
    pub fn map(&self, f: impl FnMut(&CellValue) -> CellValue) -> Range {
        Range {
            rows: self.rows,
            cols: self.cols,
            cells: self.cells.iter().map(f).collect(),
        }
    }

    /// First error in row-major order
    pub fn first_error(&self) -> Option<CellError> {
        self.cells.iter().find_map(|v| v.error())
    }

    /// Fit the range onto a `rows x cols` target
    ///
    /// A 1-length dimension stretches, positions past a longer dimension
    /// are `#N/A` and a larger range is truncated.
    pub fn project(&self, rows: usize, cols: usize) -> Range {
        if self.shape() == (rows, cols) {
            return self.clone();
        }
        let mut cells = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                cells.push(self.at(r, c).clone());
            }
        }
        Range {
            rows: rows.max(1),
            cols: cols.max(1),
            cells,
        }
    }

    /// Replace `Empty` with `0`, the value a formula cell shows for an
    /// empty result
    pub fn fill_empty(mut self) -> Range {
        for cell in &mut self.cells {
            if cell.is_empty() {
                *cell = CellValue::Number(0.0);
            }
        }
        self
    }

    /// Overwrite the block starting at `(row, col)` with `other`, clipped
    /// to this range; the offset may be negative
    pub fn paste(&mut self, row: i64, col: i64, other: &Range) {
        for r in 0..other.rows {
            for c in 0..other.cols {
                let (tr, tc) = (row + r as i64, col + c as i64);
                if (0..self.rows as i64).contains(&tr) && (0..self.cols as i64).contains(&tc) {
                    let target = tr as usize * self.cols + tc as usize;
                    self.cells[target] = other.cells[r * other.cols + c].clone();
                }
            }
        }
    }

    /// The `rows x cols` block starting at `(row, col)`, `Empty` where it
    /// leaves the grid
    pub fn slice(&self, row: usize, col: usize, rows: usize, cols: usize) -> Range {
        let mut cells = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                cells.push(self.get(row + r, col + c).unwrap_or(&EMPTY).clone());
            }
        }
        Range {
            rows: rows.max(1),
            cols: cols.max(1),
            cells,
        }
    }
}

impl Default for Range {
    fn default() -> Self {
        Range::scalar(CellValue::Empty)
    }
}

impl From<CellValue> for Range {
    fn from(value: CellValue) -> Self {
        Range::scalar(value)
    }
}

impl From<f64> for Range {
    fn from(n: f64) -> Self {
        Range::scalar(n)
    }
}

impl From<bool> for Range {
    fn from(b: bool) -> Self {
        Range::scalar(b)
    }
}

impl From<&str> for Range {
    fn from(s: &str) -> Self {
        Range::scalar(s)
    }
}

impl From<CellError> for Range {
    fn from(e: CellError) -> Self {
        Range::scalar(e)
    }
}

/// Shared shape of several ranges combined element-wise
///
/// Each dimension must be equal across arguments or 1.
pub fn broadcast_shape<I>(shapes: I) -> FormulaResult<(usize, usize)>
where
    I: IntoIterator<Item = (usize, usize)>,
{
    let mut acc = (1, 1);
    for shape in shapes {
        let rows = combine_dim(acc.0, shape.0);
        let cols = combine_dim(acc.1, shape.1);
        match (rows, cols) {
            (Some(rows), Some(cols)) => acc = (rows, cols),
            _ => {
                return Err(FormulaError::Broadcast {
                    left_rows: acc.0,
                    left_cols: acc.1,
                    right_rows: shape.0,
                    right_cols: shape.1,
                })
            }
        }
    }
    Ok(acc)
}

fn combine_dim(a: usize, b: usize) -> Option<usize> {
    if a == b || b == 1 {
        Some(a)
    } else if a == 1 {
        Some(b)
    } else {
        None
    }
}

/// Combine ranges position by position under the broadcast rule
pub fn broadcast_map<F>(args: &[&Range], mut f: F) -> FormulaResult<Range>
where
    F: FnMut(&[&CellValue]) -> CellValue,
{
    let (rows, cols) = broadcast_shape(args.iter().map(|a| a.shape()))?;
    let mut cells = Vec::with_capacity(rows * cols);
    let mut scratch: Vec<&CellValue> = Vec::with_capacity(args.len());
    for r in 0..rows {
        for c in 0..cols {
            scratch.clear();
            scratch.extend(args.iter().map(|a| a.at(r, c)));
            cells.push(f(&scratch));
        }
    }
    Range::new(rows, cols, cells)
}

/// A referenced rectangle together with the values it covers
///
/// `values` starts at the reference's top-left cell. It may be smaller than
/// the reference (whole columns are clipped to the used rows); positions
/// outside it read as `Empty`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Area {
    pub reference: Reference,
    pub values: Range,
}

impl Area {
    pub fn new(reference: Reference, values: Range) -> Self {
        Self { reference, values }
    }

    /// Value at a position relative to the top-left cell
    pub fn get(&self, row: usize, col: usize) -> &CellValue {
        self.values.get(row, col).unwrap_or(&EMPTY)
    }

    /// Rows covered by the reference
    pub fn rows(&self) -> usize {
        self.reference.rows()
    }

    /// Columns covered by the reference
    pub fn cols(&self) -> usize {
        self.reference.cols()
    }

    /// The part of this area covered by `reference`
    pub fn sub_area(&self, reference: Reference) -> Area {
        let row = (reference.range.start.row - self.reference.range.start.row) as usize;
        let col = (reference.range.start.col - self.reference.range.start.col) as usize;
        let rows = reference.rows().min(self.values.rows().saturating_sub(row).max(1));
        let cols = reference.cols().min(self.values.cols().saturating_sub(col).max(1));
        let values = self.values.slice(row, col, rows, cols);
        Area { reference, values }
    }
}

/// The value of a graph node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Plain values (constants, operator and function results)
    Range(Range),
    /// One or more referenced areas, in union order
    Areas(Vec<Area>),
}

impl Value {
    /// Create a scalar value
    pub fn scalar(value: impl Into<CellValue>) -> Self {
        Value::Range(Range::scalar(value))
    }

    /// Create an error value
    pub fn error(e: CellError) -> Self {
        Value::scalar(e)
    }

    /// Referenced areas, if this is a reference
    pub fn areas(&self) -> Option<&[Area]> {
        match self {
            Value::Areas(areas) => Some(areas),
            Value::Range(_) => None,
        }
    }

    /// The values as a grid; a multi-area reference is `#VALUE!`
    pub fn to_range(&self) -> Range {
        match self {
            Value::Range(range) => range.clone(),
            Value::Areas(areas) if areas.len() == 1 => areas[0].values.clone(),
            Value::Areas(_) => Range::scalar(CellError::Value),
        }
    }

    /// Owned version of [`Value::to_range`]
    pub fn into_range(self) -> Range {
        match self {
            Value::Range(range) => range,
            Value::Areas(mut areas) if areas.len() == 1 => areas.remove(0).values,
            Value::Areas(_) => Range::scalar(CellError::Value),
        }
    }

    /// Check if the value is a 1x1 plain range
    pub fn is_scalar(&self) -> bool {
        matches!(self, Value::Range(r) if r.is_scalar())
    }
}

impl From<Range> for Value {
    fn from(range: Range) -> Self {
        Value::Range(range)
    }
}

impl From<CellValue> for Value {
    fn from(value: CellValue) -> Self {
        Value::scalar(value)
    }
}

// === Coercions ===

/// Coerce a scalar for arithmetic
///
/// `Empty` is 0, booleans are 1/0 and numeric text is parsed.
pub fn to_number(value: &CellValue) -> Result<f64, CellError> {
    match value {
        CellValue::Empty => Ok(0.0),
        CellValue::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
        CellValue::Number(n) => Ok(*n),
        CellValue::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Err(CellError::Value);
            }
            trimmed
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .ok_or(CellError::Value)
        }
        CellValue::Error(e) => Err(*e),
    }
}

/// Coerce a scalar for text operations
pub fn to_text(value: &CellValue) -> Result<String, CellError> {
    match value {
        CellValue::Empty => Ok(String::new()),
        CellValue::Boolean(true) => Ok("TRUE".into()),
        CellValue::Boolean(false) => Ok("FALSE".into()),
        CellValue::Number(n) => Ok(format_number(*n)),
        CellValue::String(s) => Ok(s.clone()),
        CellValue::Error(e) => Err(*e),
    }
}

/// Coerce a scalar to a condition
pub fn to_bool(value: &CellValue) -> Result<bool, CellError> {
    match value {
        CellValue::Empty => Ok(false),
        CellValue::Boolean(b) => Ok(*b),
        CellValue::Number(n) => Ok(*n != 0.0),
        CellValue::String(s) if s.eq_ignore_ascii_case("TRUE") => Ok(true),
        CellValue::String(s) if s.eq_ignore_ascii_case("FALSE") => Ok(false),
        CellValue::String(_) => Err(CellError::Value),
        CellValue::Error(e) => Err(*e),
    }
}

/// Turn a computed number into a value, mapping NaN and infinities to `#NUM!`
pub fn number_value(n: f64) -> CellValue {
    if n.is_finite() {
        CellValue::Number(n)
    } else {
        CellValue::Error(CellError::Num)
    }
}

/// Compare two non-error scalars the way Excel does
///
/// Numbers sort before text, text before booleans. Text compares
/// case-insensitively. `Empty` takes the zero value of the other side.
pub fn compare(left: &CellValue, right: &CellValue) -> Ordering {
    fn rank(v: &CellValue) -> u8 {
        match v {
            CellValue::Number(_) => 0,
            CellValue::String(_) => 1,
            CellValue::Boolean(_) => 2,
            _ => 3,
        }
    }

    let zero_like = |other: &CellValue| match other {
        CellValue::String(_) => CellValue::String(String::new()),
        CellValue::Boolean(_) => CellValue::Boolean(false),
        _ => CellValue::Number(0.0),
    };
    let left_owned;
    let right_owned;
    let (left, right) = match (left, right) {
        (CellValue::Empty, CellValue::Empty) => return Ordering::Equal,
        (CellValue::Empty, r) => {
            left_owned = zero_like(r);
            (&left_owned, r)
        }
        (l, CellValue::Empty) => {
            right_owned = zero_like(l);
            (l, &right_owned)
        }
        pair => pair,
    };

    match (left, right) {
        (CellValue::Number(l), CellValue::Number(r)) => l.partial_cmp(r).unwrap_or(Ordering::Equal),
        (CellValue::String(l), CellValue::String(r)) => l.to_lowercase().cmp(&r.to_lowercase()),
        (CellValue::Boolean(l), CellValue::Boolean(r)) => l.cmp(r),
        (l, r) => rank(l).cmp(&rank(r)),
    }
}

/// Apply a value operator to two scalars
pub fn scalar_binary(op: BinaryOperator, left: &CellValue, right: &CellValue) -> CellValue {
    // Propagate errors, left operand first
    if let CellValue::Error(e) = left {
        return CellValue::Error(*e);
    }
    if let CellValue::Error(e) = right {
        return CellValue::Error(*e);
    }

    match op {
        BinaryOperator::Add
        | BinaryOperator::Subtract
        | BinaryOperator::Multiply
        | BinaryOperator::Divide
        | BinaryOperator::Power => {
            let (l, r) = match (to_number(left), to_number(right)) {
                (Ok(l), Ok(r)) => (l, r),
                (Err(e), _) | (_, Err(e)) => return CellValue::Error(e),
            };
            match op {
                BinaryOperator::Add => number_value(l + r),
                BinaryOperator::Subtract => number_value(l - r),
                BinaryOperator::Multiply => number_value(l * r),
                BinaryOperator::Divide if r == 0.0 => CellValue::Error(CellError::Div0),
                BinaryOperator::Divide => number_value(l / r),
                _ if l == 0.0 && r == 0.0 => CellValue::Error(CellError::Num),
                _ if l == 0.0 && r < 0.0 => CellValue::Error(CellError::Div0),
                _ => number_value(l.powf(r)),
            }
        }
        BinaryOperator::Concat => match (to_text(left), to_text(right)) {
            (Ok(l), Ok(r)) => CellValue::String(l + &r),
            (Err(e), _) | (_, Err(e)) => CellValue::Error(e),
        },
        BinaryOperator::Equal => CellValue::Boolean(compare(left, right) == Ordering::Equal),
        BinaryOperator::NotEqual => CellValue::Boolean(compare(left, right) != Ordering::Equal),
        BinaryOperator::LessThan => CellValue::Boolean(compare(left, right) == Ordering::Less),
        BinaryOperator::LessEqual => CellValue::Boolean(compare(left, right) != Ordering::Greater),
        BinaryOperator::GreaterThan => {
            CellValue::Boolean(compare(left, right) == Ordering::Greater)
        }
        BinaryOperator::GreaterEqual => CellValue::Boolean(compare(left, right) != Ordering::Less),
        BinaryOperator::Range | BinaryOperator::Union | BinaryOperator::Intersect => {
            CellValue::Error(CellError::Value)
        }
    }
}

/// Apply a unary operator to a scalar
pub fn scalar_unary(op: UnaryOperator, operand: &CellValue) -> CellValue {
    match to_number(operand) {
        Ok(n) => match op {
            UnaryOperator::Negate => number_value(-n),
            UnaryOperator::Percent => number_value(n / 100.0),
        },
        Err(e) => CellValue::Error(e),
    }
}

/// Evaluate a binary operator over two node values
///
/// Value operators broadcast element-wise; an incompatible shape pair is a
/// [`FormulaError::Broadcast`] fault.
pub fn binary_op(op: BinaryOperator, left: &Value, right: &Value) -> FormulaResult<Value> {
    match op {
        BinaryOperator::Union => Ok(union(&[left, right])),
        BinaryOperator::Intersect => Ok(intersect(left, right)),
        // Static ranges are merged while parsing; a range between computed
        // references has no cell data behind it
        BinaryOperator::Range => Ok(Value::error(CellError::Ref)),
        _ => {
            let l = left.to_range();
            let r = right.to_range();
            let result = broadcast_map(&[&l, &r], |v| scalar_binary(op, v[0], v[1]))?;
            Ok(Value::Range(result))
        }
    }
}

/// Evaluate a unary operator over a node value
pub fn unary_op(op: UnaryOperator, operand: &Value) -> Value {
    Value::Range(operand.to_range().map(|v| scalar_unary(op, v)))
}

/// Concatenate the areas of several references, keeping duplicates
pub fn union(values: &[&Value]) -> Value {
    let mut areas = Vec::new();
    for value in values {
        match value {
            Value::Areas(a) => areas.extend(a.iter().cloned()),
            Value::Range(r) => {
                return Value::error(r.first_error().unwrap_or(CellError::Value));
            }
        }
    }
    Value::Areas(areas)
}

/// Pairwise intersection of the areas of two references
///
/// No shared cell at all is `#NULL!`.
pub fn intersect(left: &Value, right: &Value) -> Value {
    let (Value::Areas(l), Value::Areas(r)) = (left, right) else {
        let err = [left, right]
            .iter()
            .find_map(|v| match v {
                Value::Range(r) => r.first_error(),
                Value::Areas(_) => None,
            })
            .unwrap_or(CellError::Value);
        return Value::error(err);
    };

    let mut areas = Vec::new();
    for a in l {
        for b in r {
            if let Some(shared) = a.reference.intersect(&b.reference) {
                areas.push(a.sub_area(shared));
            }
        }
    }
    if areas.is_empty() {
        Value::error(CellError::Null)
    } else {
        Value::Areas(areas)
    }
}
