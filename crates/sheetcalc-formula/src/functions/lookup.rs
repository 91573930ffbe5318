//! Reference functions
//!
//! These look at the referenced areas rather than (only) at the values.

use super::{scalar_arg, CallContext};
use crate::error::FormulaResult;
use crate::value::{to_number, Area, Range, Value};
use sheetcalc_core::{CellError, CellRange, CellValue};

/// The single area of a reference argument
fn single_area(value: &Value) -> Result<&Area, CellError> {
    match value {
        Value::Areas(areas) if areas.len() == 1 => Ok(&areas[0]),
        Value::Areas(_) => Err(CellError::Ref),
        Value::Range(r) => Err(r.first_error().unwrap_or(CellError::Value)),
    }
}

fn index_arg(args: &[Value], index: usize) -> Result<Option<i64>, CellError> {
    match scalar_arg(args, index) {
        None => Ok(None),
        Some(v) => Ok(Some(to_number(&v)?.trunc() as i64)),
    }
}

fn errorable(result: Result<Value, CellError>) -> FormulaResult<Value> {
    Ok(result.unwrap_or_else(Value::error))
}

/// ROW([reference])
///
/// Without an argument, the row of the calling cell. With a reference, a
/// column vector of the rows it covers.
pub fn fn_row(args: &[Value], ctx: &CallContext) -> FormulaResult<Value> {
    errorable((|| -> Result<Value, CellError> {
        let Some(arg) = args.first() else {
            let cell = ctx.cell.as_ref().ok_or(CellError::Value)?;
            return Ok(Value::scalar((cell.range.start.row + 1) as f64));
        };
        let area = single_area(arg)?;
        let first = area.reference.range.start.row as usize + 1;
        let cells = (0..area.rows()).map(|i| CellValue::Number((first + i) as f64)).collect();
        Range::new(area.rows(), 1, cells)
            .map(Value::Range)
            .map_err(|_| CellError::Value)
    })())
}

/// COLUMN([reference])
pub fn fn_column(args: &[Value], ctx: &CallContext) -> FormulaResult<Value> {
    errorable((|| -> Result<Value, CellError> {
        let Some(arg) = args.first() else {
            let cell = ctx.cell.as_ref().ok_or(CellError::Value)?;
            return Ok(Value::scalar((cell.range.start.col + 1) as f64));
        };
        let area = single_area(arg)?;
        let first = area.reference.range.start.col as usize + 1;
        let cells = (0..area.cols()).map(|i| CellValue::Number((first + i) as f64)).collect();
        Range::new(1, area.cols(), cells)
            .map(Value::Range)
            .map_err(|_| CellError::Value)
    })())
}

/// ROWS(array)
pub fn fn_rows(args: &[Value], _ctx: &CallContext) -> FormulaResult<Value> {
    errorable(match &args[0] {
        Value::Range(r) => Ok(Value::scalar(r.rows() as f64)),
        areas => single_area(areas).map(|a| Value::scalar(a.rows() as f64)),
    })
}

/// COLUMNS(array)
pub fn fn_columns(args: &[Value], _ctx: &CallContext) -> FormulaResult<Value> {
    errorable(match &args[0] {
        Value::Range(r) => Ok(Value::scalar(r.cols() as f64)),
        areas => single_area(areas).map(|a| Value::scalar(a.cols() as f64)),
    })
}

/// Zero-based `(first, count)` span selected by a one-based index, 0
/// selecting everything
fn select(index: i64, len: usize) -> Result<(usize, usize), CellError> {
    match index {
        i if i < 0 => Err(CellError::Value),
        0 => Ok((0, len)),
        i if i as usize > len => Err(CellError::Ref),
        i => Ok((i as usize - 1, 1)),
    }
}

/// INDEX(array, row_num, [column_num], [area_num])
///
/// On a one-row array a lone index picks the column. Index 0 selects a whole
/// row or column. On a reference the result is itself a reference.
pub fn fn_index(args: &[Value], _ctx: &CallContext) -> FormulaResult<Value> {
    errorable((|| -> Result<Value, CellError> {
        let row_num = index_arg(args, 1)?.unwrap_or(0);
        let col_num = index_arg(args, 2)?;
        let area_num = index_arg(args, 3)?.unwrap_or(1);

        let (rows, cols) = match &args[0] {
            Value::Range(r) if area_num == 1 => r.shape(),
            Value::Range(_) => return Err(CellError::Ref),
            Value::Areas(areas) => {
                if area_num < 1 || area_num as usize > areas.len() {
                    return Err(CellError::Ref);
                }
                let area = &areas[area_num as usize - 1];
                (area.rows(), area.cols())
            }
        };

        let (row_num, col_num) = match col_num {
            Some(col) => (row_num, col),
            None if rows == 1 => (1, row_num),
            None => (row_num, if cols == 1 { 1 } else { 0 }),
        };
        let (r0, nr) = select(row_num, rows)?;
        let (c0, nc) = select(col_num, cols)?;

        match &args[0] {
            Value::Range(r) => Ok(Value::Range(r.slice(r0, c0, nr, nc))),
            Value::Areas(areas) => {
                let area = &areas[area_num as usize - 1];
                let start = area.reference.range.start;
                let range = CellRange::from_indices(
                    start.row + r0 as u32,
                    start.col + c0 as u16,
                    start.row + (r0 + nr - 1) as u32,
                    start.col + (c0 + nc - 1) as u16,
                );
                Ok(Value::Areas(vec![area.sub_area(area.reference.with_range(range))]))
            }
        }
    })())
}

/// SINGLE(reference) - Implicit intersection with the calling cell
///
/// A single cell is returned as is. A one-column (one-row) area yields the
/// cell on the caller's row (column). Anything else is `#VALUE!`.
pub fn fn_single(args: &[Value], ctx: &CallContext) -> FormulaResult<Value> {
    errorable((|| -> Result<Value, CellError> {
        let area = match &args[0] {
            Value::Range(r) => return Ok(Value::scalar(r.scalar_value().clone())),
            other => single_area(other).map_err(|_| CellError::Value)?,
        };
        if area.rows() == 1 && area.cols() == 1 {
            return Ok(Value::Areas(vec![area.clone()]));
        }

        let cell = ctx.cell.as_ref().ok_or(CellError::Value)?;
        if cell.book != area.reference.book || cell.sheet != area.reference.sheet {
            return Err(CellError::Value);
        }
        let range = &area.reference.range;
        let at = cell.range.start;
        let target = if range.col_count() == 1 && (range.start.row..=range.end.row).contains(&at.row) {
            CellRange::from_indices(at.row, range.start.col, at.row, range.start.col)
        } else if range.row_count() == 1
            && (range.start.col..=range.end.col).contains(&at.col)
        {
            CellRange::from_indices(range.start.row, at.col, range.start.row, at.col)
        } else {
            return Err(CellError::Value);
        };
        Ok(Value::Areas(vec![area.sub_area(area.reference.with_range(target))]))
    })())
}
