//! Information functions

use super::{elementwise, CallContext};
use crate::error::FormulaResult;
use crate::value::Value;
use sheetcalc_core::{CellError, CellValue};

/// ISERROR(value)
pub fn fn_iserror(args: &[Value], _ctx: &CallContext) -> FormulaResult<Value> {
    elementwise(args, |v| CellValue::Boolean(v[0].is_error()))
}

/// ISNUMBER(value) - Numeric text is not a number
pub fn fn_isnumber(args: &[Value], _ctx: &CallContext) -> FormulaResult<Value> {
    elementwise(args, |v| CellValue::Boolean(matches!(v[0], CellValue::Number(_))))
}

/// ISBLANK(value)
pub fn fn_isblank(args: &[Value], _ctx: &CallContext) -> FormulaResult<Value> {
    elementwise(args, |v| CellValue::Boolean(v[0].is_empty()))
}

/// NA()
pub fn fn_na(_args: &[Value], _ctx: &CallContext) -> FormulaResult<Value> {
    Ok(Value::error(CellError::Na))
}
