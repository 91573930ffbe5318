//! Text functions

use super::{cell_result, elementwise, scalar_result, visit, CallContext};
use crate::error::FormulaResult;
use crate::value::{to_text, Value};
use sheetcalc_core::{CellError, CellValue};

/// CONCAT(text1, ...) - Joins every value of every argument, ranges included
pub fn fn_concat(args: &[Value], _ctx: &CallContext) -> FormulaResult<Value> {
    let mut out = String::new();
    let result = visit(args, |v, _| {
        out.push_str(&to_text(v)?);
        Ok(())
    });
    scalar_result(result.map(|_| CellValue::String(out)))
}

/// CONCATENATE(text1, ...) - Joins its arguments position by position
pub fn fn_concatenate(args: &[Value], _ctx: &CallContext) -> FormulaResult<Value> {
    elementwise(args, |v| {
        let joined = v.iter().try_fold(String::new(), |mut acc, value| {
            acc.push_str(&to_text(value)?);
            Ok::<_, CellError>(acc)
        });
        cell_result(joined.map(CellValue::String))
    })
}

/// LEN(text) - Number of characters
pub fn fn_len(args: &[Value], _ctx: &CallContext) -> FormulaResult<Value> {
    elementwise(args, |v| {
        cell_result(to_text(v[0]).map(|s| CellValue::Number(s.chars().count() as f64)))
    })
}

/// UPPER(text)
pub fn fn_upper(args: &[Value], _ctx: &CallContext) -> FormulaResult<Value> {
    elementwise(args, |v| cell_result(to_text(v[0]).map(|s| s.to_uppercase().into())))
}

/// LOWER(text)
pub fn fn_lower(args: &[Value], _ctx: &CallContext) -> FormulaResult<Value> {
    elementwise(args, |v| cell_result(to_text(v[0]).map(|s| s.to_lowercase().into())))
}
