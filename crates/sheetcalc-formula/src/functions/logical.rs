//! Logical functions

use super::{elementwise, visit, CallContext, Origin};
use crate::error::FormulaResult;
use crate::value::{to_bool, Value};
use sheetcalc_core::{CellError, CellValue};

/// IF(condition, value_if_true, [value_if_false])
///
/// Works position by position: the three arguments broadcast to a common
/// shape. A missing `value_if_false` is FALSE.
pub fn fn_if(args: &[Value], _ctx: &CallContext) -> FormulaResult<Value> {
    let mut args = args.to_vec();
    if args.len() == 2 {
        args.push(Value::scalar(false));
    }
    elementwise(&args, |v| match to_bool(v[0]) {
        Ok(true) => v[1].clone(),
        Ok(false) => v[2].clone(),
        Err(e) => CellValue::Error(e),
    })
}

/// IFS(condition1, value1, ...)
///
/// Returns the value paired with the first true condition, `#N/A` when none
/// holds.
pub fn fn_ifs(args: &[Value], _ctx: &CallContext) -> FormulaResult<Value> {
    if args.len() % 2 != 0 {
        return Ok(Value::error(CellError::Value));
    }
    elementwise(args, |v| {
        for pair in v.chunks(2) {
            match to_bool(pair[0]) {
                Ok(true) => return pair[1].clone(),
                Ok(false) => {}
                Err(e) => return CellValue::Error(e),
            }
        }
        CellValue::Error(CellError::Na)
    })
}

/// IFERROR(value, value_if_error)
pub fn fn_iferror(args: &[Value], _ctx: &CallContext) -> FormulaResult<Value> {
    elementwise(args, |v| {
        if v[0].is_error() {
            v[1].clone()
        } else {
            v[0].clone()
        }
    })
}

/// IFNA(value, value_if_na)
pub fn fn_ifna(args: &[Value], _ctx: &CallContext) -> FormulaResult<Value> {
    elementwise(args, |v| match v[0] {
        CellValue::Error(CellError::Na) => v[1].clone(),
        other => other.clone(),
    })
}

/// Collect the logical values of AND/OR/XOR arguments
///
/// Text inside references and arrays is skipped; direct text must read as
/// TRUE or FALSE. No logical value at all is `#VALUE!`.
fn logicals(args: &[Value]) -> Result<Vec<bool>, CellError> {
    let mut out = Vec::new();
    visit(args, |v, origin| {
        match (v, origin) {
            (CellValue::Error(e), _) => return Err(*e),
            (CellValue::Boolean(b), _) => out.push(*b),
            (CellValue::Number(n), _) => out.push(*n != 0.0),
            (_, Origin::Scalar) => out.push(to_bool(v)?),
            (_, Origin::Collection) => {}
        }
        Ok(())
    })?;
    if out.is_empty() {
        Err(CellError::Value)
    } else {
        Ok(out)
    }
}

fn logical_result(result: Result<bool, CellError>) -> FormulaResult<Value> {
    Ok(match result {
        Ok(b) => Value::scalar(b),
        Err(e) => Value::error(e),
    })
}

/// AND function
pub fn fn_and(args: &[Value], _ctx: &CallContext) -> FormulaResult<Value> {
    logical_result(logicals(args).map(|bs| bs.iter().all(|b| *b)))
}

/// OR function
pub fn fn_or(args: &[Value], _ctx: &CallContext) -> FormulaResult<Value> {
    logical_result(logicals(args).map(|bs| bs.iter().any(|b| *b)))
}

/// XOR function - TRUE when an odd number of arguments are TRUE
pub fn fn_xor(args: &[Value], _ctx: &CallContext) -> FormulaResult<Value> {
    logical_result(logicals(args).map(|bs| bs.iter().filter(|b| **b).count() % 2 == 1))
}

/// NOT function
pub fn fn_not(args: &[Value], _ctx: &CallContext) -> FormulaResult<Value> {
    elementwise(args, |v| match to_bool(v[0]) {
        Ok(b) => CellValue::Boolean(!b),
        Err(e) => CellValue::Error(e),
    })
}

/// TRUE function
pub fn fn_true(_args: &[Value], _ctx: &CallContext) -> FormulaResult<Value> {
    Ok(Value::scalar(true))
}

/// FALSE function
pub fn fn_false(_args: &[Value], _ctx: &CallContext) -> FormulaResult<Value> {
    Ok(Value::scalar(false))
}
