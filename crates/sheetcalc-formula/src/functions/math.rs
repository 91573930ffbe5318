//! Math functions

use super::{cell_result, elementwise, numbers, scalar_result, visit, CallContext, Origin};
use crate::error::FormulaResult;
use crate::value::{number_value, scalar_binary, to_number, Value};
use crate::ast::BinaryOperator;
use sheetcalc_core::{CellError, CellValue};

/// SUM function
pub fn fn_sum(args: &[Value], _ctx: &CallContext) -> FormulaResult<Value> {
    scalar_result(numbers(args).map(|ns| number_value(ns.iter().sum())))
}

/// AVERAGE function
pub fn fn_average(args: &[Value], _ctx: &CallContext) -> FormulaResult<Value> {
    scalar_result(numbers(args).and_then(|ns| {
        if ns.is_empty() {
            Err(CellError::Div0)
        } else {
            Ok(number_value(ns.iter().sum::<f64>() / ns.len() as f64))
        }
    }))
}

/// MIN function (0 when there are no numbers)
pub fn fn_min(args: &[Value], _ctx: &CallContext) -> FormulaResult<Value> {
    scalar_result(numbers(args).map(|ns| {
        CellValue::Number(ns.into_iter().reduce(f64::min).unwrap_or(0.0))
    }))
}

/// MAX function (0 when there are no numbers)
pub fn fn_max(args: &[Value], _ctx: &CallContext) -> FormulaResult<Value> {
    scalar_result(numbers(args).map(|ns| {
        CellValue::Number(ns.into_iter().reduce(f64::max).unwrap_or(0.0))
    }))
}

/// PRODUCT function
pub fn fn_product(args: &[Value], _ctx: &CallContext) -> FormulaResult<Value> {
    scalar_result(numbers(args).map(|ns| {
        if ns.is_empty() {
            CellValue::Number(0.0)
        } else {
            number_value(ns.iter().product())
        }
    }))
}

/// COUNT function
///
/// Counts numbers; direct arguments also count when they coerce to one.
/// Errors are skipped, never propagated.
pub fn fn_count(args: &[Value], _ctx: &CallContext) -> FormulaResult<Value> {
    let mut count = 0usize;
    let _ = visit(args, |v, origin| {
        let counted = match (v, origin) {
            (CellValue::Number(_), _) => true,
            (CellValue::Boolean(_) | CellValue::String(_), Origin::Scalar) => to_number(v).is_ok(),
            _ => false,
        };
        if counted {
            count += 1;
        }
        Ok(())
    });
    Ok(Value::scalar(count as f64))
}

/// COUNTA function
pub fn fn_counta(args: &[Value], _ctx: &CallContext) -> FormulaResult<Value> {
    let mut count = 0usize;
    let _ = visit(args, |v, _| {
        if !v.is_empty() {
            count += 1;
        }
        Ok(())
    });
    Ok(Value::scalar(count as f64))
}

/// GCD(number1, ...)
pub fn fn_gcd(args: &[Value], _ctx: &CallContext) -> FormulaResult<Value> {
    fn gcd(mut a: u64, mut b: u64) -> u64 {
        while b != 0 {
            (a, b) = (b, a % b);
        }
        a
    }

    scalar_result(numbers(args).and_then(|ns| {
        let mut acc = 0u64;
        for n in ns {
            let n = n.trunc();
            if !(0.0..9.007_199_254_740_992e15).contains(&n) {
                return Err(CellError::Num);
            }
            acc = gcd(acc, n as u64);
        }
        Ok(CellValue::Number(acc as f64))
    }))
}

/// ABS(number)
pub fn fn_abs(args: &[Value], _ctx: &CallContext) -> FormulaResult<Value> {
    unary_math(args, |n| Ok(n.abs()))
}

/// INT(number) - Rounds down to the nearest integer
pub fn fn_int(args: &[Value], _ctx: &CallContext) -> FormulaResult<Value> {
    unary_math(args, |n| Ok(n.floor()))
}

/// SQRT(number)
pub fn fn_sqrt(args: &[Value], _ctx: &CallContext) -> FormulaResult<Value> {
    unary_math(args, |n| if n < 0.0 { Err(CellError::Num) } else { Ok(n.sqrt()) })
}

/// ROUND(number, [num_digits])
///
/// Rounds half away from zero.
pub fn fn_round(args: &[Value], _ctx: &CallContext) -> FormulaResult<Value> {
    let digits = args.get(1).cloned().unwrap_or_else(|| Value::scalar(0.0));
    elementwise(&[args[0].clone(), digits], |v| {
        cell_result((|| -> Result<CellValue, CellError> {
            let n = to_number(v[0])?;
            let digits = to_number(v[1])?.trunc() as i32;
            let factor = 10f64.powi(digits);
            let rounded = if digits >= 0 {
                (n * factor).round() / factor
            } else {
                let factor = 10f64.powi(-digits);
                (n / factor).round() * factor
            };
            Ok(number_value(rounded))
        })())
    })
}

/// MOD(number, divisor) - The result has the sign of the divisor
pub fn fn_mod(args: &[Value], _ctx: &CallContext) -> FormulaResult<Value> {
    elementwise(args, |v| {
        cell_result((|| -> Result<CellValue, CellError> {
            let n = to_number(v[0])?;
            let d = to_number(v[1])?;
            if d == 0.0 {
                return Err(CellError::Div0);
            }
            Ok(number_value(n - d * (n / d).floor()))
        })())
    })
}

/// POWER(number, power)
pub fn fn_power(args: &[Value], _ctx: &CallContext) -> FormulaResult<Value> {
    elementwise(args, |v| scalar_binary(BinaryOperator::Power, v[0], v[1]))
}

/// PI()
pub fn fn_pi(_args: &[Value], _ctx: &CallContext) -> FormulaResult<Value> {
    Ok(Value::scalar(std::f64::consts::PI))
}

/// RAND() - Returns a random number between 0 and 1
pub fn fn_rand(_args: &[Value], _ctx: &CallContext) -> FormulaResult<Value> {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    Ok(Value::scalar(rng.gen::<f64>()))
}

/// RANDBETWEEN(bottom, top) - Returns a random integer between bottom and top (inclusive)
pub fn fn_randbetween(args: &[Value], _ctx: &CallContext) -> FormulaResult<Value> {
    use rand::Rng;

    scalar_result((|| -> Result<CellValue, CellError> {
        let bottom = to_number(args[0].to_range().scalar_value())?.ceil() as i64;
        let top = to_number(args[1].to_range().scalar_value())?.floor() as i64;
        if bottom > top {
            return Err(CellError::Num);
        }
        let mut rng = rand::thread_rng();
        Ok(CellValue::Number(rng.gen_range(bottom..=top) as f64))
    })())
}

fn unary_math<F>(args: &[Value], f: F) -> FormulaResult<Value>
where
    F: Fn(f64) -> Result<f64, CellError>,
{
    elementwise(&args[..1], |v| {
        cell_result(to_number(v[0]).and_then(&f).map(number_value))
    })
}
