//! Date/time functions
//!
//! Dates are Excel serial numbers in the 1900 date system, which keeps the
//! historical "1900 leap year" bug: the non-existent 1900-02-29 is serial 60.

use super::{cell_result, elementwise, CallContext};
use crate::error::FormulaResult;
use crate::value::{to_number, Value};
use chrono::{Datelike, Local, NaiveDate, Timelike};
use sheetcalc_core::{CellError, CellValue};

fn is_leap_gregorian(year: i32) -> bool {
    (year % 4 == 0) && ((year % 100 != 0) || (year % 400 == 0))
}

fn days_in_year_excel1900(year: i32) -> i64 {
    if year == 1900 || is_leap_gregorian(year) {
        366
    } else {
        365
    }
}

fn days_in_month_excel1900(year: i32, month: u32) -> i64 {
    match month {
        2 if year == 1900 || is_leap_gregorian(year) => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

/// Serial of the first day of a month, 1900-01-01 being 1
fn excel1900_serial_month_start(year: i32, month: u32) -> i64 {
    let days: i64 = (1900..year).map(days_in_year_excel1900).sum::<i64>()
        + (1..month).map(|m| days_in_month_excel1900(year, m)).sum::<i64>();
    1 + days
}

/// Serial of a date; `day` may run past the end of the month
pub fn excel1900_serial_from_ymd(year: i32, month: u32, day: i64) -> i64 {
    excel1900_serial_month_start(year, month) + day - 1
}

/// Calendar date of a serial, `None` before 1900-01-01
pub fn excel1900_date_from_serial(serial: i64) -> Option<(i32, u32, u32)> {
    if serial == 60 {
        return Some((1900, 2, 29));
    }
    if serial < 1 {
        return None;
    }
    let base = NaiveDate::from_ymd_opt(1899, 12, 31)?;
    let adjusted = if serial > 60 { serial - 1 } else { serial };
    let date = base.checked_add_signed(chrono::Duration::days(adjusted))?;
    Some((date.year(), date.month(), date.day()))
}

fn today_serial() -> (i64, f64) {
    let now = Local::now();
    let serial = excel1900_serial_from_ymd(now.year(), now.month(), now.day() as i64);
    let seconds = now.num_seconds_from_midnight() as f64 + now.nanosecond() as f64 / 1e9;
    (serial, seconds / 86_400.0)
}

/// DATE(year, month, day)
///
/// Years 0..1899 are offset by 1900; months and days outside their range
/// roll over into the neighbouring years and months.
pub fn fn_date(args: &[Value], _ctx: &CallContext) -> FormulaResult<Value> {
    elementwise(args, |v| {
        cell_result((|| -> Result<CellValue, CellError> {
            let mut year = to_number(v[0])?.trunc() as i64;
            let month = to_number(v[1])?.trunc() as i64;
            let day = to_number(v[2])?.trunc() as i64;

            if (0..1900).contains(&year) {
                year += 1900;
            }
            if !(0..=9999).contains(&year) {
                return Err(CellError::Num);
            }

            let total_months = year * 12 + (month - 1);
            let norm_year = total_months.div_euclid(12) as i32;
            let norm_month = total_months.rem_euclid(12) as u32 + 1;
            if !(1900..=9999).contains(&norm_year) {
                return Err(CellError::Num);
            }

            let serial = excel1900_serial_from_ymd(norm_year, norm_month, day);
            if !(0..=2_958_465).contains(&serial) {
                return Err(CellError::Num);
            }
            Ok(CellValue::Number(serial as f64))
        })())
    })
}

/// NOW() - Current date and time as a serial number
pub fn fn_now(_args: &[Value], _ctx: &CallContext) -> FormulaResult<Value> {
    let (serial, fraction) = today_serial();
    Ok(Value::scalar(serial as f64 + fraction))
}

/// TODAY() - Current date as a serial number
pub fn fn_today(_args: &[Value], _ctx: &CallContext) -> FormulaResult<Value> {
    let (serial, _) = today_serial();
    Ok(Value::scalar(serial as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn date(y: f64, m: f64, d: f64) -> Value {
        fn_date(
            &[Value::scalar(y), Value::scalar(m), Value::scalar(d)],
            &CallContext::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_serials_around_leap_bug() {
        assert_eq!(date(1900.0, 1.0, 1.0), Value::scalar(1.0));
        assert_eq!(date(1900.0, 2.0, 28.0), Value::scalar(59.0));
        assert_eq!(date(1900.0, 2.0, 29.0), Value::scalar(60.0));
        assert_eq!(date(1900.0, 3.0, 1.0), Value::scalar(61.0));
        assert_eq!(date(2024.0, 1.0, 15.0), Value::scalar(45306.0));
    }

    #[test]
    fn test_date_rollover() {
        assert_eq!(date(2023.0, 13.0, 1.0), date(2024.0, 1.0, 1.0));
        assert_eq!(date(2024.0, 3.0, 0.0), date(2024.0, 2.0, 29.0));
        assert_eq!(date(124.0, 1.0, 15.0), Value::scalar(45306.0));
        assert_eq!(date(10000.0, 1.0, 1.0), Value::error(CellError::Num));
    }

    #[test]
    fn test_serial_to_date() {
        assert_eq!(excel1900_date_from_serial(60), Some((1900, 2, 29)));
        assert_eq!(excel1900_date_from_serial(61), Some((1900, 3, 1)));
        assert_eq!(excel1900_date_from_serial(45306), Some((2024, 1, 15)));
        assert_eq!(excel1900_date_from_serial(0), None);
    }

    #[test]
    fn test_now_has_time_of_day() {
        let ctx = CallContext::default();
        let today = fn_today(&[], &ctx).unwrap().to_range().scalar_value().as_number().unwrap();
        let now = fn_now(&[], &ctx).unwrap().to_range().scalar_value().as_number().unwrap();
        assert!(now >= today);
        assert_eq!(today.fract(), 0.0);
    }
}
