//! Built-in Excel functions
//!
//! Functions receive their evaluated arguments as [`Value`]s, so reference
//! functions (ROW, INDEX, SINGLE...) can inspect the referenced areas while
//! value functions coerce through the helpers below.

pub mod date;
pub mod info;
pub mod logical;
pub mod lookup;
pub mod math;
pub mod text;

use crate::error::FormulaResult;
use crate::value::{broadcast_map, Range, Value};
use ahash::AHashMap;
use once_cell::sync::Lazy;
use sheetcalc_core::{CellError, CellValue, Reference};
use std::fmt;
use std::sync::Arc;

/// Information a function may need about the call site
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallContext {
    /// Cell holding the formula, when it lives in a worksheet
    pub cell: Option<Reference>,
}

impl CallContext {
    pub fn new(cell: Option<Reference>) -> Self {
        Self { cell }
    }
}

/// Function implementation signature
pub type FunctionImpl = fn(&[Value], &CallContext) -> FormulaResult<Value>;

/// Function definition
#[derive(Clone)]
pub struct FunctionDef {
    /// Function name (uppercase)
    pub name: &'static str,
    /// Minimum arguments
    pub min_args: usize,
    /// Maximum arguments (None = unlimited)
    pub max_args: Option<usize>,
    /// Implementation
    pub implementation: FunctionImpl,
    /// Is volatile (recalculates every time)
    pub volatile: bool,
}

impl FunctionDef {
    pub fn new(
        name: &'static str,
        min_args: usize,
        max_args: Option<usize>,
        implementation: FunctionImpl,
    ) -> Self {
        Self {
            name,
            min_args,
            max_args,
            implementation,
            volatile: false,
        }
    }

    /// Mark the function as volatile
    pub fn volatile(mut self) -> Self {
        self.volatile = true;
        self
    }

    /// Check if `count` arguments are accepted
    pub fn accepts(&self, count: usize) -> bool {
        count >= self.min_args && self.max_args.map_or(true, |max| count <= max)
    }

    /// Human readable arity, for diagnostics
    pub fn arity(&self) -> String {
        match self.max_args {
            Some(max) if max == self.min_args => max.to_string(),
            Some(max) => format!("{}..={}", self.min_args, max),
            None => format!("{}..", self.min_args),
        }
    }
}

impl fmt::Debug for FunctionDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDef")
            .field("name", &self.name)
            .field("min_args", &self.min_args)
            .field("max_args", &self.max_args)
            .field("volatile", &self.volatile)
            .finish()
    }
}

/// Function registry
pub struct FunctionRegistry {
    functions: AHashMap<String, FunctionDef>,
}

static GLOBAL: Lazy<Arc<FunctionRegistry>> = Lazy::new(|| Arc::new(FunctionRegistry::new()));

/// The shared registry of built-in functions
pub fn global_registry() -> Arc<FunctionRegistry> {
    Arc::clone(&GLOBAL)
}

impl FunctionRegistry {
    /// Create a new registry with all built-in functions
    pub fn new() -> Self {
        let mut registry = Self::empty();

        registry.register_math_functions();
        registry.register_logical_functions();
        registry.register_text_functions();
        registry.register_info_functions();
        registry.register_date_functions();
        registry.register_reference_functions();

        registry
    }

    /// Create a registry without any function
    pub fn empty() -> Self {
        Self {
            functions: AHashMap::new(),
        }
    }

    /// Look up a function by name
    pub fn get(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(&name.to_uppercase())
    }

    /// Register a function, replacing any previous one with the same name
    pub fn register(&mut self, def: FunctionDef) {
        self.functions.insert(def.name.to_uppercase(), def);
    }

    /// Number of registered functions
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    fn register_math_functions(&mut self) {
        self.register(FunctionDef::new("SUM", 1, None, math::fn_sum));
        self.register(FunctionDef::new("AVERAGE", 1, None, math::fn_average));
        self.register(FunctionDef::new("MIN", 1, None, math::fn_min));
        self.register(FunctionDef::new("MAX", 1, None, math::fn_max));
        self.register(FunctionDef::new("COUNT", 1, None, math::fn_count));
        self.register(FunctionDef::new("COUNTA", 1, None, math::fn_counta));
        self.register(FunctionDef::new("PRODUCT", 1, None, math::fn_product));
        self.register(FunctionDef::new("ABS", 1, Some(1), math::fn_abs));
        self.register(FunctionDef::new("INT", 1, Some(1), math::fn_int));
        self.register(FunctionDef::new("ROUND", 1, Some(2), math::fn_round));
        self.register(FunctionDef::new("MOD", 2, Some(2), math::fn_mod));
        self.register(FunctionDef::new("SQRT", 1, Some(1), math::fn_sqrt));
        self.register(FunctionDef::new("POWER", 2, Some(2), math::fn_power));
        self.register(FunctionDef::new("PI", 0, Some(0), math::fn_pi));
        self.register(FunctionDef::new("GCD", 1, None, math::fn_gcd));

        // Volatile
        self.register(FunctionDef::new("RAND", 0, Some(0), math::fn_rand).volatile());
        self.register(
            FunctionDef::new("RANDBETWEEN", 2, Some(2), math::fn_randbetween).volatile(),
        );
    }

    fn register_logical_functions(&mut self) {
        self.register(FunctionDef::new("IF", 2, Some(3), logical::fn_if));
        self.register(FunctionDef::new("IFS", 2, None, logical::fn_ifs));
        self.register(FunctionDef::new("IFERROR", 2, Some(2), logical::fn_iferror));
        self.register(FunctionDef::new("IFNA", 2, Some(2), logical::fn_ifna));
        self.register(FunctionDef::new("AND", 1, None, logical::fn_and));
        self.register(FunctionDef::new("OR", 1, None, logical::fn_or));
        self.register(FunctionDef::new("XOR", 1, None, logical::fn_xor));
        self.register(FunctionDef::new("NOT", 1, Some(1), logical::fn_not));
        self.register(FunctionDef::new("TRUE", 0, Some(0), logical::fn_true));
        self.register(FunctionDef::new("FALSE", 0, Some(0), logical::fn_false));
    }

    fn register_text_functions(&mut self) {
        self.register(FunctionDef::new("CONCAT", 1, None, text::fn_concat));
        self.register(FunctionDef::new("CONCATENATE", 1, None, text::fn_concatenate));
        self.register(FunctionDef::new("LEN", 1, Some(1), text::fn_len));
        self.register(FunctionDef::new("UPPER", 1, Some(1), text::fn_upper));
        self.register(FunctionDef::new("LOWER", 1, Some(1), text::fn_lower));
    }

    fn register_info_functions(&mut self) {
        self.register(FunctionDef::new("ISERROR", 1, Some(1), info::fn_iserror));
        self.register(FunctionDef::new("ISNUMBER", 1, Some(1), info::fn_isnumber));
        self.register(FunctionDef::new("ISBLANK", 1, Some(1), info::fn_isblank));
        self.register(FunctionDef::new("NA", 0, Some(0), info::fn_na));
    }

    fn register_date_functions(&mut self) {
        self.register(FunctionDef::new("DATE", 3, Some(3), date::fn_date));
        self.register(FunctionDef::new("NOW", 0, Some(0), date::fn_now).volatile());
        self.register(FunctionDef::new("TODAY", 0, Some(0), date::fn_today).volatile());
    }

    fn register_reference_functions(&mut self) {
        self.register(FunctionDef::new("ROW", 0, Some(1), lookup::fn_row));
        self.register(FunctionDef::new("COLUMN", 0, Some(1), lookup::fn_column));
        self.register(FunctionDef::new("ROWS", 1, Some(1), lookup::fn_rows));
        self.register(FunctionDef::new("COLUMNS", 1, Some(1), lookup::fn_columns));
        self.register(FunctionDef::new("INDEX", 2, Some(4), lookup::fn_index));
        self.register(FunctionDef::new("SINGLE", 1, Some(1), lookup::fn_single));
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.functions.values().map(|d| d.name).collect();
        names.sort_unstable();
        f.debug_struct("FunctionRegistry")
            .field("functions", &names)
            .finish()
    }
}

// === Argument helpers ===

/// Where an aggregated value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Origin {
    /// Typed directly as an argument (or computed to a single value)
    Scalar,
    /// Part of a reference or array argument
    Collection,
}

/// Visit every value of every argument in scan order
///
/// Areas are read in union order, each row by row. Stops at the first
/// `Err` returned by `f`.
pub(crate) fn visit<F>(args: &[Value], mut f: F) -> Result<(), CellError>
where
    F: FnMut(&CellValue, Origin) -> Result<(), CellError>,
{
    for arg in args {
        match arg {
            Value::Range(range) if range.is_scalar() => f(range.scalar_value(), Origin::Scalar)?,
            Value::Range(range) => {
                for v in range.iter() {
                    f(v, Origin::Collection)?;
                }
            }
            Value::Areas(areas) => {
                for area in areas {
                    for v in area.values.iter() {
                        f(v, Origin::Collection)?;
                    }
                }
            }
        }
    }
    Ok(())
}

/// Numbers of the arguments the way SUM reads them
///
/// Scalar arguments are coerced (text that is not numeric is `#VALUE!`).
/// References and arrays contribute their numbers only. The first error
/// wins.
pub(crate) fn numbers(args: &[Value]) -> Result<Vec<f64>, CellError> {
    let mut out = Vec::new();
    visit(args, |v, origin| {
        match (v, origin) {
            (CellValue::Error(e), _) => return Err(*e),
            (CellValue::Number(n), _) => out.push(*n),
            (_, Origin::Scalar) => out.push(crate::value::to_number(v)?),
            (_, Origin::Collection) => {}
        }
        Ok(())
    })?;
    Ok(out)
}

/// Apply `f` position by position over all arguments, broadcasting shapes
pub(crate) fn elementwise<F>(args: &[Value], f: F) -> FormulaResult<Value>
where
    F: FnMut(&[&CellValue]) -> CellValue,
{
    let ranges: Vec<Range> = args.iter().map(Value::to_range).collect();
    let refs: Vec<&Range> = ranges.iter().collect();
    Ok(Value::Range(broadcast_map(&refs, f)?))
}

/// Turn a per-value result into a value
pub(crate) fn cell_result(result: Result<CellValue, CellError>) -> CellValue {
    result.unwrap_or_else(CellValue::Error)
}

/// Wrap a scalar computation as a function result
pub(crate) fn scalar_result(result: Result<CellValue, CellError>) -> FormulaResult<Value> {
    Ok(Value::scalar(cell_result(result)))
}

/// First value of an optional scalar argument
pub(crate) fn scalar_arg(args: &[Value], index: usize) -> Option<CellValue> {
    args.get(index).map(|v| v.to_range().scalar_value().clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Area;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_registry_lookup_is_case_insensitive() {
        let registry = FunctionRegistry::new();
        assert!(registry.get("sum").is_some());
        assert!(registry.get("Sum").is_some());
        assert!(registry.get("INDIRECT").is_none());
        assert!(registry.get("NOW").map_or(false, |d| d.volatile));
        assert!(!registry.get("SUM").map_or(true, |d| d.volatile));
    }

    #[test]
    fn test_arity() {
        let registry = FunctionRegistry::new();
        let def = registry.get("IF").unwrap();
        assert!(!def.accepts(1));
        assert!(def.accepts(2));
        assert!(def.accepts(3));
        assert!(!def.accepts(4));
        assert_eq!(def.arity(), "2..=3");
        assert_eq!(registry.get("SUM").unwrap().arity(), "1..");
        assert_eq!(registry.get("PI").unwrap().arity(), "0");
    }

    #[test]
    fn test_custom_registration() {
        fn answer(_: &[Value], _: &CallContext) -> FormulaResult<Value> {
            Ok(Value::scalar(42.0))
        }
        let mut registry = FunctionRegistry::empty();
        assert!(registry.is_empty());
        registry.register(FunctionDef::new("ANSWER", 0, Some(0), answer));
        let def = registry.get("answer").unwrap();
        let out = (def.implementation)(&[], &CallContext::default()).unwrap();
        assert_eq!(out, Value::scalar(42.0));
    }

    #[test]
    fn test_numbers_skip_text_in_collections() {
        let array = Value::Range(
            Range::new(1, 3, vec![1.0.into(), "x".into(), true.into()]).unwrap(),
        );
        assert_eq!(numbers(&[array, Value::scalar("2")]), Ok(vec![1.0, 2.0]));
        assert_eq!(numbers(&[Value::scalar("ciao")]), Err(CellError::Value));
        assert_eq!(numbers(&[Value::scalar(true)]), Ok(vec![1.0]));

        let area = Value::Areas(vec![Area::new(
            Reference::parse("S!A1:A2").unwrap(),
            Range::new(2, 1, vec![CellError::Na.into(), 1.0.into()]).unwrap(),
        )]);
        assert_eq!(numbers(&[area]), Err(CellError::Na));
    }
}
