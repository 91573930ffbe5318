//! Workbooks as the model reads and writes them
//!
//! [`BookSource`] is what [`ExcelModel`](crate::ExcelModel) needs from a
//! workbook: its sheets, declared cells, defined names, and somewhere to
//! put calculated values. [`Workbook`] is the in-memory implementation and
//! doubles as a JSON document:
//!
//! ```json
//! {
//!   "name": "excel.xlsx",
//!   "sheets": [{ "name": "DATA", "cells": { "A1": 1, "B1": "=A1+1" } }],
//!   "names": { "INPUT_A": "DATA!$A$1" }
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::json;
use sheetcalc_core::{CellError, CellValue};
use sheetcalc_formula::is_formula;
use std::collections::BTreeMap;

/// Declared content of a cell (or of an array-formula range)
///
/// In JSON: `null`, booleans, numbers and strings are values, a string
/// starting with `=` is a formula and `{"error": "#N/A"}` an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "serde_json::Value", into = "serde_json::Value")]
pub enum CellContent {
    Value(CellValue),
    Formula(String),
}

impl CellContent {
    /// Formula text if this is a formula
    pub fn formula(&self) -> Option<&str> {
        match self {
            CellContent::Formula(f) => Some(f),
            CellContent::Value(_) => None,
        }
    }
}

impl From<CellValue> for CellContent {
    fn from(value: CellValue) -> Self {
        CellContent::Value(value)
    }
}

impl From<f64> for CellContent {
    fn from(n: f64) -> Self {
        CellContent::Value(CellValue::Number(n))
    }
}

impl From<bool> for CellContent {
    fn from(b: bool) -> Self {
        CellContent::Value(CellValue::Boolean(b))
    }
}

impl From<&str> for CellContent {
    fn from(s: &str) -> Self {
        if is_formula(s) {
            CellContent::Formula(s.to_string())
        } else {
            CellContent::Value(CellValue::String(s.to_string()))
        }
    }
}

impl From<CellError> for CellContent {
    fn from(e: CellError) -> Self {
        CellContent::Value(CellValue::Error(e))
    }
}

impl TryFrom<serde_json::Value> for CellContent {
    type Error = String;

    fn try_from(value: serde_json::Value) -> Result<Self, String> {
        use serde_json::Value as Json;
        Ok(match value {
            Json::Null => CellContent::Value(CellValue::Empty),
            Json::Bool(b) => b.into(),
            Json::Number(n) => n
                .as_f64()
                .map(CellContent::from)
                .ok_or_else(|| format!("number {} out of range", n))?,
            Json::String(s) => s.as_str().into(),
            Json::Object(map) => {
                let text = map
                    .get("error")
                    .and_then(Json::as_str)
                    .ok_or_else(|| "expected {\"error\": \"#...\"}".to_string())?;
                CellError::parse(text)
                    .map(CellContent::from)
                    .ok_or_else(|| format!("unknown error value {}", text))?
            }
            Json::Array(_) => return Err("arrays are not cell content".into()),
        })
    }
}

impl From<CellContent> for serde_json::Value {
    fn from(content: CellContent) -> Self {
        match content {
            CellContent::Formula(f) => json!(f),
            CellContent::Value(CellValue::Empty) => serde_json::Value::Null,
            CellContent::Value(CellValue::Boolean(b)) => json!(b),
            CellContent::Value(CellValue::Number(n)) => json!(n),
            CellContent::Value(CellValue::String(s)) => json!(s),
            CellContent::Value(CellValue::Error(e)) => json!({ "error": e.as_str() }),
        }
    }
}

/// A worksheet: declared cells plus the values last written back
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Worksheet {
    pub name: String,
    /// Cells by address; a range address (`A1:C3`) declares an array formula
    #[serde(default)]
    pub cells: BTreeMap<String, CellContent>,
    /// Calculated values by address
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub values: BTreeMap<String, CellContent>,
}

impl Worksheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Declare a cell, builder style
    pub fn with(mut self, address: &str, content: impl Into<CellContent>) -> Self {
        self.set(address, content);
        self
    }

    /// Declare a cell
    pub fn set(&mut self, address: &str, content: impl Into<CellContent>) {
        self.cells.insert(address.to_string(), content.into());
    }

    /// Declared content of a cell
    pub fn get(&self, address: &str) -> Option<&CellContent> {
        self.cells.get(address)
    }

    /// Calculated value of a cell, once written back
    pub fn value(&self, address: &str) -> Option<&CellContent> {
        self.values.get(address)
    }
}

/// A workbook held in memory
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workbook {
    pub name: String,
    #[serde(default)]
    pub sheets: Vec<Worksheet>,
    /// Defined names and their references (`INPUT_A` → `DATA!$A$2`)
    #[serde(default)]
    pub names: BTreeMap<String, String>,
}

impl Workbook {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Append a sheet, builder style
    pub fn with_sheet(mut self, sheet: Worksheet) -> Self {
        self.sheets.push(sheet);
        self
    }

    /// Define a name, builder style
    pub fn with_name(mut self, name: &str, reference: &str) -> Self {
        self.names.insert(name.to_string(), reference.to_string());
        self
    }

    /// Sheet by name (case-insensitive)
    pub fn sheet(&self, name: &str) -> Option<&Worksheet> {
        self.sheets.iter().find(|s| s.name.eq_ignore_ascii_case(name))
    }

    /// Mutable sheet by name (case-insensitive)
    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut Worksheet> {
        self.sheets.iter_mut().find(|s| s.name.eq_ignore_ascii_case(name))
    }

    /// Parse a book document
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Render the book as a document
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// A workbook the model can load from and write back to
pub trait BookSource {
    /// Workbook name, as used in `[book]` qualifiers
    fn book_name(&self) -> &str;

    /// Sheet names in workbook order
    fn sheet_names(&self) -> Vec<&str>;

    /// Declared cells as `(sheet, address, content)`
    fn cells(&self) -> Vec<(&str, &str, &CellContent)>;

    /// Defined names as `(name, reference)`
    fn defined_names(&self) -> Vec<(&str, &str)>;

    /// Receive the calculated values of one sheet
    fn store(&mut self, sheet: &str, values: BTreeMap<String, CellValue>);
}

impl BookSource for Workbook {
    fn book_name(&self) -> &str {
        &self.name
    }

    fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    fn cells(&self) -> Vec<(&str, &str, &CellContent)> {
        self.sheets
            .iter()
            .flat_map(|sheet| {
                sheet
                    .cells
                    .iter()
                    .map(move |(address, content)| (sheet.name.as_str(), address.as_str(), content))
            })
            .collect()
    }

    fn defined_names(&self) -> Vec<(&str, &str)> {
        self.names
            .iter()
            .map(|(name, reference)| (name.as_str(), reference.as_str()))
            .collect()
    }

    fn store(&mut self, sheet: &str, values: BTreeMap<String, CellValue>) {
        if self.sheet(sheet).is_none() {
            self.sheets.push(Worksheet::new(sheet));
        }
        if let Some(target) = self.sheet_mut(sheet) {
            target
                .values
                .extend(values.into_iter().map(|(address, value)| (address, value.into())));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_content_from_json() {
        let parse = |s: &str| serde_json::from_str::<CellContent>(s).unwrap();
        assert_eq!(parse("1.5"), CellContent::Value(CellValue::Number(1.5)));
        assert_eq!(parse("true"), CellContent::Value(CellValue::Boolean(true)));
        assert_eq!(parse("null"), CellContent::Value(CellValue::Empty));
        assert_eq!(parse(r#""=A1+1""#), CellContent::Formula("=A1+1".into()));
        assert_eq!(parse(r#""=""#), CellContent::Value(CellValue::String("=".into())));
        assert_eq!(parse(r#""ciao""#), CellContent::Value(CellValue::String("ciao".into())));
        assert_eq!(
            parse(r##"{"error": "#N/A"}"##),
            CellContent::Value(CellValue::Error(CellError::Na))
        );
        assert!(serde_json::from_str::<CellContent>("[1]").is_err());
        assert!(serde_json::from_str::<CellContent>(r##"{"error": "#NOPE"}"##).is_err());
    }

    #[test]
    fn test_content_to_json() {
        let render = |c: CellContent| serde_json::to_string(&c).unwrap();
        assert_eq!(render(2.0.into()), "2.0");
        assert_eq!(render("=SUM(A1:A3)".into()), r#""=SUM(A1:A3)""#);
        assert_eq!(render(CellError::Div0.into()), r##"{"error":"#DIV/0!"}"##);
        assert_eq!(render(CellValue::Empty.into()), "null");
    }

    #[test]
    fn test_book_document() {
        let book = Workbook::from_json(
            r#"{
                "name": "excel.xlsx",
                "sheets": [{"name": "DATA", "cells": {"A1": 1, "B1": "=A1+1"}}],
                "names": {"INPUT_A": "DATA!$A$1"}
            }"#,
        )
        .unwrap();
        assert_eq!(book.book_name(), "excel.xlsx");
        assert_eq!(book.sheet_names(), vec!["DATA"]);
        assert_eq!(book.defined_names(), vec![("INPUT_A", "DATA!$A$1")]);
        assert_eq!(
            book.cells(),
            vec![
                ("DATA", "A1", &CellContent::from(1.0)),
                ("DATA", "B1", &CellContent::Formula("=A1+1".into())),
            ]
        );
        assert_eq!(Workbook::from_json(&book.to_json().unwrap()).unwrap(), book);
    }

    #[test]
    fn test_store_values() {
        let mut book = Workbook::new("b").with_sheet(Worksheet::new("Data").with("A1", "=1+1"));
        let mut values = BTreeMap::new();
        values.insert("A1".to_string(), CellValue::Number(2.0));
        book.store("DATA", values);
        book.store("Other", BTreeMap::new());

        assert_eq!(book.sheets.len(), 2);
        let sheet = book.sheet("data").unwrap();
        assert_eq!(sheet.value("A1"), Some(&CellContent::from(2.0)));
        assert_eq!(sheet.get("A1").and_then(CellContent::formula), Some("=1+1"));
    }
}
