//! End-to-end tests: books in, calculated values out

use pretty_assertions::assert_eq;
use sheetcalc::prelude::*;
use sheetcalc::FormulaError;

const SHEET: &str = "'[book.xlsx]Sheet1'!";

fn book(cells: &[(&str, CellContent)]) -> Workbook {
    let mut sheet = Worksheet::new("Sheet1");
    for (address, content) in cells {
        sheet.set(address, content.clone());
    }
    Workbook::new("book.xlsx").with_sheet(sheet)
}

fn finished(book: &Workbook, options: CalculationOptions) -> ExcelModel {
    let mut model = ExcelModel::new();
    model.load(book).unwrap();
    model.finish(options).unwrap();
    model
}

fn calculated(cells: &[(&str, CellContent)]) -> ExcelModel {
    let mut model = finished(&book(cells), CalculationOptions::default());
    model.calculate().unwrap();
    model
}

fn value(model: &ExcelModel, address: &str) -> Range {
    model.value(&format!("{}{}", SHEET, address)).unwrap()
}

fn number(range: &Range) -> f64 {
    match range.scalar_value() {
        CellValue::Number(n) => *n,
        other => panic!("expected a number, got {:?}", other),
    }
}

fn row(values: Vec<CellValue>) -> Range {
    Range::from_rows(vec![values]).unwrap()
}

/// Arithmetic follows operator precedence
#[test]
fn test_arithmetic_precedence() {
    let model = calculated(&[
        ("A1", "=( 1 + 2 + 3)*(4 + 5)^(1/5)".into()),
        ("A2", "=-2^2".into()),
        ("A3", "=INT(1)%+3".into()),
        ("A4", "=1+2*3-4/2".into()),
    ]);
    assert!((number(&value(&model, "A1")) - 9.311073443492159).abs() < 1e-12);
    assert_eq!(value(&model, "A2"), Range::scalar(4.0));
    assert!((number(&value(&model, "A3")) - 3.01).abs() < 1e-12);
    assert_eq!(value(&model, "A4"), Range::scalar(5.0));
}

/// Errors propagate as values; IF looks at its condition first
#[test]
fn test_error_propagation() {
    let model = calculated(&[
        ("A1", "=IF(#NAME?, #VALUE!, #N/A)".into()),
        ("A2", "=GCD(#NAME?,#VALUE!,#N/A)".into()),
        ("A3", "=1/0".into()),
        ("A4", "=A3+1".into()),
        ("A5", "=IFERROR(A3, 7)".into()),
    ]);
    assert_eq!(value(&model, "A1"), Range::scalar(CellError::Name));
    assert_eq!(value(&model, "A2"), Range::scalar(CellError::Name));
    assert_eq!(value(&model, "A3"), Range::scalar(CellError::Div0));
    assert_eq!(value(&model, "A4"), Range::scalar(CellError::Div0));
    assert_eq!(value(&model, "A5"), Range::scalar(7.0));
}

/// Scalars and 1-wide arrays stretch; extra output cells are #N/A
#[test]
fn test_broadcast_onto_output() {
    let model = calculated(&[("A1:D1", "=IF({0,-0.2,0},2,{1})".into())]);
    assert_eq!(
        value(&model, "A1:D1"),
        row(vec![
            CellValue::Number(1.0),
            CellValue::Number(2.0),
            CellValue::Number(1.0),
            CellValue::Error(CellError::Na),
        ])
    );
}

/// Incompatible shapes abort the calculation
#[test]
fn test_broadcast_mismatch_is_a_fault() {
    let mut model = finished(
        &book(&[("A1:D1", "=IF({0,-2,0},{2,3},{1,4})".into())]),
        CalculationOptions::default(),
    );
    let err = model.calculate().unwrap_err();
    assert!(matches!(err, ModelError::Formula(FormulaError::Broadcast { .. })));
}

/// Formula results are fitted onto the cells of the formula
#[test]
fn test_output_projection() {
    let model = calculated(&[
        ("A1", "={1,2;1,2}".into()),
        ("A2:C4", "=ROW(D1:D2)".into()),
    ]);
    assert_eq!(value(&model, "A1"), Range::scalar(1.0));

    let n = |v: f64| CellValue::Number(v);
    let na = CellValue::Error(CellError::Na);
    assert_eq!(
        value(&model, "A2:C4"),
        Range::from_rows(vec![
            vec![n(1.0), n(1.0), n(1.0)],
            vec![n(2.0), n(2.0), n(2.0)],
            vec![na.clone(), na.clone(), na],
        ])
        .unwrap()
    );
}

/// Empty results are written as zero
#[test]
fn test_empty_results_are_zero() {
    let model = calculated(&[
        ("A1", "=IFS(-1,A2,1,TRUE)".into()),
        ("B2", "=INDEX(B1:C1,1,1)".into()),
        ("B3", "=C9".into()),
    ]);
    assert_eq!(value(&model, "A1"), Range::scalar(0.0));
    assert_eq!(value(&model, "B2"), Range::scalar(0.0));
    assert_eq!(value(&model, "B3"), Range::scalar(0.0));
}

/// Union keeps duplicates; intersection distributes over it
#[test]
fn test_reference_operators() {
    let model = calculated(&[
        ("B1", 2.0.into()),
        ("C1", 3.0.into()),
        ("D1", 4.0.into()),
        ("A1", "=SUM(B1:D1 (B1:D1,B1:C1))".into()),
        ("A2", "=B1:D1 C1:C5".into()),
        ("A3", "=A5 A6".into()),
        ("A4", "=SUM(B1:B1:D1)".into()),
    ]);
    assert_eq!(value(&model, "A1"), Range::scalar(14.0));
    assert_eq!(value(&model, "A2"), Range::scalar(3.0));
    assert_eq!(value(&model, "A3"), Range::scalar(CellError::Null));
    assert_eq!(value(&model, "A4"), Range::scalar(9.0));
}

/// Whole columns and rows are bounded by the used area
#[test]
fn test_whole_columns_and_rows() {
    let model = calculated(&[
        ("A1", 1.0.into()),
        ("A2", 2.0.into()),
        ("A3", 3.0.into()),
        ("C1", "=SUM(A:A)".into()),
        ("C2", "=ROWS(A:A)".into()),
        ("C3", "=SUM(1:1)".into()),
    ]);
    assert_eq!(value(&model, "C1"), Range::scalar(6.0));
    // ROWS sees the whole column, SUM only the used cells
    assert_eq!(value(&model, "C2"), Range::scalar(1_048_576.0));
    assert_eq!(value(&model, "C3"), Range::scalar(7.0));
}

/// Unknown functions, undefined names and bad arity
#[test]
fn test_unresolved_names() {
    let model = calculated(&[
        ("A1", "=REF".into()),
        ("A2", r#"=__xludf.DUMMYFUNCTION("x")"#.into()),
        ("A3", "=ABS(1,2)".into()),
        ("A4", "=SUM(\"2\",\"4\")".into()),
        ("A5", "=SUM(\"2\",\"4\",\"ciao\")".into()),
    ]);
    assert_eq!(value(&model, "A1"), Range::scalar(CellError::Ref));
    assert_eq!(value(&model, "A2"), Range::scalar(CellError::Name));
    assert_eq!(value(&model, "A3"), Range::scalar(CellError::Value));
    assert_eq!(value(&model, "A4"), Range::scalar(6.0));
    assert_eq!(value(&model, "A5"), Range::scalar(CellError::Value));
}

/// Circular references are errors unless iteration is enabled
#[test]
fn test_circular_disabled() {
    let book = book(&[("A1", "=B1+1".into()), ("B1", "=A1".into()), ("C1", "=A1+1".into())]);
    let mut model = finished(&book, CalculationOptions::default());
    let stats = model.calculate().unwrap();
    assert_eq!(stats.cycles, 1);
    assert!(!stats.converged);
    assert_eq!(value(&model, "A1"), Range::scalar(CellError::Circular));
    assert_eq!(value(&model, "B1"), Range::scalar(CellError::Circular));
    assert_eq!(value(&model, "C1"), Range::scalar(CellError::Circular));
}

/// A converging cycle settles near its fixed point
#[test]
fn test_circular_converges() {
    let book = book(&[("A1", "=B1/2+1".into()), ("B1", "=A1".into())]);
    let mut model = finished(&book, CalculationOptions::iterative(100));
    let stats = model.calculate().unwrap();
    assert!(stats.converged);
    assert!(stats.iterations > 1 && stats.iterations < 100);
    assert!((number(&value(&model, "A1")) - 2.0).abs() < 0.01);
    assert!((number(&value(&model, "B1")) - 2.0).abs() < 0.01);
}

/// A diverging cycle runs out of iterations
#[test]
fn test_circular_diverges() {
    let book = book(&[("A1", "=B1*2+1".into()), ("B1", "=A1".into())]);
    let mut model = finished(&book, CalculationOptions::iterative(20));
    let stats = model.calculate().unwrap();
    assert!(!stats.converged);
    assert_eq!(stats.iterations, 20);
    assert_eq!(value(&model, "A1"), Range::scalar(CellError::Circular));
}

/// An override on a cycle member feeds the other members
#[test]
fn test_override_breaks_circular_reference() {
    let book = book(&[("A1", "=B1+1".into()), ("B1", "=A1".into()), ("C1", "=A1*2".into())]);
    let mut model = finished(&book, CalculationOptions::default());
    let stats = model
        .calculate_with_overrides(vec![(format!("{}B1", SHEET), Range::scalar(5.0))])
        .unwrap();
    assert_eq!(stats.cycles, 0);
    assert_eq!(value(&model, "B1"), Range::scalar(5.0));
    assert_eq!(value(&model, "A1"), Range::scalar(6.0));
    assert_eq!(value(&model, "C1"), Range::scalar(12.0));

    model.calculate().unwrap();
    assert_eq!(value(&model, "A1"), Range::scalar(CellError::Circular));
}

/// Volatile functions change between calculations, pure ones do not
#[test]
fn test_volatile_functions() {
    let mut model = calculated(&[("A1", "=RAND()".into()), ("A2", "=1+1".into())]);
    let (rand, pure) = (value(&model, "A1"), value(&model, "A2"));
    model.calculate().unwrap();
    assert_ne!(value(&model, "A1"), rand);
    assert_eq!(value(&model, "A2"), pure);
    let n = number(&rand);
    assert!((0.0..1.0).contains(&n));
}

/// Overrides replace declared values for one calculation only
#[test]
fn test_overrides() {
    let book = book(&[
        ("A1", 1.0.into()),
        ("B1", 2.0.into()),
        ("C1", "=A1+B1".into()),
        ("D1", "=SUM(E1:E2)".into()),
    ]);
    let mut model = finished(&book, CalculationOptions::default());

    model
        .calculate_with_overrides(vec![(format!("{}A1", SHEET), Range::scalar(10.0))])
        .unwrap();
    assert_eq!(value(&model, "C1"), Range::scalar(12.0));
    assert_eq!(value(&model, "A1"), Range::scalar(10.0));

    // Split over the cells the range covers
    let grid = row(vec![CellValue::Number(5.0), CellValue::Number(6.0)]);
    model
        .calculate_with_overrides(vec![(format!("{}A1:B1", SHEET), grid)])
        .unwrap();
    assert_eq!(value(&model, "C1"), Range::scalar(11.0));

    // Empty cells referenced as a range
    let grid = Range::from_rows(vec![vec![CellValue::Number(1.0)], vec![CellValue::Number(2.0)]]).unwrap();
    model
        .calculate_with_overrides(vec![(format!("{}E1:E2", SHEET), grid)])
        .unwrap();
    assert_eq!(value(&model, "D1"), Range::scalar(3.0));

    // Unknown cells are ignored
    model
        .calculate_with_overrides(vec![(format!("{}Z99", SHEET), Range::scalar(1.0))])
        .unwrap();
    assert_eq!(value(&model, "C1"), Range::scalar(3.0));
    assert_eq!(value(&model, "D1"), Range::scalar(0.0));
}

/// A range of separate cells reads back as one grid
#[test]
fn test_range_values() {
    let model = calculated(&[("A1", 1.0.into()), ("B2", "=A1*2".into())]);
    assert_eq!(
        value(&model, "A1:B2"),
        Range::from_rows(vec![
            vec![CellValue::Number(1.0), CellValue::Empty],
            vec![CellValue::Empty, CellValue::Number(2.0)],
        ])
        .unwrap()
    );
    assert!(matches!(
        model.value("'[nope.xlsx]Sheet1'!A1"),
        Err(ModelError::UnknownReference(_))
    ));
}

/// Sheets and books refer to each other
#[test]
fn test_cross_sheet_and_book_references() {
    let data = Workbook::new("excel.xlsx")
        .with_sheet(Worksheet::new("S1").with("A1", 1.0))
        .with_sheet(Worksheet::new("S2").with("A1", 2.0))
        .with_sheet(Worksheet::new("S3").with("A1", 3.0))
        .with_sheet(
            Worksheet::new("Summary")
                .with("A1", "=SUM(S1:S3!A1)")
                .with("A2", "=S2!A1*10")
                .with("A3", "=SUM(S3:S1!A1:B1)"),
        );
    let other = Workbook::new("extra.xlsx").with_sheet(
        Worksheet::new("EXTRA")
            .with("A1", "='[excel.xlsx]Summary'!A1+1")
            .with("A2", "=[excel.xlsx]S1!A1")
            .with("A3", "='[excel.xlsx]Missing'!A1"),
    );

    let mut model = ExcelModel::new();
    model.load(&data).unwrap();
    model.load(&other).unwrap();
    model.finish(CalculationOptions::default()).unwrap();
    model.calculate().unwrap();

    let get = |r: &str| model.value(r).unwrap();
    assert_eq!(get("'[excel.xlsx]Summary'!A1"), Range::scalar(6.0));
    assert_eq!(get("'[excel.xlsx]Summary'!A2"), Range::scalar(20.0));
    assert_eq!(get("'[excel.xlsx]Summary'!A3"), Range::scalar(6.0));
    assert_eq!(get("'[extra.xlsx]EXTRA'!A1"), Range::scalar(7.0));
    assert_eq!(get("'[extra.xlsx]EXTRA'!A2"), Range::scalar(1.0));
    assert_eq!(get("'[extra.xlsx]EXTRA'!A3"), Range::scalar(CellError::Ref));
}

/// Defined names in formulas, values and compiled functions
#[test]
fn test_defined_names() {
    let book = Workbook::new("excel.xlsx")
        .with_sheet(
            Worksheet::new("DATA")
                .with("A2", 3.0)
                .with("B1", "=INPUT_A*2")
                .with("B2", "=SUM(INPUT_A, 1)"),
        )
        .with_name("INPUT_A", "DATA!$A$2");
    let mut model = finished(&book, CalculationOptions::default());
    model.calculate().unwrap();
    assert_eq!(model.value("'[excel.xlsx]DATA'!B1").unwrap(), Range::scalar(6.0));
    assert_eq!(model.value("'[excel.xlsx]DATA'!B2").unwrap(), Range::scalar(4.0));
    assert_eq!(model.value("'[excel.xlsx]DATA'!INPUT_A").unwrap(), Range::scalar(3.0));

    let func = model
        .compile(&["'[excel.xlsx]DATA'!INPUT_A"], &["'[excel.xlsx]DATA'!B1"])
        .unwrap();
    assert_eq!(func.call(&[Range::scalar(5.0)]).unwrap(), vec![Range::scalar(10.0)]);
}

/// Compiled functions are reusable and independent of the model
#[test]
fn test_compile() {
    let book = book(&[
        ("A1", 1.0.into()),
        ("A2", 2.0.into()),
        ("B1", "=A1+A2".into()),
        ("B2", "=B1*A2".into()),
    ]);
    let model = finished(&book, CalculationOptions::default());
    let func = model
        .compile(
            &[&format!("{}A1", SHEET), &format!("{}A2", SHEET)],
            &[&format!("{}B2", SHEET)],
        )
        .unwrap();
    assert_eq!(func.inputs(), vec!["'[BOOK.XLSX]SHEET1'!A1", "'[BOOK.XLSX]SHEET1'!A2"]);

    let args = [Range::scalar(1.0), Range::scalar(2.0)];
    let first = func.call(&args).unwrap();
    assert_eq!(first, vec![Range::scalar(6.0)]);
    assert_eq!(func.call(&args).unwrap(), first);
    assert_eq!(
        func.call(&[Range::scalar(3.0), Range::scalar(4.0)]).unwrap(),
        vec![Range::scalar(28.0)]
    );
    assert!(matches!(
        func.call(&[Range::scalar(1.0)]),
        Err(FormulaError::ArgumentCount { .. })
    ));

    drop(model);
    let handle = std::thread::spawn(move || func.call(&[Range::scalar(0.0), Range::scalar(1.0)]));
    assert_eq!(handle.join().unwrap().unwrap(), vec![Range::scalar(1.0)]);
}

/// Compiling through a circular reference keeps the iteration
#[test]
fn test_compile_circular() {
    let book = book(&[
        ("A1", 4.0.into()),
        ("B1", "=C1/2+A1".into()),
        ("C1", "=B1".into()),
    ]);
    let model = finished(&book, CalculationOptions::iterative(100));
    let func = model
        .compile(&[&format!("{}A1", SHEET)], &[&format!("{}C1", SHEET)])
        .unwrap();
    let out = func.call(&[Range::scalar(1.0)]).unwrap();
    assert!((number(&out[0]) - 2.0).abs() < 0.01);
    let out = func.call(&[Range::scalar(4.0)]).unwrap();
    assert!((number(&out[0]) - 8.0).abs() < 0.01);
}

/// A cycle member can be the input of a compiled function
#[test]
fn test_compile_from_cycle_member() {
    let book = book(&[
        ("A1", "=B1/2+C1".into()),
        ("B1", "=A1".into()),
        ("C1", 4.0.into()),
    ]);
    let model = finished(&book, CalculationOptions::iterative(100));
    let func = model
        .compile(&[&format!("{}B1", SHEET)], &[&format!("{}A1", SHEET)])
        .unwrap();
    assert_eq!(func.call(&[Range::scalar(2.0)]).unwrap(), vec![Range::scalar(5.0)]);
    assert_eq!(func.call(&[Range::scalar(10.0)]).unwrap(), vec![Range::scalar(9.0)]);
}

/// Unknown references are reported
#[test]
fn test_compile_unknown_reference() {
    let model = finished(&book(&[("A1", 1.0.into())]), CalculationOptions::default());
    assert!(matches!(
        model.compile(&["A1"], &[&format!("{}A1", SHEET)]),
        Err(ModelError::UnknownReference(_))
    ));
    assert!(matches!(
        model.compile(&[], &[&format!("{}Q7", SHEET)]),
        Err(ModelError::UnknownReference(_))
    ));
}

/// Values are written back per book, sheet and address
#[test]
fn test_write() {
    let mut source = book(&[("A1", 2.0.into()), ("B1:C1", "=A1*{1,2}".into())]);
    let model = {
        let mut model = finished(&source, CalculationOptions::default());
        model.calculate().unwrap();
        model
    };

    let written = model.write();
    let sheet = &written["book.xlsx"]["Sheet1"];
    assert_eq!(sheet.len(), 3);
    assert_eq!(sheet["A1"], CellValue::Number(2.0));
    assert_eq!(sheet["B1"], CellValue::Number(2.0));
    assert_eq!(sheet["C1"], CellValue::Number(4.0));

    model.write_to(&mut source);
    let stored = source.sheet("Sheet1").unwrap();
    assert_eq!(stored.value("C1"), Some(&CellContent::from(4.0)));
    assert_eq!(stored.get("B1:C1").and_then(CellContent::formula), Some("=A1*{1,2}"));
}

/// Books load from JSON documents
#[test]
fn test_book_document() {
    let book = Workbook::from_json(
        r#"{
            "name": "excel.xlsx",
            "sheets": [
                {"name": "DATA", "cells": {"A1": 1, "A2": "2", "B1": "=A1+A2", "B2": "=B1&\"!\""}}
            ],
            "names": {"TOTAL": "DATA!B1"}
        }"#,
    )
    .unwrap();
    let mut model = finished(&book, CalculationOptions::default());
    model.calculate().unwrap();
    assert_eq!(model.value("TOTAL").unwrap(), Range::scalar(3.0));
    assert_eq!(model.value("'[excel.xlsx]DATA'!B2").unwrap(), Range::scalar("3!"));
}
