//! # sheetcalc-formula
//!
//! Formula engine for sheetcalc.
//!
//! This crate provides:
//! - Formula parsing (text → AST)
//! - Cell compilation (AST → graph fragments)
//! - A computation graph with circular reference detection
//! - Graph evaluation with broadcasting and Excel coercions
//! - Built-in Excel functions
//!
//! ## Example
//!
//! ```rust
//! use sheetcalc_core::{CellValue, Reference};
//! use sheetcalc_formula::{global_registry, Cell, Dispatcher, Graph};
//! use ahash::AHashMap;
//!
//! let registry = global_registry();
//! let mut graph = Graph::new();
//! let b1 = Cell::new(Reference::parse("'[book]s'!B1").unwrap(), "2", &registry).unwrap();
//! let a1 = Cell::new(Reference::parse("'[book]s'!A1").unwrap(), "=B1*21", &registry).unwrap();
//! a1.add(&mut graph).unwrap();
//! b1.add(&mut graph).unwrap();
//!
//! let out = graph.id("'[BOOK]S'!A1").unwrap();
//! let solution = Dispatcher::new(&graph, registry).dispatch(&AHashMap::new(), &[out]).unwrap();
//! assert_eq!(solution.outputs[0].to_range().scalar_value(), &CellValue::Number(42.0));
//! ```

pub mod ast;
pub mod cell;
pub mod dispatcher;
pub mod error;
pub mod functions;
pub mod graph;
pub mod parser;
pub mod value;

pub use ast::{BinaryOperator, FormulaExpr, UnaryOperator};
pub use cell::{Cell, Fragment};
pub use dispatcher::{CompiledFunction, CycleReport, CycleSettings, Dispatcher, Solution};
pub use error::{FormulaError, FormulaResult};
pub use functions::{global_registry, CallContext, FunctionDef, FunctionRegistry};
pub use graph::{Graph, Node, NodeId, Operation};
pub use parser::{is_formula, parse_formula, parse_literal};
pub use value::{Area, Range, Value};
