//! Cell compilation
//!
//! A [`Cell`] turns the content of one worksheet cell (or array-formula
//! range) into graph fragments. Fragments name their dependencies by key;
//! [`Cell::add`] resolves the keys, leaving placeholders for data that
//! another cell or the model will define later.
//!
//! Keys:
//! - the cell output is keyed by the canonical reference (`'[BOOK]SHEET'!A1`)
//! - a reference reads the node keyed by its own canonical string
//! - intermediate fragments are keyed `{output}|{n}`

use crate::ast::{BinaryOperator, FormulaExpr};
use crate::error::{FormulaError, FormulaResult};
use crate::functions::FunctionRegistry;
use crate::graph::{Graph, NodeId, Operation};
use crate::parser::{is_formula, parse_formula, parse_literal};
use crate::value::Range;
use sheetcalc_core::{CellError, CellValue, Reference};

/// One node to be added to the graph
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub key: String,
    pub operation: Operation,
    pub dependencies: Vec<String>,
}

/// A compiled cell
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    /// Cells covered, fully qualified
    pub reference: Reference,
    /// Formula text, for formula cells
    pub formula: Option<String>,
    fragments: Vec<Fragment>,
    output: String,
}

impl Cell {
    /// Compile cell content: formula text when it starts with `=`, a
    /// literal otherwise
    pub fn new(reference: Reference, content: &str, registry: &FunctionRegistry) -> FormulaResult<Self> {
        if is_formula(content) {
            Self::compile(reference, content, registry)
        } else {
            Ok(Self::constant(reference, Range::scalar(parse_literal(content))))
        }
    }

    /// Compile a formula
    pub fn compile(reference: Reference, formula: &str, registry: &FunctionRegistry) -> FormulaResult<Self> {
        let (book, sheet) = match (&reference.book, &reference.sheet) {
            (Some(book), Some(sheet)) if !reference.is_3d() => (book.clone(), sheet.clone()),
            _ => {
                return Err(FormulaError::InvalidReference(format!(
                    "cell {} must name one book and sheet",
                    reference
                )))
            }
        };
        let ast = parse_formula(formula)?;

        let output = reference.to_string();
        let mut compiler = Compiler {
            book,
            sheet,
            cell: &reference,
            output: &output,
            registry,
            fragments: Vec::new(),
        };
        let root = compiler.expr(&ast);
        let mut fragments = compiler.fragments;
        fragments.push(Fragment {
            key: output.clone(),
            operation: Operation::Output {
                reference: reference.clone(),
                formula: true,
            },
            dependencies: vec![root],
        });

        Ok(Self {
            reference,
            formula: Some(formula.to_string()),
            fragments,
            output,
        })
    }

    /// A cell holding a fixed value
    pub fn constant(reference: Reference, value: Range) -> Self {
        let output = reference.to_string();
        Self {
            fragments: vec![Fragment {
                key: output.clone(),
                operation: Operation::Constant(value),
                dependencies: Vec::new(),
            }],
            reference,
            formula: None,
            output,
        }
    }

    /// Key of the node holding the cell value
    pub fn output_key(&self) -> &str {
        &self.output
    }

    /// The nodes this cell adds, dependencies first
    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    /// Keys read from outside the cell
    pub fn inputs(&self) -> Vec<&str> {
        let own: Vec<&str> = self.fragments.iter().map(|f| f.key.as_str()).collect();
        let mut out: Vec<&str> = Vec::new();
        for dep in self.fragments.iter().flat_map(|f| &f.dependencies) {
            if !own.contains(&dep.as_str()) && !out.contains(&dep.as_str()) {
                out.push(dep);
            }
        }
        out
    }

    /// Add the cell's nodes to `graph`, returning the output node
    ///
    /// Nothing is added when one of the keys is already defined.
    pub fn add(&self, graph: &mut Graph) -> FormulaResult<NodeId> {
        let taken = self.fragments.iter().find(|fragment| {
            graph
                .id(&fragment.key)
                .and_then(|id| graph.node(id))
                .map_or(false, |node| node.operation != Operation::Input)
        });
        if let Some(fragment) = taken {
            return Err(FormulaError::DuplicateNode(fragment.key.clone()));
        }

        let mut output = None;
        for fragment in &self.fragments {
            let dependencies = fragment
                .dependencies
                .iter()
                .map(|key| graph.ensure_input(key))
                .collect();
            let id = graph.add_node(fragment.key.clone(), fragment.operation.clone(), dependencies)?;
            output = Some(id);
        }
        output.ok_or_else(|| FormulaError::UnknownNode(self.output.clone()))
    }
}

struct Compiler<'a> {
    book: String,
    sheet: String,
    cell: &'a Reference,
    output: &'a str,
    registry: &'a FunctionRegistry,
    fragments: Vec<Fragment>,
}

impl Compiler<'_> {
    fn push(&mut self, operation: Operation, dependencies: Vec<String>) -> String {
        let key = format!("{}|{}", self.output, self.fragments.len());
        self.fragments.push(Fragment {
            key: key.clone(),
            operation,
            dependencies,
        });
        key
    }

    fn constant(&mut self, value: impl Into<CellValue>) -> String {
        self.push(Operation::Constant(Range::scalar(value)), Vec::new())
    }

    fn expr(&mut self, expr: &FormulaExpr) -> String {
        match expr {
            FormulaExpr::Number(n) => self.constant(*n),
            FormulaExpr::String(s) => self.constant(s.as_str()),
            FormulaExpr::Boolean(b) => self.constant(*b),
            FormulaExpr::Error(e) => self.constant(*e),
            FormulaExpr::Missing => self.constant(CellValue::Empty),
            FormulaExpr::Array(rows) => match Range::from_rows(rows.clone()) {
                Ok(range) => self.push(Operation::Constant(range), Vec::new()),
                Err(_) => self.constant(CellError::Value),
            },
            FormulaExpr::Reference(reference) => {
                let qualified = reference.qualify(&self.book, &self.sheet);
                let data = qualified.to_string();
                self.push(Operation::Reference(qualified), vec![data])
            }
            FormulaExpr::NameRef { book, name } => {
                let book = book.clone().or_else(|| Some(self.book.clone()));
                self.push(
                    Operation::Name {
                        book,
                        name: name.to_uppercase(),
                    },
                    Vec::new(),
                )
            }
            FormulaExpr::BinaryOp {
                op: BinaryOperator::Union,
                ..
            } => {
                let mut operands = Vec::new();
                flatten_union(expr, &mut operands);
                let deps = operands.into_iter().map(|e| self.expr(e)).collect();
                self.push(Operation::Operator(BinaryOperator::Union), deps)
            }
            FormulaExpr::BinaryOp { op, left, right } => {
                let l = self.expr(left);
                let r = self.expr(right);
                self.push(Operation::Operator(*op), vec![l, r])
            }
            FormulaExpr::UnaryOp { op, operand } => {
                let operand = self.expr(operand);
                self.push(Operation::Unary(*op), vec![operand])
            }
            FormulaExpr::Function { name, args } => self.function(name, args),
        }
    }

    fn function(&mut self, name: &str, args: &[FormulaExpr]) -> String {
        let Some(def) = self.registry.get(name) else {
            log::debug!("{}: unknown function {}", self.output, name);
            return self.constant(CellError::Name);
        };
        if !def.accepts(args.len()) {
            log::warn!(
                "{}: {} takes {} arguments, got {}",
                self.output,
                def.name,
                def.arity(),
                args.len()
            );
            return self.constant(CellError::Value);
        }
        let (name, volatile) = (def.name.to_string(), def.volatile);
        let deps = args.iter().map(|a| self.expr(a)).collect();
        self.push(
            Operation::Function {
                name,
                volatile,
                cell: Some(self.cell.clone()),
            },
            deps,
        )
    }
}

fn flatten_union<'e>(expr: &'e FormulaExpr, out: &mut Vec<&'e FormulaExpr>) {
    match expr {
        FormulaExpr::BinaryOp {
            op: BinaryOperator::Union,
            left,
            right,
        } => {
            flatten_union(left, out);
            flatten_union(right, out);
        }
        other => out.push(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::global_registry;
    use pretty_assertions::assert_eq;

    fn at(cell: &str) -> Reference {
        Reference::parse(cell).unwrap()
    }

    fn compile(cell: &str, formula: &str) -> Cell {
        Cell::compile(at(cell), formula, &global_registry()).unwrap()
    }

    #[test]
    fn test_literal_cell_is_one_constant() {
        let cell = Cell::new(at("'[b]s'!A1"), "42", &global_registry()).unwrap();
        assert_eq!(cell.output_key(), "'[B]S'!A1");
        assert_eq!(cell.fragments().len(), 1);
        assert_eq!(
            cell.fragments()[0].operation,
            Operation::Constant(Range::scalar(42.0))
        );
        assert!(cell.formula.is_none());

        let text = Cell::new(at("'[b]s'!A2"), "=", &global_registry()).unwrap();
        assert_eq!(text.fragments()[0].operation, Operation::Constant(Range::scalar("=")));
    }

    #[test]
    fn test_references_are_qualified() {
        let cell = compile("'[b]s'!A1", "=B1+other!C2");
        assert_eq!(cell.inputs(), vec!["'[B]S'!B1", "'[B]OTHER'!C2"]);
        let last = cell.fragments().last().unwrap();
        assert_eq!(last.key, "'[B]S'!A1");
        assert!(matches!(last.operation, Operation::Output { formula: true, .. }));
    }

    #[test]
    fn test_union_is_flattened() {
        let cell = compile("'[b]s'!A1", "=SUM((B1,C1,D1))");
        let union = cell
            .fragments()
            .iter()
            .find(|f| f.operation == Operation::Operator(BinaryOperator::Union))
            .unwrap();
        assert_eq!(union.dependencies.len(), 3);
    }

    #[test]
    fn test_unknown_function_and_bad_arity() {
        let cell = compile("'[b]s'!A1", "=NOPE(1)");
        assert_eq!(
            cell.fragments()[0].operation,
            Operation::Constant(Range::scalar(CellError::Name))
        );
        let cell = compile("'[b]s'!A1", "=ABS(1,2)");
        assert_eq!(
            cell.fragments()[0].operation,
            Operation::Constant(Range::scalar(CellError::Value))
        );
    }

    #[test]
    fn test_names_default_to_the_cell_book() {
        let cell = compile("'[b]s'!A1", "=REF");
        assert_eq!(
            cell.fragments()[0].operation,
            Operation::Name {
                book: Some("B".into()),
                name: "REF".into()
            }
        );
    }

    #[test]
    fn test_unqualified_cell_is_rejected() {
        assert!(Cell::compile(at("A1"), "=1", &global_registry()).is_err());
        assert!(Cell::compile(at("'[b]s'!A1"), "=1+", &global_registry()).is_err());
    }

    #[test]
    fn test_add_resolves_and_detects_duplicates() {
        let mut graph = Graph::new();
        let a1 = compile("'[b]s'!A1", "=B1*2");
        let out = a1.add(&mut graph).unwrap();
        assert_eq!(graph.id("'[B]S'!A1"), Some(out));
        let placeholder = graph.id("'[B]S'!B1").unwrap();
        assert_eq!(graph.node(placeholder).unwrap().operation, Operation::Input);

        let b1 = Cell::constant(at("'[b]s'!B1"), Range::scalar(4.0));
        assert_eq!(b1.add(&mut graph).unwrap(), placeholder);
        assert!(matches!(a1.add(&mut graph), Err(FormulaError::DuplicateNode(_))));
    }

    #[test]
    fn test_failed_add_leaves_graph_untouched() {
        let mut graph = Graph::new();
        Cell::constant(at("'[b]s'!A1"), Range::scalar(1.0))
            .add(&mut graph)
            .unwrap();
        let before = graph.len();

        let formula = compile("'[b]s'!A1", "=1+C1");
        assert!(matches!(
            formula.add(&mut graph),
            Err(FormulaError::DuplicateNode(key)) if key == "'[B]S'!A1"
        ));
        assert_eq!(graph.len(), before);
        assert_eq!(graph.id("'[B]S'!C1"), None);
    }
}
