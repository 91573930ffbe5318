//! Formula Abstract Syntax Tree types

use sheetcalc_core::{CellError, CellValue, Reference};

/// Formula expression AST
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaExpr {
    // === Literals ===
    /// Numeric literal
    Number(f64),
    /// String literal
    String(String),
    /// Boolean literal
    Boolean(bool),
    /// Error literal
    Error(CellError),
    /// Omitted function argument (`IF(A1,,2)`)
    Missing,

    // === References ===
    /// Cell, range, whole row/column or 3-D reference
    Reference(Reference),
    /// Defined name, optionally scoped to a workbook
    NameRef {
        book: Option<String>,
        name: String,
    },

    // === Operators ===
    /// Binary operation
    BinaryOp {
        op: BinaryOperator,
        left: Box<FormulaExpr>,
        right: Box<FormulaExpr>,
    },
    /// Unary operation
    UnaryOp {
        op: UnaryOperator,
        operand: Box<FormulaExpr>,
    },

    // === Function call ===
    Function {
        name: String,
        args: Vec<FormulaExpr>,
    },

    // === Array ===
    /// Array literal, rows of constants of equal length
    Array(Vec<Vec<CellValue>>),
}

impl FormulaExpr {
    /// Create a binary operation node
    pub fn binary(op: BinaryOperator, left: FormulaExpr, right: FormulaExpr) -> Self {
        FormulaExpr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Create a unary operation node
    pub fn unary(op: UnaryOperator, operand: FormulaExpr) -> Self {
        FormulaExpr::UnaryOp {
            op,
            operand: Box::new(operand),
        }
    }

    /// Check if this expression is a reference-valued leaf or reference operator
    pub fn is_reference(&self) -> bool {
        match self {
            FormulaExpr::Reference(_) | FormulaExpr::NameRef { .. } => true,
            FormulaExpr::BinaryOp { op, .. } => op.is_reference_operator(),
            _ => false,
        }
    }

    /// Visit every static reference in the tree, left to right
    pub fn references(&self) -> Vec<&Reference> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<&'a Reference>) {
        match self {
            FormulaExpr::Reference(r) => out.push(r),
            FormulaExpr::BinaryOp { left, right, .. } => {
                left.collect_references(out);
                right.collect_references(out);
            }
            FormulaExpr::UnaryOp { operand, .. } => operand.collect_references(out),
            FormulaExpr::Function { args, .. } => {
                for arg in args {
                    arg.collect_references(out);
                }
            }
            _ => {}
        }
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum BinaryOperator {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,

    // Comparison
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,

    // Text
    Concat,

    // Reference
    Range,
    Union,
    Intersect,
}

impl BinaryOperator {
    /// Check if the operator combines references rather than values
    pub fn is_reference_operator(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Range | BinaryOperator::Union | BinaryOperator::Intersect
        )
    }

    /// Formula text of the operator
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Power => "^",
            BinaryOperator::Equal => "=",
            BinaryOperator::NotEqual => "<>",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessEqual => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterEqual => ">=",
            BinaryOperator::Concat => "&",
            BinaryOperator::Range => ":",
            BinaryOperator::Union => ",",
            BinaryOperator::Intersect => " ",
        }
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum UnaryOperator {
    Negate,
    Percent,
}
