//! Formula Abstract Syntax Tree types

use magic_sheets_core::{CellAddress, CellError, CellRange};

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

    // === References ===
    /// Single cell reference
    CellRef(CellAddress),
    /// Range reference
    RangeRef(CellRange),
    /// Bare identifier that is neither a function nor a reference
    NameRef(String),

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
    Array(Vec<Vec<FormulaExpr>>),
}

impl FormulaExpr {
    /// Every cell this expression reads, ranges expanded
    pub fn references(&self) -> Vec<CellAddress> {
        let mut refs = Vec::new();
        self.collect_references(&mut refs);
        refs
    }

    /// Number of cells [`references`](Self::references) would return
    pub fn reference_count(&self) -> u64 {
        match self {
            FormulaExpr::CellRef(_) => 1,
            FormulaExpr::RangeRef(range) => range.cell_count(),
            FormulaExpr::BinaryOp { left, right, .. } => {
                left.reference_count() + right.reference_count()
            }
            FormulaExpr::UnaryOp { operand, .. } => operand.reference_count(),
            FormulaExpr::Function { args, .. } => args.iter().map(Self::reference_count).sum(),
            FormulaExpr::Array(rows) => rows.iter().flatten().map(Self::reference_count).sum(),
            _ => 0,
        }
    }

    fn collect_references(&self, refs: &mut Vec<CellAddress>) {
        match self {
            FormulaExpr::CellRef(addr) => refs.push(*addr),
            FormulaExpr::RangeRef(range) => refs.extend(range.cells()),
            FormulaExpr::BinaryOp { left, right, .. } => {
                left.collect_references(refs);
                right.collect_references(refs);
            }
            FormulaExpr::UnaryOp { operand, .. } => operand.collect_references(refs),
            FormulaExpr::Function { args, .. } => {
                for arg in args {
                    arg.collect_references(refs);
                }
            }
            FormulaExpr::Array(rows) => {
                for cell in rows.iter().flatten() {
                    cell.collect_references(refs);
                }
            }
            FormulaExpr::Number(_)
            | FormulaExpr::String(_)
            | FormulaExpr::Boolean(_)
            | FormulaExpr::Error(_)
            | FormulaExpr::NameRef(_) => {}
        }
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
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
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Negate,
    Percent,
}
