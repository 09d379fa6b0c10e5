//! Formula evaluator
//!
//! Evaluates formula ASTs to produce values. Cell lookups go through the
//! [`CellSource`] trait so the evaluator never depends on how the engine
//! stores its mirror of the sheet.

use crate::ast::{BinaryOperator, FormulaExpr, UnaryOperator};
use crate::error::{FormulaError, FormulaResult};
use crate::functions::FunctionRegistry;
use magic_sheets_core::{CellAddress, CellError, CellRange, CellValue, Grid};
use std::cmp::Ordering;

/// Largest range a single reference may expand to
pub const MAX_RANGE_CELLS: u64 = 1_000_000;

/// Value types during formula evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaValue {
    Number(f64),
    String(String),
    Boolean(bool),
    Error(CellError),
    Array(Vec<Vec<FormulaValue>>),
    Empty,
}

impl FormulaValue {
    /// Convert to number, if possible
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FormulaValue::Number(n) => Some(*n),
            FormulaValue::Boolean(true) => Some(1.0),
            FormulaValue::Boolean(false) => Some(0.0),
            FormulaValue::String(s) => s.trim().parse().ok(),
            FormulaValue::Empty => Some(0.0),
            _ => None,
        }
    }

    /// Force conversion to number for arithmetic
    pub fn to_number(&self) -> FormulaResult<f64> {
        self.as_number()
            .ok_or_else(|| FormulaError::Evaluation(format!("Cannot convert {:?} to number", self)))
    }

    /// Convert to boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FormulaValue::Boolean(b) => Some(*b),
            FormulaValue::Number(n) => Some(*n != 0.0),
            FormulaValue::Empty => Some(false),
            FormulaValue::String(s) => match s.to_uppercase().as_str() {
                "TRUE" => Some(true),
                "FALSE" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Convert to string
    pub fn as_string(&self) -> String {
        match self {
            FormulaValue::Number(n) => CellValue::Number(*n).to_string(),
            FormulaValue::String(s) => s.clone(),
            FormulaValue::Boolean(true) => "TRUE".to_string(),
            FormulaValue::Boolean(false) => "FALSE".to_string(),
            FormulaValue::Error(e) => e.to_string(),
            FormulaValue::Empty => String::new(),
            FormulaValue::Array(_) => CellError::Value.to_string(),
        }
    }

    /// Check if this is an error
    pub fn is_error(&self) -> bool {
        matches!(self, FormulaValue::Error(_))
    }

    /// Get the error if this is one
    pub fn get_error(&self) -> Option<CellError> {
        match self {
            FormulaValue::Error(e) => Some(*e),
            _ => None,
        }
    }

    /// Iterate over scalar values, flattening arrays in row order
    pub fn scalars(&self) -> Box<dyn Iterator<Item = &FormulaValue> + '_> {
        match self {
            FormulaValue::Array(rows) => Box::new(rows.iter().flatten()),
            other => Box::new(std::iter::once(other)),
        }
    }
}

impl From<&CellValue> for FormulaValue {
    fn from(value: &CellValue) -> Self {
        match value {
            CellValue::Empty => FormulaValue::Empty,
            CellValue::Number(n) => FormulaValue::Number(*n),
            CellValue::String(s) => FormulaValue::String(s.as_str().to_string()),
            CellValue::Boolean(b) => FormulaValue::Boolean(*b),
            CellValue::Error(e) => FormulaValue::Error(*e),
            CellValue::Formula { cached_value, .. } => cached_value
                .as_deref()
                .map(FormulaValue::from)
                .unwrap_or(FormulaValue::Empty),
        }
    }
}

impl From<FormulaValue> for CellValue {
    fn from(value: FormulaValue) -> Self {
        match value {
            FormulaValue::Empty => CellValue::Empty,
            FormulaValue::Number(n) if !n.is_finite() => CellValue::Error(CellError::Num),
            FormulaValue::Number(n) => CellValue::Number(n),
            FormulaValue::String(s) => CellValue::string(s),
            FormulaValue::Boolean(b) => CellValue::Boolean(b),
            FormulaValue::Error(e) => CellValue::Error(e),
            // A single-cell array collapses to its only element
            FormulaValue::Array(rows) => match rows.as_slice() {
                [row] if row.len() == 1 => row[0].clone().into(),
                _ => CellValue::Error(CellError::Value),
            },
        }
    }
}

/// Where the evaluator reads referenced cells from
pub trait CellSource {
    /// Current value of a cell; `Empty` when unset
    fn cell_value(&self, row: u32, col: u32) -> FormulaValue;
}

impl CellSource for Grid {
    fn cell_value(&self, row: u32, col: u32) -> FormulaValue {
        self.value_at(row, col).into()
    }
}

/// Context for formula evaluation
pub struct EvaluationContext<'a> {
    /// Cell lookups
    pub source: &'a dyn CellSource,
    /// Functions callable from formulas
    pub functions: &'a FunctionRegistry,
    /// Cell whose formula is being evaluated
    pub current: CellAddress,
}

impl<'a> EvaluationContext<'a> {
    /// Create a new evaluation context
    pub fn new(
        source: &'a dyn CellSource,
        functions: &'a FunctionRegistry,
        current: CellAddress,
    ) -> Self {
        Self {
            source,
            functions,
            current,
        }
    }

    /// Get a cell value
    pub fn get_cell_value(&self, addr: CellAddress) -> FormulaValue {
        self.source.cell_value(addr.row, addr.col)
    }

    /// Get a range of cell values as an array
    pub fn get_range_values(&self, range: &CellRange) -> FormulaValue {
        if range.cell_count() > MAX_RANGE_CELLS {
            return FormulaValue::Error(CellError::Ref);
        }

        let rows = (range.start.row..=range.end.row)
            .map(|row| {
                (range.start.col..=range.end.col)
                    .map(|col| self.source.cell_value(row, col))
                    .collect()
            })
            .collect();

        FormulaValue::Array(rows)
    }
}

/// Evaluate a formula expression
pub fn evaluate(expr: &FormulaExpr, ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    match expr {
        // === Literals ===
        FormulaExpr::Number(n) => Ok(FormulaValue::Number(*n)),
        FormulaExpr::String(s) => Ok(FormulaValue::String(s.clone())),
        FormulaExpr::Boolean(b) => Ok(FormulaValue::Boolean(*b)),
        FormulaExpr::Error(e) => Ok(FormulaValue::Error(*e)),

        // === References ===
        FormulaExpr::CellRef(addr) => Ok(ctx.get_cell_value(*addr)),
        FormulaExpr::RangeRef(range) => Ok(ctx.get_range_values(range)),

        // No defined names exist, so every bare name is unresolved
        FormulaExpr::NameRef(_) => Ok(FormulaValue::Error(CellError::Name)),

        // === Operators ===
        FormulaExpr::BinaryOp { op, left, right } => evaluate_binary_op(*op, left, right, ctx),
        FormulaExpr::UnaryOp { op, operand } => evaluate_unary_op(*op, operand, ctx),

        // === Functions ===
        FormulaExpr::Function { name, args } => evaluate_function(name, args, ctx),

        // === Arrays ===
        FormulaExpr::Array(rows) => {
            let mut result_rows = Vec::with_capacity(rows.len());
            for row in rows {
                let values = row
                    .iter()
                    .map(|expr| evaluate(expr, ctx))
                    .collect::<FormulaResult<Vec<_>>>()?;
                result_rows.push(values);
            }
            Ok(FormulaValue::Array(result_rows))
        }
    }
}

fn operand_number(value: &FormulaValue) -> FormulaResult<f64> {
    value
        .as_number()
        .ok_or_else(|| FormulaError::Evaluation(format!("Expected number, got {:?}", value)))
}

/// Evaluate a binary operation
fn evaluate_binary_op(
    op: BinaryOperator,
    left: &FormulaExpr,
    right: &FormulaExpr,
    ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    let left_val = evaluate(left, ctx)?;
    let right_val = evaluate(right, ctx)?;

    // Propagate errors
    if let Some(e) = left_val.get_error() {
        return Ok(FormulaValue::Error(e));
    }
    if let Some(e) = right_val.get_error() {
        return Ok(FormulaValue::Error(e));
    }

    let number = |value: f64| {
        if value.is_finite() {
            FormulaValue::Number(value)
        } else {
            FormulaValue::Error(CellError::Num)
        }
    };

    match op {
        BinaryOperator::Add => Ok(number(operand_number(&left_val)? + operand_number(&right_val)?)),
        BinaryOperator::Subtract => {
            Ok(number(operand_number(&left_val)? - operand_number(&right_val)?))
        }
        BinaryOperator::Multiply => {
            Ok(number(operand_number(&left_val)? * operand_number(&right_val)?))
        }
        BinaryOperator::Divide => {
            let l = operand_number(&left_val)?;
            let r = operand_number(&right_val)?;
            if r == 0.0 {
                Ok(FormulaValue::Error(CellError::Div0))
            } else {
                Ok(number(l / r))
            }
        }
        BinaryOperator::Power => Ok(number(
            operand_number(&left_val)?.powf(operand_number(&right_val)?),
        )),

        BinaryOperator::Equal => Ok(FormulaValue::Boolean(
            compare_values(&left_val, &right_val) == Ordering::Equal,
        )),
        BinaryOperator::NotEqual => Ok(FormulaValue::Boolean(
            compare_values(&left_val, &right_val) != Ordering::Equal,
        )),
        BinaryOperator::LessThan => Ok(FormulaValue::Boolean(
            compare_values(&left_val, &right_val) == Ordering::Less,
        )),
        BinaryOperator::LessEqual => Ok(FormulaValue::Boolean(
            compare_values(&left_val, &right_val) != Ordering::Greater,
        )),
        BinaryOperator::GreaterThan => Ok(FormulaValue::Boolean(
            compare_values(&left_val, &right_val) == Ordering::Greater,
        )),
        BinaryOperator::GreaterEqual => Ok(FormulaValue::Boolean(
            compare_values(&left_val, &right_val) != Ordering::Less,
        )),

        BinaryOperator::Concat => Ok(FormulaValue::String(
            left_val.as_string() + &right_val.as_string(),
        )),
    }
}

/// Compare two values for ordering
///
/// Empty compares as zero against numbers and as `""` against text. Across
/// types, numbers sort before text and text before booleans. Text compares
/// case-insensitively.
pub fn compare_values(left: &FormulaValue, right: &FormulaValue) -> Ordering {
    use FormulaValue::*;

    match (left, right) {
        (Empty, Empty) => Ordering::Equal,
        (Empty, Number(_)) => compare_values(&Number(0.0), right),
        (Number(_), Empty) => compare_values(left, &Number(0.0)),
        (Empty, String(_)) => compare_values(&String(std::string::String::new()), right),
        (String(_), Empty) => compare_values(left, &String(std::string::String::new())),
        (Empty, Boolean(_)) => compare_values(&Boolean(false), right),
        (Boolean(_), Empty) => compare_values(left, &Boolean(false)),

        (Number(l), Number(r)) => l.partial_cmp(r).unwrap_or(Ordering::Equal),
        (String(l), String(r)) => l.to_lowercase().cmp(&r.to_lowercase()),
        (Boolean(l), Boolean(r)) => l.cmp(r),

        (Number(_), String(_) | Boolean(_)) => Ordering::Less,
        (String(_), Number(_)) => Ordering::Greater,
        (String(_), Boolean(_)) => Ordering::Less,
        (Boolean(_), Number(_) | String(_)) => Ordering::Greater,

        (Error(l), Error(r)) => l.code().cmp(&r.code()),

        _ => Ordering::Equal,
    }
}

/// Evaluate a unary operation
fn evaluate_unary_op(
    op: UnaryOperator,
    operand: &FormulaExpr,
    ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    let val = evaluate(operand, ctx)?;

    if let Some(e) = val.get_error() {
        return Ok(FormulaValue::Error(e));
    }

    let n = operand_number(&val)?;
    match op {
        UnaryOperator::Negate => Ok(FormulaValue::Number(-n)),
        UnaryOperator::Percent => Ok(FormulaValue::Number(n / 100.0)),
    }
}

/// Evaluate a function call
fn evaluate_function(
    name: &str,
    args: &[FormulaExpr],
    ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    let func = ctx
        .functions
        .get(name)
        .ok_or_else(|| FormulaError::UnknownFunction(name.to_string()))?;

    if args.len() < func.min_args {
        return Err(FormulaError::ArgumentCount {
            function: name.to_string(),
            expected: format!("at least {}", func.min_args),
            actual: args.len(),
        });
    }

    if let Some(max) = func.max_args {
        if args.len() > max {
            return Err(FormulaError::ArgumentCount {
                function: name.to_string(),
                expected: format!("at most {}", max),
                actual: args.len(),
            });
        }
    }

    let evaluated_args = args
        .iter()
        .map(|arg| evaluate(arg, ctx))
        .collect::<FormulaResult<Vec<_>>>()?;

    (func.implementation)(&evaluated_args, ctx)
}
