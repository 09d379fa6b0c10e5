//! Logical functions

use super::required;
use crate::error::FormulaResult;
use crate::evaluator::{EvaluationContext, FormulaValue};
use magic_sheets_core::CellError;

/// Truth values across all arguments; text and blanks inside arrays are skipped
fn collect_bools(args: &[FormulaValue]) -> Result<Vec<bool>, CellError> {
    let mut values = Vec::new();
    for arg in args {
        match arg {
            FormulaValue::Array(rows) => {
                for cell in rows.iter().flatten() {
                    match cell {
                        FormulaValue::Error(e) => return Err(*e),
                        FormulaValue::Boolean(b) => values.push(*b),
                        FormulaValue::Number(n) => values.push(*n != 0.0),
                        _ => {}
                    }
                }
            }
            FormulaValue::Error(e) => return Err(*e),
            other => values.push(other.as_bool().ok_or(CellError::Value)?),
        }
    }
    Ok(values)
}

/// IF(condition, if_true, [if_false])
pub fn fn_if(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let condition = required(args, 0, "IF")?;
    let if_true = required(args, 1, "IF")?;

    let condition = match condition {
        FormulaValue::Error(e) => return Ok(FormulaValue::Error(*e)),
        other => match other.as_bool() {
            Some(b) => b,
            None => return Ok(FormulaValue::Error(CellError::Value)),
        },
    };

    if condition {
        Ok(if_true.clone())
    } else {
        Ok(args.get(2).cloned().unwrap_or(FormulaValue::Boolean(false)))
    }
}

/// AND function
pub fn fn_and(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(match collect_bools(args) {
        Ok(values) if values.is_empty() => FormulaValue::Error(CellError::Value),
        Ok(values) => FormulaValue::Boolean(values.into_iter().all(|b| b)),
        Err(e) => FormulaValue::Error(e),
    })
}

/// OR function
pub fn fn_or(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(match collect_bools(args) {
        Ok(values) if values.is_empty() => FormulaValue::Error(CellError::Value),
        Ok(values) => FormulaValue::Boolean(values.into_iter().any(|b| b)),
        Err(e) => FormulaValue::Error(e),
    })
}

/// NOT function
pub fn fn_not(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(match required(args, 0, "NOT")? {
        FormulaValue::Error(e) => FormulaValue::Error(*e),
        other => match other.as_bool() {
            Some(b) => FormulaValue::Boolean(!b),
            None => FormulaValue::Error(CellError::Value),
        },
    })
}

/// IFERROR(value, value_if_error)
pub fn fn_iferror(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let value = required(args, 0, "IFERROR")?;
    let fallback = required(args, 1, "IFERROR")?;

    if value.is_error() {
        Ok(fallback.clone())
    } else {
        Ok(value.clone())
    }
}
