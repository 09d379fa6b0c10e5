//! Text functions

use super::{required, scalar_number};
use crate::error::FormulaResult;
use crate::evaluator::{EvaluationContext, FormulaValue};
use magic_sheets_core::CellError;

/// Text of a single-value argument, or the error value to return
fn scalar_text(value: &FormulaValue) -> Result<String, FormulaValue> {
    match value {
        FormulaValue::Error(e) => Err(FormulaValue::Error(*e)),
        FormulaValue::Array(_) => Err(FormulaValue::Error(CellError::Value)),
        other => Ok(other.as_string()),
    }
}

/// Optional character count argument, defaulting to one
fn char_count(args: &[FormulaValue]) -> Result<usize, FormulaValue> {
    match args.get(1) {
        None => Ok(1),
        Some(v) => {
            let n = scalar_number(v)?;
            if n < 0.0 {
                Err(FormulaValue::Error(CellError::Value))
            } else {
                Ok(n.trunc() as usize)
            }
        }
    }
}

fn map_text(
    args: &[FormulaValue],
    name: &str,
    f: impl FnOnce(String) -> FormulaValue,
) -> FormulaResult<FormulaValue> {
    Ok(match scalar_text(required(args, 0, name)?) {
        Ok(text) => f(text),
        Err(e) => e,
    })
}

/// CONCAT(text1, [text2], ...), also registered as CONCATENATE
pub fn fn_concat(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let mut out = String::new();
    for value in args.iter().flat_map(FormulaValue::scalars) {
        if let FormulaValue::Error(e) = value {
            return Ok(FormulaValue::Error(*e));
        }
        out.push_str(&value.as_string());
    }
    Ok(FormulaValue::String(out))
}

/// LEN(text) in characters
pub fn fn_len(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    map_text(args, "LEN", |s| FormulaValue::Number(s.chars().count() as f64))
}

pub fn fn_upper(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    map_text(args, "UPPER", |s| FormulaValue::String(s.to_uppercase()))
}

pub fn fn_lower(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    map_text(args, "LOWER", |s| FormulaValue::String(s.to_lowercase()))
}

/// TRIM(text) - strips ends and collapses inner runs of spaces
pub fn fn_trim(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    map_text(args, "TRIM", |s| {
        FormulaValue::String(s.split_whitespace().collect::<Vec<_>>().join(" "))
    })
}

/// LEFT(text, [num_chars])
pub fn fn_left(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let count = match char_count(args) {
        Ok(n) => n,
        Err(e) => return Ok(e),
    };
    map_text(args, "LEFT", |s| {
        FormulaValue::String(s.chars().take(count).collect())
    })
}

/// RIGHT(text, [num_chars])
pub fn fn_right(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let count = match char_count(args) {
        Ok(n) => n,
        Err(e) => return Ok(e),
    };
    map_text(args, "RIGHT", |s| {
        let skip = s.chars().count().saturating_sub(count);
        FormulaValue::String(s.chars().skip(skip).collect())
    })
}
