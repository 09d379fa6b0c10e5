//! Math functions

use super::{required, scalar_number};
use crate::error::FormulaResult;
use crate::evaluator::{EvaluationContext, FormulaValue};
use magic_sheets_core::CellError;

/// Numbers across all arguments, arrays flattened
///
/// Text, booleans and blanks are skipped. The first error value found is
/// returned instead.
fn collect_numbers(args: &[FormulaValue]) -> Result<Vec<f64>, CellError> {
    let mut numbers = Vec::new();
    for value in args.iter().flat_map(FormulaValue::scalars) {
        match value {
            FormulaValue::Number(n) => numbers.push(*n),
            FormulaValue::Error(e) => return Err(*e),
            _ => {}
        }
    }
    Ok(numbers)
}

fn number_or_error(value: f64) -> FormulaValue {
    if value.is_finite() {
        FormulaValue::Number(value)
    } else {
        FormulaValue::Error(CellError::Num)
    }
}

/// SUM function
pub fn fn_sum(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(match collect_numbers(args) {
        Ok(numbers) => number_or_error(numbers.iter().sum()),
        Err(e) => FormulaValue::Error(e),
    })
}

/// AVERAGE function
pub fn fn_average(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(match collect_numbers(args) {
        Ok(numbers) if numbers.is_empty() => FormulaValue::Error(CellError::Div0),
        Ok(numbers) => number_or_error(numbers.iter().sum::<f64>() / numbers.len() as f64),
        Err(e) => FormulaValue::Error(e),
    })
}

/// MIN function; zero when nothing numeric was given
pub fn fn_min(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(match collect_numbers(args) {
        Ok(numbers) => FormulaValue::Number(numbers.into_iter().reduce(f64::min).unwrap_or(0.0)),
        Err(e) => FormulaValue::Error(e),
    })
}

/// MAX function; zero when nothing numeric was given
pub fn fn_max(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(match collect_numbers(args) {
        Ok(numbers) => FormulaValue::Number(numbers.into_iter().reduce(f64::max).unwrap_or(0.0)),
        Err(e) => FormulaValue::Error(e),
    })
}

/// PRODUCT function
pub fn fn_product(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(match collect_numbers(args) {
        Ok(numbers) if numbers.is_empty() => FormulaValue::Number(0.0),
        Ok(numbers) => number_or_error(numbers.iter().product()),
        Err(e) => FormulaValue::Error(e),
    })
}

/// COUNT function: numeric values only, errors are not counted
pub fn fn_count(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let count = args
        .iter()
        .flat_map(FormulaValue::scalars)
        .filter(|v| matches!(v, FormulaValue::Number(_)))
        .count();
    Ok(FormulaValue::Number(count as f64))
}

/// COUNTA function: every non-blank value, errors included
pub fn fn_counta(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let count = args
        .iter()
        .flat_map(FormulaValue::scalars)
        .filter(|v| !matches!(v, FormulaValue::Empty))
        .count();
    Ok(FormulaValue::Number(count as f64))
}

/// ABS(number)
pub fn fn_abs(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(match scalar_number(required(args, 0, "ABS")?) {
        Ok(n) => FormulaValue::Number(n.abs()),
        Err(e) => e,
    })
}

/// ROUND(number, [num_digits]) - round half away from zero
pub fn fn_round(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let number = match scalar_number(required(args, 0, "ROUND")?) {
        Ok(n) => n,
        Err(e) => return Ok(e),
    };
    let digits = match args.get(1).map(scalar_number) {
        Some(Ok(d)) => d.trunc() as i32,
        Some(Err(e)) => return Ok(e),
        None => 0,
    };

    let multiplier = 10_f64.powi(digits);
    let result = if number >= 0.0 {
        (number * multiplier + 0.5).floor() / multiplier
    } else {
        (number * multiplier - 0.5).ceil() / multiplier
    };

    Ok(number_or_error(result))
}

/// INT(number) - rounds toward negative infinity
pub fn fn_int(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(match scalar_number(required(args, 0, "INT")?) {
        Ok(n) => FormulaValue::Number(n.floor()),
        Err(e) => e,
    })
}

/// MOD(number, divisor) - result takes the sign of the divisor
pub fn fn_mod(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let number = match scalar_number(required(args, 0, "MOD")?) {
        Ok(n) => n,
        Err(e) => return Ok(e),
    };
    let divisor = match scalar_number(required(args, 1, "MOD")?) {
        Ok(n) => n,
        Err(e) => return Ok(e),
    };

    if divisor == 0.0 {
        return Ok(FormulaValue::Error(CellError::Div0));
    }

    Ok(number_or_error(number - divisor * (number / divisor).floor()))
}

/// POWER(number, power)
pub fn fn_power(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let base = match scalar_number(required(args, 0, "POWER")?) {
        Ok(n) => n,
        Err(e) => return Ok(e),
    };
    let exponent = match scalar_number(required(args, 1, "POWER")?) {
        Ok(n) => n,
        Err(e) => return Ok(e),
    };

    if base == 0.0 && exponent < 0.0 {
        return Ok(FormulaValue::Error(CellError::Div0));
    }

    Ok(number_or_error(base.powf(exponent)))
}

/// SQRT(number)
pub fn fn_sqrt(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(match scalar_number(required(args, 0, "SQRT")?) {
        Ok(n) if n < 0.0 => FormulaValue::Error(CellError::Num),
        Ok(n) => FormulaValue::Number(n.sqrt()),
        Err(e) => e,
    })
}
