//! Built-in spreadsheet functions

pub mod logical;
pub mod math;
pub mod text;

use crate::error::{FormulaError, FormulaResult};
use crate::evaluator::{EvaluationContext, FormulaValue};
use ahash::AHashMap;
use magic_sheets_core::CellError;

/// Function implementation signature
pub type FunctionImpl = fn(&[FormulaValue], &EvaluationContext) -> FormulaResult<FormulaValue>;

/// Function definition
#[derive(Clone, Copy)]
pub struct FunctionDef {
    /// Function name (uppercase)
    pub name: &'static str,
    /// Minimum arguments
    pub min_args: usize,
    /// Maximum arguments (None = unlimited)
    pub max_args: Option<usize>,
    /// Implementation
    pub implementation: FunctionImpl,
}

impl FunctionDef {
    /// Describe a function
    pub const fn new(
        name: &'static str,
        min_args: usize,
        max_args: Option<usize>,
        implementation: FunctionImpl,
    ) -> Self {
        Self {
            name,
            min_args,
            max_args,
            implementation,
        }
    }
}

impl std::fmt::Debug for FunctionDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionDef")
            .field("name", &self.name)
            .field("min_args", &self.min_args)
            .field("max_args", &self.max_args)
            .finish()
    }
}

const BUILTINS: &[FunctionDef] = &[
    // Math
    FunctionDef::new("SUM", 1, None, math::fn_sum),
    FunctionDef::new("AVERAGE", 1, None, math::fn_average),
    FunctionDef::new("MIN", 1, None, math::fn_min),
    FunctionDef::new("MAX", 1, None, math::fn_max),
    FunctionDef::new("COUNT", 1, None, math::fn_count),
    FunctionDef::new("COUNTA", 1, None, math::fn_counta),
    FunctionDef::new("PRODUCT", 1, None, math::fn_product),
    FunctionDef::new("ABS", 1, Some(1), math::fn_abs),
    FunctionDef::new("ROUND", 1, Some(2), math::fn_round),
    FunctionDef::new("INT", 1, Some(1), math::fn_int),
    FunctionDef::new("MOD", 2, Some(2), math::fn_mod),
    FunctionDef::new("POWER", 2, Some(2), math::fn_power),
    FunctionDef::new("SQRT", 1, Some(1), math::fn_sqrt),
    // Logical
    FunctionDef::new("IF", 2, Some(3), logical::fn_if),
    FunctionDef::new("AND", 1, None, logical::fn_and),
    FunctionDef::new("OR", 1, None, logical::fn_or),
    FunctionDef::new("NOT", 1, Some(1), logical::fn_not),
    FunctionDef::new("IFERROR", 2, Some(2), logical::fn_iferror),
    // Text
    FunctionDef::new("CONCAT", 1, None, text::fn_concat),
    FunctionDef::new("CONCATENATE", 1, None, text::fn_concat),
    FunctionDef::new("LEN", 1, Some(1), text::fn_len),
    FunctionDef::new("UPPER", 1, Some(1), text::fn_upper),
    FunctionDef::new("LOWER", 1, Some(1), text::fn_lower),
    FunctionDef::new("TRIM", 1, Some(1), text::fn_trim),
    FunctionDef::new("LEFT", 1, Some(2), text::fn_left),
    FunctionDef::new("RIGHT", 1, Some(2), text::fn_right),
];

/// Function registry
///
/// Each [`FormulaEngine`](crate::FormulaEngine) owns one, so callers can
/// register extra functions without affecting other engines.
#[derive(Debug, Clone)]
pub struct FunctionRegistry {
    functions: AHashMap<String, FunctionDef>,
}

impl FunctionRegistry {
    /// Create a new registry with all built-in functions
    pub fn new() -> Self {
        let mut registry = Self::empty();
        for def in BUILTINS {
            registry.register(*def);
        }
        registry
    }

    /// Create a registry with no functions
    pub fn empty() -> Self {
        Self {
            functions: AHashMap::new(),
        }
    }

    /// Look up a function by name
    pub fn get(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(&name.to_uppercase())
    }

    /// Register a function, replacing any previous definition of that name
    pub fn register(&mut self, def: FunctionDef) {
        self.functions.insert(def.name.to_uppercase(), def);
    }

    /// Sorted names of every registered function
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.functions.values().map(|def| def.name).collect();
        names.sort_unstable();
        names
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Argument `index`, or an argument error naming the function
pub(crate) fn required<'a>(
    args: &'a [FormulaValue],
    index: usize,
    function: &str,
) -> FormulaResult<&'a FormulaValue> {
    args.get(index).ok_or_else(|| {
        FormulaError::Argument(format!("{} is missing argument {}", function, index + 1))
    })
}

/// Numeric coercion shared by single-value functions
///
/// `Err` carries the error value the function should return as-is.
pub(crate) fn scalar_number(value: &FormulaValue) -> Result<f64, FormulaValue> {
    match value {
        FormulaValue::Number(n) => Ok(*n),
        FormulaValue::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
        FormulaValue::Empty => Ok(0.0),
        FormulaValue::Error(e) => Err(FormulaValue::Error(*e)),
        FormulaValue::String(s) => s
            .trim()
            .parse()
            .map_err(|_| FormulaValue::Error(CellError::Value)),
        FormulaValue::Array(_) => Err(FormulaValue::Error(CellError::Value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_lookup_is_case_insensitive() {
        let registry = FunctionRegistry::new();
        assert!(registry.get("sum").is_some());
        assert!(registry.get("Concatenate").is_some());
        assert!(registry.get("VLOOKUP").is_none());
    }

    #[test]
    fn test_register_custom_function() {
        fn fn_answer(_: &[FormulaValue], _: &EvaluationContext) -> FormulaResult<FormulaValue> {
            Ok(FormulaValue::Number(42.0))
        }

        let mut registry = FunctionRegistry::empty();
        registry.register(FunctionDef::new("ANSWER", 0, Some(0), fn_answer));
        assert_eq!(registry.names(), vec!["ANSWER"]);
    }
}
