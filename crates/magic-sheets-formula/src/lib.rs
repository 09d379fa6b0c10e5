//! # magic-sheets-formula
//!
//! Formula parser and evaluator for magic-sheets.
//!
//! This crate provides:
//! - Formula parsing (text → AST)
//! - Formula evaluation (AST → value)
//! - A small library of built-in functions
//! - Dependency tracking and the incremental [`FormulaEngine`]
//!
//! ## Example
//!
//! ```rust
//! use magic_sheets_core::{CellAddress, CellValue};
//! use magic_sheets_formula::FormulaEngine;
//!
//! let mut engine = FormulaEngine::new();
//! engine.set_contents(CellAddress::new(0, 0), "5");
//! engine.set_contents(CellAddress::new(0, 1), "=A1*2");
//! assert_eq!(engine.value(CellAddress::new(0, 1)), CellValue::Number(10.0));
//! ```

pub mod ast;
pub mod dependency;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod parser;

pub use ast::{BinaryOperator, FormulaExpr, UnaryOperator};
pub use engine::{FormulaEngine, RecalcStats};
pub use error::{FormulaError, FormulaResult};
pub use evaluator::{evaluate, CellSource, EvaluationContext, FormulaValue};
pub use functions::{FunctionDef, FunctionRegistry};
pub use parser::parse_formula;
