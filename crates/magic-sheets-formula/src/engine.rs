//! Incremental formula engine
//!
//! The engine keeps its own mirror of the sheet: raw contents plus the last
//! computed value of every formula cell. Each edit updates the dependency
//! graph and recalculates only the edited cell and its transitive
//! dependents, in topological order.
//!
//! Failures never escape as `Err`. They are stored as cell error values:
//!
//! | Failure                               | Cached value |
//! |---------------------------------------|--------------|
//! | unparseable formula, unknown function | `#NAME?`     |
//! | circular reference, oversized range   | `#REF!`      |
//! | any other evaluation failure          | `#VALUE!`    |

use crate::ast::FormulaExpr;
use crate::dependency::DependencyGraph;
use crate::error::FormulaError;
use crate::evaluator::{evaluate, EvaluationContext, FormulaValue, MAX_RANGE_CELLS};
use crate::functions::FunctionRegistry;
use crate::parser::parse_formula;
use ahash::AHashMap;
use magic_sheets_core::{CellAddress, CellError, CellValue, Grid};
use tracing::{debug, trace};

/// Statistics from a recalculation run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecalcStats {
    /// Formula cells evaluated
    pub cells_calculated: usize,
    /// Formula cells that ended in an error value
    pub errors: usize,
    /// Formula cells found on a reference cycle
    pub circular_references: usize,
}

impl RecalcStats {
    fn record(&mut self, value: &CellValue) {
        self.cells_calculated += 1;
        if value.is_error() {
            self.errors += 1;
        }
    }
}

/// Formula engine holding a sheet mirror, its dependency graph and functions
#[derive(Debug, Default)]
pub struct FormulaEngine {
    cells: Grid,
    graph: DependencyGraph,
    parsed: AHashMap<CellAddress, FormulaExpr>,
    functions: FunctionRegistry,
}

impl FormulaEngine {
    /// Create an empty engine with the built-in functions
    pub fn new() -> Self {
        Self::with_functions(FunctionRegistry::new())
    }

    /// Create an empty engine with a custom function registry
    pub fn with_functions(functions: FunctionRegistry) -> Self {
        Self {
            cells: Grid::new(),
            graph: DependencyGraph::new(),
            parsed: AHashMap::new(),
            functions,
        }
    }

    /// Functions callable from formulas
    pub fn functions_mut(&mut self) -> &mut FunctionRegistry {
        &mut self.functions
    }

    /// Set a cell from raw editor input and recalculate what depends on it
    ///
    /// Input starting with `=` is a formula; anything else is classified
    /// by [`CellValue::from_input`].
    pub fn set_contents(&mut self, addr: CellAddress, raw: &str) -> RecalcStats {
        self.set_value(addr, CellValue::from_input(raw))
    }

    /// Set a cell to a value (or a formula) and recalculate what depends on it
    pub fn set_value(&mut self, addr: CellAddress, value: CellValue) -> RecalcStats {
        self.graph.clear_precedents(addr);
        self.parsed.remove(&addr);

        let value = match value {
            CellValue::Formula { text, .. } => self.install_formula(addr, text),
            other => other,
        };
        self.cells.set(addr.row, addr.col, value);

        let order = self.graph.get_recalc_order(&[addr]);
        let stats = self.recalculate(&order);
        trace!(cell = %addr, ?stats, "cell updated");
        stats
    }

    /// Clear a cell and recalculate its dependents
    pub fn remove(&mut self, addr: CellAddress) -> RecalcStats {
        self.set_value(addr, CellValue::Empty)
    }

    /// Effective value of a cell: the computed result for formulas
    pub fn value(&self, addr: CellAddress) -> CellValue {
        match self.cells.value(addr) {
            CellValue::Formula { cached_value, .. } => cached_value
                .as_deref()
                .cloned()
                .unwrap_or(CellValue::Empty),
            other => other.clone(),
        }
    }

    /// Raw contents of a cell, formulas included
    pub fn contents(&self, addr: CellAddress) -> &CellValue {
        self.cells.value(addr)
    }

    /// The engine's mirror of the sheet
    pub fn grid(&self) -> &Grid {
        &self.cells
    }

    /// Recalculate every formula cell
    pub fn recalculate_all(&mut self) -> RecalcStats {
        let formulas: Vec<CellAddress> = self
            .cells
            .iter()
            .filter(|(_, value)| value.is_formula())
            .map(|(addr, _)| addr)
            .collect();

        let order = self.graph.get_recalc_order(&formulas);
        let stats = self.recalculate(&order);
        debug!(formulas = formulas.len(), ?stats, "full recalculation");
        stats
    }

    /// Forget every cell
    pub fn clear(&mut self) {
        self.cells.clear();
        self.graph.clear();
        self.parsed.clear();
    }

    /// Parse a formula and wire its precedents into the graph
    ///
    /// Returns the cell contents to store. Formulas that cannot be parsed
    /// get their error value immediately and never enter the graph.
    fn install_formula(&mut self, addr: CellAddress, text: String) -> CellValue {
        let expr = match parse_formula(&text) {
            Ok(expr) => expr,
            Err(err) => {
                debug!(cell = %addr, formula = %text, error = %err, "formula rejected");
                return cached(text, CellValue::Error(CellError::Name));
            }
        };

        if expr.reference_count() > MAX_RANGE_CELLS {
            debug!(cell = %addr, formula = %text, "formula references too many cells");
            return cached(text, CellValue::Error(CellError::Ref));
        }

        for precedent in expr.references() {
            self.graph.add_dependency(precedent, addr);
        }
        self.parsed.insert(addr, expr);

        CellValue::formula(text)
    }

    fn recalculate(&mut self, order: &[CellAddress]) -> RecalcStats {
        let mut stats = RecalcStats::default();
        let cycle = self.graph.cycle_members(order);

        for &addr in order {
            let Some(expr) = self.parsed.get(&addr) else {
                continue;
            };

            let result = if cycle.contains(&addr) {
                stats.circular_references += 1;
                CellValue::Error(CellError::Ref)
            } else {
                let ctx = EvaluationContext::new(&self.cells, &self.functions, addr);
                match evaluate(expr, &ctx) {
                    // A formula pointing at a blank cell shows zero
                    Ok(FormulaValue::Empty) => CellValue::Number(0.0),
                    Ok(value) => value.into(),
                    Err(err) => {
                        trace!(cell = %addr, error = %err, "evaluation failed");
                        CellValue::Error(error_value(&err))
                    }
                }
            };

            stats.record(&result);
            if let Some(CellValue::Formula { cached_value, .. }) =
                self.cells.get_mut(addr.row, addr.col)
            {
                *cached_value = Some(Box::new(result));
            }
        }

        if stats.circular_references > 0 {
            debug!(count = stats.circular_references, "circular references detected");
        }

        stats
    }
}

fn cached(text: String, value: CellValue) -> CellValue {
    CellValue::Formula {
        text,
        cached_value: Some(Box::new(value)),
    }
}

fn error_value(err: &FormulaError) -> CellError {
    match err {
        FormulaError::Parse(_) | FormulaError::UnknownFunction(_) => CellError::Name,
        FormulaError::CircularReference(_) => CellError::Ref,
        FormulaError::Evaluation(_)
        | FormulaError::Argument(_)
        | FormulaError::ArgumentCount { .. } => CellError::Value,
    }
}
