//! Formula evaluation adapter
//!
//! All reads and writes to the session's [`FormulaEngine`] go through
//! here, so the engine's mirror never drifts from what the sheet shows.
//! Engine failures come back as the `#ERROR` sentinel, never as `Err`.

use std::collections::HashMap;

use magic_sheets_core::{CellAddress, CellValue, Grid, ERROR_SENTINEL};
use magic_sheets_formula::{FormulaEngine, RecalcStats};
use tracing::{debug, warn};

use crate::error::Result;

/// Owned wrapper around the session's formula engine
#[derive(Debug, Default)]
pub struct FormulaAdapter {
    engine: FormulaEngine,
}

impl FormulaAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an engine that was configured elsewhere (custom functions etc.)
    pub fn with_engine(engine: FormulaEngine) -> Self {
        Self { engine }
    }

    /// Evaluate `formula` as the contents of `target`
    ///
    /// Literals (anything not starting with `=`) are returned unchanged as
    /// text. For formulas, `known` values are pushed into the engine mirror
    /// first, then the formula is installed at `target` and its computed
    /// value returned. Dependents of `target` are recalculated as a side
    /// effect.
    pub fn evaluate(
        &mut self,
        formula: &str,
        target: &str,
        known: &HashMap<String, CellValue>,
    ) -> Result<CellValue> {
        if !formula.starts_with('=') {
            return Ok(CellValue::string(formula));
        }

        let addr = CellAddress::decode(target)?;

        for (reference, value) in known {
            match CellAddress::decode(reference) {
                Ok(known_addr) if known_addr != addr => {
                    self.engine.set_value(known_addr, value.clone());
                }
                Ok(_) => {}
                Err(err) => warn!(reference = %reference, error = %err, "skipping known value"),
            }
        }

        let stats = self.engine.set_contents(addr, formula);
        debug!(cell = %addr, formula, ?stats, "formula evaluated");
        Ok(self.computed(addr))
    }

    /// Store raw editor input at `addr` and recalculate its dependents
    pub fn set_contents(&mut self, addr: CellAddress, raw: &str) -> RecalcStats {
        self.engine.set_contents(addr, raw)
    }

    /// Computed value at `addr` as the grid should display it
    ///
    /// Any engine error value becomes the `#ERROR` sentinel.
    pub fn computed(&self, addr: CellAddress) -> CellValue {
        let value = self.engine.value(addr);
        if value.is_error() {
            CellValue::string(ERROR_SENTINEL)
        } else {
            value
        }
    }

    /// Clear a cell in the mirror
    pub fn remove(&mut self, addr: CellAddress) -> RecalcStats {
        self.engine.remove(addr)
    }

    /// Replace the whole mirror with the contents of `grid`
    pub fn load(&mut self, grid: &Grid) -> RecalcStats {
        self.engine.clear();
        for (addr, value) in grid.iter() {
            let contents = match value {
                CellValue::Formula { text, .. } => CellValue::formula(text.clone()),
                other => other.clone(),
            };
            self.engine.set_value(addr, contents);
        }
        self.engine.recalculate_all()
    }

    /// Forget every cell
    pub fn clear(&mut self) {
        self.engine.clear();
    }

    pub fn engine(&self) -> &FormulaEngine {
        &self.engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn addr(reference: &str) -> CellAddress {
        CellAddress::decode(reference).unwrap()
    }

    #[test]
    fn test_literal_is_returned_unchanged() {
        let mut adapter = FormulaAdapter::new();
        let value = adapter.evaluate("Sales Tax", "A1", &HashMap::new()).unwrap();
        assert_eq!(value, CellValue::string("Sales Tax"));
        assert!(adapter.engine().grid().is_empty());
    }

    #[test]
    fn test_known_values_feed_the_formula() {
        let mut adapter = FormulaAdapter::new();
        let known = HashMap::from([
            ("A1".to_string(), CellValue::Number(5.0)),
            ("A2".to_string(), CellValue::Number(7.0)),
        ]);

        let value = adapter.evaluate("=SUM(A1:A2)*2", "B1", &known).unwrap();
        assert_eq!(value, CellValue::Number(24.0));
    }

    #[test]
    fn test_dependents_follow_later_edits() {
        let mut adapter = FormulaAdapter::new();
        adapter.set_contents(addr("A1"), "5");
        adapter.evaluate("=A1*2", "B1", &HashMap::new()).unwrap();

        adapter.set_contents(addr("A1"), "6");
        assert_eq!(adapter.computed(addr("B1")), CellValue::Number(12.0));
    }

    #[test]
    fn test_engine_failures_become_sentinel() {
        let mut adapter = FormulaAdapter::new();
        let sentinel = CellValue::string(ERROR_SENTINEL);

        assert_eq!(adapter.evaluate("=1/0", "A1", &HashMap::new()).unwrap(), sentinel);
        assert_eq!(adapter.evaluate("=(1+", "A2", &HashMap::new()).unwrap(), sentinel);
        assert_eq!(adapter.evaluate("=A3+1", "A3", &HashMap::new()).unwrap(), sentinel);
        assert_eq!(adapter.evaluate("=\"a\"*2", "A4", &HashMap::new()).unwrap(), sentinel);
    }

    #[test]
    fn test_invalid_target() {
        let mut adapter = FormulaAdapter::new();
        assert!(adapter.evaluate("=1", "1A", &HashMap::new()).is_err());
        // literals never touch the address codec
        assert!(adapter.evaluate("1", "1A", &HashMap::new()).is_ok());
    }

    #[test]
    fn test_load_grid() {
        let grid = Grid::from_rows(vec![vec![
            CellValue::Number(2.0),
            CellValue::formula("=A1+1"),
            CellValue::formula("=B1*C2"),
        ]]);

        let mut adapter = FormulaAdapter::new();
        adapter.load(&grid);
        assert_eq!(adapter.computed(addr("B1")), CellValue::Number(3.0));
        assert_eq!(adapter.computed(addr("C1")), CellValue::Number(0.0));
    }
}
