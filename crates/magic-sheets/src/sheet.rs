//! The visible sheet: grid backing store, formula mirror and chart overlays

use std::collections::HashMap;

use magic_sheets_chart::{ChartPlacement, ChartSeries, ChartSpecification};
use magic_sheets_core::{CellAddress, CellRange, CellValue, Grid, MAX_COLS, MAX_ROWS};
use magic_sheets_csv::{CsvWriteOptions, CsvWriter};
use tracing::debug;

use crate::adapter::FormulaAdapter;
use crate::error::{Result, SessionError};

/// A chart placed over the grid
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedChart {
    pub id: u64,
    pub spec: ChartSpecification,
    /// Series derived for the renderer
    pub series: ChartSeries,
    pub placement: ChartPlacement,
    pub visible: bool,
}

/// Grid contents plus the formula engine that computes them
///
/// The grid stores what was typed (formula text with its cached result);
/// the adapter owns dependency tracking. [`refresh`](Self::refresh) copies
/// recalculated results back into the grid.
#[derive(Debug, Default)]
pub struct Sheet {
    grid: Grid,
    adapter: FormulaAdapter,
    charts: Vec<PlacedChart>,
    next_chart_id: u64,
    viewport: Option<(f64, f64)>,
}

impl Sheet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_adapter(adapter: FormulaAdapter) -> Self {
        Self {
            adapter,
            ..Self::default()
        }
    }

    /// Viewport size used to center new charts
    pub fn set_viewport(&mut self, width: f64, height: f64) {
        self.viewport = Some((width, height));
    }

    /// Write raw input to the cell named by `target`
    ///
    /// Formulas are evaluated through the adapter; their cached result is
    /// `#ERROR` when evaluation fails. Blank input clears the cell.
    /// Targets past the last row or column are rejected.
    pub fn apply(&mut self, target: &str, raw: &str) -> Result<CellAddress> {
        let addr = CellAddress::decode(target)?;
        if addr.row >= MAX_ROWS || addr.col >= MAX_COLS {
            return Err(SessionError::InvalidAddress(format!(
                "'{}' is outside the sheet",
                target
            )));
        }

        if raw.starts_with('=') {
            let value = self.adapter.evaluate(raw, target, &HashMap::new())?;
            self.grid.set(
                addr.row,
                addr.col,
                CellValue::Formula {
                    text: raw.to_string(),
                    cached_value: Some(Box::new(value)),
                },
            );
        } else {
            self.adapter.set_contents(addr, raw);
            match CellValue::from_input(raw) {
                CellValue::Empty => {
                    self.grid.remove(addr.row, addr.col);
                }
                value => self.grid.set(addr.row, addr.col, value),
            }
        }

        Ok(addr)
    }

    /// Copy every formula's current result from the engine into the grid
    pub fn refresh(&mut self) {
        let formulas: Vec<CellAddress> = self
            .grid
            .iter()
            .filter(|(_, value)| value.is_formula())
            .map(|(addr, _)| addr)
            .collect();

        for addr in formulas {
            let computed = self.adapter.computed(addr);
            if let Some(CellValue::Formula { cached_value, .. }) =
                self.grid.get_mut(addr.row, addr.col)
            {
                *cached_value = Some(Box::new(computed));
            }
        }
    }

    /// Replace the sheet with a 2D array anchored at A1
    pub fn load_rows(&mut self, rows: Vec<Vec<CellValue>>) {
        self.load_grid(Grid::from_rows(rows));
    }

    /// Replace the sheet with `grid`, recalculating every formula
    pub fn load_grid(&mut self, grid: Grid) {
        self.grid = grid;
        let stats = self.adapter.load(&self.grid);
        debug!(cells = self.grid.cell_count(), ?stats, "sheet loaded");
        self.refresh();
    }

    /// Displayed value of a cell
    pub fn value(&self, addr: CellAddress) -> &CellValue {
        self.grid.value(addr).effective_value()
    }

    /// What was typed into a cell, formulas included
    pub fn contents(&self, addr: CellAddress) -> &CellValue {
        self.grid.value(addr)
    }

    /// Displayed values of every non-empty cell
    pub fn snapshot(&self) -> Grid {
        self.grid.map_values(|value| value.effective_value().clone())
    }

    /// Displayed values of `range` as a 2D array, for the grid widget
    pub fn window(&self, range: &CellRange) -> Vec<Vec<CellValue>> {
        self.snapshot().window(range)
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn adapter(&self) -> &FormulaAdapter {
        &self.adapter
    }

    /// The sheet's displayed values as CSV text
    pub fn to_csv(&self) -> Result<String> {
        Ok(CsvWriter::to_string(
            &self.snapshot(),
            &CsvWriteOptions::default(),
        )?)
    }

    /// Validate a chart and place it over the grid
    pub fn place_chart(&mut self, spec: ChartSpecification) -> Result<&PlacedChart> {
        let spec = spec.normalize()?;
        let series = spec.series()?;
        let placement = match self.viewport {
            Some((width, height)) => ChartPlacement::centered(width, height),
            None => ChartPlacement::default(),
        };

        self.next_chart_id += 1;
        let index = self.charts.len();
        self.charts.push(PlacedChart {
            id: self.next_chart_id,
            spec,
            series,
            placement,
            visible: true,
        });
        Ok(&self.charts[index])
    }

    pub fn charts(&self) -> &[PlacedChart] {
        &self.charts
    }

    /// Show or hide a chart, returning its new visibility
    pub fn toggle_chart(&mut self, id: u64) -> Option<bool> {
        let chart = self.charts.iter_mut().find(|chart| chart.id == id)?;
        chart.visible = !chart.visible;
        Some(chart.visible)
    }

    pub fn remove_chart(&mut self, id: u64) -> Option<PlacedChart> {
        let index = self.charts.iter().position(|chart| chart.id == id)?;
        Some(self.charts.remove(index))
    }

    /// Empty grid, formula mirror and charts
    pub fn clear(&mut self) {
        self.grid.clear();
        self.adapter.clear();
        self.charts.clear();
    }
}
