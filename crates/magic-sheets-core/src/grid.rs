//! Sparse grid storage
//!
//! The grid is the backing store the UI widget renders from. Only non-empty
//! cells are kept, in a row-major `BTreeMap<row, BTreeMap<col, CellValue>>`
//! so iteration is always in reading order.

use crate::cell::{CellAddress, CellRange, CellValue};
use std::collections::BTreeMap;

static EMPTY: CellValue = CellValue::Empty;

/// Sparse, row-major cell storage anchored at A1
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grid {
    rows: BTreeMap<u32, BTreeMap<u32, CellValue>>,
}

impl Grid {
    /// Create an empty grid
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a grid from a 2D array whose first row is row 1
    pub fn from_rows(rows: Vec<Vec<CellValue>>) -> Self {
        let mut grid = Self::new();
        for (row, values) in rows.into_iter().enumerate() {
            for (col, value) in values.into_iter().enumerate() {
                grid.set(row as u32, col as u32, value);
            }
        }
        grid
    }

    /// Get a cell, if it has content
    pub fn get(&self, row: u32, col: u32) -> Option<&CellValue> {
        self.rows.get(&row).and_then(|r| r.get(&col))
    }

    /// Get a cell value, `Empty` when unset
    pub fn value_at(&self, row: u32, col: u32) -> &CellValue {
        self.get(row, col).unwrap_or(&EMPTY)
    }

    /// Get a cell value by address
    pub fn value(&self, addr: CellAddress) -> &CellValue {
        self.value_at(addr.row, addr.col)
    }

    /// Set a cell value; empty values remove the cell
    pub fn set(&mut self, row: u32, col: u32, value: CellValue) {
        if value.is_empty() {
            self.remove(row, col);
        } else {
            self.rows.entry(row).or_default().insert(col, value);
        }
    }

    /// Get a mutable cell value
    pub fn get_mut(&mut self, row: u32, col: u32) -> Option<&mut CellValue> {
        self.rows.get_mut(&row).and_then(|r| r.get_mut(&col))
    }

    /// Remove a cell
    pub fn remove(&mut self, row: u32, col: u32) -> Option<CellValue> {
        let result = self.rows.get_mut(&row).and_then(|r| r.remove(&col));

        if self.rows.get(&row).is_some_and(|r| r.is_empty()) {
            self.rows.remove(&row);
        }

        result
    }

    /// Clear all cells
    pub fn clear(&mut self) {
        self.rows.clear();
    }

    /// Number of non-empty cells
    pub fn cell_count(&self) -> usize {
        self.rows.values().map(|r| r.len()).sum()
    }

    /// Check if the grid has no content
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Bounding range of non-empty cells
    pub fn used_range(&self) -> Option<CellRange> {
        let min_row = *self.rows.keys().next()?;
        let max_row = *self.rows.keys().next_back()?;

        let mut min_col = u32::MAX;
        let mut max_col = 0;
        for cols in self.rows.values() {
            if let Some(&col) = cols.keys().next() {
                min_col = min_col.min(col);
            }
            if let Some(&col) = cols.keys().next_back() {
                max_col = max_col.max(col);
            }
        }

        Some(CellRange::from_indices(min_row, min_col, max_row, max_col))
    }

    /// Row and column count of the block from A1 to the last used cell
    pub fn extent(&self) -> (u32, u32) {
        match self.used_range() {
            Some(range) => (range.end.row + 1, range.end.col + 1),
            None => (0, 0),
        }
    }

    /// Iterate over all cells in row order
    pub fn iter(&self) -> impl Iterator<Item = (CellAddress, &CellValue)> {
        self.rows.iter().flat_map(|(&row, cols)| {
            cols.iter()
                .map(move |(&col, value)| (CellAddress::new(row, col), value))
        })
    }

    /// Sparse copy with every cell passed through `project`
    ///
    /// Cells projected to `Empty` are dropped.
    pub fn map_values<F>(&self, mut project: F) -> Grid
    where
        F: FnMut(&CellValue) -> CellValue,
    {
        let mut grid = Grid::new();
        for (addr, value) in self.iter() {
            grid.set(addr.row, addr.col, project(value));
        }
        grid
    }

    /// Dense 2D copy of `range`
    pub fn window(&self, range: &CellRange) -> Vec<Vec<CellValue>> {
        (range.start.row..=range.end.row)
            .map(|row| {
                (range.start.col..=range.end.col)
                    .map(|col| self.value_at(row, col).clone())
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_set_and_remove() {
        let mut grid = Grid::new();
        grid.set(0, 0, CellValue::Number(1.0));
        grid.set(2, 3, CellValue::string("x"));
        assert_eq!(grid.cell_count(), 2);
        assert_eq!(grid.value_at(2, 3), &CellValue::string("x"));
        assert_eq!(grid.value_at(5, 5), &CellValue::Empty);

        grid.set(2, 3, CellValue::Empty);
        assert_eq!(grid.cell_count(), 1);
        assert_eq!(grid.remove(0, 0), Some(CellValue::Number(1.0)));
        assert!(grid.is_empty());
    }

    #[test]
    fn test_used_range_and_extent() {
        let mut grid = Grid::new();
        assert_eq!(grid.used_range(), None);
        assert_eq!(grid.extent(), (0, 0));

        grid.set(1, 2, CellValue::Number(1.0));
        grid.set(3, 1, CellValue::Number(2.0));
        assert_eq!(grid.used_range(), Some(CellRange::parse("B2:C4").unwrap()));
        assert_eq!(grid.extent(), (4, 3));
    }

    #[test]
    fn test_rows_roundtrip() {
        let rows = vec![
            vec![CellValue::string("Name"), CellValue::string("Score")],
            vec![CellValue::string("Alice"), CellValue::Number(90.0)],
            vec![CellValue::Empty, CellValue::Number(85.0)],
        ];
        let grid = Grid::from_rows(rows.clone());
        assert_eq!(grid.extent(), (3, 2));
        assert_eq!(grid.window(&CellRange::parse("A1:B3").unwrap()), rows);
    }

    #[test]
    fn test_iter_in_reading_order() {
        let mut grid = Grid::new();
        grid.set(1, 0, CellValue::Number(3.0));
        grid.set(0, 1, CellValue::Number(2.0));
        grid.set(0, 0, CellValue::Number(1.0));
        let order: Vec<String> = grid.iter().map(|(a, _)| a.encode()).collect();
        assert_eq!(order, vec!["A1", "B1", "A2"]);
    }

    #[test]
    fn test_map_values_stays_sparse() {
        let mut grid = Grid::new();
        grid.set(0, 0, CellValue::Number(1.0));
        grid.set(199, 16_383, CellValue::string("far"));
        grid.set(5, 5, CellValue::string("drop"));

        let mapped = grid.map_values(|value| match value.as_string() {
            Some("drop") => CellValue::Empty,
            _ => value.clone(),
        });
        assert_eq!(mapped.cell_count(), 2);
        assert_eq!(mapped.value_at(199, 16_383), &CellValue::string("far"));
    }

    #[test]
    fn test_window() {
        let grid = Grid::from_rows(vec![
            vec![CellValue::Number(1.0), CellValue::Number(2.0)],
            vec![CellValue::Number(3.0), CellValue::Number(4.0)],
        ]);
        let window = grid.window(&CellRange::parse("B1:C2").unwrap());
        assert_eq!(
            window,
            vec![
                vec![CellValue::Number(2.0), CellValue::Empty],
                vec![CellValue::Number(4.0), CellValue::Empty],
            ]
        );
    }
}
