//! # magic-sheets-core
//!
//! Core data structures for the magic-sheets assistant spreadsheet.
//!
//! This crate provides the fundamental types used throughout magic-sheets:
//! - [`CellAddress`] and [`CellRange`] - A1-style addressing and the address codec
//! - [`CellValue`] - Represents cell values (numbers, strings, booleans, errors, formulas)
//! - [`Grid`] - The sparse backing store the UI grid is rendered from
//!
//! ## Example
//!
//! ```rust
//! use magic_sheets_core::{CellAddress, CellValue, Grid};
//!
//! let addr = CellAddress::decode("B12").unwrap();
//! assert_eq!((addr.row, addr.col), (11, 1));
//! assert_eq!(addr.encode(), "B12");
//!
//! let mut grid = Grid::new();
//! grid.set(addr.row, addr.col, CellValue::Number(3.0));
//! assert_eq!(grid.extent(), (12, 2));
//! ```

pub mod cell;
pub mod error;
pub mod grid;

pub use cell::{CellAddress, CellError, CellRange, CellValue, SharedString};
pub use error::{Error, Result};
pub use grid::Grid;

/// Maximum number of rows addressable from a formula range
pub const MAX_ROWS: u32 = 1_048_576;

/// Maximum number of columns addressable from a formula range
pub const MAX_COLS: u32 = 16_384;

/// Text shown in place of a value the formula engine could not compute
pub const ERROR_SENTINEL: &str = "#ERROR";
