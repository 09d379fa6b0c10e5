//! Cell-related types
//!
//! This module contains:
//! - [`CellAddress`] - A cell's location and the A1 codec
//! - [`CellRange`] - A rectangular block of cells (e.g., "A1:B10")
//! - [`CellValue`] - The value stored in a cell

mod address;
mod value;

pub use address::{CellAddress, CellRange, CellRangeIterator};
pub use value::{CellError, CellValue, SharedString};
