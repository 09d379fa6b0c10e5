//! # magic-sheets-csv
//!
//! CSV reader and writer for magic-sheets grids.
//!
//! The writer is also how the grid is handed to the analysis sandbox: the
//! sandbox receives the displayed values of the grid as CSV text.

mod error;
mod options;
mod reader;
mod writer;

pub use error::{CsvError, CsvResult};
pub use options::{CsvReadOptions, CsvWriteOptions, LineTerminator};
pub use reader::CsvReader;
pub use writer::CsvWriter;
