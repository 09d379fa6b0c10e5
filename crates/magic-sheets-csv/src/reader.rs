//! CSV reader

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::CsvResult;
use crate::options::CsvReadOptions;
use magic_sheets_core::{CellValue, Grid};

/// CSV file reader
pub struct CsvReader;

impl CsvReader {
    /// Read a CSV file into a grid anchored at A1
    pub fn read_file<P: AsRef<Path>>(path: P, options: &CsvReadOptions) -> CsvResult<Grid> {
        let file = File::open(path)?;
        Self::read(file, options)
    }

    /// Read CSV text into a grid anchored at A1
    pub fn read_str(text: &str, options: &CsvReadOptions) -> CsvResult<Grid> {
        Self::read(text.as_bytes(), options)
    }

    /// Read CSV from a reader into a grid anchored at A1
    ///
    /// Rows may have different lengths; missing trailing fields stay empty.
    pub fn read<R: Read>(reader: R, options: &CsvReadOptions) -> CsvResult<Grid> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(options.delimiter)
            .quote(options.quote)
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut grid = Grid::new();

        for (row, result) in csv_reader.records().enumerate() {
            let record = result?;
            let is_header = row == 0 && options.has_header;

            for (col, field) in record.iter().enumerate() {
                let value = if options.auto_detect_types && !is_header {
                    Self::detect_type(field)
                } else if field.is_empty() {
                    CellValue::Empty
                } else {
                    CellValue::string(field)
                };

                grid.set(row as u32, col as u32, value);
            }
        }

        Ok(grid)
    }

    /// Detect the type of a field value
    fn detect_type(field: &str) -> CellValue {
        CellValue::from_input(field)
    }
}
