//! CSV writer

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::error::CsvResult;
use crate::options::{CsvWriteOptions, LineTerminator};
use magic_sheets_core::{CellValue, Grid};

/// CSV file writer
///
/// Cells are written as displayed: formulas contribute their computed value,
/// never their text. Fields are quoted only when they need to be.
pub struct CsvWriter;

impl CsvWriter {
    /// Write a grid to a CSV file
    pub fn write_file<P: AsRef<Path>>(
        grid: &Grid,
        path: P,
        options: &CsvWriteOptions,
    ) -> CsvResult<()> {
        let file = File::create(path)?;
        Self::write(grid, file, options)
    }

    /// Write a grid, from A1 to its last used cell, to a writer
    ///
    /// Rows holding a value are padded to the grid's width. Blank rows in
    /// between are written as one empty field so later rows keep their
    /// position, which keeps the output proportional to the used rows.
    pub fn write<W: Write>(grid: &Grid, writer: W, options: &CsvWriteOptions) -> CsvResult<()> {
        let (_, width) = grid.extent();
        let mut csv_writer = Self::builder(options).from_writer(writer);

        let mut record: Vec<String> = Vec::new();
        let mut current: Option<u32> = None;
        let mut next_row = 0;

        for (addr, value) in grid.iter() {
            if current != Some(addr.row) {
                if let Some(done) = current {
                    csv_writer.write_record(&record)?;
                    next_row = done + 1;
                }
                for _ in next_row..addr.row {
                    csv_writer.write_record([""])?;
                }
                record = vec![String::new(); width as usize];
                current = Some(addr.row);
            }
            record[addr.col as usize] = value.to_string();
        }
        if current.is_some() {
            csv_writer.write_record(&record)?;
        }

        csv_writer.flush()?;
        Ok(())
    }

    /// Write a 2D array of cell values to a writer
    pub fn write_rows<W: Write>(
        rows: &[Vec<CellValue>],
        writer: W,
        options: &CsvWriteOptions,
    ) -> CsvResult<()> {
        let mut csv_writer = Self::builder(options).from_writer(writer);

        for row in rows {
            csv_writer.write_record(row.iter().map(|value| value.to_string()))?;
        }

        csv_writer.flush()?;
        Ok(())
    }

    fn builder(options: &CsvWriteOptions) -> csv::WriterBuilder {
        let terminator = match options.line_terminator {
            LineTerminator::LF => csv::Terminator::Any(b'\n'),
            LineTerminator::CRLF => csv::Terminator::CRLF,
        };

        let mut builder = csv::WriterBuilder::new();
        builder
            .delimiter(options.delimiter)
            .quote(options.quote)
            .quote_style(csv::QuoteStyle::Necessary)
            .terminator(terminator)
            .flexible(true);
        builder
    }

    /// Render a 2D array of cell values as CSV text
    pub fn rows_to_string(rows: &[Vec<CellValue>], options: &CsvWriteOptions) -> CsvResult<String> {
        let mut buffer = Vec::new();
        Self::write_rows(rows, &mut buffer, options)?;
        Ok(String::from_utf8(buffer)?)
    }

    /// Render a grid as CSV text
    pub fn to_string(grid: &Grid, options: &CsvWriteOptions) -> CsvResult<String> {
        let mut buffer = Vec::new();
        Self::write(grid, &mut buffer, options)?;
        Ok(String::from_utf8(buffer)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CsvReadOptions, CsvReader};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_write_displayed_values() {
        let mut grid = Grid::new();
        grid.set(0, 0, CellValue::string("Item"));
        grid.set(0, 1, CellValue::string("Total"));
        grid.set(1, 0, CellValue::string("Pens, blue"));
        grid.set(
            1,
            1,
            CellValue::Formula {
                text: "=2*5".into(),
                cached_value: Some(Box::new(CellValue::Number(10.0))),
            },
        );
        grid.set(2, 1, CellValue::Boolean(true));

        let text = CsvWriter::to_string(&grid, &CsvWriteOptions::default()).unwrap();
        assert_eq!(text, "Item,Total\n\"Pens, blue\",10\n,TRUE\n");
    }

    #[test]
    fn test_write_empty_grid() {
        let text = CsvWriter::to_string(&Grid::new(), &CsvWriteOptions::default()).unwrap();
        assert_eq!(text, "");
    }

    #[test]
    fn test_blank_rows_keep_their_place() {
        let mut grid = Grid::new();
        grid.set(0, 0, CellValue::string("Name"));
        grid.set(0, 1, CellValue::string("Score"));
        grid.set(3, 1, CellValue::Number(7.0));

        let text = CsvWriter::to_string(&grid, &CsvWriteOptions::default()).unwrap();
        assert_eq!(text, "Name,Score\n\"\"\n\"\"\n,7\n");

        let back = CsvReader::read_str(&text, &CsvReadOptions::default()).unwrap();
        assert_eq!(back, grid);
    }

    #[test]
    fn test_far_cell_output_follows_used_rows() {
        let mut grid = Grid::new();
        grid.set(0, 0, CellValue::string("x"));
        grid.set(199, 16_383, CellValue::string("far"));

        let text = CsvWriter::to_string(&grid, &CsvWriteOptions::default()).unwrap();
        assert_eq!(text.lines().count(), 200);
        // two padded rows plus 198 blank markers
        assert!(text.len() < 3 * 16_384);
        assert!(text.ends_with(",far\n"));
    }

    #[test]
    fn test_crlf_terminator() {
        let rows = vec![vec![CellValue::Number(1.0)], vec![CellValue::Number(2.0)]];
        let options = CsvWriteOptions {
            line_terminator: LineTerminator::CRLF,
            ..Default::default()
        };
        assert_eq!(CsvWriter::rows_to_string(&rows, &options).unwrap(), "1\r\n2\r\n");
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheet.csv");

        let grid = Grid::from_rows(vec![
            vec![CellValue::string("Region"), CellValue::string("Q1")],
            vec![CellValue::string("North \"A\""), CellValue::Number(1.5)],
        ]);
        CsvWriter::write_file(&grid, &path, &CsvWriteOptions::default()).unwrap();

        let back = CsvReader::read_file(&path, &CsvReadOptions::default()).unwrap();
        assert_eq!(back, grid);
    }
}
