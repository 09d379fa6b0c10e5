//! Chart specification types

use crate::error::ChartError;
use crate::series::{ChartSeries, DataSeries};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Chart kinds the assistant may propose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Line,
    #[default]
    Bar,
    Pie,
    Scatter,
}

impl ChartKind {
    /// Name as it appears on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartKind::Line => "line",
            ChartKind::Bar => "bar",
            ChartKind::Pie => "pie",
            ChartKind::Scatter => "scatter",
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One cell of chart data: JSON numbers and strings are both accepted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChartDatum {
    Number(f64),
    Text(String),
    Boolean(bool),
    Empty,
}

impl ChartDatum {
    /// Numeric reading of the cell; text is parsed, anything else is zero
    pub fn as_number(&self) -> f64 {
        match self {
            ChartDatum::Number(n) => *n,
            ChartDatum::Text(s) => s.trim().parse().unwrap_or(0.0),
            ChartDatum::Boolean(b) => f64::from(u8::from(*b)),
            ChartDatum::Empty => 0.0,
        }
    }

    fn is_blank(&self) -> bool {
        match self {
            ChartDatum::Empty => true,
            ChartDatum::Text(s) => s.is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for ChartDatum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChartDatum::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
            ChartDatum::Number(n) => write!(f, "{}", n),
            ChartDatum::Text(s) => f.write_str(s),
            ChartDatum::Boolean(b) => f.write_str(if *b { "TRUE" } else { "FALSE" }),
            ChartDatum::Empty => Ok(()),
        }
    }
}

impl From<f64> for ChartDatum {
    fn from(n: f64) -> Self {
        ChartDatum::Number(n)
    }
}

impl From<&str> for ChartDatum {
    fn from(s: &str) -> Self {
        ChartDatum::Text(s.to_string())
    }
}

fn default_title() -> String {
    "Chart".to_string()
}

/// A proposed chart: kind, title and a table whose first row is the header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpecification {
    #[serde(rename = "type", default)]
    pub kind: ChartKind,
    #[serde(default = "default_title")]
    pub title: String,
    pub data: Vec<Vec<ChartDatum>>,
}

impl ChartSpecification {
    /// Create a specification from a header row and data rows
    pub fn new<S: Into<String>>(kind: ChartKind, title: S, data: Vec<Vec<ChartDatum>>) -> Self {
        Self {
            kind,
            title: title.into(),
            data,
        }
    }

    /// The header row, if present
    pub fn header(&self) -> Option<&[ChartDatum]> {
        self.data.first().map(Vec::as_slice)
    }

    /// Check the table shape without modifying it
    ///
    /// Rows shorter than the header are allowed since [`normalize`](Self::normalize)
    /// pads them; rows wider than the header are not.
    pub fn validate(&self) -> Result<(), ChartError> {
        let header = self.header().ok_or(ChartError::MissingHeader)?;
        if header.is_empty() {
            return Err(ChartError::EmptyHeader);
        }

        for (row, cells) in self.data.iter().enumerate().skip(1) {
            if cells.len() > header.len() {
                return Err(ChartError::RowTooWide {
                    row,
                    len: cells.len(),
                    expected: header.len(),
                });
            }
        }

        Ok(())
    }

    /// Validate and right-pad short rows with empty text
    pub fn normalize(mut self) -> Result<Self, ChartError> {
        self.validate()?;

        let width = self.data[0].len();
        for row in self.data.iter_mut().skip(1) {
            row.resize(width, ChartDatum::Text(String::new()));
        }

        Ok(self)
    }

    /// Data rows below the header
    pub fn rows(&self) -> &[Vec<ChartDatum>] {
        self.data.get(1..).unwrap_or_default()
    }

    /// Derive labelled series for a renderer
    ///
    /// Column 0 supplies the category labels and every further header
    /// column becomes one series. Unnamed header cells are called
    /// `Series N`.
    pub fn series(&self) -> Result<ChartSeries, ChartError> {
        self.validate()?;
        let header = self.header().unwrap_or_default();

        let labels = self
            .rows()
            .iter()
            .map(|row| row.first().map(ToString::to_string).unwrap_or_default())
            .collect();

        let series = header
            .iter()
            .enumerate()
            .skip(1)
            .map(|(col, name)| {
                let name = if name.is_blank() {
                    format!("Series {}", col)
                } else {
                    name.to_string()
                };
                let values = self
                    .rows()
                    .iter()
                    .map(|row| row.get(col).map(ChartDatum::as_number).unwrap_or(0.0))
                    .collect();
                DataSeries::new(name, values)
            })
            .collect();

        Ok(ChartSeries {
            kind: self.kind,
            title: self.title.clone(),
            labels,
            series,
        })
    }

    /// One comma-separated line per table row, header included
    pub fn text_rows(&self) -> Vec<String> {
        self.data
            .iter()
            .map(|row| {
                row.iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sales() -> ChartSpecification {
        ChartSpecification::new(
            ChartKind::Line,
            "Sales",
            vec![
                vec!["Month".into(), "North".into(), "South".into()],
                vec!["Jan".into(), 10.0.into(), "12".into()],
                vec!["Feb".into(), 11.0.into()],
            ],
        )
    }

    #[test]
    fn test_deserialize_from_tool_arguments() {
        let json = r#"{"type":"pie","title":"Share","data":[["Team","Votes"],["A",3],["B","4"],["C",null]]}"#;
        let spec: ChartSpecification = serde_json::from_str(json).unwrap();

        assert_eq!(spec.kind, ChartKind::Pie);
        assert_eq!(spec.data[1][1], ChartDatum::Number(3.0));
        assert_eq!(spec.data[2][1], ChartDatum::Text("4".into()));
        assert_eq!(spec.data[3][1], ChartDatum::Empty);
    }

    #[test]
    fn test_deserialize_defaults_and_rejects_unknown_kind() {
        let spec: ChartSpecification = serde_json::from_str(r#"{"data":[["x"]]}"#).unwrap();
        assert_eq!(spec.kind, ChartKind::Bar);
        assert_eq!(spec.title, "Chart");

        assert!(serde_json::from_str::<ChartSpecification>(r#"{"type":"radar","data":[]}"#).is_err());
    }

    #[test]
    fn test_serialize_uses_wire_names() {
        let json = serde_json::to_value(sales()).unwrap();
        assert_eq!(json["type"], "line");
        assert_eq!(json["data"][1][1], 10.0);
    }

    #[test]
    fn test_validate() {
        assert_eq!(
            ChartSpecification::new(ChartKind::Bar, "t", vec![]).validate(),
            Err(ChartError::MissingHeader)
        );
        assert_eq!(
            ChartSpecification::new(ChartKind::Bar, "t", vec![vec![]]).validate(),
            Err(ChartError::EmptyHeader)
        );

        let mut wide = sales();
        wide.data[1].push(1.0.into());
        assert_eq!(
            wide.validate(),
            Err(ChartError::RowTooWide {
                row: 1,
                len: 4,
                expected: 3
            })
        );
        assert!(sales().validate().is_ok());
    }

    #[test]
    fn test_normalize_pads_short_rows() {
        let spec = sales().normalize().unwrap();
        assert!(spec.data.iter().all(|row| row.len() == 3));
        assert_eq!(spec.data[2][2], ChartDatum::Text(String::new()));
    }

    #[test]
    fn test_series() {
        let series = sales().series().unwrap();
        assert_eq!(series.labels, vec!["Jan", "Feb"]);
        assert_eq!(series.series.len(), 2);
        assert_eq!(series.series[0].name, "North");
        assert_eq!(series.series[0].values, vec![10.0, 11.0]);
        assert_eq!(series.series[1].values, vec![12.0, 0.0]);
    }

    #[test]
    fn test_unnamed_series() {
        let spec = ChartSpecification::new(
            ChartKind::Bar,
            "t",
            vec![vec!["x".into(), ChartDatum::Empty], vec!["a".into(), 1.0.into()]],
        );
        assert_eq!(spec.series().unwrap().series[0].name, "Series 1");
    }

    #[test]
    fn test_text_rows() {
        assert_eq!(
            sales().text_rows(),
            vec!["Month, North, South", "Jan, 10, 12", "Feb, 11"]
        );
    }
}
