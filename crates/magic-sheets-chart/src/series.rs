//! Data series types

use crate::chart::ChartKind;
use serde::Serialize;

/// One named series of values
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataSeries {
    /// Series name, taken from the header row
    pub name: String,
    /// One value per category label
    pub values: Vec<f64>,
}

impl DataSeries {
    /// Create a new data series
    pub fn new<S: Into<String>>(name: S, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

/// Everything a renderer needs to draw a chart
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    pub kind: ChartKind,
    pub title: String,
    /// Category labels from the first column
    pub labels: Vec<String>,
    pub series: Vec<DataSeries>,
}
