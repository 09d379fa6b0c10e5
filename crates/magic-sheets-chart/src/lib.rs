//! # magic-sheets-chart
//!
//! Chart support for magic-sheets.
//!
//! A [`ChartSpecification`] is what the assistant proposes: a chart kind, a
//! title and a table whose first row holds the headers. Before a chart is
//! handed to a renderer it is normalized (every row as wide as the header)
//! and turned into labelled [`DataSeries`].

mod chart;
mod error;
mod placement;
mod series;

pub use chart::{ChartDatum, ChartKind, ChartSpecification};
pub use error::ChartError;
pub use placement::ChartPlacement;
pub use series::{ChartSeries, DataSeries};
