//! Chart error types

use thiserror::Error;

/// Reasons a chart specification cannot be rendered
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChartError {
    /// `data` has no rows at all
    #[error("chart data must contain a header row")]
    MissingHeader,

    /// The header row has no columns
    #[error("chart header row is empty")]
    EmptyHeader,

    /// A data row has more cells than the header
    #[error("chart row {row} has {len} cells but the header has {expected}")]
    RowTooWide {
        row: usize,
        len: usize,
        expected: usize,
    },
}
