//! Chart placement over the grid

use serde::{Deserialize, Serialize};

/// Width of a newly placed chart, in pixels
pub const DEFAULT_WIDTH: f64 = 550.0;
/// Height of a newly placed chart, in pixels
pub const DEFAULT_HEIGHT: f64 = 400.0;

const MIN_OFFSET: f64 = 50.0;

/// Where a chart overlay sits relative to the grid viewport
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartPlacement {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
}

impl Default for ChartPlacement {
    fn default() -> Self {
        Self {
            top: 100.0,
            left: 100.0,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
        }
    }
}

impl ChartPlacement {
    /// Default-sized chart centered horizontally in the viewport, a third of
    /// the way down, never closer than 50px to the top-left corner
    pub fn centered(viewport_width: f64, viewport_height: f64) -> Self {
        Self {
            top: MIN_OFFSET.max((viewport_height - DEFAULT_HEIGHT) / 3.0),
            left: MIN_OFFSET.max((viewport_width - DEFAULT_WIDTH) / 2.0),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centered() {
        let placement = ChartPlacement::centered(1150.0, 1000.0);
        assert_eq!(placement.left, 300.0);
        assert_eq!(placement.top, 200.0);
        assert_eq!(placement.width, 550.0);

        let small = ChartPlacement::centered(400.0, 300.0);
        assert_eq!((small.left, small.top), (50.0, 50.0));
    }
}
