//! Image dimensions and size utilities

use serde::{Deserialize, Serialize};
use std::fmt;

/// Image dimensions structure
///
/// Every frame from one camera has the same size; the calibration reference maps,
/// the dark offsets and the pixel direction map all share it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageSize {
    /// Image width in pixels (number of columns)
    pub width: usize,
    /// Image height in pixels (number of rows)
    pub height: usize,
}

impl ImageSize {
    /// Create a new ImageSize
    pub fn from_width_height(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    /// Get total number of pixels
    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    /// Whether (column, row) lies inside the image
    pub fn contains(&self, column: usize, row: usize) -> bool {
        column < self.width && row < self.height
    }

    /// Column and row ranges of a square box of the given half-width centred on
    /// (column, row), clipped to the image.
    pub fn clipped_box(
        &self,
        column: usize,
        row: usize,
        half_width: usize,
    ) -> (std::ops::Range<usize>, std::ops::Range<usize>) {
        let columns = column.saturating_sub(half_width)..(column + half_width + 1).min(self.width);
        let rows = row.saturating_sub(half_width)..(row + half_width + 1).min(self.height);
        (columns, rows)
    }
}

impl From<(usize, usize)> for ImageSize {
    fn from(dimensions: (usize, usize)) -> Self {
        Self::from_width_height(dimensions.0, dimensions.1)
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clipped_box_interior() {
        let size = ImageSize::from_width_height(256, 256);
        let (cols, rows) = size.clipped_box(100, 50, 5);
        assert_eq!(cols, 95..106);
        assert_eq!(rows, 45..56);
    }

    #[test]
    fn test_clipped_box_at_corner() {
        let size = ImageSize::from_width_height(10, 8);
        let (cols, rows) = size.clipped_box(0, 7, 3);
        assert_eq!(cols, 0..4);
        assert_eq!(rows, 4..8);
    }

    #[test]
    fn test_display_and_count() {
        let size = ImageSize::from((256, 128));
        assert_eq!(size.to_string(), "256x128");
        assert_eq!(size.pixel_count(), 32768);
        assert!(size.contains(255, 127));
        assert!(!size.contains(256, 0));
    }
}
