//! Image processing for star localization.

pub mod localize;

use crate::grid::{Grid, GridError};

pub use localize::{localize_star, LocalizeRejection, LocalizerConfig, StarMeasurement};

/// Subtract the per-pixel dark offsets from a raw frame.
///
/// The result is signed; pixels below their offset go negative rather than wrap.
pub fn subtract_offsets(raw: &Grid<u16>, offsets: &Grid<f64>) -> Result<Grid<f64>, GridError> {
    raw.zip_map(offsets, |value, offset| *value as f64 - offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_size::ImageSize;

    #[test]
    fn test_subtract_offsets() {
        let size = ImageSize::from_width_height(2, 1);
        let raw = Grid::from_row_major(size, vec![1000u16, 5]).unwrap();
        let offsets = Grid::from_row_major(size, vec![990.5, 10.0]).unwrap();
        let corrected = subtract_offsets(&raw, &offsets).unwrap();
        assert_eq!(corrected[(0, 0)], 9.5);
        assert_eq!(corrected[(1, 0)], -5.0);
    }

    #[test]
    fn test_size_mismatch() {
        let raw = Grid::filled(ImageSize::from_width_height(2, 2), 0u16);
        let offsets = Grid::filled(ImageSize::from_width_height(2, 3), 0.0);
        assert!(subtract_offsets(&raw, &offsets).is_err());
    }
}
