//! Per-camera calibration reference and the pixel direction map derived from it.
//!
//! The reference holds the observing site, the nominal azimuth/elevation each
//! pixel looks at and the per-pixel dark offsets subtracted from every frame.
//! Pixels outside the sky mask have non-finite azimuth/elevation; they are stored
//! as JSON `null`.

use ephemeris::{az_el_to_unit_vector, GeodeticSite};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::grid::{Grid, GridError};
use crate::image_size::ImageSize;

#[derive(Error, Debug)]
pub enum CalibrationError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{field} holds {actual} values, expected {expected} for a {width}x{height} image")]
    DimensionMismatch {
        field: &'static str,
        width: usize,
        height: usize,
        expected: usize,
        actual: usize,
    },
    #[error("calibration has no pixels")]
    Empty,
    #[error(transparent)]
    Grid(#[from] GridError),
}

/// Calibration reference for one camera
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationReference {
    /// Four-letter site code
    pub site: String,
    /// Geodetic position of the camera
    pub location: GeodeticSite,
    /// Image width in pixels
    pub width: usize,
    /// Image height in pixels
    pub height: usize,
    /// Row-major azimuth of each pixel in degrees, non-finite where undefined
    #[serde(with = "nan_as_null")]
    pub azimuths_deg: Vec<f64>,
    /// Row-major elevation of each pixel in degrees, non-finite where undefined
    #[serde(with = "nan_as_null")]
    pub elevations_deg: Vec<f64>,
    /// Row-major dark offset of each pixel in counts
    pub pixel_offsets: Vec<f64>,
}

impl CalibrationReference {
    pub fn image_size(&self) -> ImageSize {
        ImageSize::from_width_height(self.width, self.height)
    }

    /// Check every per-pixel field against the declared dimensions
    pub fn validate(&self) -> Result<(), CalibrationError> {
        let expected = self.image_size().pixel_count();
        if expected == 0 {
            return Err(CalibrationError::Empty);
        }
        for (field, actual) in [
            ("azimuths_deg", self.azimuths_deg.len()),
            ("elevations_deg", self.elevations_deg.len()),
            ("pixel_offsets", self.pixel_offsets.len()),
        ] {
            if actual != expected {
                return Err(CalibrationError::DimensionMismatch {
                    field,
                    width: self.width,
                    height: self.height,
                    expected,
                    actual,
                });
            }
        }
        Ok(())
    }

    /// Dark offsets as a grid
    pub fn offsets(&self) -> Result<Grid<f64>, CalibrationError> {
        Ok(Grid::from_row_major(
            self.image_size(),
            self.pixel_offsets.clone(),
        )?)
    }

    /// Save to JSON file
    pub fn save_to_file(&self, path: &Path) -> Result<(), CalibrationError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load from JSON file and validate dimensions
    pub fn load_from_file(path: &Path) -> Result<Self, CalibrationError> {
        let json = std::fs::read_to_string(path)?;
        let reference: Self = serde_json::from_str(&json)?;
        reference.validate()?;
        log::debug!(
            "Loaded calibration for site {} ({}x{}) from {}",
            reference.site,
            reference.width,
            reference.height,
            path.display()
        );
        Ok(reference)
    }
}

/// Nominal sky direction of every pixel as an east/north/up unit vector.
///
/// Pixels without a valid reference azimuth/elevation hold NaN components.
#[derive(Debug, Clone)]
pub struct PixelDirectionMap {
    directions: Grid<Vector3<f64>>,
}

impl PixelDirectionMap {
    pub fn from_reference(reference: &CalibrationReference) -> Result<Self, CalibrationError> {
        reference.validate()?;
        let size = reference.image_size();
        let azimuths = Grid::from_row_major(size, reference.azimuths_deg.clone())?;
        let elevations = Grid::from_row_major(size, reference.elevations_deg.clone())?;
        Self::from_az_el(&azimuths, &elevations)
    }

    /// Build the map from azimuth and elevation grids in degrees
    pub fn from_az_el(
        azimuths_deg: &Grid<f64>,
        elevations_deg: &Grid<f64>,
    ) -> Result<Self, CalibrationError> {
        let directions = azimuths_deg.zip_map(elevations_deg, |az, el| {
            if az.is_finite() && el.is_finite() {
                az_el_to_unit_vector(*az, *el)
            } else {
                Vector3::repeat(f64::NAN)
            }
        })?;
        Ok(Self { directions })
    }

    pub fn size(&self) -> ImageSize {
        self.directions.size()
    }

    /// Direction of the pixel at (column, row); `None` outside the image or the sky mask
    pub fn direction(&self, column: usize, row: usize) -> Option<Vector3<f64>> {
        self.directions
            .get(column, row)
            .filter(|v| v.iter().all(|c| c.is_finite()))
            .copied()
    }

    /// Iterate `((column, row), direction)` over pixels with a defined direction
    pub fn defined(&self) -> impl Iterator<Item = ((usize, usize), &Vector3<f64>)> {
        self.directions
            .indexed_iter()
            .filter(|(_, v)| v.iter().all(|c| c.is_finite()))
    }

    pub fn defined_count(&self) -> usize {
        self.defined().count()
    }
}

/// Serialize non-finite values as `null` and read `null` back as NaN
mod nan_as_null {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(values: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(values.iter().map(|v| v.is_finite().then_some(*v)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
        let values: Vec<Option<f64>> = Vec::deserialize(deserializer)?;
        Ok(values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    }
}
