//! In-memory star catalog, sorted brightest first.
//!
//! Positions are J2000 right ascension/declination in radians with proper motions
//! in radians per year (RA motion already scaled by cos(dec)).

pub mod bsc5;
pub mod selection;
pub mod working_set;

use std::path::Path;
use thiserror::Error;

pub use selection::{select_calibration_stars, star_position_at_epoch, Candidate};
pub use working_set::{CalibrationStar, CalibrationStarSet};

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("catalog truncated: expected {expected} bytes, found {actual}")]
    Truncated { expected: usize, actual: usize },
    #[error("invalid catalog header: {0}")]
    BadHeader(String),
}

/// One catalog entry
#[derive(Debug, Clone, PartialEq)]
pub struct Star {
    /// Catalog (Harvard Revised) number
    pub catalog_number: f32,
    pub ra_rad: f64,
    pub dec_rad: f64,
    /// Two-character spectral type
    pub spectral_type: String,
    /// Visual magnitude
    pub magnitude: f64,
    pub pm_ra_rad_per_year: f64,
    pub pm_dec_rad_per_year: f64,
}

/// Stars sorted by ascending magnitude
#[derive(Debug, Clone, Default)]
pub struct StarCatalog {
    stars: Vec<Star>,
}

impl StarCatalog {
    /// Build a catalog, sorting by magnitude. Equal magnitudes keep their input order.
    pub fn from_stars(mut stars: Vec<Star>) -> Self {
        stars.sort_by(|a, b| a.magnitude.total_cmp(&b.magnitude));
        Self { stars }
    }

    /// Load a Yale Bright Star Catalog binary file
    pub fn load_bsc5(path: &Path) -> Result<Self, CatalogError> {
        let bytes = std::fs::read(path)?;
        let stars = bsc5::decode(&bytes)?;
        log::info!("Loaded {} stars from {}", stars.len(), path.display());
        Ok(Self::from_stars(stars))
    }

    pub fn len(&self) -> usize {
        self.stars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stars.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Star> {
        self.stars.get(index)
    }

    pub fn stars(&self) -> &[Star] {
        &self.stars
    }

    /// Whether every magnitude is no brighter than the one before it
    pub fn is_sorted_by_magnitude(&self) -> bool {
        self.stars
            .windows(2)
            .all(|pair| pair[0].magnitude <= pair[1].magnitude)
    }
}

#[cfg(test)]
pub(crate) fn test_star(catalog_number: f32, ra_deg: f64, dec_deg: f64, magnitude: f64) -> Star {
    Star {
        catalog_number,
        ra_rad: ra_deg.to_radians(),
        dec_rad: dec_deg.to_radians(),
        spectral_type: "A0".to_string(),
        magnitude,
        pm_ra_rad_per_year: 0.0,
        pm_dec_rad_per_year: 0.0,
    }
}
