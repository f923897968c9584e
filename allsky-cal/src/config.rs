//! Run configuration for the pointing-error analysis.

use serde::{Deserialize, Serialize};
use shared::image_proc::LocalizerConfig;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn is_positive(value: f64) -> bool {
    value > 0.0
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

/// Tunables for star selection, localization and the rotation fit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Brightest visible stars selected per image
    pub n_calibration_stars: usize,
    /// Stars needed for a rotation estimate; fewer yields a NaN record
    pub min_stars_per_image: usize,
    /// Half-width of the background/peak search box in pixels
    pub search_box_half_width: usize,
    /// Half-width of the centroid box in pixels
    pub moment_box_half_width: usize,
    /// Largest centroid motion between consecutive images of one file
    pub star_max_jitter_pixels: f64,
    /// Stars at or below this elevation are not selected
    pub min_elevation_deg: f64,
    pub moment_threshold_offset: f64,
    pub max_background_signal_for_moments: f64,
    pub max_peak_signal_for_moments: f64,
    /// Images with a rotation estimate needed for a usable run
    pub min_analyzed_images: usize,
    /// Time span covered by one image file
    pub file_duration_ms: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            n_calibration_stars: 25,
            min_stars_per_image: 10,
            search_box_half_width: 5,
            moment_box_half_width: 2,
            star_max_jitter_pixels: 2.0,
            min_elevation_deg: 10.0,
            moment_threshold_offset: 10.0,
            max_background_signal_for_moments: 20000.0,
            max_peak_signal_for_moments: 60000.0,
            min_analyzed_images: 1,
            file_duration_ms: 3_600_000.0,
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_stars_per_image < 3 {
            return Err(invalid("min_stars_per_image", "must be at least 3"));
        }
        if self.n_calibration_stars < self.min_stars_per_image {
            return Err(invalid(
                "n_calibration_stars",
                format!(
                    "{} is fewer than min_stars_per_image ({})",
                    self.n_calibration_stars, self.min_stars_per_image
                ),
            ));
        }
        if self.search_box_half_width < 2 {
            return Err(invalid("search_box_half_width", "must be at least 2"));
        }
        if self.moment_box_half_width < 1
            || self.moment_box_half_width >= self.search_box_half_width
        {
            return Err(invalid(
                "moment_box_half_width",
                "must be at least 1 and smaller than search_box_half_width",
            ));
        }
        if !is_positive(self.star_max_jitter_pixels) {
            return Err(invalid("star_max_jitter_pixels", "must be positive"));
        }
        if !(0.0..90.0).contains(&self.min_elevation_deg) {
            return Err(invalid("min_elevation_deg", "must be in [0, 90)"));
        }
        if self.moment_threshold_offset.is_nan() || self.moment_threshold_offset < 0.0 {
            return Err(invalid("moment_threshold_offset", "must be non-negative"));
        }
        if !is_positive(self.max_background_signal_for_moments) {
            return Err(invalid(
                "max_background_signal_for_moments",
                "must be positive",
            ));
        }
        if !is_positive(self.max_peak_signal_for_moments) {
            return Err(invalid("max_peak_signal_for_moments", "must be positive"));
        }
        if self.min_analyzed_images < 1 {
            return Err(invalid("min_analyzed_images", "must be at least 1"));
        }
        if !is_positive(self.file_duration_ms) {
            return Err(invalid("file_duration_ms", "must be positive"));
        }
        Ok(())
    }

    /// Localizer settings derived from this configuration
    pub fn localizer(&self) -> LocalizerConfig {
        LocalizerConfig {
            search_box_half_width: self.search_box_half_width,
            moment_box_half_width: self.moment_box_half_width,
            moment_threshold_offset: self.moment_threshold_offset,
            max_background_signal: self.max_background_signal_for_moments,
            max_peak_signal: self.max_peak_signal_for_moments,
        }
    }

    /// Load from JSON file. Missing fields take their defaults.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
