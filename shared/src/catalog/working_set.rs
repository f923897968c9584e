//! Calibration star working set reused from image to image.
//!
//! Slot `i` holds the `i`-th selected candidate of the current image. When a slot
//! keeps the same catalog star as in the previous image its last moment is carried
//! over, so a star whose centroid jumps between consecutive frames can be dropped.

use ephemeris::HorizonFrame;
use nalgebra::Vector3;
use pointing_math::DirectionPair;

use super::selection::{select_calibration_stars_into, Candidate};
use super::StarCatalog;
use crate::image_proc::{LocalizeRejection, StarMeasurement};

/// Per-image state of one calibration star
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationStar {
    pub candidate: Candidate,
    /// Localization result for the current image, if any
    pub measurement: Option<StarMeasurement>,
    pub rejection: Option<LocalizeRejection>,
    /// Moment (column, row) in the current image; NaN when not localized
    pub moment: (f64, f64),
    /// Moment (column, row) of the same star in the previous image; NaN when unknown
    pub previous_moment: (f64, f64),
    /// True when this slot holds a different star than in the previous image
    pub new_star_at_index: bool,
    /// Localized successfully in the current image
    pub include_in_calibration: bool,
}

impl CalibrationStar {
    fn new(candidate: Candidate) -> Self {
        Self {
            candidate,
            measurement: None,
            rejection: None,
            moment: (f64::NAN, f64::NAN),
            previous_moment: (f64::NAN, f64::NAN),
            new_star_at_index: true,
            include_in_calibration: false,
        }
    }

    pub fn catalog_index(&self) -> usize {
        self.candidate.catalog_index
    }

    /// Record the localization outcome for the current image
    pub fn record(&mut self, outcome: Result<StarMeasurement, LocalizeRejection>) {
        match outcome {
            Ok(measurement) => {
                self.moment = (measurement.moment_column, measurement.moment_row);
                self.measurement = Some(measurement);
                self.rejection = None;
                self.include_in_calibration = true;
            }
            Err(rejection) => {
                self.moment = (f64::NAN, f64::NAN);
                self.measurement = None;
                self.rejection = Some(rejection);
                self.include_in_calibration = false;
            }
        }
    }

    /// Pixel distance between the current and previous moments; NaN if either is unknown
    pub fn jitter_pixels(&self) -> f64 {
        let dc = self.moment.0 - self.previous_moment.0;
        let dr = self.moment.1 - self.previous_moment.1;
        dc.hypot(dr)
    }

    /// Whether the star may enter the rotation fit.
    ///
    /// It must be localized and either this is the first image of its file, the slot
    /// just received a new star, or the centroid moved less than `max_jitter_pixels`.
    pub fn passes_jitter_gate(&self, first_image_in_file: bool, max_jitter_pixels: f64) -> bool {
        self.include_in_calibration
            && (first_image_in_file
                || self.new_star_at_index
                || self.jitter_pixels() < max_jitter_pixels)
    }
}

impl DirectionPair for CalibrationStar {
    fn predicted(&self) -> Vector3<f64> {
        self.candidate.direction
    }

    fn measured(&self) -> Vector3<f64> {
        self.measurement
            .map(|m| m.direction)
            .unwrap_or_else(|| Vector3::repeat(f64::NAN))
    }
}

/// Fixed-capacity set of calibration stars carried across images
#[derive(Debug, Clone)]
pub struct CalibrationStarSet {
    capacity: usize,
    stars: Vec<CalibrationStar>,
    candidates: Vec<Candidate>,
}

impl CalibrationStarSet {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            stars: Vec::with_capacity(capacity),
            candidates: Vec::with_capacity(capacity),
        }
    }

    /// Select candidates for a new image and carry over continuity state.
    ///
    /// Returns the number of stars selected. Zero is a normal outcome.
    pub fn refresh(
        &mut self,
        catalog: &StarCatalog,
        frame: &HorizonFrame,
        epoch: f64,
        elevation_bound_deg: f64,
    ) -> usize {
        let count = select_calibration_stars_into(
            catalog,
            frame,
            epoch,
            self.capacity,
            elevation_bound_deg,
            &mut self.candidates,
        );

        for (slot, candidate) in self.candidates.iter().enumerate() {
            match self.stars.get_mut(slot) {
                Some(star) if star.catalog_index() == candidate.catalog_index => {
                    star.previous_moment = star.moment;
                    star.candidate = *candidate;
                    star.new_star_at_index = false;
                    star.measurement = None;
                    star.rejection = None;
                    star.moment = (f64::NAN, f64::NAN);
                    star.include_in_calibration = false;
                }
                Some(star) => *star = CalibrationStar::new(*candidate),
                None => self.stars.push(CalibrationStar::new(*candidate)),
            }
        }
        self.stars.truncate(count);
        count
    }

    pub fn len(&self) -> usize {
        self.stars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stars.is_empty()
    }

    pub fn stars(&self) -> &[CalibrationStar] {
        &self.stars
    }

    pub fn stars_mut(&mut self) -> &mut [CalibrationStar] {
        &mut self.stars
    }

    /// Stars admitted to the rotation fit for the current image
    pub fn usable(
        &self,
        first_image_in_file: bool,
        max_jitter_pixels: f64,
    ) -> Vec<&CalibrationStar> {
        self.stars
            .iter()
            .filter(|s| s.passes_jitter_gate(first_image_in_file, max_jitter_pixels))
            .collect()
    }
}
