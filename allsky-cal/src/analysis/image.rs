//! Pointing-error estimate for a single frame.

use ephemeris::epoch::format_epoch;
use ephemeris::{GeodeticSite, HorizonFrame};
use pointing_math::{estimate_rotation_from_pairs, median};
use shared::calibration::{CalibrationReference, PixelDirectionMap};
use shared::catalog::{CalibrationStar, CalibrationStarSet, StarCatalog};
use shared::grid::Grid;
use shared::image_proc::{localize_star, subtract_offsets, LocalizerConfig};

use super::{AnalysisError, PointingErrorRecord};
use crate::config::AnalysisConfig;
use crate::imagery::{ImageRecord, ImageryError};

/// Per-run analysis context: catalog, camera geometry and the calibration star
/// working set carried from frame to frame.
pub struct ImageAnalyzer<'a> {
    catalog: &'a StarCatalog,
    site: GeodeticSite,
    directions: PixelDirectionMap,
    offsets: Grid<f64>,
    config: AnalysisConfig,
    localizer: LocalizerConfig,
    stars: CalibrationStarSet,
    print_star_info: bool,
}

impl<'a> ImageAnalyzer<'a> {
    pub fn new(
        catalog: &'a StarCatalog,
        reference: &CalibrationReference,
        config: AnalysisConfig,
    ) -> Result<Self, AnalysisError> {
        config.validate()?;
        let directions = PixelDirectionMap::from_reference(reference)?;
        let offsets = reference.offsets()?;
        log::info!(
            "Camera {} at ({:.3}, {:.3}): {} image, {} pixels with sky directions",
            reference.site,
            reference.location.latitude_deg,
            reference.location.longitude_deg,
            directions.size(),
            directions.defined_count()
        );

        Ok(Self {
            catalog,
            site: reference.location,
            directions,
            offsets,
            localizer: config.localizer(),
            stars: CalibrationStarSet::with_capacity(config.n_calibration_stars),
            config,
            print_star_info: false,
        })
    }

    /// Log every calibration star of every frame at info level
    pub fn with_star_info(mut self, print_star_info: bool) -> Self {
        self.print_star_info = print_star_info;
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Calibration stars of the most recent frame
    pub fn stars(&self) -> &[CalibrationStar] {
        self.stars.stars()
    }

    /// Select, localize and fit stars for one frame.
    ///
    /// Frames with too few usable stars give a NaN record; that is not an error.
    pub fn analyze_image(
        &mut self,
        record: &ImageRecord,
        first_image_in_file: bool,
    ) -> Result<PointingErrorRecord, AnalysisError> {
        let image = subtract_offsets(&record.pixels, &self.offsets).map_err(ImageryError::from)?;

        let frame = HorizonFrame::new(record.epoch, &self.site);
        let selected = self.stars.refresh(
            self.catalog,
            &frame,
            record.epoch,
            self.config.min_elevation_deg,
        );

        for star in self.stars.stars_mut() {
            let candidate = star.candidate;
            let outcome = localize_star(
                &image,
                &self.directions,
                &candidate.direction,
                candidate.azimuth_deg,
                candidate.elevation_deg,
                &self.localizer,
            );
            star.record(outcome);
        }

        if self.print_star_info {
            self.log_star_info(record.epoch);
        }

        let usable = self
            .stars
            .usable(first_image_in_file, self.config.star_max_jitter_pixels);
        let star_count = usable.len();

        if star_count < self.config.min_stars_per_image {
            log::debug!(
                "Epoch {}: {} of {} selected stars usable, {} required",
                record.epoch,
                star_count,
                selected,
                self.config.min_stars_per_image
            );
            return Ok(PointingErrorRecord::insufficient(record.epoch, star_count));
        }

        let estimate = estimate_rotation_from_pairs(&usable)
            .map_err(|source| AnalysisError::Rotation { star_count, source })?;

        let delta_az: Vec<f64> = usable
            .iter()
            .filter_map(|s| s.measurement.map(|m| m.delta_az_deg))
            .collect();
        let abs_delta_el: Vec<f64> = usable
            .iter()
            .filter_map(|s| s.measurement.map(|m| m.delta_el_deg.abs()))
            .collect();

        let result = PointingErrorRecord {
            epoch: record.epoch,
            dcm: estimate.dcm,
            axis: estimate.axis,
            angle_deg: estimate.angle_deg,
            star_count,
            median_delta_az_deg: median(&delta_az).unwrap_or(f64::NAN),
            median_abs_delta_el_deg: median(&abs_delta_el).unwrap_or(f64::NAN),
        };
        log::debug!(
            "Epoch {}: {} stars, angle {:.4} deg, rms {:.2e}",
            record.epoch,
            star_count,
            result.angle_deg,
            estimate.rms_residual
        );
        Ok(result)
    }

    fn log_star_info(&self, epoch: f64) {
        let time = format_epoch(epoch).unwrap_or_else(|_| epoch.to_string());
        for (slot, star) in self.stars.stars().iter().enumerate() {
            let number = self
                .catalog
                .get(star.catalog_index())
                .map_or(f32::NAN, |s| s.catalog_number);
            let c = &star.candidate;
            match &star.measurement {
                Some(m) => log::info!(
                    "{time} [{slot:2}] HR {number:.0} mag {:.2} pred az {:.3} el {:.3} \
                     pixel ({}, {}) moment ({:.2}, {:.2}) meas az {:.3} el {:.3} \
                     daz {:.3} del {:.3} bg {:.1} signal {:.1}{}",
                    c.magnitude,
                    c.azimuth_deg,
                    c.elevation_deg,
                    m.predicted_pixel.0,
                    m.predicted_pixel.1,
                    m.moment_column,
                    m.moment_row,
                    m.azimuth_deg,
                    m.elevation_deg,
                    m.delta_az_deg,
                    m.delta_el_deg,
                    m.background_mean,
                    m.mean_signal_above_threshold(),
                    if star.new_star_at_index { " new" } else { "" }
                ),
                None => log::info!(
                    "{time} [{slot:2}] HR {number:.0} mag {:.2} pred az {:.3} el {:.3} \
                     rejected: {}",
                    c.magnitude,
                    c.azimuth_deg,
                    c.elevation_deg,
                    star.rejection
                        .map_or_else(|| "not localized".to_string(), |r| r.to_string())
                ),
            }
        }
    }
}
