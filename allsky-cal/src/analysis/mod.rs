//! Imagery analysis driver
//!
//! Walks the image files of a calibration window in time order, estimates the
//! pointing error of every in-window frame and collects the results as parallel
//! time series. Unreadable files and frames are skipped with a warning; frames
//! with too few matched stars yield NaN records so the series stays aligned with
//! the frames considered.

mod image;

use indicatif::ProgressBar;
use nalgebra::{Matrix3, Vector3};
use pointing_math::RotationError;
use shared::calibration::CalibrationError;
use std::path::PathBuf;
use thiserror::Error;

pub use image::ImageAnalyzer;

use crate::config::ConfigError;
use crate::imagery::{ImageryError, ImageryFile, ImagerySource};

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("calibration error: {0}")]
    Calibration(#[from] CalibrationError),

    #[error("imagery error: {0}")]
    Imagery(#[from] ImageryError),

    #[error("rotation estimate from {star_count} stars failed: {source}")]
    Rotation {
        star_count: usize,
        #[source]
        source: RotationError,
    },

    #[error("no usable data: {analyzed} images with a pointing estimate, {required} required")]
    NoUsableData { analyzed: usize, required: usize },
}

/// Pointing error of one frame
#[derive(Debug, Clone, PartialEq)]
pub struct PointingErrorRecord {
    /// Frame time, milliseconds since 0000-01-01T00:00 UT
    pub epoch: f64,
    /// Rotation taking predicted star directions to measured ones (ENU)
    pub dcm: Matrix3<f64>,
    pub axis: Vector3<f64>,
    pub angle_deg: f64,
    /// Stars used in the fit, or found usable when too few
    pub star_count: usize,
    pub median_delta_az_deg: f64,
    pub median_abs_delta_el_deg: f64,
}

impl PointingErrorRecord {
    /// Record for a frame that had too few usable stars
    pub fn insufficient(epoch: f64, star_count: usize) -> Self {
        Self {
            epoch,
            dcm: Matrix3::repeat(f64::NAN),
            axis: Vector3::repeat(f64::NAN),
            angle_deg: f64::NAN,
            star_count,
            median_delta_az_deg: f64::NAN,
            median_abs_delta_el_deg: f64::NAN,
        }
    }

    /// Whether the record holds a rotation estimate
    pub fn is_estimated(&self) -> bool {
        self.angle_deg.is_finite()
    }
}

/// Per-frame results as index-aligned arrays
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointingErrorSeries {
    pub timestamps: Vec<f64>,
    /// Row-major direction cosine matrices
    pub dcms: Vec<[f64; 9]>,
    pub rotation_axes: Vec<[f64; 3]>,
    pub rotation_angles_deg: Vec<f64>,
    pub star_counts: Vec<usize>,
    pub median_delta_az_deg: Vec<f64>,
    pub median_abs_delta_el_deg: Vec<f64>,
    /// Files that contributed at least one frame
    pub contributing_files: Vec<PathBuf>,
}

impl PointingErrorSeries {
    pub fn push(&mut self, record: &PointingErrorRecord) {
        let m = &record.dcm;
        self.timestamps.push(record.epoch);
        self.dcms.push([
            m[(0, 0)],
            m[(0, 1)],
            m[(0, 2)],
            m[(1, 0)],
            m[(1, 1)],
            m[(1, 2)],
            m[(2, 0)],
            m[(2, 1)],
            m[(2, 2)],
        ]);
        self.rotation_axes
            .push([record.axis.x, record.axis.y, record.axis.z]);
        self.rotation_angles_deg.push(record.angle_deg);
        self.star_counts.push(record.star_count);
        self.median_delta_az_deg.push(record.median_delta_az_deg);
        self.median_abs_delta_el_deg
            .push(record.median_abs_delta_el_deg);
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Reassemble the record at `index`
    pub fn record(&self, index: usize) -> Option<PointingErrorRecord> {
        let dcm = self.dcms.get(index)?;
        let axis = self.rotation_axes.get(index)?;
        Some(PointingErrorRecord {
            epoch: *self.timestamps.get(index)?,
            dcm: Matrix3::from_row_slice(dcm),
            axis: Vector3::new(axis[0], axis[1], axis[2]),
            angle_deg: *self.rotation_angles_deg.get(index)?,
            star_count: *self.star_counts.get(index)?,
            median_delta_az_deg: *self.median_delta_az_deg.get(index)?,
            median_abs_delta_el_deg: *self.median_abs_delta_el_deg.get(index)?,
        })
    }

    /// Number of frames with a rotation estimate
    pub fn estimated_count(&self) -> usize {
        self.rotation_angles_deg
            .iter()
            .filter(|a| a.is_finite())
            .count()
    }
}

/// Analyze every frame in `[first, last]` provided by `source`.
///
/// # Errors
/// * `AnalysisError::Imagery` - If the file listing itself fails
/// * `AnalysisError::NoUsableData` - If fewer frames than
///   `min_analyzed_images` produced a rotation estimate
pub fn analyze_imagery<S: ImagerySource>(
    source: &S,
    analyzer: &mut ImageAnalyzer<'_>,
    first: f64,
    last: f64,
    progress: Option<&ProgressBar>,
) -> Result<PointingErrorSeries, AnalysisError> {
    let files = source.list_files(first, last)?;
    if files.is_empty() {
        log::warn!("No image files found in the calibration window");
    } else {
        log::info!("Analyzing {} image files", files.len());
    }
    if let Some(bar) = progress {
        bar.set_length(files.len() as u64);
    }

    let mut series = PointingErrorSeries::default();

    for path in files {
        if let Some(bar) = progress {
            bar.set_message(
                path.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            );
        }

        match source.open(&path) {
            Ok(mut file) => {
                if analyze_file(&mut file, analyzer, first, last, &mut series) > 0 {
                    series.contributing_files.push(path);
                }
            }
            Err(e) => log::warn!("Skipping {}: {}", path.display(), e),
        }

        if let Some(bar) = progress {
            bar.inc(1);
        }
    }

    let analyzed = series.estimated_count();
    let required = analyzer.config().min_analyzed_images;
    log::info!(
        "{} images considered, {} with a pointing estimate",
        series.len(),
        analyzed
    );
    if analyzed < required {
        return Err(AnalysisError::NoUsableData { analyzed, required });
    }
    Ok(series)
}

/// Analyze the in-window frames of one file, returning how many were recorded.
fn analyze_file<F: ImageryFile>(
    file: &mut F,
    analyzer: &mut ImageAnalyzer<'_>,
    first: f64,
    last: f64,
    series: &mut PointingErrorSeries,
) -> usize {
    let mut recorded = 0;

    for index in 0..file.record_count() {
        let record = match file.read_record(index) {
            Ok(record) => record,
            Err(e) => {
                log::warn!("{} record {}: {}", file.path().display(), index, e);
                continue;
            }
        };
        if !(first..=last).contains(&record.epoch) {
            continue;
        }

        match analyzer.analyze_image(&record, recorded == 0) {
            Ok(result) => series.push(&result),
            Err(AnalysisError::Rotation { star_count, source }) => {
                log::warn!(
                    "{} record {}: rotation estimate failed: {}",
                    file.path().display(),
                    index,
                    source
                );
                series.push(&PointingErrorRecord::insufficient(record.epoch, star_count));
            }
            Err(e) => {
                log::warn!("{} record {}: {}", file.path().display(), index, e);
                continue;
            }
        }
        recorded += 1;
    }
    recorded
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Rotation3;

    #[test]
    fn test_series_keeps_row_major_order() {
        let dcm = Rotation3::from_euler_angles(0.01, 0.02, 0.03).into_inner();
        let record = PointingErrorRecord {
            epoch: 1.0,
            dcm,
            axis: Vector3::x(),
            angle_deg: 2.0,
            star_count: 12,
            median_delta_az_deg: 0.1,
            median_abs_delta_el_deg: 0.2,
        };

        let mut series = PointingErrorSeries::default();
        series.push(&record);
        series.push(&PointingErrorRecord::insufficient(2.0, 4));

        assert_eq!(series.len(), 2);
        assert_eq!(series.estimated_count(), 1);
        assert_eq!(series.dcms[0][1], dcm[(0, 1)]);
        assert_eq!(series.dcms[0][3], dcm[(1, 0)]);
        assert_relative_eq!(series.record(0).unwrap().dcm, dcm);
        assert_eq!(series.record(0).unwrap(), record);

        let sentinel = series.record(1).unwrap();
        assert!(!sentinel.is_estimated());
        assert!(sentinel.dcm.iter().all(|v| v.is_nan()));
        assert_eq!(sentinel.star_count, 4);
        assert!(series.record(2).is_none());
    }
}
