//! JSON export of the pointing-error time series.
//!
//! One file per run, named
//! `<prefix>_<site>_camera_pointing_errors_<first>_<last>_<version>.json` with the
//! window bounds written as `yyyymmddTHHMMSS`. Each variable carries its name,
//! description and unit next to the data; NaN values are written as `null`.

use chrono::{DateTime, Utc};
use ephemeris::epoch::format_epoch_compact;
use ephemeris::EpochError;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::analysis::PointingErrorSeries;

pub const EXPORT_FILE_VERSION: &str = "0101";
pub const DEFAULT_EXPORT_PREFIX: &str = "themis";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid window bound: {0}")]
    Epoch(#[from] EpochError),
    #[error("no pointing-error records to export")]
    NoData,
    #[error("{0} already exists; pass overwrite to replace it")]
    AlreadyExists(PathBuf),
}

/// Provenance of an export
#[derive(Debug, Clone)]
pub struct ExportMetadata {
    pub prefix: String,
    pub site: String,
    pub first_epoch: f64,
    pub last_epoch: f64,
    pub calibration_file: PathBuf,
    pub version: String,
    pub processing_date: DateTime<Utc>,
}

impl ExportMetadata {
    pub fn new(site: &str, first_epoch: f64, last_epoch: f64, calibration_file: &Path) -> Self {
        Self {
            prefix: DEFAULT_EXPORT_PREFIX.to_string(),
            site: site.to_ascii_lowercase(),
            first_epoch,
            last_epoch,
            calibration_file: calibration_file.to_path_buf(),
            version: EXPORT_FILE_VERSION.to_string(),
            processing_date: Utc::now(),
        }
    }
}

#[derive(Serialize)]
struct Variable<'a, T> {
    #[serde(rename = "Name")]
    name: &'static str,
    #[serde(rename = "Description")]
    description: &'static str,
    #[serde(rename = "Unit")]
    unit: &'static str,
    #[serde(rename = "Data")]
    data: &'a [T],
}

#[derive(Serialize)]
struct GlobalAttributes {
    #[serde(rename = "ProcessingDate")]
    processing_date: String,
    #[serde(rename = "Filename")]
    filename: String,
    #[serde(rename = "CalibrationFilename")]
    calibration_filename: String,
    #[serde(rename = "ImageFilenames")]
    image_filenames: Vec<String>,
    #[serde(rename = "TEXT")]
    text: String,
}

#[derive(Serialize)]
struct Variables<'a> {
    #[serde(rename = "Timestamp")]
    timestamp: Variable<'a, f64>,
    #[serde(rename = "PointingErrorDCM")]
    pointing_error_dcm: Variable<'a, [f64; 9]>,
    #[serde(rename = "RotationAxis")]
    rotation_axis: Variable<'a, [f64; 3]>,
    #[serde(rename = "RotationAngle")]
    rotation_angle: Variable<'a, f64>,
    #[serde(rename = "StarCount")]
    star_count: Variable<'a, usize>,
    #[serde(rename = "MedianDeltaAzimuth")]
    median_delta_azimuth: Variable<'a, f64>,
    #[serde(rename = "MedianAbsDeltaElevation")]
    median_abs_delta_elevation: Variable<'a, f64>,
}

#[derive(Serialize)]
struct ExportDocument<'a> {
    #[serde(rename = "GlobalAttributes")]
    global_attributes: GlobalAttributes,
    #[serde(rename = "Variables")]
    variables: Variables<'a>,
}

fn basename(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// File name for an export with the given metadata
pub fn export_filename(meta: &ExportMetadata) -> Result<String, ExportError> {
    Ok(format!(
        "{}_{}_camera_pointing_errors_{}_{}_{}.json",
        meta.prefix,
        meta.site,
        format_epoch_compact(meta.first_epoch)?,
        format_epoch_compact(meta.last_epoch)?,
        meta.version
    ))
}

/// Write `series` to a JSON file in `dir`, returning its path.
///
/// # Errors
/// * `ExportError::NoData` - If the series is empty
/// * `ExportError::AlreadyExists` - If the file exists and `overwrite` is false
pub fn export_json(
    series: &PointingErrorSeries,
    meta: &ExportMetadata,
    dir: &Path,
    overwrite: bool,
) -> Result<PathBuf, ExportError> {
    if series.is_empty() {
        return Err(ExportError::NoData);
    }

    let filename = export_filename(meta)?;
    let path = dir.join(&filename);
    if path.exists() && !overwrite {
        return Err(ExportError::AlreadyExists(path));
    }

    let document = ExportDocument {
        global_attributes: GlobalAttributes {
            processing_date: meta
                .processing_date
                .format("UTC=%Y-%m-%dT%H:%M:%S")
                .to_string(),
            filename,
            calibration_filename: basename(&meta.calibration_file),
            image_filenames: series.contributing_files.iter().map(|p| basename(p)).collect(),
            text: format!(
                "allsky-cal {} camera pointing-error calibration from star imagery.",
                env!("CARGO_PKG_VERSION")
            ),
        },
        variables: Variables {
            timestamp: Variable {
                name: "Timestamp",
                description: "Image time",
                unit: "milliseconds from 0000-01-01:00:00:00 UT",
                data: &series.timestamps,
            },
            pointing_error_dcm: Variable {
                name: "PointingErrorDCM",
                description: "3x3 direction cosine matrix (row-major) that best rotates \
                              predicted star positions to measured star positions \
                              (in a least-squares sense). ENU system.",
                unit: "-",
                data: &series.dcms,
            },
            rotation_axis: Variable {
                name: "RotationAxis",
                description: "Rotation axis in ENU system calculated from pointing error DCM.",
                unit: "-",
                data: &series.rotation_axes,
            },
            rotation_angle: Variable {
                name: "RotationAngle",
                description: "Pointing error as a rotation angle about the rotation axis.",
                unit: "degrees",
                data: &series.rotation_angles_deg,
            },
            star_count: Variable {
                name: "StarCount",
                description: "Number of stars used in the pointing error estimate.",
                unit: "-",
                data: &series.star_counts,
            },
            median_delta_azimuth: Variable {
                name: "MedianDeltaAzimuth",
                description: "Median of predicted minus measured star azimuth offsets \
                              in the local tangent plane.",
                unit: "degrees",
                data: &series.median_delta_az_deg,
            },
            median_abs_delta_elevation: Variable {
                name: "MedianAbsDeltaElevation",
                description: "Median of absolute predicted minus measured star \
                              elevation offsets.",
                unit: "degrees",
                data: &series.median_abs_delta_el_deg,
            },
        },
    };

    std::fs::write(&path, serde_json::to_string_pretty(&document)?)?;
    log::info!("Exported {} records to {}", series.len(), path.display());
    Ok(path)
}
