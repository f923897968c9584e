//! Star localization around a predicted sky direction
//!
//! For one predicted star and one background-corrected frame:
//!
//! 1. find the pixel whose nominal direction is closest to the prediction
//! 2. estimate the local background from a box around it, excluding the 3x3 core,
//!    and reject stars sitting on bright background
//! 3. move to the brightest pixel in that box
//! 4. compute the signal-weighted first moment in a smaller box around the peak,
//!    both in pixel coordinates and in direction space
//!
//! The measured direction is compared with the prediction in the local tangent
//! plane (azimuth-hat, elevation-hat) so residuals stay meaningful near the zenith.

use ephemeris::unit_vector_to_az_el;
use nalgebra::Vector3;
use thiserror::Error;

use crate::calibration::PixelDirectionMap;
use crate::grid::Grid;

/// Box sizes and signal limits used by [`localize_star`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalizerConfig {
    /// Half-width of the background and peak search box
    pub search_box_half_width: usize,
    /// Half-width of the moment box centred on the peak
    pub moment_box_half_width: usize,
    /// Counts above the rounded background mean a pixel needs to contribute to the moment
    pub moment_threshold_offset: f64,
    /// Background means above this reject the star
    pub max_background_signal: f64,
    /// Pixel values are clipped to this before weighting
    pub max_peak_signal: f64,
}

impl Default for LocalizerConfig {
    fn default() -> Self {
        Self {
            search_box_half_width: 5,
            moment_box_half_width: 2,
            moment_threshold_offset: 10.0,
            max_background_signal: 20000.0,
            max_peak_signal: 60000.0,
        }
    }
}

/// Why a star was left out of the fit
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum LocalizeRejection {
    #[error("no pixel has a defined direction")]
    NoDirection,
    #[error("background mean {0} is non-finite or above the limit")]
    BackgroundTooHigh(f64),
    #[error("no pixel in the moment box exceeds the threshold")]
    NoMomentPixels,
    #[error("total signal above threshold is not positive")]
    NoSignal,
}

/// Localized star position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StarMeasurement {
    /// Pixel (column, row) whose nominal direction is closest to the prediction
    pub predicted_pixel: (usize, usize),
    /// Brightest pixel (column, row) in the search box
    pub peak_pixel: (usize, usize),
    pub background_mean: f64,
    /// Moment threshold in counts
    pub threshold: f64,
    /// Signal-weighted mean column
    pub moment_column: f64,
    /// Signal-weighted mean row
    pub moment_row: f64,
    /// Measured east/north/up unit direction
    pub direction: Vector3<f64>,
    pub azimuth_deg: f64,
    pub elevation_deg: f64,
    /// Tangent-plane residual (predicted minus measured) along azimuth, degrees
    pub delta_az_deg: f64,
    /// Tangent-plane residual (predicted minus measured) along elevation, degrees
    pub delta_el_deg: f64,
    pub n_moment_pixels: usize,
    /// Sum of clipped signal above threshold
    pub total_signal: f64,
}

impl StarMeasurement {
    /// Mean signal above threshold per contributing pixel
    pub fn mean_signal_above_threshold(&self) -> f64 {
        self.total_signal / self.n_moment_pixels as f64
    }
}

/// Pixel whose nominal direction is closest (chord distance) to `direction`
pub fn nearest_pixel(
    directions: &PixelDirectionMap,
    direction: &Vector3<f64>,
) -> Option<(usize, usize)> {
    let mut best: Option<((usize, usize), f64)> = None;
    for (position, pixel_direction) in directions.defined() {
        let distance = (pixel_direction - direction).norm_squared();
        if best.map_or(true, |(_, d)| distance < d) {
            best = Some((position, distance));
        }
    }
    best.map(|(position, _)| position)
}

/// Mean of the finite pixels in a box around (column, row), skipping the 3x3 core.
///
/// Returns NaN when no pixel qualifies.
pub fn background_mean(image: &Grid<f64>, column: usize, row: usize, half_width: usize) -> f64 {
    let (columns, rows) = image.size().clipped_box(column, row, half_width);
    let mut sum = 0.0;
    let mut count = 0usize;

    for r in rows {
        for c in columns.clone() {
            if c.abs_diff(column) <= 1 && r.abs_diff(row) <= 1 {
                continue;
            }
            let value = image[(c, r)];
            if value.is_finite() {
                sum += value;
                count += 1;
            }
        }
    }

    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

/// Brightest finite pixel in a box around (column, row). Ties keep the first in
/// row-major order.
pub fn brightest_pixel(
    image: &Grid<f64>,
    column: usize,
    row: usize,
    half_width: usize,
) -> Option<(usize, usize)> {
    let (columns, rows) = image.size().clipped_box(column, row, half_width);
    let mut best: Option<((usize, usize), f64)> = None;

    for r in rows {
        for c in columns.clone() {
            let value = image[(c, r)];
            if value.is_finite() && best.map_or(true, |(_, v)| value > v) {
                best = Some(((c, r), value));
            }
        }
    }
    best.map(|(position, _)| position)
}

/// First moment accumulated over a moment box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FirstMoment {
    pub column: f64,
    pub row: f64,
    /// Normalized weighted mean direction
    pub direction: Vector3<f64>,
    pub n_pixels: usize,
    pub total_signal: f64,
}

/// Signal-weighted first moment around (column, row).
///
/// A pixel contributes `min(value, max_signal) - threshold` when its value exceeds
/// `threshold` and it has a defined direction.
pub fn first_moment(
    image: &Grid<f64>,
    directions: &PixelDirectionMap,
    column: usize,
    row: usize,
    half_width: usize,
    threshold: f64,
    max_signal: f64,
) -> Result<FirstMoment, LocalizeRejection> {
    let (columns, rows) = image.size().clipped_box(column, row, half_width);
    let mut m00 = 0.0;
    let mut m10 = 0.0;
    let mut m01 = 0.0;
    let mut weighted_direction = Vector3::zeros();
    let mut n_pixels = 0usize;

    for r in rows {
        for c in columns.clone() {
            let value = image[(c, r)];
            if value.is_nan() || value <= threshold {
                continue;
            }
            let Some(direction) = directions.direction(c, r) else {
                continue;
            };
            let weight = value.min(max_signal) - threshold;
            m00 += weight;
            m10 += weight * c as f64;
            m01 += weight * r as f64;
            weighted_direction += weight * direction;
            n_pixels += 1;
        }
    }

    if n_pixels == 0 {
        return Err(LocalizeRejection::NoMomentPixels);
    }
    if m00.is_nan() || m00 <= 0.0 {
        return Err(LocalizeRejection::NoSignal);
    }

    Ok(FirstMoment {
        column: m10 / m00,
        row: m01 / m00,
        direction: weighted_direction.normalize(),
        n_pixels,
        total_signal: m00,
    })
}

/// Residual `predicted - measured` projected onto the local azimuth and elevation
/// unit vectors at the predicted position, in degrees.
pub fn tangent_plane_residual(
    predicted: &Vector3<f64>,
    measured: &Vector3<f64>,
    azimuth_deg: f64,
    elevation_deg: f64,
) -> (f64, f64) {
    let (sin_az, cos_az) = azimuth_deg.to_radians().sin_cos();
    let (sin_el, cos_el) = elevation_deg.to_radians().sin_cos();
    let azimuth_hat = Vector3::new(cos_az, -sin_az, 0.0);
    let elevation_hat = Vector3::new(-sin_el * sin_az, -sin_el * cos_az, cos_el);

    let delta = predicted - measured;
    (
        delta.dot(&azimuth_hat).to_degrees(),
        delta.dot(&elevation_hat).to_degrees(),
    )
}

/// Localize one predicted star in a background-corrected frame.
pub fn localize_star(
    image: &Grid<f64>,
    directions: &PixelDirectionMap,
    predicted_direction: &Vector3<f64>,
    predicted_azimuth_deg: f64,
    predicted_elevation_deg: f64,
    config: &LocalizerConfig,
) -> Result<StarMeasurement, LocalizeRejection> {
    let predicted_pixel =
        nearest_pixel(directions, predicted_direction).ok_or(LocalizeRejection::NoDirection)?;
    let (column, row) = predicted_pixel;

    let background = background_mean(image, column, row, config.search_box_half_width);
    if !background.is_finite() || background > config.max_background_signal {
        return Err(LocalizeRejection::BackgroundTooHigh(background));
    }

    let peak_pixel = brightest_pixel(image, column, row, config.search_box_half_width)
        .ok_or(LocalizeRejection::NoMomentPixels)?;

    let threshold = background.round() + config.moment_threshold_offset;
    let moment = first_moment(
        image,
        directions,
        peak_pixel.0,
        peak_pixel.1,
        config.moment_box_half_width,
        threshold,
        config.max_peak_signal,
    )?;

    let (azimuth_deg, elevation_deg) = unit_vector_to_az_el(&moment.direction);
    let (delta_az_deg, delta_el_deg) = tangent_plane_residual(
        predicted_direction,
        &moment.direction,
        predicted_azimuth_deg,
        predicted_elevation_deg,
    );

    Ok(StarMeasurement {
        predicted_pixel,
        peak_pixel,
        background_mean: background,
        threshold,
        moment_column: moment.column,
        moment_row: moment.row,
        direction: moment.direction,
        azimuth_deg,
        elevation_deg,
        delta_az_deg,
        delta_el_deg,
        n_moment_pixels: moment.n_pixels,
        total_signal: moment.total_signal,
    })
}
