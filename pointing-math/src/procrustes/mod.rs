//! Least-squares rotation between matched direction sets
//!
//! Solves the orthogonal Procrustes problem: given predicted unit directions `pᵢ`
//! and measured unit directions `qᵢ`, find the proper rotation `R` minimizing
//! `Σ‖R·pᵢ − qᵢ‖²`. The rotation is returned as a direction cosine matrix together
//! with its axis-angle form.

mod transform;

use nalgebra::{Matrix3, Vector3};
use ndarray::Array2;
use thiserror::Error;

use transform::{calculate_rms_residual, compute_optimal_rotation, convert_to_vector3_points};

/// Errors that can occur during rotation estimation
#[derive(Error, Debug)]
pub enum RotationError {
    #[error("Invalid argument: {0}")]
    ArgumentError(String),

    #[error("SVD decomposition failed to produce U or V^T matrices")]
    SvdFailed,
}

/// Result of a rotation estimate for one set of correspondences
#[derive(Debug, Clone)]
pub struct RotationEstimate {
    /// Direction cosine matrix rotating predicted directions onto measured ones
    pub dcm: Matrix3<f64>,

    /// Unit rotation axis; `(1, 0, 0)` when the rotation is numerically the identity
    pub axis: Vector3<f64>,

    /// Rotation angle about `axis` in degrees
    pub angle_deg: f64,

    /// RMS chord length between rotated predictions and measurements
    pub rms_residual: f64,

    /// Number of correspondences used
    pub n_points: usize,
}

/// Extract the rotation axis and angle (degrees) from a direction cosine matrix.
///
/// Uses the antisymmetric part `R − Rᵗ = 2 sin θ [k]ₓ`, so angles are reported in
/// `[0, 90]` degrees; pointing corrections are always far smaller than that.
pub fn axis_angle_from_dcm(dcm: &Matrix3<f64>) -> (Vector3<f64>, f64) {
    let axis = Vector3::new(
        dcm[(2, 1)] - dcm[(1, 2)],
        dcm[(0, 2)] - dcm[(2, 0)],
        dcm[(1, 0)] - dcm[(0, 1)],
    );
    let length = axis.norm();
    let angle_deg = (length / 2.0).clamp(-1.0, 1.0).asin().to_degrees();

    if length > 0.0 {
        (axis / length, angle_deg)
    } else {
        (Vector3::x(), angle_deg)
    }
}

/// Estimate the rotation mapping predicted directions onto measured directions
///
/// # Arguments
/// * `predicted` - Predicted unit directions as `ndarray::Array2<f64>` with shape [n_points, 3]
/// * `measured` - Measured unit directions, same shape, row `i` matched to `predicted` row `i`
///
/// # Returns
/// * `Result<RotationEstimate, RotationError>` - DCM, axis-angle and fit residual
///
/// # Errors
/// * `RotationError::ArgumentError` - If the arrays are not [n, 3], differ in length,
///   are empty, or contain non-finite values
/// * `RotationError::SvdFailed` - If the SVD decomposition fails
pub fn estimate_rotation(
    predicted: &Array2<f64>,
    measured: &Array2<f64>,
) -> Result<RotationEstimate, RotationError> {
    if predicted.shape()[1] != 3 {
        return Err(RotationError::ArgumentError(
            "Predicted directions must have shape [n_points, 3]".to_string(),
        ));
    }
    if measured.shape()[1] != 3 {
        return Err(RotationError::ArgumentError(
            "Measured directions must have shape [n_points, 3]".to_string(),
        ));
    }
    if predicted.shape()[0] != measured.shape()[0] {
        return Err(RotationError::ArgumentError(format!(
            "direction sets differ in length: {} predicted vs {} measured",
            predicted.shape()[0],
            measured.shape()[0]
        )));
    }
    if predicted.shape()[0] == 0 {
        return Err(RotationError::ArgumentError(
            "direction sets are empty".to_string(),
        ));
    }

    let predicted_vec = convert_to_vector3_points(predicted);
    let measured_vec = convert_to_vector3_points(measured);

    let dcm = compute_optimal_rotation(&predicted_vec, &measured_vec)?;
    let (axis, angle_deg) = axis_angle_from_dcm(&dcm);
    let rms_residual = calculate_rms_residual(&predicted_vec, &measured_vec, &dcm);

    Ok(RotationEstimate {
        dcm,
        axis,
        angle_deg,
        rms_residual,
        n_points: predicted_vec.len(),
    })
}

/// Trait for objects carrying one predicted and one measured direction.
pub trait DirectionPair {
    /// Predicted unit direction
    fn predicted(&self) -> Vector3<f64>;

    /// Measured unit direction
    fn measured(&self) -> Vector3<f64>;
}

/// Implement DirectionPair for plain `(predicted, measured)` tuples
impl DirectionPair for (Vector3<f64>, Vector3<f64>) {
    fn predicted(&self) -> Vector3<f64> {
        self.0
    }

    fn measured(&self) -> Vector3<f64> {
        self.1
    }
}

impl<T: DirectionPair + ?Sized> DirectionPair for &T {
    fn predicted(&self) -> Vector3<f64> {
        (**self).predicted()
    }

    fn measured(&self) -> Vector3<f64> {
        (**self).measured()
    }
}

/// Estimate the rotation from a slice of objects implementing [`DirectionPair`].
///
/// # Errors
/// * `RotationError::ArgumentError` - If `pairs` is empty or holds non-finite directions
/// * `RotationError::SvdFailed` - If the SVD decomposition fails
pub fn estimate_rotation_from_pairs<T>(pairs: &[T]) -> Result<RotationEstimate, RotationError>
where
    T: DirectionPair,
{
    if pairs.is_empty() {
        return Err(RotationError::ArgumentError("pairs slice is empty".to_string()));
    }

    let predicted_vec: Vec<f64> = pairs
        .iter()
        .flat_map(|p| {
            let v = p.predicted();
            [v.x, v.y, v.z]
        })
        .collect();
    let predicted = Array2::from_shape_vec((pairs.len(), 3), predicted_vec)
        .map_err(|e| RotationError::ArgumentError(e.to_string()))?;

    let measured_vec: Vec<f64> = pairs
        .iter()
        .flat_map(|p| {
            let v = p.measured();
            [v.x, v.y, v.z]
        })
        .collect();
    let measured = Array2::from_shape_vec((pairs.len(), 3), measured_vec)
        .map_err(|e| RotationError::ArgumentError(e.to_string()))?;

    estimate_rotation(&predicted, &measured)
}
