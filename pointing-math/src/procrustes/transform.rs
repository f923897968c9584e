//! Rotation estimation via SVD decomposition.
//!
//! Given matched direction correspondences, computes the proper rotation that
//! minimizes the summed squared chord error (orthogonal Procrustes / Kabsch).

use nalgebra::{Matrix3, Vector3};
use ndarray::Array2;

use super::RotationError;

/// Determinant of a 3x3 matrix by cofactor expansion along the first row.
pub(super) fn determinant_cofactor(m: &Matrix3<f64>) -> f64 {
    m[(0, 0)] * (m[(1, 1)] * m[(2, 2)] - m[(1, 2)] * m[(2, 1)])
        - m[(0, 1)] * (m[(1, 0)] * m[(2, 2)] - m[(1, 2)] * m[(2, 0)])
        + m[(0, 2)] * (m[(1, 0)] * m[(2, 1)] - m[(1, 1)] * m[(2, 0)])
}

/// Cross-covariance `C = Pᵗ·Q = Σ pᵢ qᵢᵗ` of matched direction sets.
pub(super) fn cross_covariance(
    predicted: &[Vector3<f64>],
    measured: &[Vector3<f64>],
) -> Matrix3<f64> {
    let mut c = Matrix3::zeros();
    for (p, q) in predicted.iter().zip(measured) {
        c += p * q.transpose();
    }
    c
}

/// Computes the optimal proper rotation `R` with `R·pᵢ ≈ qᵢ` using SVD.
pub(super) fn compute_optimal_rotation(
    predicted: &[Vector3<f64>],
    measured: &[Vector3<f64>],
) -> Result<Matrix3<f64>, RotationError> {
    let c = cross_covariance(predicted, measured);

    if c.iter().any(|v| !v.is_finite()) {
        return Err(RotationError::ArgumentError(
            "direction sets contain non-finite components".to_string(),
        ));
    }

    // Perform SVD: C = U·S·Vᵗ
    let svd = c.svd(true, true);
    let u = svd.u.ok_or(RotationError::SvdFailed)?;
    let v_t = svd.v_t.ok_or(RotationError::SvdFailed)?;
    let v = v_t.transpose();

    // Handle reflection case: flip the axis of the smallest singular value so the
    // result always has determinant +1, even for coplanar direction sets
    let det_sign = if determinant_cofactor(&(v * u.transpose())) < 0.0 {
        -1.0
    } else {
        1.0
    };
    let weakest = svd.singular_values.imin();
    let mut d = Matrix3::identity();
    d[(weakest, weakest)] = det_sign;

    Ok(v * d * u.transpose())
}

/// Converts ndarray point representation to nalgebra Vector3 format.
///
/// Input must have shape [n_points, 3] where each row is [x, y, z].
pub(super) fn convert_to_vector3_points(points: &Array2<f64>) -> Vec<Vector3<f64>> {
    let mut result = Vec::with_capacity(points.shape()[0]);

    for i in 0..points.shape()[0] {
        result.push(Vector3::new(points[(i, 0)], points[(i, 1)], points[(i, 2)]));
    }

    result
}

/// Root-mean-square chord length between rotated predictions and measurements.
///
/// RMS = sqrt((1/n) × Σ||R × pᵢ - qᵢ||²)
pub(super) fn calculate_rms_residual(
    predicted: &[Vector3<f64>],
    measured: &[Vector3<f64>],
    rotation: &Matrix3<f64>,
) -> f64 {
    if predicted.is_empty() {
        return f64::INFINITY;
    }

    let total: f64 = predicted
        .iter()
        .zip(measured)
        .map(|(p, q)| (rotation * p - q).norm_squared())
        .sum();

    (total / predicted.len() as f64).sqrt()
}
