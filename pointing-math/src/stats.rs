//! Robust statistics over per-star residuals.

use num_traits::Float;
use thiserror::Error;

/// Error types for statistics over residual sets
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StatsError {
    #[error("NaN value encountered at index {0}")]
    NaNEncountered(usize),
    #[error("No data provided (empty slice)")]
    NoData,
}

/// Median of a slice of floating point values.
///
/// Even-length inputs return the mean of the two central values. The input is not
/// modified; a sorted copy is made.
///
/// # Returns
/// * `Ok(T)` - The median
/// * `Err(StatsError::NaNEncountered(index))` - If any value is NaN
/// * `Err(StatsError::NoData)` - If the slice is empty
pub fn median<T: Float>(data: &[T]) -> Result<T, StatsError> {
    if data.is_empty() {
        return Err(StatsError::NoData);
    }
    if let Some(index) = data.iter().position(|v| v.is_nan()) {
        return Err(StatsError::NaNEncountered(index));
    }

    let mut sorted = data.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Ok(sorted[mid])
    } else {
        let two = T::one() + T::one();
        Ok((sorted[mid - 1] + sorted[mid]) / two)
    }
}
