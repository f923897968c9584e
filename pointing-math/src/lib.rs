//! Numerical core for camera pointing-error estimation
//!
//! - [`procrustes`]: least-squares proper rotation between matched unit-vector sets
//! - [`stats`]: robust scalar summaries (median) of per-star residuals

pub mod procrustes;
pub mod stats;

pub use procrustes::{
    axis_angle_from_dcm, estimate_rotation, estimate_rotation_from_pairs, DirectionPair,
    RotationError, RotationEstimate,
};
pub use stats::{median, StatsError};
