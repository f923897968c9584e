//! All-sky camera pointing-error calibration.
//!
//! Predicts where catalog stars should appear in each frame of a calibration
//! window, localizes them, and fits the rotation that maps predicted onto measured
//! star directions. The per-frame rotations are exported as a time series.
//!
//! - [`config`]: analysis tunables
//! - [`imagery`]: image file discovery and frame access
//! - [`analysis`]: per-frame estimation and the driver over a time window
//! - [`export`]: JSON output

pub mod analysis;
pub mod config;
pub mod export;
pub mod imagery;

pub use analysis::{
    analyze_imagery, AnalysisError, ImageAnalyzer, PointingErrorRecord, PointingErrorSeries,
};
pub use config::{AnalysisConfig, ConfigError};
pub use export::{export_json, ExportError, ExportMetadata};
pub use imagery::{ImageRecord, ImageryError, ImageryFile, ImagerySource, RawFrameDirectory};
