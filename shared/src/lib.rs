//! Shared building blocks for all-sky camera calibration.
//!
//! - [`grid`]: fixed-size pixel grids with bounds-checked (column, row) access
//! - [`image_size`]: image dimensions
//! - [`calibration`]: the per-camera reference (site, az/el map, dark offsets) and
//!   the pixel direction map derived from it
//! - [`catalog`]: the magnitude-sorted star catalog, its BSC5 decode layer and
//!   per-image calibration star selection
//! - [`image_proc`]: background subtraction and star localization

pub mod calibration;
pub mod catalog;
pub mod grid;
pub mod image_proc;
pub mod image_size;

pub use calibration::{CalibrationError, CalibrationReference, PixelDirectionMap};
pub use catalog::{CatalogError, Star, StarCatalog};
pub use grid::{Grid, GridError};
pub use image_size::ImageSize;
