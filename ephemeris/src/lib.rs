//! Ephemeris utilities for ground-based sky cameras.
//!
//! Provides the pure geometric machinery the calibration pipeline is built on:
//!
//! - [`epoch`]: millisecond epochs counted from 0000-01-01T00:00 (no leap seconds),
//!   calendar conversion and date-string parsing
//! - [`celestial::frames`]: WGS84 geodetic to Earth-centred Cartesian conversion and
//!   the local east/north/up basis at an observing site
//! - [`celestial`]: right ascension/declination to azimuth/elevation (and back) using
//!   a linear Earth-rotation model referenced to J2000
//!
//! Nothing in this crate fails on numerically undefined input; NaN in gives NaN out.

pub mod celestial;
pub mod epoch;

pub use celestial::frames::{geodetic_to_ecef, EcefPosition, EnuBasis, GeodeticSite};
pub use celestial::{
    az_el_to_ra_dec, az_el_to_unit_vector, ra_dec_to_az_el, unit_vector_to_az_el, HorizonFrame,
};
pub use epoch::{compute_epoch, parse_epoch, EpochError, J2000_EPOCH, MS_PER_DAY};
