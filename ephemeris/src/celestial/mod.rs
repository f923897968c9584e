//! Horizon and equatorial coordinates
//!
//! Azimuth is measured clockwise from north, elevation up from the horizon. Right
//! ascension and declination are referenced to the Earth's rotation axis and a
//! Greenwich sidereal angle that advances linearly from J2000; leap seconds,
//! precession and nutation are ignored. All angles here are in degrees.

pub mod frames;

use nalgebra::Vector3;

use crate::epoch::{J2000_EPOCH, MS_PER_DAY};
use frames::{EnuBasis, GeodeticSite};

/// Earth rotations per mean solar day.
pub const SIDEREAL_ROTATIONS_PER_DAY: f64 = 1.002_737_811_911_354_48;

/// Fraction of a rotation completed at J2000.
const ROTATION_FRACTION_AT_J2000: f64 = 0.779_057_273_264_0;

/// Greenwich sidereal angle in degrees, in `[0, 360)`.
pub fn greenwich_sidereal_angle_deg(epoch: f64) -> f64 {
    let days = (epoch - J2000_EPOCH) / MS_PER_DAY;
    // Whole days contribute whole rotations; keep only the fractional parts
    let fraction = ROTATION_FRACTION_AT_J2000
        + (SIDEREAL_ROTATIONS_PER_DAY - 1.0) * days
        + days.rem_euclid(1.0);
    fraction.rem_euclid(1.0) * 360.0
}

fn wrap_degrees(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(360.0);
    // rem_euclid can return 360.0 for tiny negative inputs
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Unit vector in the local (east, north, up) frame for an azimuth/elevation.
pub fn az_el_to_unit_vector(azimuth_deg: f64, elevation_deg: f64) -> Vector3<f64> {
    let (sin_az, cos_az) = azimuth_deg.to_radians().sin_cos();
    let (sin_el, cos_el) = elevation_deg.to_radians().sin_cos();
    Vector3::new(cos_el * sin_az, cos_el * cos_az, sin_el)
}

/// Azimuth/elevation of a local (east, north, up) direction. The vector need not be
/// normalized.
pub fn unit_vector_to_az_el(direction: &Vector3<f64>) -> (f64, f64) {
    let norm = direction.norm();
    let elevation = (direction.z / norm).clamp(-1.0, 1.0).asin().to_degrees();
    let azimuth = wrap_degrees(90.0 - direction.y.atan2(direction.x).to_degrees());
    (azimuth, elevation)
}

/// Horizon frame of one site at one instant.
///
/// Caches the ENU basis and the sidereal angle so that many stars can be converted
/// for the same image without recomputing them.
#[derive(Debug, Clone, Copy)]
pub struct HorizonFrame {
    basis: EnuBasis,
    sidereal_angle_deg: f64,
}

impl HorizonFrame {
    pub fn new(epoch: f64, site: &GeodeticSite) -> Self {
        Self {
            basis: EnuBasis::at(site),
            sidereal_angle_deg: greenwich_sidereal_angle_deg(epoch),
        }
    }

    /// Local (east, north, up) unit vector toward a right ascension/declination.
    pub fn ra_dec_to_local(&self, ra_deg: f64, dec_deg: f64) -> Vector3<f64> {
        let hour = (ra_deg - self.sidereal_angle_deg).to_radians();
        let (sin_dec, cos_dec) = dec_deg.to_radians().sin_cos();
        let ecef = Vector3::new(cos_dec * hour.cos(), cos_dec * hour.sin(), sin_dec);
        self.basis.to_local(&ecef)
    }

    /// Convert right ascension/declination to (azimuth, elevation).
    pub fn ra_dec_to_az_el(&self, ra_deg: f64, dec_deg: f64) -> (f64, f64) {
        unit_vector_to_az_el(&self.ra_dec_to_local(ra_deg, dec_deg))
    }

    /// Convert (azimuth, elevation) to (right ascension, declination).
    pub fn az_el_to_ra_dec(&self, azimuth_deg: f64, elevation_deg: f64) -> (f64, f64) {
        let local = az_el_to_unit_vector(azimuth_deg, elevation_deg);
        let ecef = self.basis.to_ecef(&local);
        let dec = ecef.z.clamp(-1.0, 1.0).asin().to_degrees();
        let ra = wrap_degrees(ecef.y.atan2(ecef.x).to_degrees() + self.sidereal_angle_deg);
        (ra, dec)
    }
}

/// Convert right ascension/declination to (azimuth, elevation) at a site and epoch.
pub fn ra_dec_to_az_el(epoch: f64, site: &GeodeticSite, ra_deg: f64, dec_deg: f64) -> (f64, f64) {
    HorizonFrame::new(epoch, site).ra_dec_to_az_el(ra_deg, dec_deg)
}

/// Convert (azimuth, elevation) to (right ascension, declination) at a site and epoch.
pub fn az_el_to_ra_dec(
    epoch: f64,
    site: &GeodeticSite,
    azimuth_deg: f64,
    elevation_deg: f64,
) -> (f64, f64) {
    HorizonFrame::new(epoch, site).az_el_to_ra_dec(azimuth_deg, elevation_deg)
}
