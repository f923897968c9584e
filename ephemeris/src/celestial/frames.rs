//! Earth-fixed reference frames at an observing site.
//!
//! Converts WGS84 geodetic coordinates to Earth-centred, Earth-fixed (ECEF) Cartesian
//! coordinates and builds the local east/north/up (ENU) basis used for horizon
//! coordinates.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// WGS84 ellipsoid semi-major axis in metres.
pub const WGS84_SEMI_MAJOR_AXIS_M: f64 = 6_378_137.0;

/// WGS84 ellipsoid semi-minor axis in metres.
pub const WGS84_SEMI_MINOR_AXIS_M: f64 = 6_356_752.314245;

/// Geodetic position of a camera site.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeodeticSite {
    /// Geodetic latitude in degrees, positive north
    pub latitude_deg: f64,
    /// Longitude in degrees, positive east
    pub longitude_deg: f64,
    /// Height above the ellipsoid in metres
    pub altitude_m: f64,
}

impl GeodeticSite {
    pub fn new(latitude_deg: f64, longitude_deg: f64, altitude_m: f64) -> Self {
        Self {
            latitude_deg,
            longitude_deg,
            altitude_m,
        }
    }
}

/// Result of [`geodetic_to_ecef`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EcefPosition {
    /// ECEF position in metres
    pub position: Vector3<f64>,
    /// Offset along the polar axis that turns `position` into a vector parallel to
    /// the ellipsoid normal: `position + (0, 0, ellipsoid_offset)`
    pub ellipsoid_offset: f64,
}

impl EcefPosition {
    /// Vector along the local vertical (ellipsoid normal), not normalized.
    pub fn vertical(&self) -> Vector3<f64> {
        self.position + Vector3::new(0.0, 0.0, self.ellipsoid_offset)
    }
}

/// Convert WGS84 geodetic coordinates to ECEF using the closed-form ellipsoid formula.
pub fn geodetic_to_ecef(site: &GeodeticSite) -> EcefPosition {
    let a2 = WGS84_SEMI_MAJOR_AXIS_M * WGS84_SEMI_MAJOR_AXIS_M;
    let b2 = WGS84_SEMI_MINOR_AXIS_M * WGS84_SEMI_MINOR_AXIS_M;

    let lat = site.latitude_deg.to_radians();
    let lon = site.longitude_deg.to_radians();
    let (sin_lat, cos_lat) = lat.sin_cos();
    let (sin_lon, cos_lon) = lon.sin_cos();

    // Prime vertical radius of curvature
    let n = a2 / (a2 * cos_lat * cos_lat + b2 * sin_lat * sin_lat).sqrt();
    let h = site.altitude_m;

    let position = Vector3::new(
        (n + h) * cos_lat * cos_lon,
        (n + h) * cos_lat * sin_lon,
        (b2 / a2 * n + h) * sin_lat,
    );

    EcefPosition {
        position,
        ellipsoid_offset: n * (1.0 - b2 / a2) * sin_lat,
    }
}

/// Orthonormal east/north/up unit vectors at a site, expressed in ECEF.
///
/// Degenerate (NaN) at the geographic poles where east is undefined.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnuBasis {
    pub east: Vector3<f64>,
    pub north: Vector3<f64>,
    pub up: Vector3<f64>,
}

impl EnuBasis {
    /// Build the basis at a geodetic site.
    pub fn at(site: &GeodeticSite) -> Self {
        let up = geodetic_to_ecef(site).vertical().normalize();
        let east = Vector3::z().cross(&up).normalize();
        let north = up.cross(&east).normalize();
        Self { east, north, up }
    }

    /// Express an ECEF vector in local (east, north, up) components.
    pub fn to_local(&self, ecef: &Vector3<f64>) -> Vector3<f64> {
        Vector3::new(ecef.dot(&self.east), ecef.dot(&self.north), ecef.dot(&self.up))
    }

    /// Express a local (east, north, up) vector in ECEF.
    pub fn to_ecef(&self, local: &Vector3<f64>) -> Vector3<f64> {
        self.east * local.x + self.north * local.y + self.up * local.z
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_equator_prime_meridian() {
        let ecef = geodetic_to_ecef(&GeodeticSite::new(0.0, 0.0, 0.0));
        assert_relative_eq!(ecef.position.x, WGS84_SEMI_MAJOR_AXIS_M, epsilon = 1e-6);
        assert_relative_eq!(ecef.position.y, 0.0, epsilon = 1e-6);
        assert_relative_eq!(ecef.position.z, 0.0, epsilon = 1e-6);
        assert_relative_eq!(ecef.ellipsoid_offset, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_near_pole_reaches_semi_minor_axis() {
        let ecef = geodetic_to_ecef(&GeodeticSite::new(90.0, 0.0, 0.0));
        assert_relative_eq!(ecef.position.z, WGS84_SEMI_MINOR_AXIS_M, epsilon = 1e-3);
    }

    #[test]
    fn test_vertical_matches_geodetic_normal() {
        let site = GeodeticSite::new(62.82, -92.11, 25.0);
        let up = geodetic_to_ecef(&site).vertical().normalize();
        let lat = site.latitude_deg.to_radians();
        let lon = site.longitude_deg.to_radians();
        let normal = Vector3::new(lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin());
        assert_relative_eq!(up, normal, epsilon = 1e-12);
    }

    #[test]
    fn test_enu_is_orthonormal_and_right_handed() {
        let basis = EnuBasis::at(&GeodeticSite::new(62.82, -92.11, 0.0));
        assert_relative_eq!(basis.east.norm(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(basis.north.norm(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(basis.up.norm(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(basis.east.dot(&basis.north), 0.0, epsilon = 1e-12);
        assert_relative_eq!(basis.east.cross(&basis.north), basis.up, epsilon = 1e-12);
        // North points toward the polar axis
        assert!(basis.north.z > 0.0);
    }

    #[test]
    fn test_local_ecef_round_trip() {
        let basis = EnuBasis::at(&GeodeticSite::new(-33.9, 151.2, 50.0));
        let v = Vector3::new(0.3, -0.5, 0.81);
        assert_relative_eq!(basis.to_local(&basis.to_ecef(&v)), v, epsilon = 1e-12);
    }
}
