//! Per-image calibration star selection.

use ephemeris::epoch::julian_years_since_j2000;
use ephemeris::{az_el_to_unit_vector, GeodeticSite, HorizonFrame};
use nalgebra::Vector3;
use std::f64::consts::TAU;

use super::{Star, StarCatalog};

/// A catalog star predicted above the elevation bound at one epoch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    /// Index into the magnitude-sorted catalog
    pub catalog_index: usize,
    pub magnitude: f64,
    pub azimuth_deg: f64,
    pub elevation_deg: f64,
    /// Predicted east/north/up unit direction
    pub direction: Vector3<f64>,
}

/// Right ascension/declination (radians) of a star at `epoch`, after proper motion.
/// Right ascension is wrapped into `[0, 2π)`.
pub fn star_position_at_epoch(star: &Star, epoch: f64) -> (f64, f64) {
    let years = julian_years_since_j2000(epoch);
    let ra = (star.ra_rad + star.pm_ra_rad_per_year * years).rem_euclid(TAU);
    let dec = star.dec_rad + star.pm_dec_rad_per_year * years;
    (ra, dec)
}

/// Fill `out` with up to `max_count` of the brightest catalog stars whose predicted
/// elevation exceeds `elevation_bound_deg`, in catalog order. Returns the count.
pub fn select_calibration_stars_into(
    catalog: &StarCatalog,
    frame: &HorizonFrame,
    epoch: f64,
    max_count: usize,
    elevation_bound_deg: f64,
    out: &mut Vec<Candidate>,
) -> usize {
    out.clear();
    if max_count == 0 {
        return 0;
    }

    for (catalog_index, star) in catalog.stars().iter().enumerate() {
        let (ra, dec) = star_position_at_epoch(star, epoch);
        let (azimuth_deg, elevation_deg) = frame.ra_dec_to_az_el(ra.to_degrees(), dec.to_degrees());

        if elevation_deg > elevation_bound_deg {
            out.push(Candidate {
                catalog_index,
                magnitude: star.magnitude,
                azimuth_deg,
                elevation_deg,
                direction: az_el_to_unit_vector(azimuth_deg, elevation_deg),
            });
            if out.len() == max_count {
                break;
            }
        }
    }
    out.len()
}

/// Select calibration star candidates for one site and epoch.
pub fn select_calibration_stars(
    catalog: &StarCatalog,
    site: &GeodeticSite,
    epoch: f64,
    max_count: usize,
    elevation_bound_deg: f64,
) -> Vec<Candidate> {
    let frame = HorizonFrame::new(epoch, site);
    let mut candidates = Vec::with_capacity(max_count);
    select_calibration_stars_into(
        catalog,
        &frame,
        epoch,
        max_count,
        elevation_bound_deg,
        &mut candidates,
    );
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::test_star;
    use approx::assert_relative_eq;
    use ephemeris::{compute_epoch, J2000_EPOCH, MS_PER_DAY};

    fn site() -> GeodeticSite {
        GeodeticSite::new(62.82, -92.11, 0.0)
    }

    fn spread_catalog() -> StarCatalog {
        let mut stars = Vec::new();
        for i in 0..200 {
            let ra = (i as f64 * 37.0) % 360.0;
            let dec = -80.0 + (i as f64 * 13.0) % 160.0;
            stars.push(test_star(i as f32, ra, dec, i as f64 * 0.03));
        }
        StarCatalog::from_stars(stars)
    }

    #[test]
    fn test_respects_count_and_elevation_bound() {
        let catalog = spread_catalog();
        let epoch = compute_epoch(2013, 12, 13, 6, 0, 0, 0).unwrap();

        for (max_count, bound) in [(25, 10.0), (5, 45.0), (200, 0.0), (1, 80.0)] {
            let candidates = select_calibration_stars(&catalog, &site(), epoch, max_count, bound);
            assert!(candidates.len() <= max_count);
            for c in &candidates {
                assert!(c.elevation_deg > bound);
                assert_relative_eq!(c.direction.norm(), 1.0, epsilon = 1e-12);
            }
            assert!(candidates
                .windows(2)
                .all(|pair| pair[0].catalog_index < pair[1].catalog_index));
        }
    }

    #[test]
    fn test_zero_candidates_is_legal() {
        let catalog = spread_catalog();
        let epoch = compute_epoch(2013, 12, 13, 6, 0, 0, 0).unwrap();
        assert!(select_calibration_stars(&catalog, &site(), epoch, 0, 10.0).is_empty());
        assert!(select_calibration_stars(&catalog, &site(), epoch, 10, 90.0).is_empty());
        assert!(
            select_calibration_stars(&StarCatalog::default(), &site(), epoch, 10, 10.0).is_empty()
        );
    }

    #[test]
    fn test_polaris_like_star_always_selected() {
        // Near the celestial pole the elevation is close to the site latitude at any time
        let catalog = StarCatalog::from_stars(vec![test_star(424.0, 37.95, 89.26, 2.0)]);
        let base = compute_epoch(2013, 12, 13, 0, 0, 0, 0).unwrap();
        for hour in 0..24 {
            let epoch = base + hour as f64 * MS_PER_DAY / 24.0;
            let candidates = select_calibration_stars(&catalog, &site(), epoch, 5, 10.0);
            assert_eq!(candidates.len(), 1);
            assert!((candidates[0].elevation_deg - 62.82).abs() < 1.0);
        }
    }

    #[test]
    fn test_proper_motion_applied() {
        let mut star = test_star(1.0, 359.9, 10.0, 1.0);
        star.pm_ra_rad_per_year = 1e-3;
        star.pm_dec_rad_per_year = -2e-4;

        let (ra, dec) = star_position_at_epoch(&star, J2000_EPOCH);
        assert_relative_eq!(ra, star.ra_rad, epsilon = 1e-12);
        assert_relative_eq!(dec, star.dec_rad, epsilon = 1e-12);

        let ten_years = J2000_EPOCH + 10.0 * 365.25 * MS_PER_DAY;
        let (ra, dec) = star_position_at_epoch(&star, ten_years);
        assert_relative_eq!(ra, (star.ra_rad + 1e-2).rem_euclid(TAU), epsilon = 1e-9);
        assert!(ra < 0.01);
        assert_relative_eq!(dec, star.dec_rad - 2e-3, epsilon = 1e-9);
    }
}
