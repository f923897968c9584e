//! End-to-end runs over a synthetic equidistant fisheye camera.
//!
//! Catalog stars are placed at the sky directions of chosen pixels (optionally
//! through a known pointing rotation) and frames are rendered with single bright
//! pixels on a noisy dark background, so the recovered rotation is known exactly.

use allsky_cal::analysis::{analyze_imagery, AnalysisError, ImageAnalyzer};
use allsky_cal::config::AnalysisConfig;
use allsky_cal::export::{export_json, ExportMetadata};
use allsky_cal::imagery::{
    ImageRecord, ImageryError, ImageryFile, ImagerySource, RawFrameDirectory, RawFrameWriter,
};
use approx::assert_relative_eq;
use ephemeris::{
    az_el_to_ra_dec, az_el_to_unit_vector, compute_epoch, unit_vector_to_az_el, GeodeticSite,
};
use nalgebra::{Matrix3, Rotation3, Vector3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use shared::calibration::CalibrationReference;
use shared::catalog::{Star, StarCatalog};
use shared::grid::Grid;
use shared::image_size::ImageSize;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

const SIZE: usize = 64;
const DARK_OFFSET: u16 = 100;
const STAR_SIGNAL: u16 = 5000;
const STAR_PIXELS: [(usize, usize); 4] = [(40, 22), (20, 30), (33, 45), (25, 15)];

fn window_start() -> f64 {
    compute_epoch(2013, 12, 13, 6, 0, 0, 0).unwrap()
}

fn site() -> GeodeticSite {
    GeodeticSite::new(62.82, -92.11, 0.0)
}

/// Zenith at the centre, 3 degrees per pixel, horizon at radius 30
fn fisheye_reference() -> CalibrationReference {
    let centre = (SIZE as f64 - 1.0) / 2.0;
    let mut azimuths = Vec::with_capacity(SIZE * SIZE);
    let mut elevations = Vec::with_capacity(SIZE * SIZE);
    for row in 0..SIZE {
        for column in 0..SIZE {
            let east = column as f64 - centre;
            let north = centre - row as f64;
            let radius = east.hypot(north);
            if radius <= 30.0 {
                azimuths.push(east.atan2(north).to_degrees().rem_euclid(360.0));
                elevations.push(90.0 - 3.0 * radius);
            } else {
                azimuths.push(f64::NAN);
                elevations.push(f64::NAN);
            }
        }
    }

    CalibrationReference {
        site: "rank".to_string(),
        location: site(),
        width: SIZE,
        height: SIZE,
        azimuths_deg: azimuths,
        elevations_deg: elevations,
        pixel_offsets: vec![DARK_OFFSET as f64; SIZE * SIZE],
    }
}

fn catalog_for(
    reference: &CalibrationReference,
    epoch: f64,
    pointing: &Rotation3<f64>,
) -> StarCatalog {
    catalog_at(reference, epoch, pointing, &STAR_PIXELS)
}

/// Catalog whose stars, seen at `epoch`, land on `pixels` after `pointing` is
/// applied to their predicted directions. Earlier pixels get brighter stars.
fn catalog_at(
    reference: &CalibrationReference,
    epoch: f64,
    pointing: &Rotation3<f64>,
    pixels: &[(usize, usize)],
) -> StarCatalog {
    let stars = pixels
        .iter()
        .enumerate()
        .map(|(i, &(column, row))| {
            let index = row * SIZE + column;
            let measured = az_el_to_unit_vector(
                reference.azimuths_deg[index],
                reference.elevations_deg[index],
            );
            let predicted = pointing.inverse() * measured;
            let (az, el) = unit_vector_to_az_el(&predicted);
            let (ra, dec) = az_el_to_ra_dec(epoch, &reference.location, az, el);
            Star {
                catalog_number: 1000.0 + i as f32,
                ra_rad: ra.to_radians(),
                dec_rad: dec.to_radians(),
                spectral_type: "A0".to_string(),
                magnitude: 1.0 + i as f64,
                pm_ra_rad_per_year: 0.0,
                pm_dec_rad_per_year: 0.0,
            }
        })
        .collect();
    StarCatalog::from_stars(stars)
}

/// Dark frame with a few counts of noise and one bright pixel per star
fn render(rng: &mut ChaCha8Rng, stars: &[(usize, usize)]) -> Grid<u16> {
    let mut values: Vec<u16> = (0..SIZE * SIZE)
        .map(|_| DARK_OFFSET + rng.random_range(0..5))
        .collect();
    for &(column, row) in stars {
        values[row * SIZE + column] = DARK_OFFSET + STAR_SIGNAL;
    }
    Grid::from_row_major(ImageSize::from_width_height(SIZE, SIZE), values).unwrap()
}

fn test_config() -> AnalysisConfig {
    AnalysisConfig {
        n_calibration_stars: 4,
        min_stars_per_image: 3,
        min_elevation_deg: 20.0,
        ..Default::default()
    }
}

struct MemoryFile {
    path: PathBuf,
    records: Vec<ImageRecord>,
    broken: Vec<usize>,
}

impl ImageryFile for MemoryFile {
    fn path(&self) -> &Path {
        &self.path
    }

    fn record_count(&self) -> usize {
        self.records.len()
    }

    fn read_record(&mut self, index: usize) -> Result<ImageRecord, ImageryError> {
        if self.broken.contains(&index) {
            return Err(ImageryError::Malformed {
                path: self.path.clone(),
                reason: format!("record {index} is corrupt"),
            });
        }
        self.records
            .get(index)
            .cloned()
            .ok_or(ImageryError::RecordIndex {
                index,
                count: self.records.len(),
            })
    }
}

/// Files listed in order; paths without records fail to open
struct MemorySource {
    files: Vec<(PathBuf, Vec<ImageRecord>, Vec<usize>)>,
    unreadable: Vec<PathBuf>,
}

impl ImagerySource for MemorySource {
    type File = MemoryFile;

    fn list_files(&self, _first: f64, _last: f64) -> Result<Vec<PathBuf>, ImageryError> {
        let mut paths: Vec<PathBuf> = self.unreadable.clone();
        paths.extend(self.files.iter().map(|(path, _, _)| path.clone()));
        Ok(paths)
    }

    fn open(&self, path: &Path) -> Result<MemoryFile, ImageryError> {
        self.files
            .iter()
            .find(|(p, _, _)| p == path)
            .map(|(p, records, broken)| MemoryFile {
                path: p.clone(),
                records: records.clone(),
                broken: broken.clone(),
            })
            .ok_or_else(|| ImageryError::Malformed {
                path: path.to_path_buf(),
                reason: "cannot open".to_string(),
            })
    }
}

#[test]
fn test_aligned_camera_from_frame_directory() {
    let reference = fisheye_reference();
    let start = window_start();
    let epoch = start + 600_000.0;
    let catalog = catalog_for(&reference, epoch, &Rotation3::identity());
    let mut rng = ChaCha8Rng::seed_from_u64(7);

    let dir = tempdir().unwrap();
    let size = ImageSize::from_width_height(SIZE, SIZE);
    let mut writer =
        RawFrameWriter::create(&dir.path().join("thg_l1_asf_rank_2013121306_v01.asif"), size)
            .unwrap();
    for offset_ms in [0.0, 3_000.0, 6_600_000.0] {
        writer
            .write_record(&ImageRecord {
                epoch: epoch + offset_ms,
                pixels: render(&mut rng, &STAR_PIXELS),
            })
            .unwrap();
    }
    writer.finish().unwrap();

    let source = RawFrameDirectory {
        dir: dir.path().to_path_buf(),
        site: "rank".to_string(),
        file_duration_ms: 3_600_000.0,
    };
    let mut analyzer = ImageAnalyzer::new(&catalog, &reference, test_config()).unwrap();
    let series =
        analyze_imagery(&source, &mut analyzer, start, start + 3_600_000.0, None).unwrap();

    // The third frame lies outside the window
    assert_eq!(series.len(), 2);
    assert_eq!(series.star_counts, vec![4, 4]);
    assert_eq!(series.contributing_files.len(), 1);

    let first = series.record(0).unwrap();
    assert!(first.is_estimated());
    assert_relative_eq!(first.dcm, Matrix3::identity(), epsilon = 1e-6);
    assert!(first.angle_deg.abs() < 1e-4);
    assert!(first.median_delta_az_deg.abs() < 1e-6);
    assert!(first.median_abs_delta_el_deg < 1e-6);

    // Three seconds of sky rotation stays well inside one pixel
    let second = series.record(1).unwrap();
    assert!(second.angle_deg < 0.05);

    let meta = ExportMetadata::new("rank", start, start + 3_600_000.0, Path::new("cal.json"));
    let exported = export_json(&series, &meta, dir.path(), false).unwrap();
    assert!(exported.exists());
}

#[test]
fn test_three_exact_stars_give_identity() {
    let reference = fisheye_reference();
    let epoch = window_start() + 600_000.0;
    let pixels = &STAR_PIXELS[..3];
    let catalog = catalog_at(&reference, epoch, &Rotation3::identity(), pixels);

    let config = AnalysisConfig {
        n_calibration_stars: 3,
        min_stars_per_image: 3,
        min_elevation_deg: 20.0,
        ..Default::default()
    };
    let mut analyzer = ImageAnalyzer::new(&catalog, &reference, config).unwrap();
    let mut values = vec![DARK_OFFSET; SIZE * SIZE];
    for &(column, row) in pixels {
        values[row * SIZE + column] = DARK_OFFSET + STAR_SIGNAL;
    }
    let record = ImageRecord {
        epoch,
        pixels: Grid::from_row_major(ImageSize::from_width_height(SIZE, SIZE), values).unwrap(),
    };
    let result = analyzer.analyze_image(&record, true).unwrap();

    assert_eq!(result.star_count, 3);
    assert_relative_eq!(result.dcm, Matrix3::identity(), epsilon = 1e-6);
    assert!(result.angle_deg.abs() < 1e-4);
}

#[test]
fn test_rotated_camera_recovers_rotation() {
    let reference = fisheye_reference();
    let epoch = window_start() + 600_000.0;
    let pointing = Rotation3::from_axis_angle(&Vector3::z_axis(), 2.0_f64.to_radians());
    let catalog = catalog_for(&reference, epoch, &pointing);
    let mut rng = ChaCha8Rng::seed_from_u64(11);

    let mut analyzer = ImageAnalyzer::new(&catalog, &reference, test_config()).unwrap();
    let record = ImageRecord {
        epoch,
        pixels: render(&mut rng, &STAR_PIXELS),
    };
    let result = analyzer.analyze_image(&record, true).unwrap();

    assert_eq!(result.star_count, 4);
    assert_relative_eq!(result.dcm, *pointing.matrix(), epsilon = 1e-6);
    assert_relative_eq!(result.angle_deg, 2.0, epsilon = 1e-6);
    assert_relative_eq!(result.axis, Vector3::z(), epsilon = 1e-6);

    // A turn about the zenith shifts azimuth only
    assert!(result.median_abs_delta_el_deg < 1e-6);
    assert!(result.median_delta_az_deg > 1.0 && result.median_delta_az_deg < 2.0);
}

#[test]
fn test_too_few_stars_gives_nan_record() {
    let reference = fisheye_reference();
    let epoch = window_start() + 600_000.0;
    let catalog = catalog_for(&reference, epoch, &Rotation3::identity());
    let mut rng = ChaCha8Rng::seed_from_u64(3);

    let config = AnalysisConfig {
        n_calibration_stars: 4,
        min_stars_per_image: 4,
        min_elevation_deg: 20.0,
        ..Default::default()
    };
    let mut analyzer = ImageAnalyzer::new(&catalog, &reference, config).unwrap();

    // Only three of the four stars are in the frame
    let record = ImageRecord {
        epoch,
        pixels: render(&mut rng, &STAR_PIXELS[..3]),
    };
    let result = analyzer.analyze_image(&record, true).unwrap();

    assert!(!result.is_estimated());
    assert!(result.dcm.iter().all(|v| v.is_nan()));
    assert!(result.axis.iter().all(|v| v.is_nan()));
    assert_eq!(result.star_count, 3);
    assert!(analyzer.stars()[3].measurement.is_none());
}

#[test]
fn test_jitter_gate_and_unreadable_input() {
    let reference = fisheye_reference();
    let start = window_start();
    let epoch = start + 600_000.0;
    let catalog = catalog_for(&reference, epoch, &Rotation3::identity());
    let mut rng = ChaCha8Rng::seed_from_u64(5);

    // The brightest star jumps four pixels east between frames
    let mut moved = STAR_PIXELS;
    moved[0] = (44, 22);

    let frame = |rng: &mut ChaCha8Rng, offset_ms: f64, stars: &[(usize, usize)]| ImageRecord {
        epoch: epoch + offset_ms,
        pixels: render(rng, stars),
    };
    let file_a = vec![
        frame(&mut rng, 0.0, &STAR_PIXELS),
        frame(&mut rng, 1_000.0, &STAR_PIXELS),
        frame(&mut rng, 2_000.0, &moved),
    ];
    let file_b = vec![frame(&mut rng, 4_000.0, &moved)];

    let source = MemorySource {
        files: vec![
            (PathBuf::from("a.asif"), file_a, vec![1]),
            (PathBuf::from("b.asif"), file_b, vec![]),
        ],
        unreadable: vec![PathBuf::from("corrupt.asif")],
    };

    let mut analyzer = ImageAnalyzer::new(&catalog, &reference, test_config()).unwrap();
    let series =
        analyze_imagery(&source, &mut analyzer, start, start + 3_600_000.0, None).unwrap();

    // Moved star rejected within file a, accepted again as the first frame of file b
    assert_eq!(series.star_counts, vec![4, 3, 4]);
    assert_eq!(
        series.contributing_files,
        vec![PathBuf::from("a.asif"), PathBuf::from("b.asif")]
    );
    assert!(series.record(1).unwrap().angle_deg < 0.05);
}

#[test]
fn test_no_usable_data() {
    let reference = fisheye_reference();
    let start = window_start();
    let catalog = StarCatalog::from_stars(Vec::new());
    let mut rng = ChaCha8Rng::seed_from_u64(1);

    let source = MemorySource {
        files: vec![(
            PathBuf::from("a.asif"),
            vec![ImageRecord {
                epoch: start + 1_000.0,
                pixels: render(&mut rng, &STAR_PIXELS),
            }],
            vec![],
        )],
        unreadable: Vec::new(),
    };

    let mut analyzer = ImageAnalyzer::new(&catalog, &reference, test_config()).unwrap();
    let result = analyze_imagery(&source, &mut analyzer, start, start + 3_600_000.0, None);
    assert!(matches!(
        result,
        Err(AnalysisError::NoUsableData {
            analyzed: 0,
            required: 1
        })
    ));
}

#[test]
fn test_zero_candidates_give_nan_record() {
    let reference = fisheye_reference();
    let catalog = StarCatalog::from_stars(Vec::new());
    let mut rng = ChaCha8Rng::seed_from_u64(2);

    let mut analyzer = ImageAnalyzer::new(&catalog, &reference, test_config()).unwrap();
    let record = ImageRecord {
        epoch: window_start() + 1_000.0,
        pixels: render(&mut rng, &STAR_PIXELS),
    };
    let result = analyzer.analyze_image(&record, true).unwrap();

    assert!(!result.is_estimated());
    assert!(result.dcm.iter().all(|v| v.is_nan()));
    assert!(result.angle_deg.is_nan());
    assert!(result.median_delta_az_deg.is_nan());
    assert_eq!(result.star_count, 0);
    assert_eq!(result.epoch, record.epoch);
    assert!(analyzer.stars().is_empty());
}

#[test]
fn test_undefined_frame_time_is_skipped() {
    let reference = fisheye_reference();
    let start = window_start();
    let epoch = start + 600_000.0;
    let catalog = catalog_for(&reference, epoch, &Rotation3::identity());
    let mut rng = ChaCha8Rng::seed_from_u64(9);

    let untimed = ImageRecord {
        epoch: f64::NAN,
        pixels: render(&mut rng, &STAR_PIXELS),
    };
    let timed = ImageRecord {
        epoch,
        pixels: render(&mut rng, &STAR_PIXELS),
    };
    let source = MemorySource {
        files: vec![
            (PathBuf::from("a.asif"), vec![untimed.clone()], vec![]),
            (PathBuf::from("b.asif"), vec![untimed, timed], vec![]),
        ],
        unreadable: Vec::new(),
    };

    let mut analyzer = ImageAnalyzer::new(&catalog, &reference, test_config()).unwrap();
    let series =
        analyze_imagery(&source, &mut analyzer, start, start + 3_600_000.0, None).unwrap();

    assert_eq!(series.timestamps, vec![epoch]);
    assert_eq!(series.star_counts, vec![4]);
    assert_eq!(series.contributing_files, vec![PathBuf::from("b.asif")]);
}
