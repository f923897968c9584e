//! Estimate all-sky camera pointing errors from star imagery.
//!
//! ```bash
//! allsky-cal rank 2013-12-13T06 2013-12-13T09 \
//!     --imagery-dir /data/l1 --calibration rank_calibration.json --catalog BSC5 \
//!     --export-dir out --show-progress
//! ```
//!
//! Set `RUST_LOG` to control log output; `--verbose` lowers the default level to
//! `debug`.

use allsky_cal::analysis::{analyze_imagery, ImageAnalyzer};
use allsky_cal::config::AnalysisConfig;
use allsky_cal::export::{export_json, ExportMetadata};
use allsky_cal::imagery::RawFrameDirectory;
use anyhow::{bail, Context, Result};
use clap::Parser;
use ephemeris::epoch::{format_epoch, parse_epoch};
use indicatif::{ProgressBar, ProgressStyle};
use shared::calibration::CalibrationReference;
use shared::catalog::StarCatalog;
use std::path::PathBuf;

/// Four-letter site code, lower-cased
fn parse_site(s: &str) -> Result<String, String> {
    if s.len() == 4 && s.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(s.to_ascii_lowercase())
    } else {
        Err(format!("site must be four letters, got '{s}'"))
    }
}

fn parse_time(s: &str) -> Result<f64, String> {
    parse_epoch(s).map_err(|e| e.to_string())
}

#[derive(Parser, Debug)]
#[command(
    name = "allsky-cal",
    about = "Estimates all-sky camera pointing errors by fitting catalog star positions to imagery",
    long_about = None
)]
struct Args {
    /// Four-letter site code
    #[arg(value_parser = parse_site)]
    site: String,

    /// Start of the calibration window (yyyy-mm-ddTHH:MM:SS.sss)
    #[arg(value_parser = parse_time)]
    first_cal_time: f64,

    /// End of the calibration window (yyyy-mm-ddTHH:MM:SS.sss)
    #[arg(value_parser = parse_time)]
    last_cal_time: f64,

    /// Directory holding the image files
    #[arg(long, default_value = ".")]
    imagery_dir: PathBuf,

    /// Camera calibration reference (JSON)
    #[arg(long)]
    calibration: PathBuf,

    /// Yale Bright Star Catalog binary
    #[arg(long)]
    catalog: PathBuf,

    /// Directory for the exported file
    #[arg(long, default_value = ".")]
    export_dir: PathBuf,

    /// Analysis configuration (JSON); command line options take precedence
    #[arg(long)]
    config: Option<PathBuf>,

    /// Brightest visible stars used per image
    #[arg(long)]
    number_of_calibration_stars: Option<usize>,

    /// Half-width in pixels of the star search box
    #[arg(long)]
    star_search_box_width: Option<usize>,

    /// Largest centroid motion in pixels between consecutive images
    #[arg(long)]
    star_max_jitter_pixels: Option<f64>,

    /// Lowest star elevation in degrees
    #[arg(long)]
    min_elevation: Option<f64>,

    /// Log every calibration star of every image
    #[arg(long)]
    print_star_info: bool,

    /// Show a progress bar over image files
    #[arg(long)]
    show_progress: bool,

    /// Replace an existing export file
    #[arg(long)]
    overwrite: bool,

    /// Debug-level logging
    #[arg(long)]
    verbose: bool,
}

impl Args {
    fn analysis_config(&self) -> Result<AnalysisConfig> {
        let mut config = match &self.config {
            Some(path) => AnalysisConfig::load_from_file(path)
                .with_context(|| format!("Could not load configuration {}", path.display()))?,
            None => AnalysisConfig::default(),
        };

        if let Some(n) = self.number_of_calibration_stars {
            config.n_calibration_stars = n;
        }
        if let Some(width) = self.star_search_box_width {
            config.search_box_half_width = width;
        }
        if let Some(jitter) = self.star_max_jitter_pixels {
            config.star_max_jitter_pixels = jitter;
        }
        if let Some(elevation) = self.min_elevation {
            config.min_elevation_deg = elevation;
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let config = args.analysis_config()?;
    if args.first_cal_time >= args.last_cal_time {
        bail!("The first calibration time must precede the last calibration time");
    }

    let catalog = StarCatalog::load_bsc5(&args.catalog).with_context(|| {
        format!("Could not load star catalog file {}", args.catalog.display())
    })?;
    let reference = CalibrationReference::load_from_file(&args.calibration).with_context(|| {
        format!(
            "Could not load calibration file {}",
            args.calibration.display()
        )
    })?;
    if reference.site.to_ascii_lowercase() != args.site {
        log::warn!(
            "Calibration is for site {}, analyzing imagery for {}",
            reference.site,
            args.site
        );
    }

    log::info!(
        "Calibrating {} from {} to {}",
        args.site,
        format_epoch(args.first_cal_time)?,
        format_epoch(args.last_cal_time)?
    );

    let source = RawFrameDirectory {
        dir: args.imagery_dir.clone(),
        site: args.site.clone(),
        file_duration_ms: config.file_duration_ms,
    };
    let mut analyzer =
        ImageAnalyzer::new(&catalog, &reference, config)?.with_star_info(args.print_star_info);

    let progress = if args.show_progress {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{msg} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
                .progress_chars("█▉▊▋▌▍▎▏ "),
        );
        Some(bar)
    } else {
        None
    };

    let series = analyze_imagery(
        &source,
        &mut analyzer,
        args.first_cal_time,
        args.last_cal_time,
        progress.as_ref(),
    )?;
    if let Some(bar) = &progress {
        bar.finish_with_message("done");
    }

    let meta = ExportMetadata::new(
        &args.site,
        args.first_cal_time,
        args.last_cal_time,
        &args.calibration,
    );
    let path = export_json(&series, &meta, &args.export_dir, args.overwrite)?;
    println!("{}", path.display());

    Ok(())
}
