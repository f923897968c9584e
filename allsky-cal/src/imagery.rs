//! Imagery file discovery and frame access.
//!
//! Image files are named `thg_l1_asf_<site>_<yyyymmddhh>_v<nn>.<ext>`, where the
//! ten-digit field is the UT hour the file starts. Each file holds a sequence of
//! timestamped frames of one fixed size.
//!
//! [`RawFrameFile`] is the on-disk frame container read by the command line tool:
//!
//! ```text
//! header  b"ASIF"  u32 width  u32 height  u32 record_count     (little-endian)
//! record  f64 epoch  width*height u16 pixels, row-major
//! ```

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use ephemeris::epoch::compute_epoch;
use shared::grid::{Grid, GridError};
use shared::image_size::ImageSize;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const RAW_FRAME_MAGIC: &[u8; 4] = b"ASIF";
const HEADER_SIZE: u64 = 16;

#[derive(Error, Debug)]
pub enum ImageryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed frame file {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },
    #[error("record {index} out of range for a file of {count} records")]
    RecordIndex { index: usize, count: usize },
    #[error(transparent)]
    Grid(#[from] GridError),
}

/// One timestamped frame
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    /// Milliseconds since 0000-01-01T00:00 UT
    pub epoch: f64,
    pub pixels: Grid<u16>,
}

/// Site and start time encoded in an image file name
#[derive(Debug, Clone, PartialEq)]
pub struct ImageFileName {
    pub site: String,
    pub start_epoch: f64,
}

/// Parse an image file name (directory components are ignored).
pub fn parse_image_filename(name: &str) -> Option<ImageFileName> {
    let base = Path::new(name).file_name()?.to_str()?;
    let stem = base.split('.').next()?;
    let fields: Vec<&str> = stem.split('_').collect();
    let [thg, level, kind, site, hour, version] = fields.as_slice() else {
        return None;
    };
    if *thg != "thg" || *level != "l1" || *kind != "asf" {
        return None;
    }
    if site.len() != 4 || !site.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    if !version.starts_with('v') {
        return None;
    }
    if hour.len() != 10 || !hour.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let year: i32 = hour[0..4].parse().ok()?;
    let month: u8 = hour[4..6].parse().ok()?;
    let day: u8 = hour[6..8].parse().ok()?;
    let h: u8 = hour[8..10].parse().ok()?;
    let start_epoch = compute_epoch(year, month, day, h, 0, 0, 0).ok()?;

    Some(ImageFileName {
        site: site.to_ascii_lowercase(),
        start_epoch,
    })
}

/// Start epoch of an image file from its name
pub fn epoch_from_image_filename(name: &str) -> Option<f64> {
    parse_image_filename(name).map(|parsed| parsed.start_epoch)
}

/// Image files in `dir` for `site` overlapping `[first, last]`, oldest first.
///
/// A file starting at `s` covers `[s, s + file_duration_ms)`; files ending at or
/// before `first` or starting at or after `last` are skipped.
pub fn list_image_files(
    dir: &Path,
    site: &str,
    first: f64,
    last: f64,
    file_duration_ms: f64,
) -> Result<Vec<PathBuf>, ImageryError> {
    let site = site.to_ascii_lowercase();
    let mut files: Vec<(f64, PathBuf)> = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(parsed) = parse_image_filename(name) else {
            continue;
        };
        if parsed.site != site {
            continue;
        }
        let start = parsed.start_epoch;
        if start + file_duration_ms <= first || start >= last {
            continue;
        }
        files.push((start, path));
    }

    files.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
    log::debug!(
        "{} image files for {} in {}",
        files.len(),
        site,
        dir.display()
    );
    Ok(files.into_iter().map(|(_, path)| path).collect())
}

/// Random access to the frames of one image file
pub trait ImageryFile {
    fn path(&self) -> &Path;

    /// Number of records in the file
    fn record_count(&self) -> usize;

    fn read_record(&mut self, index: usize) -> Result<ImageRecord, ImageryError>;
}

/// A collection of image files covering a time window
pub trait ImagerySource {
    type File: ImageryFile;

    /// Files overlapping `[first, last]`, in chronological order
    fn list_files(&self, first: f64, last: f64) -> Result<Vec<PathBuf>, ImageryError>;

    fn open(&self, path: &Path) -> Result<Self::File, ImageryError>;
}

/// Directory of [`RawFrameFile`]s for one site
#[derive(Debug, Clone)]
pub struct RawFrameDirectory {
    pub dir: PathBuf,
    pub site: String,
    pub file_duration_ms: f64,
}

impl ImagerySource for RawFrameDirectory {
    type File = RawFrameFile;

    fn list_files(&self, first: f64, last: f64) -> Result<Vec<PathBuf>, ImageryError> {
        list_image_files(&self.dir, &self.site, first, last, self.file_duration_ms)
    }

    fn open(&self, path: &Path) -> Result<RawFrameFile, ImageryError> {
        RawFrameFile::open(path)
    }
}

/// Reader for the raw frame container
#[derive(Debug)]
pub struct RawFrameFile {
    path: PathBuf,
    reader: BufReader<File>,
    size: ImageSize,
    record_count: usize,
}

impl RawFrameFile {
    pub fn open(path: &Path) -> Result<Self, ImageryError> {
        let mut reader = BufReader::new(File::open(path)?);
        let malformed = |reason: String| ImageryError::Malformed {
            path: path.to_path_buf(),
            reason,
        };

        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != RAW_FRAME_MAGIC {
            return Err(malformed(format!("bad magic {magic:?}")));
        }
        let width = reader.read_u32::<LittleEndian>()? as usize;
        let height = reader.read_u32::<LittleEndian>()? as usize;
        let record_count = reader.read_u32::<LittleEndian>()? as usize;
        if width == 0 || height == 0 {
            return Err(malformed(format!("empty frame size {width}x{height}")));
        }

        let expected_len = (width as u64)
            .checked_mul(height as u64)
            .and_then(|pixels| pixels.checked_mul(2))
            .and_then(|pixel_bytes| pixel_bytes.checked_add(8))
            .and_then(|record_bytes| record_bytes.checked_mul(record_count as u64))
            .and_then(|payload| payload.checked_add(HEADER_SIZE))
            .ok_or_else(|| {
                malformed(format!(
                    "{record_count} records of {width}x{height} overflow the file size"
                ))
            })?;
        let actual_len = std::fs::metadata(path)?.len();
        if actual_len != expected_len {
            return Err(malformed(format!(
                "{record_count} records of {width}x{height} need {expected_len} bytes, \
                 file has {actual_len}"
            )));
        }

        Ok(Self {
            path: path.to_path_buf(),
            reader,
            size: ImageSize::from_width_height(width, height),
            record_count,
        })
    }

    pub fn size(&self) -> ImageSize {
        self.size
    }

    fn record_bytes(&self) -> u64 {
        8 + 2 * self.size.pixel_count() as u64
    }
}

impl ImageryFile for RawFrameFile {
    fn path(&self) -> &Path {
        &self.path
    }

    fn record_count(&self) -> usize {
        self.record_count
    }

    fn read_record(&mut self, index: usize) -> Result<ImageRecord, ImageryError> {
        if index >= self.record_count {
            return Err(ImageryError::RecordIndex {
                index,
                count: self.record_count,
            });
        }
        let offset = HEADER_SIZE + index as u64 * self.record_bytes();
        self.reader.seek(SeekFrom::Start(offset))?;

        let epoch = self.reader.read_f64::<LittleEndian>()?;
        let mut values = vec![0u16; self.size.pixel_count()];
        self.reader.read_u16_into::<LittleEndian>(&mut values)?;

        Ok(ImageRecord {
            epoch,
            pixels: Grid::from_row_major(self.size, values)?,
        })
    }
}

/// Writer for the raw frame container. The record count is patched on [`finish`].
///
/// [`finish`]: RawFrameWriter::finish
pub struct RawFrameWriter {
    writer: BufWriter<File>,
    size: ImageSize,
    record_count: u32,
}

impl RawFrameWriter {
    pub fn create(path: &Path, size: ImageSize) -> Result<Self, ImageryError> {
        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(RAW_FRAME_MAGIC)?;
        writer.write_u32::<LittleEndian>(size.width as u32)?;
        writer.write_u32::<LittleEndian>(size.height as u32)?;
        writer.write_u32::<LittleEndian>(0)?;
        Ok(Self {
            writer,
            size,
            record_count: 0,
        })
    }

    pub fn write_record(&mut self, record: &ImageRecord) -> Result<(), ImageryError> {
        if record.pixels.size() != self.size {
            return Err(GridError::SizeMismatch(record.pixels.size(), self.size).into());
        }
        self.writer.write_f64::<LittleEndian>(record.epoch)?;
        for value in record.pixels.as_array().iter() {
            self.writer.write_u16::<LittleEndian>(*value)?;
        }
        self.record_count += 1;
        Ok(())
    }

    /// Write the record count into the header and flush. Returns the count.
    pub fn finish(mut self) -> Result<usize, ImageryError> {
        self.writer.seek(SeekFrom::Start(12))?;
        self.writer.write_u32::<LittleEndian>(self.record_count)?;
        self.writer.flush()?;
        Ok(self.record_count as usize)
    }
}
