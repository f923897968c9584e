//! Yale Bright Star Catalog (BSC5) binary decoding.
//!
//! Layout: a 28-byte header of seven 32-bit integers
//! `STAR0 STAR1 STARN STNUM MPROP NMAG NBENT`, followed by `|STARN|` entries of
//! `NBENT` = 32 bytes:
//!
//! ```text
//!  0..4    XNO    f32  catalog number
//!  4..12   SRA0   f64  right ascension (rad)
//! 12..20   SDEC0  f64  declination (rad)
//! 20..22   IS     2 x u8 spectral type
//! 22..24   MAG    i16  visual magnitude x 100
//! 24..28   XRPM   f32  RA proper motion (rad/yr)
//! 28..32   XDPM   f32  Dec proper motion (rad/yr)
//! ```
//!
//! The file carries no byte-order mark; the order is the one in which `NBENT`
//! reads as 32.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use super::{CatalogError, Star};

pub const HEADER_SIZE: usize = 28;
pub const ENTRY_SIZE: usize = 32;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Endian {
    Big,
    Little,
}

/// Decoded catalog header
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bsc5Header {
    pub star0: i32,
    pub star1: i32,
    /// Number of stars; negative when positions are J2000
    pub starn: i32,
    pub stnum: i32,
    pub mprop: i32,
    pub nmag: i32,
    pub nbent: i32,
    pub endian: Endian,
}

impl Bsc5Header {
    pub fn star_count(&self) -> usize {
        self.starn.unsigned_abs() as usize
    }
}

fn read_header_as<B: ByteOrder>(bytes: &[u8], endian: Endian) -> Bsc5Header {
    Bsc5Header {
        star0: B::read_i32(&bytes[0..4]),
        star1: B::read_i32(&bytes[4..8]),
        starn: B::read_i32(&bytes[8..12]),
        stnum: B::read_i32(&bytes[12..16]),
        mprop: B::read_i32(&bytes[16..20]),
        nmag: B::read_i32(&bytes[20..24]),
        nbent: B::read_i32(&bytes[24..28]),
        endian,
    }
}

pub fn read_header(bytes: &[u8]) -> Result<Bsc5Header, CatalogError> {
    if bytes.len() < HEADER_SIZE {
        return Err(CatalogError::Truncated {
            expected: HEADER_SIZE,
            actual: bytes.len(),
        });
    }

    let little = read_header_as::<LittleEndian>(bytes, Endian::Little);
    if little.nbent == ENTRY_SIZE as i32 {
        return Ok(little);
    }
    let big = read_header_as::<BigEndian>(bytes, Endian::Big);
    if big.nbent == ENTRY_SIZE as i32 {
        return Ok(big);
    }

    Err(CatalogError::BadHeader(format!(
        "entry size reads as {} (LE) / {} (BE), expected {ENTRY_SIZE}",
        little.nbent, big.nbent
    )))
}

fn read_entry_as<B: ByteOrder>(entry: &[u8]) -> Star {
    Star {
        catalog_number: B::read_f32(&entry[0..4]),
        ra_rad: B::read_f64(&entry[4..12]),
        dec_rad: B::read_f64(&entry[12..20]),
        spectral_type: String::from_utf8_lossy(&entry[20..22])
            .trim_end_matches(['\0', ' '])
            .to_string(),
        magnitude: B::read_i16(&entry[22..24]) as f64 / 100.0,
        pm_ra_rad_per_year: B::read_f32(&entry[24..28]) as f64,
        pm_dec_rad_per_year: B::read_f32(&entry[28..32]) as f64,
    }
}

/// Decode a whole catalog file. Placeholder entries with zero position are dropped.
pub fn decode(bytes: &[u8]) -> Result<Vec<Star>, CatalogError> {
    let header = read_header(bytes)?;
    let expected = HEADER_SIZE + header.star_count() * ENTRY_SIZE;
    if bytes.len() < expected {
        return Err(CatalogError::Truncated {
            expected,
            actual: bytes.len(),
        });
    }

    let stars: Vec<Star> = bytes[HEADER_SIZE..expected]
        .chunks_exact(ENTRY_SIZE)
        .map(|entry| match header.endian {
            Endian::Little => read_entry_as::<LittleEndian>(entry),
            Endian::Big => read_entry_as::<BigEndian>(entry),
        })
        .filter(|star| star.ra_rad != 0.0 || star.dec_rad != 0.0)
        .collect();

    log::debug!(
        "BSC5 header {:?}: {} entries, {} with positions",
        header,
        header.star_count(),
        stars.len()
    );
    Ok(stars)
}
