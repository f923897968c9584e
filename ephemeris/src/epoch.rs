//! Millisecond epochs counted from 0000-01-01T00:00:00 UT.
//!
//! Imagery timestamps use this continuous time scale: proleptic Gregorian calendar,
//! every day exactly 86 400 000 ms long, leap seconds ignored.

use thiserror::Error;
use time::{Date, Month, Time};

/// Milliseconds in one mean solar day.
pub const MS_PER_DAY: f64 = 86_400_000.0;

/// Milliseconds in one hour.
pub const MS_PER_HOUR: f64 = 3_600_000.0;

/// 2000-01-01T12:00:00 UT expressed as an epoch.
pub const J2000_EPOCH: f64 = 63_113_947_200_000.0;

/// Julian day number of 0000-01-01 in the proleptic Gregorian calendar.
const JULIAN_DAY_OF_EPOCH_ORIGIN: i32 = 1_721_060;

/// Errors produced while building or parsing epochs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EpochError {
    #[error("Invalid calendar date or time: {0}")]
    InvalidComponent(String),

    #[error("Malformed date string '{0}', expected yyyy-mm-ddTHH:MM:SS.sss")]
    MalformedString(String),

    #[error("Epoch {0} is outside the representable calendar range")]
    OutOfRange(f64),
}

/// Convert calendar components to an epoch in milliseconds.
pub fn compute_epoch(
    year: i32,
    month: u8,
    day: u8,
    hour: u8,
    minute: u8,
    second: u8,
    millisecond: u16,
) -> Result<f64, EpochError> {
    let month =
        Month::try_from(month).map_err(|e| EpochError::InvalidComponent(e.to_string()))?;
    let date = Date::from_calendar_date(year, month, day)
        .map_err(|e| EpochError::InvalidComponent(e.to_string()))?;
    let time = Time::from_hms_milli(hour, minute, second, millisecond)
        .map_err(|e| EpochError::InvalidComponent(e.to_string()))?;

    let days = (date.to_julian_day() - JULIAN_DAY_OF_EPOCH_ORIGIN) as f64;
    let (h, m, s, ms) = time.as_hms_milli();
    let ms_of_day = ((h as f64 * 60.0 + m as f64) * 60.0 + s as f64) * 1000.0 + ms as f64;

    Ok(days * MS_PER_DAY + ms_of_day)
}

/// Parse `yyyy-mm-ddTHH:MM:SS.sss` into an epoch.
///
/// The time part may be shortened to `HH`, `HH:MM` or `HH:MM:SS`, and may be omitted
/// entirely (midnight). Fractional seconds are truncated to whole milliseconds.
pub fn parse_epoch(text: &str) -> Result<f64, EpochError> {
    let malformed = || EpochError::MalformedString(text.to_string());

    let (date_part, time_part) = match text.trim().split_once('T') {
        Some((d, t)) => (d, Some(t)),
        None => (text.trim(), None),
    };

    let date_fields: Vec<&str> = date_part.split('-').collect();
    if date_fields.len() != 3 || date_fields[0].len() != 4 {
        return Err(malformed());
    }
    let year: i32 = date_fields[0].parse().map_err(|_| malformed())?;
    let month: u8 = date_fields[1].parse().map_err(|_| malformed())?;
    let day: u8 = date_fields[2].parse().map_err(|_| malformed())?;

    let (mut hour, mut minute, mut second, mut millisecond) = (0u8, 0u8, 0u8, 0u16);
    if let Some(time_part) = time_part {
        let fields: Vec<&str> = time_part.split(':').collect();
        if fields.is_empty() || fields.len() > 3 {
            return Err(malformed());
        }
        hour = fields[0].parse().map_err(|_| malformed())?;
        if let Some(m) = fields.get(1) {
            minute = m.parse().map_err(|_| malformed())?;
        }
        if let Some(s) = fields.get(2) {
            let (whole, fraction) = match s.split_once('.') {
                Some((w, f)) => (w, f),
                None => (*s, ""),
            };
            second = whole.parse().map_err(|_| malformed())?;
            if !fraction.is_empty() {
                if !fraction.chars().all(|c| c.is_ascii_digit()) {
                    return Err(malformed());
                }
                let padded: String = fraction.chars().chain("000".chars()).take(3).collect();
                millisecond = padded.parse().map_err(|_| malformed())?;
            }
        }
    }

    compute_epoch(year, month, day, hour, minute, second, millisecond)
}

/// Split an epoch into its calendar date and the milliseconds elapsed in that day.
fn split_epoch(epoch: f64) -> Result<(Date, u64), EpochError> {
    if !epoch.is_finite() {
        return Err(EpochError::OutOfRange(epoch));
    }
    let days = (epoch / MS_PER_DAY).floor();
    let ms_of_day = (epoch - days * MS_PER_DAY).round() as u64;
    let julian_day = days as i64 + JULIAN_DAY_OF_EPOCH_ORIGIN as i64;
    let julian_day = i32::try_from(julian_day).map_err(|_| EpochError::OutOfRange(epoch))?;
    let date = Date::from_julian_day(julian_day).map_err(|_| EpochError::OutOfRange(epoch))?;
    Ok((date, ms_of_day.min(86_399_999)))
}

/// Format an epoch as `yyyy-mm-ddTHH:MM:SS.sss`.
pub fn format_epoch(epoch: f64) -> Result<String, EpochError> {
    let (date, ms) = split_epoch(epoch)?;
    Ok(format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}",
        date.year(),
        date.month() as u8,
        date.day(),
        ms / 3_600_000,
        (ms / 60_000) % 60,
        (ms / 1000) % 60,
        ms % 1000
    ))
}

/// Format an epoch as `yyyymmddTHHMMSS`, the form used in exported file names.
pub fn format_epoch_compact(epoch: f64) -> Result<String, EpochError> {
    let (date, ms) = split_epoch(epoch)?;
    Ok(format!(
        "{:04}{:02}{:02}T{:02}{:02}{:02}",
        date.year(),
        date.month() as u8,
        date.day(),
        ms / 3_600_000,
        (ms / 60_000) % 60,
        (ms / 1000) % 60
    ))
}

/// Julian years of 365.25 days elapsed since J2000.
pub fn julian_years_since_j2000(epoch: f64) -> f64 {
    (epoch - J2000_EPOCH) / (365.25 * MS_PER_DAY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_j2000_constant_matches_calendar() {
        let epoch = compute_epoch(2000, 1, 1, 12, 0, 0, 0).unwrap();
        assert_eq!(epoch, J2000_EPOCH);
    }

    #[test]
    fn test_origin_is_zero() {
        assert_eq!(compute_epoch(0, 1, 1, 0, 0, 0, 0).unwrap(), 0.0);
    }

    #[test]
    fn test_parse_full_string() {
        let parsed = parse_epoch("2013-12-13T06:00:03.250").unwrap();
        let expected = compute_epoch(2013, 12, 13, 6, 0, 3, 250).unwrap();
        assert_eq!(parsed, expected);
    }

    #[test]
    fn test_parse_short_forms() {
        let hour_only = parse_epoch("2013-12-13T06").unwrap();
        let date_only = parse_epoch("2013-12-13").unwrap();
        assert_eq!(hour_only - date_only, 6.0 * MS_PER_HOUR);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_epoch("yesterday").is_err());
        assert!(parse_epoch("2013-13-01T00:00:00").is_err());
        assert!(parse_epoch("2013-12-13T25:00:00").is_err());
        assert!(parse_epoch("2013-12-13T06:00:00.5x").is_err());
    }

    #[test]
    fn test_format_round_trip() {
        let text = "2013-12-13T06:07:08.009";
        let epoch = parse_epoch(text).unwrap();
        assert_eq!(format_epoch(epoch).unwrap(), text);
        assert_eq!(format_epoch_compact(epoch).unwrap(), "20131213T060708");
    }

    #[test]
    fn test_julian_years() {
        let one_year_later = J2000_EPOCH + 365.25 * MS_PER_DAY;
        assert!((julian_years_since_j2000(one_year_later) - 1.0).abs() < 1e-12);
    }
}
