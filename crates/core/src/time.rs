use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, Offset, Timelike, Utc};

use crate::error::{DcvstatError, Result};

/// Layout of the timestamp at the head of each server log line, in UTC.
pub const LOG_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Layout of the time labels handed to charts.
pub const CLOCK_FORMAT: &str = "%H:%M:%S";

/// Zone used to render sample time labels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DisplayZone {
    /// Whatever the process considers local time.
    #[default]
    Local,
    Fixed(FixedOffset),
}

impl DisplayZone {
    pub fn clock_label(&self, ts: DateTime<Utc>) -> String {
        match self {
            Self::Local => ts.with_timezone(&Local).format(CLOCK_FORMAT).to_string(),
            Self::Fixed(offset) => ts.with_timezone(offset).format(CLOCK_FORMAT).to_string(),
        }
    }
}

impl FromStr for DisplayZone {
    type Err = DcvstatError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "local" | "" => Ok(Self::Local),
            "utc" | "UTC" | "Z" => Ok(Self::Fixed(Utc.fix())),
            other => other
                .parse::<FixedOffset>()
                .map(Self::Fixed)
                .map_err(|e| DcvstatError::Parse(format!("invalid utc offset {other}: {e}"))),
        }
    }
}

/// Parses the `YYYY-MM-DD HH:MM:SS` prefix of a log line as a UTC instant.
///
/// Every field must be zero padded, the separator a single space, and
/// leap seconds are refused.
pub fn parse_log_timestamp(input: &str) -> Result<DateTime<Utc>> {
    if !has_log_timestamp_shape(input) {
        return Err(DcvstatError::Parse(format!(
            "invalid log timestamp {input}: expected YYYY-MM-DD HH:MM:SS"
        )));
    }
    let naive = NaiveDateTime::parse_from_str(input, LOG_TIMESTAMP_FORMAT)
        .map_err(|e| DcvstatError::Parse(format!("invalid log timestamp {input}: {e}")))?;
    // chrono reads second 60 as a leap second folded into the nanoseconds.
    if naive.nanosecond() >= 1_000_000_000 {
        return Err(DcvstatError::Parse(format!(
            "invalid log timestamp {input}: second out of range"
        )));
    }
    Ok(naive.and_utc())
}

fn has_log_timestamp_shape(input: &str) -> bool {
    let bytes = input.as_bytes();
    bytes.len() == 19
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            10 => *b == b' ',
            13 | 16 => *b == b':',
            _ => b.is_ascii_digit(),
        })
}

pub fn parse_duration_str(input: &str) -> Result<Duration> {
    humantime::parse_duration(input)
        .map_err(|e| DcvstatError::Parse(format!("invalid duration {input}: {e}")))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn parses_log_timestamp_as_utc() {
        let ts = parse_log_timestamp("2025-09-26 10:39:33").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2025, 9, 26, 10, 39, 33).unwrap());
    }

    #[test]
    fn rejects_bad_log_timestamp() {
        assert!(parse_log_timestamp("2025-13-26 10:39:33").is_err());
        assert!(parse_log_timestamp("yesterday noon").is_err());
        assert!(parse_log_timestamp("2025-09-26T10:39:33").is_err());
    }

    #[test]
    fn rejects_loose_log_timestamp_layouts() {
        for raw in [
            "2025-9-26 10:39:33",
            "2025-09-26 1:2:3",
            "2025-09-26\t10:39:33",
            "2025-09-26  10:39:33",
            "2025-09-26 10:39:33 ",
            "2025-09-26 10:39:60",
            "2025-09-26 24:00:00",
        ] {
            assert!(parse_log_timestamp(raw).is_err(), "{raw:?}");
        }
        assert!(parse_log_timestamp("2025-12-31 23:59:59").is_ok());
    }

    #[test]
    fn fixed_zone_shifts_label() {
        let ts = Utc.with_ymd_and_hms(2025, 9, 26, 23, 30, 5).unwrap();
        let zone: DisplayZone = "+02:00".parse().unwrap();
        assert_eq!(zone.clock_label(ts), "01:30:05");
        let utc: DisplayZone = "utc".parse().unwrap();
        assert_eq!(utc.clock_label(ts), "23:30:05");
    }

    #[test]
    fn local_zone_matches_chrono_local() {
        let ts = Utc.with_ymd_and_hms(2025, 9, 26, 10, 39, 33).unwrap();
        let expected = ts.with_timezone(&Local).format(CLOCK_FORMAT).to_string();
        assert_eq!(DisplayZone::Local.clock_label(ts), expected);
    }

    #[test]
    fn rejects_bad_offset() {
        assert!("+25:00".parse::<DisplayZone>().is_err());
        assert!("nowhere".parse::<DisplayZone>().is_err());
    }

    #[test]
    fn parses_duration() {
        assert_eq!(parse_duration_str("30s").unwrap(), Duration::from_secs(30));
        assert!(parse_duration_str("soon").is_err());
    }
}
