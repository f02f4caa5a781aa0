//! Snapshot clock: a total order over snapshot files.
//!
//! Snapshot file names follow
//! `<identifier>[_<counter>]_<YYYY-MM-DD-HH-MM-SS-micro>.<ext>`. When a name
//! does not parse, the file modification time is used instead and a warning
//! is logged. Ordering is lexicographic on `(timestamp, counter, file name)`.

use std::cmp::Ordering;
use std::fmt;
use std::path::Path;
use std::time::UNIX_EPOCH;

use serde::Serialize;

const MICROS_PER_SEC: i64 = 1_000_000;
const SECS_PER_DAY: i64 = 86_400;
/// Years a file name may carry; anything else is not a timestamp.
const YEARS: std::ops::RangeInclusive<i64> = 0..=9999;

// ---------------------------------------------------------------------------
// Timestamps
// ---------------------------------------------------------------------------

/// UTC instant with microsecond resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SnapshotStamp {
    pub epoch_micros: i64,
}

impl SnapshotStamp {
    /// Build from calendar fields, validating every range. Returns `None`
    /// instead of overflowing.
    pub fn from_parts(
        year: i64,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
        second: u32,
        micros: u32,
    ) -> Option<Self> {
        if !YEARS.contains(&year)
            || !(1..=12).contains(&month)
            || day == 0
            || day > days_in_month(year, month)
            || hour > 23
            || minute > 59
            || second > 59
            || micros >= 1_000_000
        {
            return None;
        }
        let days = days_from_civil(year, month, day);
        let secs = days
            .checked_mul(SECS_PER_DAY)?
            .checked_add(i64::from(hour * 3600 + minute * 60 + second))?;
        let epoch_micros = secs
            .checked_mul(MICROS_PER_SEC)?
            .checked_add(i64::from(micros))?;
        Some(Self { epoch_micros })
    }

    /// Parse `YYYY-MM-DD-HH-MM-SS-f` where `f` is 1 to 6 fraction digits.
    pub fn parse(s: &str) -> Option<Self> {
        let parts: Vec<&str> = s.split('-').collect();
        if parts.len() != 7 || parts.iter().any(|p| p.is_empty()) {
            return None;
        }
        if parts.iter().any(|p| !p.bytes().all(|b| b.is_ascii_digit())) {
            return None;
        }
        let fraction = parts[6];
        if fraction.len() > 6 {
            return None;
        }
        // strptime %f semantics: "5" means 500000 microseconds.
        let micros: u32 = format!("{fraction:0<6}").parse().ok()?;
        Self::from_parts(
            parts[0].parse().ok()?,
            parts[1].parse().ok()?,
            parts[2].parse().ok()?,
            parts[3].parse().ok()?,
            parts[4].parse().ok()?,
            parts[5].parse().ok()?,
            micros,
        )
    }

    pub fn from_epoch_micros(epoch_micros: i64) -> Self {
        Self { epoch_micros }
    }

    /// Calendar fields `(year, month, day, hour, minute, second, micros)`.
    pub fn to_parts(self) -> (i64, u32, u32, u32, u32, u32, u32) {
        let secs = self.epoch_micros.div_euclid(MICROS_PER_SEC);
        let micros = self.epoch_micros.rem_euclid(MICROS_PER_SEC) as u32;
        let days = secs.div_euclid(SECS_PER_DAY);
        let tod = secs.rem_euclid(SECS_PER_DAY) as u32;
        let (year, month, day) = civil_from_days(days);
        (year, month, day, tod / 3600, (tod / 60) % 60, tod % 60, micros)
    }
}

impl fmt::Display for SnapshotStamp {
    /// `YYYY-MM-DD-HH-MM-SS-ffffff`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (y, mo, d, h, mi, s, us) = self.to_parts();
        write!(f, "{y:04}-{mo:02}-{d:02}-{h:02}-{mi:02}-{s:02}-{us:06}")
    }
}

fn is_leap(year: i64) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn days_in_month(year: i64, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap(year) => 29,
        2 => 28,
        _ => 0,
    }
}

/// Days since 1970-01-01 for a proleptic Gregorian date.
fn days_from_civil(year: i64, month: u32, day: u32) -> i64 {
    let y = if month <= 2 { year - 1 } else { year };
    let era = y.div_euclid(400);
    let yoe = y - era * 400;
    let mp = (month as i64 + 9) % 12;
    let doy = (153 * mp + 2) / 5 + day as i64 - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let year = yoe + era * 400 + if month <= 2 { 1 } else { 0 };
    (year, month, day)
}

// ---------------------------------------------------------------------------
// Snapshot keys
// ---------------------------------------------------------------------------

/// Where a snapshot's timestamp came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StampSource {
    FileName,
    ModifiedTime,
}

/// Sort key of one snapshot file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotKey {
    pub timestamp: SnapshotStamp,
    pub counter: u64,
    pub file_name: String,
    pub source: StampSource,
}

impl Ord for SnapshotKey {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.timestamp, self.counter, &self.file_name).cmp(&(
            other.timestamp,
            other.counter,
            &other.file_name,
        ))
    }
}

impl PartialOrd for SnapshotKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Parse the timestamp and counter out of a snapshot file name.
/// The extension is cut from the date component only, so identifiers may
/// contain dots.
pub fn parse_snapshot_name(file_name: &str) -> Option<(SnapshotStamp, u64)> {
    let components: Vec<&str> = file_name.split('_').collect();
    if components.len() < 2 {
        return None;
    }
    let last = components[components.len() - 1];
    let date = last.split_once('.').map_or(last, |(d, _)| d);
    let stamp = SnapshotStamp::parse(date)?;

    let counter = if components.len() >= 3 {
        let c = components[components.len() - 2];
        if !c.is_empty() && c.bytes().all(|b| b.is_ascii_digit()) {
            c.parse().unwrap_or(0)
        } else {
            0
        }
    } else {
        0
    };
    Some((stamp, counter))
}

/// Clock key for a snapshot file. Never fails.
pub fn snapshot_key(path: &Path) -> SnapshotKey {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    if let Some((timestamp, counter)) = parse_snapshot_name(&file_name) {
        return SnapshotKey {
            timestamp,
            counter,
            file_name,
            source: StampSource::FileName,
        };
    }

    let modified = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok());
    let epoch_micros = match modified {
        Some(d) => {
            log::warn!("{file_name}: name does not carry a timestamp, ordering by modification time");
            d.as_micros() as i64
        }
        None => {
            log::warn!("{file_name}: no parsable timestamp and no modification time, using epoch");
            0
        }
    };
    SnapshotKey {
        timestamp: SnapshotStamp::from_epoch_micros(epoch_micros),
        counter: 0,
        file_name,
        source: StampSource::ModifiedTime,
    }
}

/// Rename legacy `YYYYMMDDHHMMSSffffff_<a>_<b>.bin` names into
/// `<a>-<b>_<YYYY-MM-DD-HH-MM-SS-ffffff>.bin`.
pub fn normalize_legacy_name(file_name: &str) -> Option<String> {
    let stem = file_name.strip_suffix(".bin")?;
    let mut parts = stem.splitn(3, '_');
    let raw = parts.next()?;
    let a = parts.next()?;
    let b = parts.next()?;
    if raw.len() != 20 || !raw.bytes().all(|c| c.is_ascii_digit()) || a.is_empty() || b.is_empty()
    {
        return None;
    }
    let date = format!(
        "{}-{}-{}-{}-{}-{}-{}",
        &raw[0..4],
        &raw[4..6],
        &raw[6..8],
        &raw[8..10],
        &raw[10..12],
        &raw[12..14],
        &raw[14..20]
    );
    SnapshotStamp::parse(&date)?;
    Some(format!("{a}-{b}_{date}.bin"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stamp_round_trip() {
        let s = SnapshotStamp::parse("2020-01-02-03-04-05-000123").unwrap();
        assert_eq!(s.to_string(), "2020-01-02-03-04-05-000123");
        let leap = SnapshotStamp::parse("2024-02-29-23-59-59-999999").unwrap();
        assert_eq!(leap.to_string(), "2024-02-29-23-59-59-999999");
    }

    #[test]
    fn test_stamp_epoch() {
        let s = SnapshotStamp::parse("1970-01-02-00-00-01-5").unwrap();
        assert_eq!(s.epoch_micros, (86_400 + 1) * 1_000_000 + 500_000);
    }

    #[test]
    fn test_stamp_rejects_invalid_calendar() {
        assert!(SnapshotStamp::parse("2023-02-29-00-00-00-0").is_none());
        assert!(SnapshotStamp::parse("2023-13-01-00-00-00-0").is_none());
        assert!(SnapshotStamp::parse("2023-01-01-24-00-00-0").is_none());
        assert!(SnapshotStamp::parse("2023-01-01-00-00-00-1234567").is_none());
        assert!(SnapshotStamp::parse("2023-01-01-00-00").is_none());
    }

    #[test]
    fn test_parse_snapshot_name() {
        let (s, c) = parse_snapshot_name("drive_3_2021-06-01-10-00-00-000001.txt").unwrap();
        assert_eq!(c, 3);
        assert_eq!(s.to_string(), "2021-06-01-10-00-00-000001");
        let (_, c) = parse_snapshot_name("drive_2021-06-01-10-00-00-000001.bin").unwrap();
        assert_eq!(c, 0);
        assert!(parse_snapshot_name("drive.txt").is_none());
        assert!(parse_snapshot_name("drive_notadate.txt").is_none());
    }

    #[test]
    fn test_ordering_timestamp_counter_name() {
        let key = |name: &str| {
            let (timestamp, counter) = parse_snapshot_name(name).unwrap();
            SnapshotKey {
                timestamp,
                counter,
                file_name: name.to_string(),
                source: StampSource::FileName,
            }
        };
        let mut keys = vec![
            key("b_2_2020-01-01-00-00-00-000000.txt"),
            key("a_1_2020-01-01-00-00-01-000000.txt"),
            key("a_1_2020-01-01-00-00-00-000000.txt"),
            key("a_2_2020-01-01-00-00-00-000000.txt"),
        ];
        keys.sort();
        let names: Vec<&str> = keys.iter().map(|k| k.file_name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "a_1_2020-01-01-00-00-00-000000.txt",
                "a_2_2020-01-01-00-00-00-000000.txt",
                "b_2_2020-01-01-00-00-00-000000.txt",
                "a_1_2020-01-01-00-00-01-000000.txt",
            ]
        );
    }

    #[test]
    fn test_snapshot_key_falls_back_to_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("undated.txt");
        std::fs::write(&path, "x").unwrap();
        let key = snapshot_key(&path);
        assert_eq!(key.source, StampSource::ModifiedTime);
        assert!(key.timestamp.epoch_micros > 0);
        assert_eq!(key.file_name, "undated.txt");
    }

    #[test]
    fn test_normalize_legacy_name() {
        assert_eq!(
            normalize_legacy_name("20200102030405123456_drive_a.bin").as_deref(),
            Some("drive-a_2020-01-02-03-04-05-123456.bin")
        );
        assert!(normalize_legacy_name("2020_drive_a.bin").is_none());
        assert!(normalize_legacy_name("20200102030405123456_drive_a.txt").is_none());
        assert!(normalize_legacy_name("20201302030405123456_drive_a.bin").is_none());
    }

    #[test]
    fn test_out_of_range_year_does_not_overflow() {
        assert!(SnapshotStamp::from_parts(i64::MAX, 1, 1, 0, 0, 0, 0).is_none());
        assert!(SnapshotStamp::from_parts(i64::MIN, 12, 31, 23, 59, 59, 999_999).is_none());
        assert!(SnapshotStamp::from_parts(10_000, 1, 1, 0, 0, 0, 0).is_none());
        assert!(SnapshotStamp::parse("99999999999999999999-01-01-00-00-00-0").is_none());
        assert!(parse_snapshot_name("dev_9999999999999999-01-01-00-00-00-0.txt").is_none());
        let edge = SnapshotStamp::parse("9999-12-31-23-59-59-999999").unwrap();
        assert_eq!(edge.to_string(), "9999-12-31-23-59-59-999999");
    }

    #[test]
    fn test_huge_year_name_falls_back_to_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dev_9999999999999999-01-01-00-00-00-0.txt");
        std::fs::write(&path, "x").unwrap();
        let key = snapshot_key(&path);
        assert_eq!(key.source, StampSource::ModifiedTime);
        assert_eq!(key.counter, 0);
    }

    #[test]
    fn test_identifier_with_dots() {
        let (s, c) = parse_snapshot_name("drive.v2_2021-01-01-00-00-00-0.txt").unwrap();
        assert_eq!(c, 0);
        assert_eq!(s.to_string(), "2021-01-01-00-00-00-000000");
        let (_, c) = parse_snapshot_name("drive.v2_4_2021-01-01-00-00-00-0.txt.gz").unwrap();
        assert_eq!(c, 4);
    }
}
