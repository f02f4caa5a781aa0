//! Event-log merge.
//!
//! Each snapshot may come with an event-log dump whose first lines are a
//! header and whose remaining lines are timestamped events. Merging keeps the
//! first occurrence of every distinct line: unseen header lines in file order,
//! then events sorted by time of day. Events without a readable time sort
//! last, in input order.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Leading lines of each file treated as header.
pub const HEADER_LINES: usize = 5;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedLog {
    pub header: Vec<String>,
    pub events: Vec<String>,
}

impl MergedLog {
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in self.header.iter().chain(&self.events) {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

/// Seconds since midnight of an event line such as `12:03:04.5 event` or
/// `17 12:03:04.5 event`, ignoring `*` markers.
pub fn event_seconds(line: &str) -> Option<f64> {
    let cleaned = line.replace('*', "");
    let mut tokens = cleaned.split_whitespace();
    let mut token = tokens.next()?;
    if token.bytes().all(|b| b.is_ascii_digit()) {
        token = tokens.next()?;
    }
    let mut parts = token.split(':');
    let h: f64 = parts.next()?.parse().ok()?;
    let m: f64 = parts.next()?.parse().ok()?;
    let s: f64 = parts.next()?.parse().ok()?;
    Some(h * 3600.0 + m * 60.0 + s)
}

/// Merge log texts in the given order.
pub fn merge_logs<'a>(texts: impl IntoIterator<Item = &'a str>) -> MergedLog {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut merged = MergedLog::default();
    for text in texts {
        for (index, line) in text.lines().enumerate() {
            if !seen.insert(line) {
                continue;
            }
            if index < HEADER_LINES {
                merged.header.push(line.to_string());
            } else {
                merged.events.push(line.to_string());
            }
        }
    }
    // Stable sort keeps untimed events in input order.
    merged.events.sort_by(|a, b| match (event_seconds(a), event_seconds(b)) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    let untimed = merged.events.iter().filter(|l| event_seconds(l).is_none()).count();
    if untimed > 0 {
        log::warn!("{untimed} event line(s) without a readable time, placed last");
    }
    merged
}

/// Merge event-log files and write `<stem>_NLOG.txt` into `out_dir`.
pub fn merge_files(paths: &[PathBuf], out_dir: &Path, stem: &str) -> Result<PathBuf> {
    let mut texts = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;
        texts.push(String::from_utf8_lossy(&bytes).into_owned());
    }
    let merged = merge_logs(texts.iter().map(String::as_str));
    fs::create_dir_all(out_dir).map_err(|e| Error::io(out_dir, e))?;
    let out = out_dir.join(format!("{stem}_NLOG.txt"));
    fs::write(&out, merged.render()).map_err(|e| Error::io(&out, e))?;
    log::info!(
        "merged {} file(s): {} header and {} event line(s)",
        paths.len(),
        merged.header.len(),
        merged.events.len()
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "NLOG dump\nFW 1.2\nSN 9\n---\ncols\n";

    #[test]
    fn test_event_seconds() {
        assert_eq!(event_seconds("01:02:03.5 boot"), Some(3723.5));
        assert_eq!(event_seconds("17 00:00:10 x"), Some(10.0));
        assert_eq!(event_seconds("*00:01:00* marked"), Some(60.0));
        assert_eq!(event_seconds("garbage"), None);
        assert_eq!(event_seconds(""), None);
    }

    #[test]
    fn test_merge_dedupes_and_sorts() {
        let a = format!("{HEADER}00:00:05 b\n00:00:01 a\n");
        let b = format!("{HEADER}00:00:05 b\nnot timed\n00:00:03 c\n");
        let merged = merge_logs([a.as_str(), b.as_str()]);
        assert_eq!(merged.header.len(), 5);
        assert_eq!(
            merged.events,
            vec!["00:00:01 a", "00:00:03 c", "00:00:05 b", "not timed"]
        );
    }

    #[test]
    fn test_new_header_lines_from_later_files() {
        let a = "h1\nh2\n";
        let b = "h1\nh3\n00:00:01 e\n";
        let merged = merge_logs([a, b]);
        assert_eq!(merged.header, vec!["h1", "h2", "h3", "00:00:01 e"]);
        assert!(merged.events.is_empty());
    }

    #[test]
    fn test_merge_files_writes_output() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a_NLOG.txt");
        std::fs::write(&a, format!("{HEADER}00:00:02 x\n")).unwrap();
        let out = merge_files(&[a], dir.path(), "time-series").unwrap();
        assert!(out.ends_with("time-series_NLOG.txt"));
        let text = std::fs::read_to_string(out).unwrap();
        assert!(text.ends_with("00:00:02 x\n"));
    }
}
