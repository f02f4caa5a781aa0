//! Validity gate: reject datasets with too many empty fields.
//!
//! A field is broken when its series holds no observation at all. An object
//! whose broken share reaches the threshold rejects the whole dataset. The
//! gate is mandatory before model fitting and advisory for read-only use.

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::dataset::{Dataset, ObjectId};
use crate::error::{Error, Result};

pub const DEFAULT_VALIDITY_THRESHOLD: f64 = 0.6;

/// Conventional file name of the broken-field report.
pub const ERROR_LOG_FILE: &str = "time_series_errorlog.txt";

/// One empty `(object, field)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrokenField {
    pub object: ObjectId,
    pub field: String,
}

impl fmt::Display for BrokenField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.object, self.field)
    }
}

/// Per-object broken share.
#[derive(Debug, Clone, Serialize)]
pub struct ObjectVerdict {
    pub object: ObjectId,
    pub fields: usize,
    pub broken: usize,
    pub ratio: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GateVerdict {
    pub threshold: f64,
    pub accepted: bool,
    pub objects: Vec<ObjectVerdict>,
    pub broken: Vec<BrokenField>,
}

impl GateVerdict {
    /// Objects at or above the threshold.
    pub fn failing_objects(&self) -> impl Iterator<Item = &ObjectVerdict> {
        self.objects.iter().filter(move |o| o.ratio >= self.threshold)
    }

    /// Write the broken pairs, one per line.
    pub fn write_report(&self, path: &Path) -> Result<()> {
        write_broken_report(&self.broken, path)
    }
}

/// Write `(uid-N, field)` lines to `path`.
pub fn write_broken_report(broken: &[BrokenField], path: &Path) -> Result<()> {
    let mut out = String::new();
    for b in broken {
        out.push_str(&b.to_string());
        out.push('\n');
    }
    let mut file = fs::File::create(path).map_err(|e| Error::io(path, e))?;
    file.write_all(out.as_bytes())
        .map_err(|e| Error::io(path, e))
}

#[derive(Debug, Clone, Copy)]
pub struct ValidityGate {
    pub threshold: f64,
}

impl Default for ValidityGate {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_VALIDITY_THRESHOLD,
        }
    }
}

impl ValidityGate {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn evaluate(&self, dataset: &Dataset) -> GateVerdict {
        let mut objects = Vec::new();
        let mut broken = Vec::new();

        for object in dataset.objects() {
            let mut fields = 0;
            let mut empty = 0;
            for (path, series) in object.payload_fields() {
                fields += 1;
                if !series.iter().any(|r| r.is_observed()) {
                    empty += 1;
                    broken.push(BrokenField {
                        object: object.uid,
                        field: path.clone(),
                    });
                }
            }
            let ratio = if fields == 0 {
                0.0
            } else {
                empty as f64 / fields as f64
            };
            objects.push(ObjectVerdict {
                object: object.uid,
                fields,
                broken: empty,
                ratio,
            });
        }

        let accepted = objects.iter().all(|o| o.ratio < self.threshold);
        if !accepted {
            for o in objects.iter().filter(|o| o.ratio >= self.threshold) {
                log::warn!(
                    "{}: {}/{} fields empty ({:.0}%)",
                    o.object,
                    o.broken,
                    o.fields,
                    o.ratio * 100.0
                );
            }
        }
        GateVerdict {
            threshold: self.threshold,
            accepted,
            objects,
            broken,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{ObjectSeries, Reading};

    fn object_with(uid: u64, good: usize, empty: usize, snapshots: usize) -> ObjectSeries {
        let mut o = ObjectSeries::new(ObjectId(uid), "O", Some("r".into()));
        o.fields
            .insert("core".into(), vec![Reading::Int(0); snapshots]);
        for i in 0..good {
            o.fields
                .insert(format!("good{i}"), vec![Reading::Int(1); snapshots]);
        }
        for i in 0..empty {
            o.fields
                .insert(format!("empty{i}"), vec![Reading::Null; snapshots]);
        }
        o
    }

    #[test]
    fn test_rejects_at_threshold() {
        let ds = Dataset::from_objects([object_with(1, 3, 7, 3)]);
        let v = ValidityGate::default().evaluate(&ds);
        assert!(!v.accepted);
        assert_eq!(v.broken.len(), 7);
        assert_eq!(v.failing_objects().count(), 1);
    }

    #[test]
    fn test_accepts_below_threshold() {
        let ds = Dataset::from_objects([object_with(1, 5, 5, 3)]);
        assert!(ValidityGate::default().evaluate(&ds).accepted);
    }

    #[test]
    fn test_core_not_counted() {
        let ds = Dataset::from_objects([object_with(1, 0, 0, 2)]);
        let v = ValidityGate::default().evaluate(&ds);
        assert!(v.accepted);
        assert_eq!(v.objects[0].fields, 0);
    }

    #[test]
    fn test_enumeration_sentinel_counts_as_empty() {
        let mut o = object_with(2, 0, 0, 2);
        o.fields.insert(
            "text".into(),
            vec![Reading::Text(String::new()), Reading::Text(String::new())],
        );
        let v = ValidityGate::new(0.5).evaluate(&Dataset::from_objects([o]));
        assert!(!v.accepted);
    }

    #[test]
    fn test_lower_threshold_never_accepts_more() {
        let ds = Dataset::from_objects([object_with(1, 6, 4, 2), object_with(2, 9, 1, 2)]);
        let mut previous = true;
        for t in [0.9, 0.6, 0.4, 0.3, 0.1, 0.0] {
            let accepted = ValidityGate::new(t).evaluate(&ds).accepted;
            assert!(previous || !accepted, "accepted again at {t}");
            previous = accepted;
        }
        assert!(!previous);
    }

    #[test]
    fn test_write_report() {
        let dir = tempfile::tempdir().unwrap();
        let ds = Dataset::from_objects([object_with(7, 0, 2, 1)]);
        let v = ValidityGate::default().evaluate(&ds);
        let path = dir.path().join(ERROR_LOG_FILE);
        v.write_report(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "(uid-7, empty0)\n(uid-7, empty1)\n");
    }
}
