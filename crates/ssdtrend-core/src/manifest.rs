//! Run manifest: JSON metadata written next to the canonical files.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use uuid::Uuid;

use crate::align::AlignmentDiagnostics;
use crate::canonical::fingerprint;
use crate::clock::{SnapshotStamp, StampSource};
use crate::config::PipelineConfig;
use crate::corpus::IngestOutcome;
use crate::dump::ParseReport;
use crate::error::{Error, Result};
use crate::header::{DeviceSignature, PayloadValidity};

/// Bumped when the manifest layout changes.
pub const MANIFEST_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize)]
pub struct SnapshotEntry {
    pub file_name: String,
    pub timestamp: String,
    pub counter: u64,
    pub source: StampSource,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValiditySummary {
    pub threshold: f64,
    pub broken_fields: usize,
    /// Highest per-object broken share.
    pub worst_ratio: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunManifest {
    pub version: u32,
    pub id: String,
    pub created_at: String,
    pub snapshot_directory: PathBuf,
    pub snapshots: Vec<SnapshotEntry>,
    pub skipped: Vec<(String, String)>,
    pub fingerprint: String,
    pub objects: usize,
    pub fields: usize,
    pub payload_validity: PayloadValidity,
    pub device_status: String,
    pub device_signature: Option<DeviceSignature>,
    pub validity: ValiditySummary,
    pub parse: ParseReport,
    pub alignment: AlignmentDiagnostics,
    pub ssdtrend_version: String,
}

impl RunManifest {
    pub fn from_outcome(outcome: &IngestOutcome, config: &PipelineConfig) -> Self {
        let ds = &outcome.dataset;
        let signature = outcome.header.signature.clone();
        let device_status = signature
            .as_ref()
            .map(|s| s.status().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        Self {
            version: MANIFEST_VERSION,
            id: Uuid::new_v4().to_string(),
            created_at: format_iso8601(now_stamp()),
            snapshot_directory: config.snapshot_directory.clone(),
            snapshots: outcome
                .snapshots
                .iter()
                .map(|k| SnapshotEntry {
                    file_name: k.file_name.clone(),
                    timestamp: k.timestamp.to_string(),
                    counter: k.counter,
                    source: k.source,
                })
                .collect(),
            skipped: outcome.skipped.clone(),
            fingerprint: fingerprint(ds),
            objects: ds.object_count(),
            fields: ds.schema().field_count(),
            payload_validity: outcome.header.validity,
            device_status,
            device_signature: signature,
            validity: ValiditySummary {
                threshold: outcome.verdict.threshold,
                broken_fields: outcome.verdict.broken.len(),
                worst_ratio: outcome
                    .verdict
                    .objects
                    .iter()
                    .map(|o| o.ratio)
                    .fold(0.0, f64::max),
            },
            parse: outcome.parse.clone(),
            alignment: outcome.alignment.clone(),
            ssdtrend_version: crate::VERSION.to_string(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        fs::write(path, json).map_err(|e| Error::io(path, e))
    }
}

fn now_stamp() -> SnapshotStamp {
    let micros = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as i64)
        .unwrap_or_default();
    SnapshotStamp::from_epoch_micros(micros)
}

/// `2026-02-15T01:30:00Z`
fn format_iso8601(stamp: SnapshotStamp) -> String {
    let (y, mo, d, h, mi, s, _) = stamp.to_parts();
    format!("{y:04}-{mo:02}-{d:02}T{h:02}:{mi:02}:{s:02}Z")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_iso8601() {
        let stamp = SnapshotStamp::from_parts(2026, 2, 15, 1, 30, 0, 250).unwrap();
        assert_eq!(format_iso8601(stamp), "2026-02-15T01:30:00Z");
        assert_eq!(format_iso8601(SnapshotStamp::from_epoch_micros(0)), "1970-01-01T00:00:00Z");
    }

    #[test]
    fn test_now_is_after_2020() {
        let (year, ..) = now_stamp().to_parts();
        assert!(year >= 2020);
    }
}
