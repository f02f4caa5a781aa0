//! Device signature from the header object.
//!
//! The header object (by default `uid-240`) carries device health and
//! firmware identity. Field names are matched case-insensitively, first by
//! full dotted path and then by leaf name; fields named `reserved` are ignored.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::dataset::{Dataset, ObjectId, Reading};

const REASON_CODE: &[&str] = &["reasonid.reason.reasoncode", "reasoncode"];
const FAILURE_MODE: &[&str] = &["reasonid.failuremodestring", "failuremodestring"];
const FW_REVISION: &[&str] = &["reasonid.fwrevision", "fwrevision"];
const BL_REVISION: &[&str] = &["reasonid.blrevision", "blrevision"];
const SERIAL_NUMBER: &[&str] = &["reasonid.serialnumber", "serialnumber"];
const MAJOR_VERSION: &[&str] = &["reasonid.majorversion", "majorversion"];
const MINOR_VERSION: &[&str] = &["reasonid.minorversion", "minorversion"];

/// Whether the payload could be tied to a device signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadValidity {
    /// Header present with a readable reason code.
    Verified,
    /// No header object.
    Unknown,
    /// Header present but its reason code is missing or unreadable.
    Corrupted,
}

/// Device identity and health as of the last snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceSignature {
    pub reason_code: Option<i64>,
    pub failure_mode: Option<String>,
    pub fw_revision: Option<String>,
    pub bl_revision: Option<String>,
    pub serial_number: Option<String>,
    pub major_version: Option<i64>,
    pub minor_version: Option<i64>,
}

impl DeviceSignature {
    pub fn is_healthy(&self) -> bool {
        self.reason_code == Some(0)
    }

    /// `"0 : HEALTHY"` or `"1 : ASSERT detected"`.
    pub fn status(&self) -> &'static str {
        match self.reason_code {
            Some(0) => "0 : HEALTHY",
            Some(_) => "1 : ASSERT detected",
            None => "unknown",
        }
    }
}

/// Result of looking for the header object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeaderExtraction {
    pub header_uid: ObjectId,
    pub validity: PayloadValidity,
    pub signature: Option<DeviceSignature>,
}

/// Last observed reading of every non-reserved header field.
pub fn header_fields(dataset: &Dataset, header_uid: ObjectId) -> Option<BTreeMap<String, Reading>> {
    let object = dataset.object(header_uid)?;
    Some(
        object
            .fields
            .iter()
            .filter(|(path, _)| !is_reserved(path))
            .filter_map(|(path, series)| {
                last_observed(series).map(|r| (path.clone(), r.clone()))
            })
            .collect(),
    )
}

fn is_reserved(path: &str) -> bool {
    path.rsplit('.')
        .next()
        .is_some_and(|leaf| leaf.to_ascii_lowercase().starts_with("reserved"))
}

fn last_observed(series: &[Reading]) -> Option<&Reading> {
    series.iter().rev().find(|r| r.is_observed())
}

fn lookup<'a>(fields: &'a BTreeMap<String, Reading>, candidates: &[&str]) -> Option<&'a Reading> {
    let (full, leaf) = (candidates[0], candidates[1]);
    fields
        .iter()
        .find(|(p, _)| p.eq_ignore_ascii_case(full))
        .or_else(|| {
            fields.iter().find(|(p, _)| {
                p.rsplit('.')
                    .next()
                    .is_some_and(|l| l.eq_ignore_ascii_case(leaf))
            })
        })
        .map(|(_, r)| r)
}

fn as_int(r: Option<&Reading>) -> Option<i64> {
    match r? {
        Reading::Int(v) => Some(*v),
        Reading::Text(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_string(r: Option<&Reading>) -> Option<String> {
    match r? {
        Reading::Null => None,
        other => Some(other.to_string()),
    }
}

/// Derive the device signature and payload validity.
pub fn extract_device_signature(dataset: &Dataset, header_uid: ObjectId) -> HeaderExtraction {
    let Some(fields) = header_fields(dataset, header_uid) else {
        log::warn!("header object {header_uid} not present, payload validity unknown");
        return HeaderExtraction {
            header_uid,
            validity: PayloadValidity::Unknown,
            signature: None,
        };
    };

    let signature = DeviceSignature {
        reason_code: as_int(lookup(&fields, REASON_CODE)),
        failure_mode: as_string(lookup(&fields, FAILURE_MODE)),
        fw_revision: as_string(lookup(&fields, FW_REVISION)),
        bl_revision: as_string(lookup(&fields, BL_REVISION)),
        serial_number: as_string(lookup(&fields, SERIAL_NUMBER)),
        major_version: as_int(lookup(&fields, MAJOR_VERSION)),
        minor_version: as_int(lookup(&fields, MINOR_VERSION)),
    };
    let validity = if signature.reason_code.is_some() {
        PayloadValidity::Verified
    } else {
        log::warn!("header object {header_uid} has no readable reason code");
        PayloadValidity::Corrupted
    };
    HeaderExtraction {
        header_uid,
        validity,
        signature: Some(signature),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{DEFAULT_HEADER_UID, ObjectSeries};

    fn header(fields: &[(&str, Vec<Reading>)]) -> Dataset {
        let mut o = ObjectSeries::new(DEFAULT_HEADER_UID, "Header", Some("r".into()));
        for (p, v) in fields {
            o.fields.insert(p.to_string(), v.clone());
        }
        Dataset::from_objects([o])
    }

    #[test]
    fn test_healthy_signature() {
        let ds = header(&[
            ("reasonId.reason.reasonCode", vec![Reading::Int(3), Reading::Int(0)]),
            ("reasonId.fwRevision", vec![Reading::Text("FW1.2".into())]),
            ("reasonId.serialNumber", vec![Reading::Text("SN9".into())]),
            ("reasonId.majorVersion", vec![Reading::Int(2)]),
            ("reasonId.minorVersion", vec![Reading::Int(1)]),
        ]);
        let h = extract_device_signature(&ds, DEFAULT_HEADER_UID);
        assert_eq!(h.validity, PayloadValidity::Verified);
        let sig = h.signature.unwrap();
        assert!(sig.is_healthy());
        assert_eq!(sig.status(), "0 : HEALTHY");
        assert_eq!(sig.fw_revision.as_deref(), Some("FW1.2"));
        assert_eq!(sig.serial_number.as_deref(), Some("SN9"));
        assert_eq!(sig.major_version, Some(2));
        assert_eq!(sig.minor_version, Some(1));
    }

    #[test]
    fn test_assert_detected_from_last_reading() {
        let ds = header(&[(
            "reasonId.reason.reasonCode",
            vec![Reading::Int(0), Reading::Int(7), Reading::Null],
        )]);
        let sig = extract_device_signature(&ds, DEFAULT_HEADER_UID)
            .signature
            .unwrap();
        assert_eq!(sig.reason_code, Some(7));
        assert_eq!(sig.status(), "1 : ASSERT detected");
    }

    #[test]
    fn test_leaf_name_fallback() {
        let ds = header(&[("block.reasonCode", vec![Reading::Int(0)])]);
        let h = extract_device_signature(&ds, DEFAULT_HEADER_UID);
        assert_eq!(h.signature.unwrap().reason_code, Some(0));
    }

    #[test]
    fn test_missing_header_is_unknown() {
        let ds = Dataset::default();
        let h = extract_device_signature(&ds, DEFAULT_HEADER_UID);
        assert_eq!(h.validity, PayloadValidity::Unknown);
        assert!(h.signature.is_none());
    }

    #[test]
    fn test_header_without_reason_code_is_corrupted() {
        let ds = header(&[("reasonId.fwRevision", vec![Reading::Text("x".into())])]);
        let h = extract_device_signature(&ds, DEFAULT_HEADER_UID);
        assert_eq!(h.validity, PayloadValidity::Corrupted);
    }

    #[test]
    fn test_reserved_fields_excluded() {
        let ds = header(&[
            ("reserved1", vec![Reading::Int(1)]),
            ("misc.reserved", vec![Reading::Int(1)]),
            ("kept", vec![Reading::Int(1)]),
        ]);
        let fields = header_fields(&ds, DEFAULT_HEADER_UID).unwrap();
        assert_eq!(fields.len(), 1);
        assert!(fields.contains_key("kept"));
    }
}
