//! The aligned, immutable time-series dataset.
//!
//! A [`Dataset`] maps object identifiers to [`ObjectSeries`]; every series is a
//! vector of [`Reading`]s whose index `i` is snapshot `i` of the corpus. The
//! reserved object [`TIMESTAMP_UID`] carries the acquisition time of every
//! snapshot.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::schema::{Domain, Schema};

/// Synthetic object carrying per-snapshot acquisition timestamps.
pub const TIMESTAMP_UID: ObjectId = ObjectId(4_294_967_292);

/// Object carrying device health and firmware identity.
pub const DEFAULT_HEADER_UID: ObjectId = ObjectId(240);

pub const CORE_FIELD: &str = "core";
pub const TIMESTAMP_FIELD: &str = "timestamp";

// ---------------------------------------------------------------------------
// Object identifiers
// ---------------------------------------------------------------------------

/// Identifier of a telemetry object kind, rendered `uid-<N>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectId(pub u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "uid-{}", self.0)
    }
}

impl FromStr for ObjectId {
    type Err = String;

    /// Accepts `uid-240` or a bare `240`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let digits = s.strip_prefix("uid-").unwrap_or(s);
        digits
            .parse::<u64>()
            .map(ObjectId)
            .map_err(|_| format!("invalid object id '{s}'"))
    }
}

impl TryFrom<String> for ObjectId {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ObjectId> for String {
    fn from(id: ObjectId) -> Self {
        id.to_string()
    }
}

// ---------------------------------------------------------------------------
// Readings
// ---------------------------------------------------------------------------

/// One value of a series at one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum Reading {
    /// No observation at this snapshot.
    Null,
    Int(i64),
    Text(String),
    /// Only produced by installed derived series such as matrix profiles.
    Real(f64),
}

impl Reading {
    /// Interpret a raw dump value.
    ///
    /// Integers are recognised only in canonical decimal form, so `"007"` and
    /// `"+5"` stay text and rendering an `Int` reproduces the raw value.
    pub fn interpret(raw: &str) -> Reading {
        let raw = raw.trim();
        if raw.is_empty() {
            return Reading::Null;
        }
        match raw.parse::<i64>() {
            Ok(v) if v.to_string() == raw => Reading::Int(v),
            _ => Reading::Text(raw.to_string()),
        }
    }

    /// False for `Null` and for the enumeration sentinel `""`.
    pub fn is_observed(&self) -> bool {
        match self {
            Reading::Null => false,
            Reading::Text(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn domain(&self) -> Domain {
        match self {
            Reading::Null => Domain::Unknown,
            Reading::Int(_) => Domain::Integer,
            Reading::Text(_) => Domain::Enumeration,
            Reading::Real(_) => Domain::Real,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Reading::Int(v) => Some(*v as f64),
            Reading::Real(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Reading::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Reading::Null => Value::Null,
            Reading::Int(v) => Value::from(*v),
            Reading::Text(s) => Value::from(s.as_str()),
            Reading::Real(v) => serde_json::Number::from_f64(*v)
                .map(Value::Number)
                .unwrap_or(Value::Null),
        }
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reading::Null => write!(f, "None"),
            Reading::Int(v) => write!(f, "{v}"),
            Reading::Text(s) => write!(f, "{s}"),
            Reading::Real(v) => write!(f, "{v:?}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Objects
// ---------------------------------------------------------------------------

/// All series of one telemetry object.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectSeries {
    pub uid: ObjectId,
    pub name: String,
    pub reference: Option<String>,
    /// Field path → series; includes the `core` signature series.
    pub fields: BTreeMap<String, Vec<Reading>>,
}

impl ObjectSeries {
    pub fn new(uid: ObjectId, name: impl Into<String>, reference: Option<String>) -> Self {
        Self {
            uid,
            name: name.into(),
            reference,
            fields: BTreeMap::new(),
        }
    }

    pub fn series(&self, path: &str) -> Option<&[Reading]> {
        self.fields.get(path).map(Vec::as_slice)
    }

    /// Payload fields: everything except the `core` signature series.
    pub fn payload_fields(&self) -> impl Iterator<Item = (&String, &Vec<Reading>)> {
        self.fields.iter().filter(|(p, _)| !is_signature_field(p))
    }

    /// Nested view of the dotted field paths, leaves holding reading arrays.
    pub fn to_tree(&self) -> Value {
        let mut root = Map::new();
        root.insert("name".into(), Value::from(self.name.as_str()));
        root.insert("uid".into(), Value::from(self.uid.0));
        if let Some(r) = &self.reference {
            root.insert("ref".into(), Value::from(r.as_str()));
        }
        for (path, readings) in &self.fields {
            let leaf = Value::Array(readings.iter().map(Reading::to_json).collect());
            insert_path(&mut root, path, leaf);
        }
        Value::Object(root)
    }
}

fn insert_path(node: &mut Map<String, Value>, path: &str, leaf: Value) {
    match path.split_once('.') {
        None => {
            if let Some(Value::Object(child)) = node.get_mut(path) {
                child.insert("value".into(), leaf);
                return;
            }
            node.insert(path.to_string(), leaf);
        }
        Some((head, rest)) => {
            let entry = node
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                let previous = std::mem::replace(entry, Value::Object(Map::new()));
                if let Value::Object(child) = entry {
                    child.insert("value".into(), previous);
                }
            }
            if let Value::Object(child) = entry {
                insert_path(child, rest, leaf);
            }
        }
    }
}

/// `core` and its repeat occurrences (`core#1`, ...).
pub fn is_signature_field(path: &str) -> bool {
    path == CORE_FIELD
        || path
            .strip_prefix(CORE_FIELD)
            .and_then(|rest| rest.strip_prefix('#'))
            .is_some_and(|k| !k.is_empty() && k.bytes().all(|b| b.is_ascii_digit()))
}

// ---------------------------------------------------------------------------
// Dataset
// ---------------------------------------------------------------------------

/// Aligned series of every object over the whole corpus.
///
/// Equality is structural over schema and series values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dataset {
    schema: Schema,
    objects: BTreeMap<ObjectId, ObjectSeries>,
}

impl Dataset {
    pub(crate) fn from_parts(schema: Schema, objects: BTreeMap<ObjectId, ObjectSeries>) -> Self {
        Self { schema, objects }
    }

    /// Build a dataset from objects, inferring the schema from their values.
    pub fn from_objects(objects: impl IntoIterator<Item = ObjectSeries>) -> Self {
        let objects: BTreeMap<ObjectId, ObjectSeries> =
            objects.into_iter().map(|o| (o.uid, o)).collect();
        let schema = Schema::infer(objects.values());
        Self { schema, objects }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn objects(&self) -> impl Iterator<Item = &ObjectSeries> {
        self.objects.values()
    }

    pub fn object_ids(&self) -> Vec<ObjectId> {
        self.objects.keys().copied().collect()
    }

    pub fn object(&self, uid: ObjectId) -> Option<&ObjectSeries> {
        self.objects.get(&uid)
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn series(&self, uid: ObjectId, path: &str) -> Option<&[Reading]> {
        self.objects.get(&uid).and_then(|o| o.series(path))
    }

    /// Number of snapshots, taken from the timestamp object.
    pub fn snapshot_count(&self) -> usize {
        match self.series(TIMESTAMP_UID, TIMESTAMP_FIELD) {
            Some(ts) => ts.len(),
            None => self
                .objects
                .values()
                .flat_map(|o| o.fields.values())
                .map(Vec::len)
                .max()
                .unwrap_or(0),
        }
    }

    /// Acquisition timestamp strings in snapshot order.
    pub fn timestamps(&self) -> Vec<&str> {
        self.series(TIMESTAMP_UID, TIMESTAMP_FIELD)
            .map(|ts| ts.iter().filter_map(Reading::as_text).collect())
            .unwrap_or_default()
    }

    /// Store a derived numeric series next to its source as `<path><suffix>`.
    ///
    /// Returns the installed key, or `None` when the object is missing or the
    /// length does not match the snapshot count.
    pub fn install_derived(
        &mut self,
        uid: ObjectId,
        path: &str,
        suffix: &str,
        values: &[f64],
    ) -> Option<String> {
        if values.len() != self.snapshot_count() {
            return None;
        }
        let object = self.objects.get_mut(&uid)?;
        let key = format!("{path}{suffix}");
        object
            .fields
            .insert(key.clone(), values.iter().map(|&v| Reading::Real(v)).collect());
        self.schema = Schema::infer(self.objects.values());
        Some(key)
    }

    /// Copy of the dataset keeping only the fields for which `keep` holds.
    pub fn retain_fields(&self, mut keep: impl FnMut(ObjectId, &str) -> bool) -> Dataset {
        let objects: BTreeMap<ObjectId, ObjectSeries> = self
            .objects
            .iter()
            .map(|(&uid, object)| {
                let mut object = object.clone();
                object.fields.retain(|path, _| keep(uid, path));
                (uid, object)
            })
            .collect();
        let schema = Schema::infer(objects.values());
        Dataset { schema, objects }
    }
}
