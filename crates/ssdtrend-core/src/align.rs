//! Series alignment: fold per-snapshot object blocks into aligned series.
//!
//! After every snapshot, every known series has exactly one reading per
//! snapshot seen so far. Fields and objects that appear late are backfilled
//! with [`Reading::Null`]; fields that disappear are padded the same way.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::dataset::{
    CORE_FIELD, Dataset, ObjectId, ObjectSeries, Reading, TIMESTAMP_FIELD, TIMESTAMP_UID,
};
use crate::dump::ObjectBlock;
use crate::schema::{Domain, Schema};

// ---------------------------------------------------------------------------
// Fill policy
// ---------------------------------------------------------------------------

/// How missing readings are substituted when a series is materialised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillPolicy {
    /// Last observed value; leading gaps become 0.
    #[default]
    ForwardFill,
    /// Gaps stay missing (NaN).
    Null,
}

impl FillPolicy {
    pub fn apply(self, values: &[Option<f64>]) -> Vec<f64> {
        match self {
            FillPolicy::Null => values.iter().map(|v| v.unwrap_or(f64::NAN)).collect(),
            FillPolicy::ForwardFill => {
                let mut last = 0.0;
                values
                    .iter()
                    .map(|v| {
                        if let Some(x) = v {
                            last = *x;
                        }
                        last
                    })
                    .collect()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

/// What the aligner had to patch up.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AlignmentDiagnostics {
    pub snapshots: usize,
    /// Object → snapshot indices that did not carry it.
    pub absent: BTreeMap<ObjectId, Vec<usize>>,
    /// `(object, old path, new path)` moves caused by depth conflicts.
    pub renamed_fields: Vec<(ObjectId, String, String)>,
    /// Vendor blocks dropped because they used the reserved timestamp id.
    pub reserved_collisions: usize,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

struct SnapshotState {
    index: usize,
    occurrences: HashMap<(ObjectId, String), usize>,
    seen: BTreeSet<ObjectId>,
}

/// Accumulates snapshots in clock order and closes into a [`Dataset`].
#[derive(Default)]
pub struct DatasetBuilder {
    schema: Schema,
    objects: BTreeMap<ObjectId, ObjectSeries>,
    timestamps: Vec<String>,
    current: Option<SnapshotState>,
    diagnostics: AlignmentDiagnostics,
}

impl DatasetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schema discovered so far.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn snapshot_count(&self) -> usize {
        self.timestamps.len()
    }

    /// Open the next snapshot, closing the previous one if needed.
    pub fn begin_snapshot(&mut self, stamp: impl Into<String>) {
        self.end_snapshot();
        let index = self.timestamps.len();
        self.timestamps.push(stamp.into());
        self.current = Some(SnapshotState {
            index,
            occurrences: HashMap::new(),
            seen: BTreeSet::new(),
        });
    }

    /// Fold one block into the open snapshot.
    pub fn observe_block(&mut self, block: &ObjectBlock) {
        let Some(mut state) = self.current.take() else {
            log::warn!("block {} observed outside a snapshot, ignored", block.signature.uid);
            return;
        };
        let sig = &block.signature;
        let uid = sig.uid;
        if uid == TIMESTAMP_UID {
            log::error!(
                "object '{}' uses the reserved id {uid}, block dropped",
                sig.name
            );
            self.diagnostics.reserved_collisions += 1;
            self.current = Some(state);
            return;
        }

        let index = state.index;
        state.seen.insert(uid);
        if self.schema.ensure_object(uid) {
            log::debug!("new object {uid} '{}' at snapshot {index}", sig.name);
            if index > 0 {
                self.diagnostics.absent.insert(uid, (0..index).collect());
            }
        }
        let object = self
            .objects
            .entry(uid)
            .or_insert_with(|| ObjectSeries::new(uid, sig.name.clone(), None));
        object.name = sig.name.clone();
        object.reference = Some(sig.reference.clone());

        self.push(&mut state, uid, CORE_FIELD, Reading::Int(sig.core));
        for (path, readings) in &block.fields {
            let resolved = self.schema.resolve_path(uid, path);
            for (old, new) in resolved.renamed {
                if let Some(object) = self.objects.get_mut(&uid) {
                    if let Some(series) = object.fields.remove(&old) {
                        object.fields.insert(new.clone(), series);
                    }
                }
                self.diagnostics.renamed_fields.push((uid, old, new));
            }
            for leaf in readings {
                self.push(&mut state, uid, &resolved.path, leaf.value.clone());
            }
        }
        self.current = Some(state);
    }

    fn push(&mut self, state: &mut SnapshotState, uid: ObjectId, base: &str, reading: Reading) {
        let count = state
            .occurrences
            .entry((uid, base.to_string()))
            .or_insert(0);
        let path = if *count == 0 {
            base.to_string()
        } else {
            format!("{base}#{count}")
        };
        *count += 1;

        self.schema.observe(uid, &path, &reading);
        let Some(object) = self.objects.get_mut(&uid) else {
            return;
        };
        let series = object
            .fields
            .entry(path)
            .or_insert_with(|| vec![Reading::Null; state.index]);
        if series.len() < state.index {
            series.resize(state.index, Reading::Null);
        }
        series.push(reading);
    }

    /// Close the open snapshot, padding every series to its length.
    pub fn end_snapshot(&mut self) {
        let Some(state) = self.current.take() else {
            return;
        };
        let len = state.index + 1;
        for (uid, object) in self.objects.iter_mut() {
            for series in object.fields.values_mut() {
                if series.len() < len {
                    series.resize(len, Reading::Null);
                }
            }
            if !state.seen.contains(uid) {
                self.diagnostics
                    .absent
                    .entry(*uid)
                    .or_default()
                    .push(state.index);
            }
        }
    }

    /// Convenience: one whole snapshot.
    pub fn add_snapshot(&mut self, stamp: impl Into<String>, blocks: &[ObjectBlock]) {
        self.begin_snapshot(stamp);
        for block in blocks {
            self.observe_block(block);
        }
        self.end_snapshot();
    }

    /// Freeze into a dataset.
    ///
    /// Enumeration sentinels become `""`, and the reserved timestamp object
    /// is added.
    pub fn close(mut self) -> (Dataset, AlignmentDiagnostics) {
        self.end_snapshot();
        let n = self.timestamps.len();

        for (uid, object) in self.objects.iter_mut() {
            for (path, series) in object.fields.iter_mut() {
                if self.schema.domain(*uid, path) == Some(Domain::Enumeration) {
                    for r in series.iter_mut().filter(|r| **r == Reading::Null) {
                        *r = Reading::Text(String::new());
                    }
                }
            }
        }

        let mut clock = ObjectSeries::new(TIMESTAMP_UID, TIMESTAMP_FIELD, None);
        clock.fields.insert(
            TIMESTAMP_FIELD.to_string(),
            self.timestamps.into_iter().map(Reading::Text).collect(),
        );
        clock
            .fields
            .insert(CORE_FIELD.to_string(), vec![Reading::Int(0); n]);
        self.objects.insert(TIMESTAMP_UID, clock);

        let schema = Schema::infer(self.objects.values());
        self.diagnostics.snapshots = n;
        (Dataset::from_parts(schema, self.objects), self.diagnostics)
    }
}
