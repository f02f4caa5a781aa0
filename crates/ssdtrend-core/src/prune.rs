//! Constant-feature pruning.
//!
//! Every series is classified as constant, stationary, varying or untestable.
//! Annotation is non-destructive; [`prune`] removes the constant and
//! stationary series. The `core` signature series and the timestamp object are
//! never removed.

use serde::Serialize;
use ssdtrend_stats::adf_test;

use crate::align::FillPolicy;
use crate::dataset::{Dataset, ObjectId, Reading, TIMESTAMP_UID, is_signature_field};
use crate::schema::Domain;
use crate::transform::numeric_values;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "class")]
pub enum Stationarity {
    /// A single distinct reading.
    Constant,
    /// ADF p-value above the threshold.
    Stationary { p_value: f64 },
    Varying { p_value: f64 },
    /// Text series, too short, or a singular regression.
    Untestable,
}

impl Stationarity {
    pub fn is_prunable(&self) -> bool {
        matches!(self, Stationarity::Constant | Stationarity::Stationary { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Stationarity::Constant => "constant",
            Stationarity::Stationary { .. } => "stationary",
            Stationarity::Varying { .. } => "varying",
            Stationarity::Untestable => "untestable",
        }
    }
}

/// Classify one series against the p-value threshold.
pub fn classify(readings: &[Reading], domain: Domain, p_threshold: f64) -> Stationarity {
    let Some(first) = readings.first() else {
        return Stationarity::Untestable;
    };
    if readings.iter().all(|r| r == first) {
        return Stationarity::Constant;
    }
    if !domain.is_numeric() {
        return Stationarity::Untestable;
    }
    let values = numeric_values(readings, FillPolicy::ForwardFill);
    match adf_test(&values) {
        Some(adf) if adf.p_value > p_threshold => Stationarity::Stationary {
            p_value: adf.p_value,
        },
        Some(adf) => Stationarity::Varying {
            p_value: adf.p_value,
        },
        None => Stationarity::Untestable,
    }
}

fn is_exempt(uid: ObjectId, path: &str) -> bool {
    uid == TIMESTAMP_UID || is_signature_field(path)
}

#[derive(Debug, Clone, Serialize)]
pub struct StationarityEntry {
    pub object: ObjectId,
    pub field: String,
    #[serde(flatten)]
    pub class: Stationarity,
}

/// Classification of every non-exempt series.
#[derive(Debug, Clone, Serialize)]
pub struct StationarityReport {
    pub p_threshold: f64,
    pub entries: Vec<StationarityEntry>,
}

impl StationarityReport {
    pub fn prunable(&self) -> impl Iterator<Item = &StationarityEntry> {
        self.entries.iter().filter(|e| e.class.is_prunable())
    }

    /// Count per class label, in a fixed order.
    pub fn counts(&self) -> [(&'static str, usize); 4] {
        let mut counts = [("constant", 0), ("stationary", 0), ("varying", 0), ("untestable", 0)];
        for e in &self.entries {
            if let Some(slot) = counts.iter_mut().find(|(l, _)| *l == e.class.label()) {
                slot.1 += 1;
            }
        }
        counts
    }
}

pub fn annotate(dataset: &Dataset, p_threshold: f64) -> StationarityReport {
    let mut entries = Vec::new();
    for object in dataset.objects() {
        for (path, readings) in &object.fields {
            if is_exempt(object.uid, path) {
                continue;
            }
            let domain = dataset
                .schema()
                .domain(object.uid, path)
                .unwrap_or(Domain::Unknown);
            entries.push(StationarityEntry {
                object: object.uid,
                field: path.clone(),
                class: classify(readings, domain, p_threshold),
            });
        }
    }
    StationarityReport {
        p_threshold,
        entries,
    }
}

/// Copy of `dataset` without its constant and stationary series.
pub fn prune(dataset: &Dataset, p_threshold: f64) -> Dataset {
    let report = annotate(dataset, p_threshold);
    let doomed: std::collections::HashSet<(ObjectId, &str)> = report
        .prunable()
        .map(|e| (e.object, e.field.as_str()))
        .collect();
    log::info!(
        "pruning {} of {} series at p > {p_threshold}",
        doomed.len(),
        report.entries.len()
    );
    dataset.retain_fields(|uid, path| !doomed.contains(&(uid, path)))
}
