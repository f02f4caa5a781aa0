//! Per-object profiling: matrix profile, discords, motifs and stationarity.
//!
//! Objects are profiled independently on the parallel layer; each worker
//! holds a shared [`Arc<Dataset>`]. An object whose worker times out is
//! listed in [`ProfileReport::timed_out`] instead of failing the run.

use std::sync::Arc;

use serde::Serialize;
use ssdtrend_stats::{top_discords, top_motifs};

use crate::align::FillPolicy;
use crate::config::PipelineConfig;
use crate::dataset::{Dataset, ObjectId, TIMESTAMP_UID};
use crate::parallel::{ParallelOptions, ResultOrder, run_parallel};
use crate::prune::{Stationarity, classify};
use crate::schema::Domain;
use crate::transform::{MpOutcome, SkipReason, matrix_profile_of};

#[derive(Debug, Clone)]
pub struct ProfileOptions {
    pub window: usize,
    /// Discords and motifs reported per series.
    pub top_k: usize,
    pub fill: FillPolicy,
    pub seed: Option<u64>,
    pub p_threshold: f64,
    pub parallel: ParallelOptions,
}

impl Default for ProfileOptions {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for ProfileOptions {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            window: config.matrix_profile_window,
            top_k: 3,
            fill: config.fill_policy,
            seed: config.noise_seed,
            p_threshold: config.stationarity_p_value,
            parallel: ParallelOptions {
                timeout: config.parallel_timeout(),
                ordering: ResultOrder::InOrder,
                ..Default::default()
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MotifPair {
    pub index: usize,
    pub neighbor: usize,
    pub distance: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeriesProfile {
    pub field: String,
    pub domain: Domain,
    pub stationarity: Stationarity,
    /// Set when no matrix profile was computed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<SkipReason>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub matrix_profile: Vec<f64>,
    pub discords: Vec<usize>,
    pub motifs: Vec<MotifPair>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ObjectProfile {
    pub object: ObjectId,
    pub name: String,
    pub series: Vec<SeriesProfile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileReport {
    pub window: usize,
    pub objects: Vec<ObjectProfile>,
    pub timed_out: Vec<ObjectId>,
}

/// Profile every payload series of one object.
pub fn profile_object(dataset: &Dataset, uid: ObjectId, options: &ProfileOptions) -> Option<ObjectProfile> {
    let object = dataset.object(uid)?;
    let mut series = Vec::new();
    for (path, readings) in object.payload_fields() {
        let domain = dataset.schema().domain(uid, path).unwrap_or(Domain::Unknown);
        let stationarity = classify(readings, domain, options.p_threshold);
        let outcome = matrix_profile_of(readings, domain, options.window, options.fill, options.seed);
        let (skipped, matrix_profile, discords, motifs) = match &outcome {
            MpOutcome::Profile(mp) => {
                let zone = options.window;
                let motifs = top_motifs(mp, options.top_k, zone)
                    .into_iter()
                    .map(|m| MotifPair {
                        index: m.index,
                        neighbor: m.neighbor,
                        distance: m.distance,
                    })
                    .collect();
                (
                    None,
                    mp.profile.clone(),
                    top_discords(mp, options.top_k, zone),
                    motifs,
                )
            }
            MpOutcome::Unchanged(reason) => (Some(*reason), Vec::new(), Vec::new(), Vec::new()),
        };
        series.push(SeriesProfile {
            field: path.clone(),
            domain,
            stationarity,
            skipped,
            matrix_profile,
            discords,
            motifs,
        });
    }
    Some(ObjectProfile {
        object: uid,
        name: object.name.clone(),
        series,
    })
}

/// Profile the given objects, or every vendor object when `objects` is empty.
pub fn profile_dataset(dataset: Arc<Dataset>, objects: &[ObjectId], options: &ProfileOptions) -> ProfileReport {
    let targets: Vec<ObjectId> = if objects.is_empty() {
        dataset
            .object_ids()
            .into_iter()
            .filter(|&uid| uid != TIMESTAMP_UID)
            .collect()
    } else {
        objects.to_vec()
    };

    let shared = Arc::clone(&dataset);
    let task_options = options.clone();
    let outcomes = run_parallel(
        targets.clone(),
        move |uid| profile_object(&shared, uid, &task_options),
        &options.parallel,
    );

    let mut report = ProfileReport {
        window: options.window,
        objects: Vec::new(),
        timed_out: Vec::new(),
    };
    for outcome in outcomes {
        match outcome.value {
            Some(Some(profile)) => report.objects.push(profile),
            Some(None) => log::warn!("{} is not in the dataset", targets[outcome.index]),
            None => report.timed_out.push(targets[outcome.index]),
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{CORE_FIELD, ObjectSeries, Reading, TIMESTAMP_FIELD};

    fn dataset() -> Dataset {
        let pattern = [0i64, 1, 2, 3, 0, 1, 2, 3, 0, 9, 2, 3, 0, 1, 2, 3];
        let n = pattern.len();
        let mut ts = ObjectSeries::new(TIMESTAMP_UID, "timestamp", None);
        ts.fields.insert(
            TIMESTAMP_FIELD.into(),
            (0..n).map(|i| Reading::Text(format!("t{i}"))).collect(),
        );
        let mut a = ObjectSeries::new(ObjectId(1), "A", None);
        a.fields.insert(CORE_FIELD.into(), vec![Reading::Int(0); n]);
        a.fields.insert("wave".into(), pattern.iter().map(|&v| Reading::Int(v)).collect());
        a.fields.insert("state".into(), vec![Reading::Text("ok".into()); n]);
        let mut b = ObjectSeries::new(ObjectId(2), "B", None);
        b.fields.insert("flat".into(), vec![Reading::Int(1); n]);
        Dataset::from_objects([ts, a, b])
    }

    fn options() -> ProfileOptions {
        ProfileOptions {
            window: 4,
            top_k: 1,
            seed: Some(9),
            ..Default::default()
        }
    }

    #[test]
    fn test_profile_object() {
        let ds = dataset();
        let p = profile_object(&ds, ObjectId(1), &options()).unwrap();
        assert_eq!(p.series.len(), 2);
        let wave = p.series.iter().find(|s| s.field == "wave").unwrap();
        assert_eq!(wave.matrix_profile.len(), 13);
        assert_eq!(wave.discords.len(), 1);
        // The anomaly at offset 9 is covered by the top discord window.
        assert!((6..=9).contains(&wave.discords[0]), "{:?}", wave.discords);
        let state = p.series.iter().find(|s| s.field == "state").unwrap();
        assert_eq!(state.skipped, Some(SkipReason::NotNumeric));
        assert_eq!(state.stationarity, Stationarity::Constant);
        assert!(profile_object(&ds, ObjectId(99), &options()).is_none());
    }

    #[test]
    fn test_profile_dataset_skips_timestamp_object() {
        let report = profile_dataset(Arc::new(dataset()), &[], &options());
        let ids: Vec<ObjectId> = report.objects.iter().map(|o| o.object).collect();
        assert_eq!(ids, vec![ObjectId(1), ObjectId(2)]);
        assert!(report.timed_out.is_empty());
        let flat = &report.objects[1].series[0];
        assert_eq!(flat.skipped, Some(SkipReason::Constant));
    }

    #[test]
    fn test_profile_report_serialises() {
        let report = profile_dataset(Arc::new(dataset()), &[ObjectId(2)], &options());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["objects"][0]["object"], "uid-2");
        assert_eq!(json["objects"][0]["series"][0]["stationarity"]["class"], "constant");
    }
}
