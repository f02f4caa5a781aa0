//! Model adapter surface.
//!
//! Forecasting back-ends see the dataset only through a [`ModelSurface`],
//! which refuses to exist for a dataset the validity gate rejects. The
//! surface materialises numeric vectors, splits them in time order and
//! drives one-step-ahead evaluation of any [`ForecastModel`].

use serde::Serialize;

use crate::config::{PipelineConfig, SplitRatios};
use crate::dataset::{Dataset, ObjectId};
use crate::error::{Error, Rejection, Result};
use crate::prune::prune;
use crate::schema::Domain;
use crate::transform::{ordinal_codes, pad_to, profile_values};
use crate::validity::{GateVerdict, ValidityGate};

/// Minimum series length that can be split.
pub const MIN_SPLIT_LEN: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    Raw,
    MatrixProfile { window: usize },
}

// ---------------------------------------------------------------------------
// Temporal split
// ---------------------------------------------------------------------------

/// Contiguous, time-ordered partitions of one vector.
#[derive(Debug, Clone, Copy)]
pub struct TemporalSplit<'a> {
    pub train: &'a [f64],
    pub validation: &'a [f64],
    pub test: &'a [f64],
    /// Every partition is the whole vector because no valid split exists.
    pub degenerate: bool,
}

/// Split `values` into train, validation and test in time order.
///
/// Boundaries are `⌊n·train⌋` and `⌊n·(train + validation)⌋`. Invalid
/// ratios, fewer than [`MIN_SPLIT_LEN`] values or an empty partition yield
/// a degenerate split.
pub fn split(values: &[f64], ratios: SplitRatios) -> TemporalSplit<'_> {
    let n = values.len();
    let degenerate = |why: &str| {
        log::warn!("degenerate split of {n} values: {why}");
        TemporalSplit {
            train: values,
            validation: values,
            test: values,
            degenerate: true,
        }
    };
    if !ratios.is_valid() {
        return degenerate("invalid ratios");
    }
    if n < MIN_SPLIT_LEN {
        return degenerate("too few values");
    }
    let boundary = |fraction: f64| ((n as f64 * fraction + 1e-9).floor() as usize).min(n);
    let train_end = boundary(ratios.train);
    let validation_end = boundary(ratios.train + ratios.validation).max(train_end);
    if train_end == 0 || validation_end == train_end || validation_end == n {
        return degenerate("empty partition");
    }
    TemporalSplit {
        train: &values[..train_end],
        validation: &values[train_end..validation_end],
        test: &values[validation_end..],
        degenerate: false,
    }
}

// ---------------------------------------------------------------------------
// Forecast models
// ---------------------------------------------------------------------------

/// A forecasting back-end.
pub trait ForecastModel {
    fn name(&self) -> &str;

    /// Fit on a training vector.
    fn fit(&mut self, train: &[f64]) -> Result<()>;

    /// Predict the value following `history`.
    fn predict_next(&self, history: &[f64]) -> Option<f64>;
}

/// One-step-ahead error on the validation and test partitions.
#[derive(Debug, Clone, Serialize)]
pub struct ForecastEvaluation {
    pub model: String,
    pub validation_rmse: f64,
    pub test_rmse: f64,
    /// Predictions for every validation and test position, in order.
    pub predictions: Vec<f64>,
}

/// Fit on the train partition and predict every later value one step ahead
/// from all actual values before it.
pub fn evaluate_one_step(
    model: &mut dyn ForecastModel,
    split: &TemporalSplit<'_>,
) -> Result<ForecastEvaluation> {
    if split.degenerate {
        return Err(Error::Model {
            model: model.name().to_string(),
            detail: "cannot evaluate on a degenerate split".into(),
        });
    }
    model.fit(split.train)?;

    let mut history: Vec<f64> = split.train.to_vec();
    let mut predictions = Vec::with_capacity(split.validation.len() + split.test.len());
    let mut rmse = |part: &[f64], history: &mut Vec<f64>| -> Result<f64> {
        let mut sq = 0.0;
        for &actual in part {
            let predicted = model.predict_next(history).ok_or_else(|| Error::Model {
                model: model.name().to_string(),
                detail: format!("no prediction after {} values", history.len()),
            })?;
            sq += (predicted - actual).powi(2);
            predictions.push(predicted);
            history.push(actual);
        }
        Ok((sq / part.len() as f64).sqrt())
    };
    let validation_rmse = rmse(split.validation, &mut history)?;
    let test_rmse = rmse(split.test, &mut history)?;

    Ok(ForecastEvaluation {
        model: model.name().to_string(),
        validation_rmse,
        test_rmse,
        predictions,
    })
}

// ---------------------------------------------------------------------------
// Surface
// ---------------------------------------------------------------------------

/// Read-only, gate-checked view of a dataset for model fitting.
pub struct ModelSurface<'a> {
    dataset: &'a Dataset,
    config: PipelineConfig,
    verdict: GateVerdict,
}

impl<'a> ModelSurface<'a> {
    /// Run the validity gate; a rejected dataset yields [`Error::Rejected`].
    pub fn new(dataset: &'a Dataset, config: &PipelineConfig) -> Result<Self> {
        let verdict = ValidityGate::new(config.validity_threshold).evaluate(dataset);
        if !verdict.accepted {
            return Err(Error::Rejected(Box::new(Rejection {
                threshold: verdict.threshold,
                broken: verdict.broken,
                schema: dataset.schema().clone(),
                snapshots_read: dataset.timestamps().into_iter().map(String::from).collect(),
            })));
        }
        Ok(Self {
            dataset,
            config: config.clone(),
            verdict,
        })
    }

    pub fn dataset(&self) -> &'a Dataset {
        self.dataset
    }

    pub fn verdict(&self) -> &GateVerdict {
        &self.verdict
    }

    /// Numeric vector of one series, one value per snapshot.
    ///
    /// Text readings become ordinal label codes. A matrix profile that cannot
    /// be computed leaves the raw vector unchanged.
    pub fn materialise(&self, uid: ObjectId, path: &str, transform: Transform) -> Option<Vec<f64>> {
        let readings = self.dataset.series(uid, path)?;
        let domain = self.dataset.schema().domain(uid, path)?;
        let raw: Vec<Option<f64>> = match domain {
            Domain::Enumeration => ordinal_codes(readings),
            _ => readings.iter().map(|r| r.as_f64()).collect(),
        };
        let values = self.config.fill_policy.apply(&raw);

        match transform {
            Transform::Raw => Some(values),
            Transform::MatrixProfile { window } => {
                if !domain.is_numeric() {
                    return Some(values);
                }
                match profile_values(&values, window, self.config.noise_seed) {
                    Some(mp) => Some(pad_to(&mp.profile, values.len())),
                    None => {
                        log::warn!("{uid}.{path}: no matrix profile at window {window}, raw series used");
                        Some(values)
                    }
                }
            }
        }
    }

    pub fn split<'v>(&self, values: &'v [f64]) -> TemporalSplit<'v> {
        split(values, self.config.split)
    }

    /// Dataset without constant and stationary series.
    pub fn prune(&self, p_threshold: f64) -> Dataset {
        prune(self.dataset, p_threshold)
    }
}
