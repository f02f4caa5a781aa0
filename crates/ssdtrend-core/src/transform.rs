//! Series transforms: numeric materialisation and the matrix-profile wrapper.
//!
//! A numeric series is filled with the configured [`FillPolicy`], perturbed at
//! machine-epsilon scale so repeated readings do not produce flat windows, and
//! handed to STOMP. Enumeration series and degenerate input pass through
//! unchanged.

use std::collections::BTreeSet;

use serde::Serialize;
use ssdtrend_stats::{MatrixProfile, perturb, resample, stomp};

use crate::align::FillPolicy;
use crate::dataset::{Dataset, ObjectId, Reading};
use crate::schema::Domain;

/// Why a series was left unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NotNumeric,
    /// Zero window, or fewer than two windows fit.
    WindowTooLarge,
    Constant,
}

#[derive(Debug, Clone)]
pub enum MpOutcome {
    Profile(MatrixProfile),
    Unchanged(SkipReason),
}

impl MpOutcome {
    pub fn profile(&self) -> Option<&MatrixProfile> {
        match self {
            MpOutcome::Profile(mp) => Some(mp),
            MpOutcome::Unchanged(_) => None,
        }
    }

    /// Readings after the transform: the padded profile, or `readings` as-is.
    pub fn apply(&self, readings: &[Reading]) -> Vec<Reading> {
        match self {
            MpOutcome::Profile(mp) => pad_to(&mp.profile, readings.len())
                .into_iter()
                .map(Reading::Real)
                .collect(),
            MpOutcome::Unchanged(_) => readings.to_vec(),
        }
    }
}

/// Numeric view of a series; text and nulls are gaps.
pub fn numeric_values(readings: &[Reading], fill: FillPolicy) -> Vec<f64> {
    let raw: Vec<Option<f64>> = readings.iter().map(Reading::as_f64).collect();
    fill.apply(&raw)
}

/// Ordinal codes of a text series, labels numbered in sorted order.
///
/// The empty sentinel and nulls are gaps.
pub fn ordinal_codes(readings: &[Reading]) -> Vec<Option<f64>> {
    let labels: BTreeSet<&str> = readings
        .iter()
        .filter_map(Reading::as_text)
        .filter(|s| !s.is_empty())
        .collect();
    readings
        .iter()
        .map(|r| match r {
            Reading::Text(s) if !s.is_empty() => {
                labels.iter().position(|l| l == s).map(|p| p as f64)
            }
            Reading::Int(v) => Some(*v as f64),
            Reading::Real(v) => Some(*v),
            _ => None,
        })
        .collect()
}

/// Matrix profile of one series.
///
/// `seed` fixes the epsilon perturbation for reproducible runs.
pub fn matrix_profile_of(
    readings: &[Reading],
    domain: Domain,
    window: usize,
    fill: FillPolicy,
    seed: Option<u64>,
) -> MpOutcome {
    if !domain.is_numeric() {
        return MpOutcome::Unchanged(SkipReason::NotNumeric);
    }
    let n = readings.len();
    if window == 0 || 2 * window > n {
        log::warn!("matrix profile window {window} does not fit a series of {n}, left unchanged");
        return MpOutcome::Unchanged(SkipReason::WindowTooLarge);
    }
    let values = numeric_values(readings, fill);
    if values.iter().all(|v| v.is_nan()) || values.windows(2).all(|w| w[0] == w[1]) {
        log::warn!("constant series has no matrix profile, left unchanged");
        return MpOutcome::Unchanged(SkipReason::Constant);
    }
    match profile_values(&values, window, seed) {
        Some(mp) => MpOutcome::Profile(mp),
        None => {
            log::warn!("matrix profile degenerate for window {window}, left unchanged");
            MpOutcome::Unchanged(SkipReason::Constant)
        }
    }
}

/// STOMP over an already materialised vector, after the epsilon perturbation.
pub fn profile_values(values: &[f64], window: usize, seed: Option<u64>) -> Option<MatrixProfile> {
    // NaN gaps (FillPolicy::Null) would poison every window; zero them.
    let clean: Vec<f64> = values
        .iter()
        .map(|v| if v.is_nan() { 0.0 } else { *v })
        .collect();
    let uniform = resample(&clean, clean.len());
    stomp(&perturb(&uniform, f64::EPSILON, seed), window)
}

/// Right-pad `profile` with its last value to length `n`.
pub fn pad_to(profile: &[f64], n: usize) -> Vec<f64> {
    let mut out: Vec<f64> = profile.iter().take(n).copied().collect();
    let last = out.last().copied().unwrap_or(0.0);
    out.resize(n, last);
    out
}

/// Compute the profile of one series and install it as `<path>@mp<w>`.
///
/// Returns the installed key, or `None` when the series is missing or was
/// left unchanged.
pub fn install_matrix_profile(
    dataset: &mut Dataset,
    uid: ObjectId,
    path: &str,
    window: usize,
    fill: FillPolicy,
    seed: Option<u64>,
) -> Option<String> {
    let readings = dataset.series(uid, path)?;
    let domain = dataset.schema().domain(uid, path)?;
    let outcome = matrix_profile_of(readings, domain, window, fill, seed);
    let mp = outcome.profile()?;
    let padded = pad_to(&mp.profile, readings.len());
    dataset.install_derived(uid, path, &format!("@mp{window}"), &padded)
}
