//! Augmented Dickey-Fuller unit-root test.
//!
//! Regression with a constant term:
//!
//! ```text
//! Δy_t = α + γ·y_{t-1} + Σ_{i=1..p} β_i·Δy_{t-i} + ε_t
//! ```
//!
//! The lag order `p` is chosen by AIC over `0..=maxlag` on a common sample,
//! then the model is refit on the largest sample that order allows. The test
//! statistic is the t value of `γ`; the p-value uses MacKinnon's (1994)
//! response-surface approximation for one series with a constant.

use statrs::distribution::{ContinuousCDF, Normal};

use crate::regression::{OlsFit, ols};

/// Significance threshold used by the constant-feature pruner.
pub const DEFAULT_P_THRESHOLD: f64 = 0.05;

/// Outcome of one ADF test.
#[derive(Debug, Clone)]
pub struct AdfResult {
    pub statistic: f64,
    pub p_value: f64,
    /// Lagged differences in the final regression.
    pub used_lag: usize,
    /// Observations in the final regression.
    pub nobs: usize,
}

/// Schwert's rule of thumb: `⌈12·(n/100)^{1/4}⌉`.
pub fn default_max_lag(n: usize) -> usize {
    (12.0 * (n as f64 / 100.0).powf(0.25)).ceil() as usize
}

/// ADF test with the default maximum lag.
///
/// Returns `None` when the series is too short or the regression is singular
/// (for instance a constant series).
pub fn adf_test(values: &[f64]) -> Option<AdfResult> {
    adf_test_with_max_lag(values, default_max_lag(values.len()))
}

/// ADF test considering at most `max_lag` lagged differences.
pub fn adf_test_with_max_lag(values: &[f64], max_lag: usize) -> Option<AdfResult> {
    let n = values.len();
    // Leave room for the constant, the level and at least one residual dof.
    let bound = (n / 2).checked_sub(2)?;
    let max_lag = max_lag.min(bound);
    if values.iter().any(|v| !v.is_finite()) {
        return None;
    }

    let diffs: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();

    let mut best: Option<(usize, f64)> = None;
    for lag in 0..=max_lag {
        let Some(fit) = fit_adf(values, &diffs, lag, max_lag) else {
            continue;
        };
        let aic = fit.aic();
        match best {
            Some((_, best_aic)) if aic >= best_aic => {}
            _ => best = Some((lag, aic)),
        }
    }
    let (lag, _) = best?;

    let fit = fit_adf(values, &diffs, lag, lag)?;
    let statistic = fit.t_value(1);
    if !statistic.is_finite() {
        return None;
    }
    Some(AdfResult {
        statistic,
        p_value: mackinnon_p_value(statistic),
        used_lag: lag,
        nobs: fit.nobs,
    })
}

/// Fit the ADF regression with `lag` differences on rows starting at `start`.
///
/// Row `r` regresses `Δy[r]` on `[1, y[r], Δy[r-1], ..., Δy[r-lag]]`.
fn fit_adf(values: &[f64], diffs: &[f64], lag: usize, start: usize) -> Option<OlsFit> {
    let rows: Vec<Vec<f64>> = (start..diffs.len())
        .map(|r| {
            let mut row = Vec::with_capacity(lag + 2);
            row.push(1.0);
            row.push(values[r]);
            row.extend((1..=lag).map(|i| diffs[r - i]));
            row
        })
        .collect();
    ols(&diffs[start..], &rows)
}

/// MacKinnon (1994) approximate p-value for the constant-only ADF statistic.
pub fn mackinnon_p_value(statistic: f64) -> f64 {
    const TAU_MAX: f64 = 2.74;
    const TAU_MIN: f64 = -18.83;
    const TAU_STAR: f64 = -1.61;
    const SMALL_P: [f64; 3] = [2.1659, 1.4412, 3.8269e-2];
    const LARGE_P: [f64; 4] = [1.7339, 9.3202e-1, -1.2745e-1, -1.0368e-2];

    if statistic > TAU_MAX {
        return 1.0;
    }
    if statistic < TAU_MIN {
        return 0.0;
    }
    let coefficients: &[f64] = if statistic <= TAU_STAR {
        &SMALL_P
    } else {
        &LARGE_P
    };
    let z = coefficients
        .iter()
        .rev()
        .fold(0.0, |acc, &c| acc * statistic + c);
    Normal::standard().cdf(z)
}
