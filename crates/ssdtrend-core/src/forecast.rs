//! Baseline auto-regressive forecaster.
//!
//! `y_t = c + φ_1·y_{t-1} + … + φ_p·y_{t-p}`, fitted by ordinary least
//! squares. It exists so the adapter surface has a real model to drive.

use ssdtrend_stats::{OlsFit, ols};

use crate::adapter::ForecastModel;
use crate::error::{Error, Result};

pub struct AutoRegressive {
    order: usize,
    name: String,
    fit: Option<OlsFit>,
}

impl AutoRegressive {
    pub fn new(order: usize) -> Self {
        Self {
            order,
            name: format!("ar({order})"),
            fit: None,
        }
    }

    pub fn order(&self) -> usize {
        self.order
    }

    /// Intercept followed by the lag coefficients, once fitted.
    pub fn coefficients(&self) -> Option<&[f64]> {
        self.fit.as_ref().map(|f| f.coefficients.as_slice())
    }

    fn row(&self, history: &[f64]) -> Option<Vec<f64>> {
        if history.len() < self.order {
            return None;
        }
        let mut row = Vec::with_capacity(self.order + 1);
        row.push(1.0);
        row.extend(history.iter().rev().take(self.order));
        Some(row)
    }

    /// Iterated forecast of the next `steps` values.
    pub fn forecast(&self, history: &[f64], steps: usize) -> Option<Vec<f64>> {
        let mut extended = history.to_vec();
        let mut out = Vec::with_capacity(steps);
        for _ in 0..steps {
            let next = self.predict_next(&extended)?;
            out.push(next);
            extended.push(next);
        }
        Some(out)
    }

    fn error(&self, detail: impl Into<String>) -> Error {
        Error::Model {
            model: self.name.clone(),
            detail: detail.into(),
        }
    }
}

impl ForecastModel for AutoRegressive {
    fn name(&self) -> &str {
        &self.name
    }

    fn fit(&mut self, train: &[f64]) -> Result<()> {
        let p = self.order;
        // Need more equations than unknowns.
        if train.len() <= 2 * p + 1 {
            return Err(self.error(format!("{} training values are too few", train.len())));
        }
        if train.iter().any(|v| !v.is_finite()) {
            return Err(self.error("training values must be finite"));
        }
        let mut rows = Vec::with_capacity(train.len() - p);
        for t in p..train.len() {
            // `row` only fails when history is shorter than the order.
            let row = self
                .row(&train[..t])
                .ok_or_else(|| self.error("history shorter than order"))?;
            rows.push(row);
        }
        let fit = ols(&train[p..], &rows).ok_or_else(|| self.error("singular design matrix"))?;
        log::debug!("{} fitted: {:?}", self.name, fit.coefficients);
        self.fit = Some(fit);
        Ok(())
    }

    fn predict_next(&self, history: &[f64]) -> Option<f64> {
        let fit = self.fit.as_ref()?;
        Some(fit.predict(&self.row(history)?))
    }
}
