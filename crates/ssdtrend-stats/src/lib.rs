//! Numerical building blocks for telemetry series.
//!
//! - [`matrix_profile`]: STOMP self-join matrix profile, motifs and discords.
//! - [`stationarity`]: Augmented Dickey-Fuller test with AIC lag selection.
//! - [`regression`]: small dense ordinary least squares.
//! - [`noise`]: seeded Gaussian perturbation.
//!
//! Everything here works on plain `&[f64]` slices and knows nothing about
//! telemetry objects or datasets.

pub mod matrix_profile;
pub mod noise;
pub mod regression;
pub mod stationarity;

pub use matrix_profile::{
    DEFAULT_WINDOW, MatrixProfile, Motif, in_exclusion_zone, resample, sliding_dot_product,
    stomp, top_discords, top_motifs,
};
pub use noise::{GaussianNoise, perturb};
pub use regression::{OlsFit, ols};
pub use stationarity::{AdfResult, DEFAULT_P_THRESHOLD, adf_test, mackinnon_p_value};
