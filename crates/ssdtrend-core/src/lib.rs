//! # ssdtrend-core
//!
//! **SSD telemetry snapshots in, aligned time series out.**
//!
//! `ssdtrend-core` reads a directory of decoded telemetry dumps, orders the
//! snapshots by acquisition time, parses every object block, and aligns the
//! readings into one series per `(object, field)` with exactly one reading per
//! snapshot. The resulting [`Dataset`] is gated for validity, written in two
//! canonical text formats, and exposed to forecasting back-ends through a
//! [`ModelSurface`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use ssdtrend_core::{PipelineConfig, corpus};
//!
//! let config = PipelineConfig {
//!     snapshot_directory: "dumps".into(),
//!     output_directory: "out".into(),
//!     ..Default::default()
//! };
//! let (outcome, outputs) = corpus::run(&config).expect("ingestion failed");
//! println!(
//!     "{} snapshots, {} objects -> {}",
//!     outcome.snapshots.len(),
//!     outcome.dataset.object_count(),
//!     outputs.files.sections.display()
//! );
//! ```
//!
//! ## Architecture
//!
//! clock → dump → schema → align → header → validity → canonical
//!
//! The matrix profile ([`transform`]), constant-feature pruning ([`prune`])
//! and per-object profiling ([`profile`]) work on a finished dataset. Object
//! profiling fans out over the [`parallel`] layer with a per-task deadline.

pub mod adapter;
pub mod align;
pub mod canonical;
pub mod clock;
pub mod config;
pub mod corpus;
pub mod dataset;
pub mod dump;
pub mod error;
pub mod forecast;
pub mod header;
pub mod manifest;
pub mod nlog;
pub mod parallel;
pub mod profile;
pub mod prune;
pub mod schema;
pub mod transform;
pub mod validity;

pub use adapter::{
    ForecastEvaluation, ForecastModel, ModelSurface, TemporalSplit, Transform, evaluate_one_step,
    split,
};
pub use align::{AlignmentDiagnostics, DatasetBuilder, FillPolicy};
pub use canonical::{fingerprint, read_path, read_rows, read_sections, write_rows, write_sections};
pub use clock::{SnapshotKey, SnapshotStamp, normalize_legacy_name, snapshot_key};
pub use config::{DecoderConfig, PipelineConfig, SplitRatios};
pub use corpus::{
    ExternalCommandDecoder, IngestOutcome, Ingestor, SnapshotDecoder, TextDumpDecoder, ingest,
};
pub use dataset::{
    DEFAULT_HEADER_UID, Dataset, ObjectId, ObjectSeries, Reading, TIMESTAMP_UID,
};
pub use dump::{DumpParser, ObjectBlock, ParseMode, ParsedSnapshot};
pub use error::{Error, Rejection, Result};
pub use forecast::AutoRegressive;
pub use header::{DeviceSignature, HeaderExtraction, PayloadValidity, extract_device_signature};
pub use manifest::RunManifest;
pub use parallel::{ParallelOptions, ResultOrder, TaskOutcome, run_parallel};
pub use profile::{ProfileOptions, ProfileReport, profile_dataset};
pub use prune::{Stationarity, StationarityReport, annotate, classify};
pub use schema::{Domain, Schema};
pub use transform::{MpOutcome, matrix_profile_of};
pub use validity::{BrokenField, GateVerdict, ValidityGate};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
