//! Pipeline configuration.
//!
//! Loaded from a JSON file; every key is optional and falls back to
//! [`PipelineConfig::default`]. Relative paths in the file are resolved
//! against the file's directory. Command-line flags override after loading.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::align::FillPolicy;
use crate::dataset::{DEFAULT_HEADER_UID, ObjectId};
use crate::dump::{DEFAULT_MALFORMED_WARN_THRESHOLD, ParseMode};
use crate::error::{Error, Result};
use crate::validity::DEFAULT_VALIDITY_THRESHOLD;

/// Default worker deadline for the parallel layer.
pub const DEFAULT_PARALLEL_TIMEOUT_SECS: u64 = 180;

/// Default base name of the canonical output files.
pub const DEFAULT_OUTPUT_STEM: &str = "time-series";

/// Train / validation / test fractions of a temporal split.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitRatios {
    pub train: f64,
    pub validation: f64,
    pub test: f64,
}

impl Default for SplitRatios {
    fn default() -> Self {
        Self {
            train: 0.7,
            validation: 0.2,
            test: 0.1,
        }
    }
}

impl SplitRatios {
    /// All fractions finite and non-negative, summing to one.
    pub fn is_valid(&self) -> bool {
        let parts = [self.train, self.validation, self.test];
        parts.iter().all(|r| r.is_finite() && *r >= 0.0)
            && (parts.iter().sum::<f64>() - 1.0).abs() < 1e-6
    }
}

/// External program that turns a binary snapshot into a text dump.
///
/// Invoked as `<program> <args...> <snapshot path>`; the dump is read from
/// its standard output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecoderConfig {
    pub program: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_decoder_timeout")]
    pub timeout_seconds: u64,
    /// File extensions routed through the decoder.
    #[serde(default = "default_decoder_extensions")]
    pub extensions: Vec<String>,
}

fn default_decoder_timeout() -> u64 {
    60
}

fn default_decoder_extensions() -> Vec<String> {
    vec!["bin".to_string()]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub snapshot_directory: PathBuf,
    pub output_directory: PathBuf,
    pub header_object_id: ObjectId,
    pub validity_threshold: f64,
    pub matrix_profile_window: usize,
    pub fill_policy: FillPolicy,
    pub stationarity_p_value: f64,
    pub parallel_timeout_seconds: u64,
    pub parse_mode: ParseMode,
    pub malformed_warn_threshold: usize,
    pub split: SplitRatios,
    /// Seed of the epsilon perturbation; `None` draws from the OS.
    pub noise_seed: Option<u64>,
    pub output_stem: String,
    pub decoder: Option<DecoderConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            snapshot_directory: PathBuf::from("."),
            output_directory: PathBuf::from("."),
            header_object_id: DEFAULT_HEADER_UID,
            validity_threshold: DEFAULT_VALIDITY_THRESHOLD,
            matrix_profile_window: ssdtrend_stats::DEFAULT_WINDOW,
            fill_policy: FillPolicy::default(),
            stationarity_p_value: ssdtrend_stats::DEFAULT_P_THRESHOLD,
            parallel_timeout_seconds: DEFAULT_PARALLEL_TIMEOUT_SECS,
            parse_mode: ParseMode::default(),
            malformed_warn_threshold: DEFAULT_MALFORMED_WARN_THRESHOLD,
            split: SplitRatios::default(),
            noise_seed: None,
            output_stem: DEFAULT_OUTPUT_STEM.to_string(),
            decoder: None,
        }
    }
}

impl PipelineConfig {
    /// Load and validate a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let mut config: PipelineConfig = serde_json::from_str(&text)?;
        config.rebase_paths(path);
        config.validate()?;
        Ok(config)
    }

    fn rebase_paths(&mut self, path: &Path) {
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        self.snapshot_directory = join_base(base, &self.snapshot_directory);
        self.output_directory = join_base(base, &self.output_directory);
        if let Some(decoder) = &mut self.decoder {
            // Bare program names are looked up on PATH.
            if decoder.program.components().count() > 1 {
                decoder.program = join_base(base, &decoder.program);
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.validity_threshold) {
            return Err(Error::Config(format!(
                "validity_threshold must be within [0, 1], got {}",
                self.validity_threshold
            )));
        }
        if !(self.stationarity_p_value > 0.0 && self.stationarity_p_value < 1.0) {
            return Err(Error::Config(format!(
                "stationarity_p_value must be within (0, 1), got {}",
                self.stationarity_p_value
            )));
        }
        if self.matrix_profile_window == 0 {
            return Err(Error::Config("matrix_profile_window must be positive".into()));
        }
        if self.parallel_timeout_seconds == 0 {
            return Err(Error::Config("parallel_timeout_seconds must be positive".into()));
        }
        if !self.split.is_valid() {
            return Err(Error::Config(format!(
                "split fractions must be non-negative and sum to 1, got {:?}",
                self.split
            )));
        }
        let stem_ok = !self.output_stem.is_empty()
            && !self.output_stem.contains(['/', '\\'])
            && self.output_stem != "."
            && self.output_stem != "..";
        if !stem_ok {
            return Err(Error::Config(format!(
                "output_stem '{}' is not a plain file name",
                self.output_stem
            )));
        }
        Ok(())
    }

    pub fn parallel_timeout(&self) -> Duration {
        Duration::from_secs(self.parallel_timeout_seconds)
    }
}

fn join_base(base: &Path, p: &Path) -> PathBuf {
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base.join(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = PipelineConfig::default();
        assert_eq!(c.header_object_id, ObjectId(240));
        assert_eq!(c.validity_threshold, 0.6);
        assert_eq!(c.matrix_profile_window, 20);
        assert_eq!(c.parallel_timeout(), Duration::from_secs(180));
        assert_eq!(c.output_stem, "time-series");
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        std::fs::write(
            &path,
            r#"{
                "snapshot_directory": "dumps",
                "header_object_id": "uid-17",
                "fill_policy": "null",
                "parse_mode": "flat",
                "split": { "train": 0.8, "validation": 0.1, "test": 0.1 },
                "decoder": { "program": "tools/decode" }
            }"#,
        )
        .unwrap();
        let c = PipelineConfig::load(&path).unwrap();
        assert_eq!(c.snapshot_directory, dir.path().join("dumps"));
        assert_eq!(c.header_object_id, ObjectId(17));
        assert_eq!(c.fill_policy, FillPolicy::Null);
        assert_eq!(c.parse_mode, ParseMode::Flat);
        assert_eq!(c.validity_threshold, 0.6);
        let decoder = c.decoder.unwrap();
        assert_eq!(decoder.program, dir.path().join("tools/decode"));
        assert_eq!(decoder.timeout_seconds, 60);
        assert_eq!(decoder.extensions, vec!["bin".to_string()]);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad = [
            PipelineConfig {
                validity_threshold: 1.5,
                ..Default::default()
            },
            PipelineConfig {
                stationarity_p_value: 0.0,
                ..Default::default()
            },
            PipelineConfig {
                matrix_profile_window: 0,
                ..Default::default()
            },
            PipelineConfig {
                split: SplitRatios {
                    train: 0.9,
                    validation: 0.2,
                    test: 0.1,
                },
                ..Default::default()
            },
            PipelineConfig {
                output_stem: "../x".into(),
                ..Default::default()
            },
        ];
        for c in bad {
            assert!(matches!(c.validate(), Err(Error::Config(_))), "{c:?}");
        }
    }

    #[test]
    fn test_malformed_json_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(PipelineConfig::load(&path), Err(Error::Json(_))));
    }
}
