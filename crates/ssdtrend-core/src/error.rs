//! Error type for the telemetry pipeline.
//!
//! Only conditions the caller must act on are errors. Recoverable data
//! problems (malformed lines, filename fallbacks, domain widening, degenerate
//! transforms) are logged and reported in structured results instead.

use std::path::PathBuf;

use thiserror::Error;

use crate::schema::Schema;
use crate::validity::BrokenField;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Payload of a validity-gate rejection.
#[derive(Debug, Clone)]
pub struct Rejection {
    pub threshold: f64,
    pub broken: Vec<BrokenField>,
    /// Schema as discovered up to the point of rejection.
    pub schema: Schema,
    /// File names of the snapshots that were read.
    pub snapshots_read: Vec<String>,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("dataset rejected by validity gate: {} broken field(s) at threshold {}", .0.broken.len(), .0.threshold)]
    Rejected(Box<Rejection>),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{origin}:{line}: {detail}")]
    Format {
        origin: String,
        line: usize,
        detail: String,
    },

    #[error("decoder failed for {path}: {detail}")]
    Decoder { path: PathBuf, detail: String },

    #[error("no snapshot with an object block in {path}")]
    EmptyCorpus { path: PathBuf },

    #[error("model {model}: {detail}")]
    Model { model: String, detail: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Attach a path to an I/O error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn format(origin: impl Into<String>, line: usize, detail: impl Into<String>) -> Self {
        Self::Format {
            origin: origin.into(),
            line,
            detail: detail.into(),
        }
    }

    /// Process exit code for this error: 2 for a gate rejection, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Rejected(_) => 2,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let rejected = Error::Rejected(Box::new(Rejection {
            threshold: 0.6,
            broken: Vec::new(),
            schema: Schema::default(),
            snapshots_read: Vec::new(),
        }));
        assert_eq!(rejected.exit_code(), 2);
        assert_eq!(Error::Config("x".into()).exit_code(), 1);
        let io = Error::io("a.txt", std::io::Error::other("boom"));
        assert_eq!(io.exit_code(), 1);
        assert!(io.to_string().contains("a.txt"));
    }

    #[test]
    fn test_format_display() {
        let e = Error::format("data.ini", 12, "unterminated list");
        assert_eq!(e.to_string(), "data.ini:12: unterminated list");
    }
}
