//! Corpus ingestion: discover, order, decode, parse, align, gate.
//!
//! Snapshot files in the corpus directory are ordered by the snapshot clock,
//! turned into text by a [`SnapshotDecoder`], parsed, and folded into one
//! [`Dataset`]. The validity gate runs last; a rejection carries the schema
//! discovered so far and the snapshots that were read.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use flate2::read::GzDecoder;

use crate::align::{AlignmentDiagnostics, DatasetBuilder};
use crate::canonical::{self, CanonicalFiles};
use crate::clock::{SnapshotKey, snapshot_key};
use crate::config::{DecoderConfig, PipelineConfig};
use crate::dataset::Dataset;
use crate::dump::{DumpParser, ParseReport};
use crate::error::{Error, Rejection, Result};
use crate::header::{HeaderExtraction, extract_device_signature};
use crate::manifest::RunManifest;
use crate::validity::{ERROR_LOG_FILE, GateVerdict, ValidityGate, write_broken_report};

// ---------------------------------------------------------------------------
// Decoders
// ---------------------------------------------------------------------------

/// Turns one snapshot file into dump text.
pub trait SnapshotDecoder: Send + Sync {
    fn name(&self) -> &str;

    /// Whether this decoder handles `path`.
    fn accepts(&self, path: &Path) -> bool;

    fn decode(&self, path: &Path) -> Result<String>;
}

/// Reads already-decoded dumps: plain text, or gzip when the name ends in `.gz`.
/// Raw `.bin` captures and content that is not text are left to other decoders.
pub struct TextDumpDecoder;

impl SnapshotDecoder for TextDumpDecoder {
    fn name(&self) -> &str {
        "text"
    }

    fn accepts(&self, path: &Path) -> bool {
        !has_extension(path, "bin")
    }

    fn decode(&self, path: &Path) -> Result<String> {
        let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;
        let bytes = if has_extension(path, "gz") {
            let mut out = Vec::new();
            GzDecoder::new(bytes.as_slice())
                .read_to_end(&mut out)
                .map_err(|e| Error::Decoder {
                    path: path.to_path_buf(),
                    detail: format!("gzip: {e}"),
                })?;
            out
        } else {
            bytes
        };
        let not_text = |detail: &str| Error::Decoder {
            path: path.to_path_buf(),
            detail: detail.to_string(),
        };
        if bytes.contains(&0) {
            return Err(not_text("binary content, not a text dump"));
        }
        String::from_utf8(bytes).map_err(|_| not_text("not UTF-8 text"))
    }
}

/// Runs `<program> <args...> <snapshot>` and reads the dump from stdout.
pub struct ExternalCommandDecoder {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub timeout: Duration,
    pub extensions: Vec<String>,
}

impl From<&DecoderConfig> for ExternalCommandDecoder {
    fn from(config: &DecoderConfig) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            timeout: Duration::from_secs(config.timeout_seconds),
            extensions: config.extensions.clone(),
        }
    }
}

fn drain(mut reader: impl Read + Send + 'static) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut out = Vec::new();
        let _ = reader.read_to_end(&mut out);
        out
    })
}

impl SnapshotDecoder for ExternalCommandDecoder {
    fn name(&self) -> &str {
        "external"
    }

    fn accepts(&self, path: &Path) -> bool {
        self.extensions.iter().any(|ext| has_extension(path, ext))
    }

    fn decode(&self, path: &Path) -> Result<String> {
        let failure = |detail: String| Error::Decoder {
            path: path.to_path_buf(),
            detail,
        };
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| failure(format!("cannot start {}: {e}", self.program.display())))?;

        // Drain both pipes so a chatty decoder cannot block on a full buffer.
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let start = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if start.elapsed() >= self.timeout {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(failure(format!("timed out after {:?}", self.timeout)));
                    }
                    thread::sleep(Duration::from_millis(5));
                }
                Err(e) => return Err(failure(e.to_string())),
            }
        };

        let out = stdout.and_then(|h| h.join().ok()).unwrap_or_default();
        let err = stderr.and_then(|h| h.join().ok()).unwrap_or_default();
        if !status.success() {
            let err = String::from_utf8_lossy(&err);
            return Err(failure(format!("{status}: {}", err.trim())));
        }
        Ok(String::from_utf8_lossy(&out).into_owned())
    }
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

/// One snapshot file with its clock key.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    pub path: PathBuf,
    pub key: SnapshotKey,
}

/// Files the pipeline writes itself and never reads back as snapshots.
fn is_pipeline_output(name: &str) -> bool {
    name == ERROR_LOG_FILE
        || name.ends_with("_NLOG.txt")
        || [".ini", ".tsv", ".csv", ".json"]
            .iter()
            .any(|ext| name.ends_with(ext))
}

/// Snapshot files of `dir` in clock order.
pub fn discover_snapshots(dir: &Path) -> Result<Vec<SnapshotFile>> {
    let entries = fs::read_dir(dir).map_err(|e| Error::io(dir, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error::io(dir, e))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') || is_pipeline_output(&name) {
            continue;
        }
        let key = snapshot_key(&path);
        files.push(SnapshotFile { path, key });
    }
    files.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(files)
}

// ---------------------------------------------------------------------------
// Ingestion
// ---------------------------------------------------------------------------

/// Everything a successful ingestion produced.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub dataset: Dataset,
    pub snapshots: Vec<SnapshotKey>,
    /// Snapshots the decoder could not read, with the reason.
    pub skipped: Vec<(String, String)>,
    pub parse: ParseReport,
    pub alignment: AlignmentDiagnostics,
    pub header: HeaderExtraction,
    pub verdict: GateVerdict,
}

pub struct Ingestor {
    config: PipelineConfig,
    parser: DumpParser,
    decoders: Vec<Box<dyn SnapshotDecoder>>,
}

impl Ingestor {
    /// Decoders: the configured external decoder first, then plain text.
    pub fn new(config: &PipelineConfig) -> Self {
        let mut decoders: Vec<Box<dyn SnapshotDecoder>> = Vec::new();
        if let Some(decoder) = &config.decoder {
            decoders.push(Box::new(ExternalCommandDecoder::from(decoder)));
        }
        decoders.push(Box::new(TextDumpDecoder));
        Self {
            config: config.clone(),
            parser: DumpParser {
                mode: config.parse_mode,
                malformed_warn_threshold: config.malformed_warn_threshold,
            },
            decoders,
        }
    }

    /// Put `decoder` ahead of the existing ones.
    pub fn with_decoder(mut self, decoder: Box<dyn SnapshotDecoder>) -> Self {
        self.decoders.insert(0, decoder);
        self
    }

    fn decoder_for(&self, path: &Path) -> Option<&dyn SnapshotDecoder> {
        self.decoders
            .iter()
            .find(|d| d.accepts(path))
            .map(|d| d.as_ref())
    }

    /// Ingest the configured snapshot directory.
    pub fn ingest(&self) -> Result<IngestOutcome> {
        let dir = &self.config.snapshot_directory;
        let files = discover_snapshots(dir)?;
        if files.is_empty() {
            return Err(Error::EmptyCorpus { path: dir.clone() });
        }
        self.ingest_files(&files)
    }

    /// Ingest files that are already in clock order.
    pub fn ingest_files(&self, files: &[SnapshotFile]) -> Result<IngestOutcome> {
        let mut builder = DatasetBuilder::new();
        let mut parse = ParseReport::default();
        let mut snapshots = Vec::new();
        let mut skipped = Vec::new();
        let mut any_blocks = false;

        for file in files {
            let name = file.key.file_name.clone();
            let Some(decoder) = self.decoder_for(&file.path) else {
                skipped.push((name, "no decoder accepts this file".to_string()));
                continue;
            };
            let text = match decoder.decode(&file.path) {
                Ok(text) => text,
                Err(e @ Error::Decoder { .. }) => {
                    log::warn!("{name}: {e}, snapshot skipped");
                    skipped.push((name, e.to_string()));
                    continue;
                }
                Err(e) => return Err(e),
            };
            let parsed = self.parser.parse(&text, &name);
            if parsed.is_empty() {
                log::warn!("{name}: no valid object block");
            }
            any_blocks |= !parsed.is_empty();
            parse.absorb(&parsed.report);
            builder.add_snapshot(file.key.timestamp.to_string(), &parsed.blocks);
            snapshots.push(file.key.clone());
        }

        if !any_blocks {
            let path = files
                .first()
                .and_then(|f| f.path.parent())
                .map(Path::to_path_buf)
                .unwrap_or_default();
            return Err(Error::EmptyCorpus { path });
        }

        let (dataset, alignment) = builder.close();
        log::info!(
            "aligned {} snapshots: {} objects, {} fields",
            snapshots.len(),
            dataset.object_count(),
            dataset.schema().field_count()
        );

        let header = extract_device_signature(&dataset, self.config.header_object_id);
        let verdict = ValidityGate::new(self.config.validity_threshold).evaluate(&dataset);
        if !verdict.accepted {
            return Err(Error::Rejected(Box::new(Rejection {
                threshold: verdict.threshold,
                broken: verdict.broken,
                schema: dataset.schema().clone(),
                snapshots_read: snapshots.iter().map(|k| k.file_name.clone()).collect(),
            })));
        }

        Ok(IngestOutcome {
            dataset,
            snapshots,
            skipped,
            parse,
            alignment,
            header,
            verdict,
        })
    }
}

/// Ingest with the default decoders.
pub fn ingest(config: &PipelineConfig) -> Result<IngestOutcome> {
    Ingestor::new(config).ingest()
}

/// What [`run`] wrote.
#[derive(Debug, Clone)]
pub struct RunOutputs {
    pub files: CanonicalFiles,
    pub manifest: PathBuf,
    /// The manifest exactly as written to `manifest`.
    pub run_manifest: RunManifest,
}

/// Ingest and write the canonical files plus the run manifest.
///
/// On rejection the broken-field report is written to the output directory
/// before the error is returned.
pub fn run(config: &PipelineConfig) -> Result<(IngestOutcome, RunOutputs)> {
    let out_dir = &config.output_directory;
    let outcome = match ingest(config) {
        Ok(outcome) => outcome,
        Err(Error::Rejected(rejection)) => {
            fs::create_dir_all(out_dir).map_err(|e| Error::io(out_dir, e))?;
            let report = out_dir.join(ERROR_LOG_FILE);
            write_broken_report(&rejection.broken, &report)?;
            log::error!("broken fields written to {}", report.display());
            return Err(Error::Rejected(rejection));
        }
        Err(e) => return Err(e),
    };

    let files = canonical::write_files(&outcome.dataset, out_dir, &config.output_stem)?;
    let run_manifest = RunManifest::from_outcome(&outcome, config);
    let manifest = out_dir.join(format!("{}.manifest.json", config.output_stem));
    run_manifest.write(&manifest)?;
    Ok((
        outcome,
        RunOutputs {
            files,
            manifest,
            run_manifest,
        },
    ))
}
