//! `ssdtrend ingest`: snapshot directory to canonical files.

use std::path::PathBuf;

use ssdtrend_core::dump::ParseMode;
use ssdtrend_core::{Error, corpus};

pub struct IngestCommandConfig<'a> {
    pub config_path: Option<&'a str>,
    pub input: Option<&'a str>,
    pub output: Option<&'a str>,
    pub threshold: Option<f64>,
    pub header: Option<&'a str>,
    pub parse_mode: Option<&'a str>,
    pub stem: Option<&'a str>,
    pub json: bool,
}

pub fn run(cmd: IngestCommandConfig<'_>) {
    let mut config = super::load_config(cmd.config_path);
    if let Some(input) = cmd.input {
        config.snapshot_directory = PathBuf::from(input);
    }
    if let Some(output) = cmd.output {
        config.output_directory = PathBuf::from(output);
    }
    if let Some(t) = cmd.threshold {
        config.validity_threshold = t;
    }
    if let Some(h) = cmd.header {
        config.header_object_id = super::parse_object_id(h);
    }
    if let Some(mode) = cmd.parse_mode {
        config.parse_mode = match mode {
            "flat" => ParseMode::Flat,
            _ => ParseMode::Nested,
        };
    }
    if let Some(stem) = cmd.stem {
        config.output_stem = stem.to_string();
    }
    if let Err(e) = config.validate() {
        super::fail(&e);
    }
    log::debug!("pipeline config: {config:?}");

    let (outcome, outputs) = match corpus::run(&config) {
        Ok(r) => r,
        Err(Error::Rejected(rejection)) => {
            eprintln!(
                "Corpus rejected: {} empty field(s) across {} snapshot(s), threshold {:.2}",
                rejection.broken.len(),
                rejection.snapshots_read.len(),
                rejection.threshold
            );
            for b in rejection.broken.iter().take(10) {
                eprintln!("  {b}");
            }
            if rejection.broken.len() > 10 {
                eprintln!("  ... and {} more", rejection.broken.len() - 10);
            }
            std::process::exit(2);
        }
        Err(e) => super::fail(&e),
    };

    if cmd.json {
        match outputs.run_manifest.to_json() {
            Ok(json) => println!("{json}"),
            Err(e) => super::fail(&e),
        }
        return;
    }

    let ds = &outcome.dataset;
    println!("Ingested {} snapshot(s) from {}", outcome.snapshots.len(), config.snapshot_directory.display());
    if !outcome.skipped.is_empty() {
        println!("Skipped {} snapshot(s):", outcome.skipped.len());
        for (name, reason) in &outcome.skipped {
            println!("  {name}: {reason}");
        }
    }
    println!(
        "  {} objects, {} fields",
        ds.object_count(),
        ds.schema().field_count()
    );
    let p = &outcome.parse;
    println!(
        "  {} blocks, {} malformed lines, {} incomplete signatures",
        p.blocks, p.malformed_lines, p.incomplete_signatures
    );
    let status = outcome
        .header
        .signature
        .as_ref()
        .map_or("unknown", |s| s.status());
    println!(
        "  header {}: payload {:?}, device {status}",
        outcome.header.header_uid, outcome.header.validity
    );
    println!();
    println!("  {}", outputs.files.sections.display());
    println!("  {}", outputs.files.rows.display());
    println!("  {}", outputs.manifest.display());
}
