//! `ssdtrend nlog`: merge per-snapshot event logs.

use std::path::{Path, PathBuf};

use ssdtrend_core::nlog::merge_files;
use ssdtrend_core::{Error, snapshot_key};

pub fn run(input: &str, output: &str, stem: &str) {
    let dir = Path::new(input);
    let entries = std::fs::read_dir(dir).unwrap_or_else(|e| super::fail(&Error::io(dir, e)));
    let merged_name = format!("{stem}_NLOG.txt");

    let mut logs: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with("_NLOG.txt") && n != merged_name)
        })
        .collect();
    if logs.is_empty() {
        println!("No *_NLOG.txt files in {input}");
        return;
    }
    // Same clock as the snapshots the logs belong to.
    logs.sort_by_cached_key(|p| snapshot_key(p));

    match merge_files(&logs, Path::new(output), stem) {
        Ok(out) => println!("Merged {} log(s) into {}", logs.len(), out.display()),
        Err(e) => super::fail(&e),
    }
}
